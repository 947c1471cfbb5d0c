//! Helpers for writing Graphviz DOT output.

/// Escapes `s` for use inside a quoted DOT label.
///
/// Generic names such as `List<T>` contain characters that are significant in record
/// labels, so angle brackets are escaped along with quotes, backslashes and newlines.
#[must_use]
pub fn escape_dot(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '"' | '<' | '>' | '{' | '}' | '|' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}
