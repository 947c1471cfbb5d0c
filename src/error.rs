use thiserror::Error;

macro_rules! type_load_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::TypeLoad {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::TypeLoad {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors are produced at three levels: by the type system (loading and resolving types),
/// by the dependency analysis (expanding a single node), and by the compilation driver
/// (escalating node failures, code generation and cancellation).
///
/// # Error Categories
///
/// ## Type System Errors
/// - [`Error::TypeLoad`] - The type system could not give a consistent answer for a type
/// - [`Error::TypeError`] - A request to the type system was malformed
///
/// ## Reachability Errors
/// - [`Error::UnresolvedReference`] - A method body references something that does not exist
/// - [`Error::RecursiveGenericTooDeep`] - Generic expansion did not converge
/// - [`Error::MethodBodyNotAvailable`] - A required method has no body
///
/// ## Compilation Errors
/// - [`Error::CodeGeneration`] - The backend could not generate code for a method
/// - [`Error::CompilationFailed`] - A fatal error, with the recoverable failures seen so far
/// - [`Error::ScannerMismatch`] - The compile pass reached code the scan never saw
/// - [`Error::Cancelled`] - The run was aborted through its cancellation token
///
/// # Examples
///
/// ```rust,ignore
/// use dotaot::prelude::*;
///
/// match compilation.run() {
///     Ok(results) => println!("{} methods compiled", results.methods().len()),
///     Err(Error::UnresolvedReference { symbol, referenced_from }) => {
///         eprintln!("{referenced_from} references missing {symbol}");
///     }
///     Err(e) => eprintln!("compilation failed: {e}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A type could not be loaded consistently.
    ///
    /// Raised for type-system invariant violations such as two MethodImpl records on
    /// different types claiming the same declaration. The source location where the
    /// violation was detected is included for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the inconsistency
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("TypeLoad - {file}:{line}: {message}")]
    TypeLoad {
        /// The message to be printed for the TypeLoad error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// General type system operation error.
    ///
    /// Covers malformed requests such as instantiating a type with the wrong number
    /// of generic arguments or defining the same type twice.
    #[error("{0}")]
    TypeError(String),

    /// A method body references a type, method or field that cannot be found.
    ///
    /// Every node the analysis expands is reachable from a root, so an unresolved
    /// reference encountered during the scan is always fatal.
    #[error("Unresolved reference to '{symbol}' from '{referenced_from}'")]
    UnresolvedReference {
        /// The symbol that could not be resolved
        symbol: String,
        /// The method whose body contains the reference
        referenced_from: String,
    },

    /// Generic instantiation nested deeper than the configured cutoff.
    ///
    /// Recursive generic expansion such as `Node<Node<Node<...>>>` never reaches a
    /// fixed point. Rather than truncating silently the analysis stops here.
    #[error("Recursive generic too deep: '{entity}' has depth {depth}, limit is {limit}")]
    RecursiveGenericTooDeep {
        /// Display name of the entity that exceeded the limit
        entity: String,
        /// The instantiation depth of the entity
        depth: u32,
        /// The configured maximum depth
        limit: u32,
    },

    /// A required method has no body available from the method-body provider.
    #[error("No method body available for '{0}'")]
    MethodBodyNotAvailable(String),

    /// The code generator failed for a method.
    ///
    /// Recoverable for ordinary methods (a trapping stub is emitted instead),
    /// fatal for required roots.
    #[error("Code generation failed for '{method}': {message}")]
    CodeGeneration {
        /// The method that failed to compile
        method: String,
        /// The message reported by the backend
        message: String,
    },

    /// The compilation failed.
    ///
    /// Carries the fatal cause and, separately, the names of methods that failed
    /// recoverably before the run was aborted.
    #[error("Compilation failed: {cause} ({} non-fatal method failures)", method_failures.len())]
    CompilationFailed {
        /// The fatal error
        #[source]
        cause: Box<Error>,
        /// Methods that failed code generation and were replaced by stubs
        method_failures: Vec<String>,
    },

    /// The compile pass reached a node the scan did not mark.
    ///
    /// The devirtualization manager is only sound with respect to what the scanner
    /// observed, so compiling anything outside of the scanned set is a bug.
    #[error("Compile pass reached '{0}' which the scanner did not mark")]
    ScannerMismatch(String),

    /// The run was cancelled between fixed-point iterations.
    #[error("Compilation was cancelled")]
    Cancelled,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` if the error aborts the whole run when raised while expanding
    /// an ordinary, non-root node.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::MethodBodyNotAvailable(_) | Error::CodeGeneration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_load_macro_records_location() {
        let error = type_load_error!("conflicting overrides for {}", "Base::M");
        match error {
            Error::TypeLoad {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "conflicting overrides for Base::M");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::Cancelled.is_fatal());
        assert!(Error::UnresolvedReference {
            symbol: "A".into(),
            referenced_from: "B".into()
        }
        .is_fatal());
        assert!(!Error::MethodBodyNotAvailable("M".into()).is_fatal());
        assert!(!Error::CodeGeneration {
            method: "M".into(),
            message: "unsupported".into()
        }
        .is_fatal());
    }

    #[test]
    fn compilation_failed_display() {
        let error = Error::CompilationFailed {
            cause: Box::new(Error::Cancelled),
            method_failures: vec!["A".into(), "B".into()],
        };
        assert_eq!(
            error.to_string(),
            "Compilation failed: Compilation was cancelled (2 non-fatal method failures)"
        );
    }
}
