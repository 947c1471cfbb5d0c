//! Configuration for scanning and compilation.
//!
//! This module provides [`CompilationOptions`], which controls generic sharing, the
//! recursion cutoff for generic expansion, parallelism and the consistency check
//! between the scan and the compile pass.

/// Default cutoff for generic instantiation nesting.
pub const DEFAULT_MAX_GENERIC_DEPTH: u32 = 30;

/// Configuration for a [`crate::compilation::Compilation`].
///
/// Controls how the dependency graph is built and how much of the work runs in
/// parallel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationOptions {
    /// Maximum instantiation nesting depth before a node fails with
    /// [`crate::Error::RecursiveGenericTooDeep`] (default: 30).
    pub max_generic_depth: u32,

    /// Compile one shared body per canonical form instead of one per exact
    /// instantiation (default: true).
    pub shared_generics: bool,

    /// Expand method bodies and generate code on the calling thread (default: false).
    pub single_threaded: bool,

    /// Fail with [`crate::Error::ScannerMismatch`] if the compile pass reaches a method the
    /// scan did not (default: true).
    pub verify_scan: bool,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            max_generic_depth: DEFAULT_MAX_GENERIC_DEPTH,
            shared_generics: true,
            single_threaded: false,
            verify_scan: true,
        }
    }
}

impl CompilationOptions {
    /// Creates options with default settings.
    ///
    /// # Returns
    ///
    /// A new `CompilationOptions` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that keep every step on the calling thread.
    ///
    /// Output is identical to the parallel configuration; this is meant for debugging and
    /// for embedding in hosts that manage their own threads.
    #[must_use]
    pub fn single_threaded() -> Self {
        Self {
            single_threaded: true,
            ..Self::default()
        }
    }

    /// Creates options that compile every exact generic instantiation separately.
    #[must_use]
    pub fn unshared_generics() -> Self {
        Self {
            shared_generics: false,
            ..Self::default()
        }
    }

    /// Sets the generic nesting cutoff.
    ///
    /// # Arguments
    ///
    /// * `depth` - The deepest instantiation nesting accepted.
    ///
    /// # Returns
    ///
    /// The modified options (builder pattern).
    #[must_use]
    pub fn with_max_generic_depth(mut self, depth: u32) -> Self {
        self.max_generic_depth = depth;
        self
    }

    /// Enables or disables shared generic code.
    #[must_use]
    pub fn with_shared_generics(mut self, shared: bool) -> Self {
        self.shared_generics = shared;
        self
    }

    /// Enables or disables parallel expansion and code generation.
    #[must_use]
    pub fn with_single_threaded(mut self, single_threaded: bool) -> Self {
        self.single_threaded = single_threaded;
        self
    }

    /// Enables or disables the scan/compile consistency check.
    #[must_use]
    pub fn with_verify_scan(mut self, verify: bool) -> Self {
        self.verify_scan = verify;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = CompilationOptions::new();
        assert_eq!(options.max_generic_depth, 30);
        assert!(options.shared_generics);
        assert!(!options.single_threaded);
        assert!(options.verify_scan);
    }

    #[test]
    fn presets_and_setters() {
        assert!(CompilationOptions::single_threaded().single_threaded);
        assert!(!CompilationOptions::unshared_generics().shared_generics);

        let options = CompilationOptions::new()
            .with_max_generic_depth(4)
            .with_verify_scan(false);
        assert_eq!(options.max_generic_depth, 4);
        assert!(!options.verify_scan);
        assert!(options.shared_generics);
    }
}
