//! Handing compiled output to an object file writer.

use crate::{compilation::NativeCodeBlock, typesystem::MethodId, Result};

/// What a symbol stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Generated code of a method
    Method,
    /// A stub that traps, emitted for a method whose code generation failed
    TrapStub,
}

/// One symbol of the object file, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSymbol {
    /// The mangled name
    pub name: String,
    /// What the symbol stands for
    pub kind: SymbolKind,
    /// The method the code belongs to
    pub method: MethodId,
    /// The code, relocations refer to methods by handle
    pub code: NativeCodeBlock,
}

/// Writes the compiled symbols and the metadata blob to an object file.
///
/// Symbols arrive sorted by name; the writer must preserve that order so that the output
/// is deterministic.
pub trait ObjectWriter {
    /// Writes all symbols and the metadata blob.
    ///
    /// # Errors
    ///
    /// Implementations return any I/O or format error.
    fn write(&mut self, symbols: &[ObjectSymbol], metadata: &[u8]) -> Result<()>;
}

/// An [`ObjectWriter`] that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectWriter {
    /// The symbols written, in order
    pub symbols: Vec<ObjectSymbol>,
    /// The metadata blob written
    pub metadata: Vec<u8>,
}

impl InMemoryObjectWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of the symbols written, in order.
    #[must_use]
    pub fn symbol_names(&self) -> Vec<&str> {
        self.symbols.iter().map(|symbol| symbol.name.as_str()).collect()
    }
}

impl ObjectWriter for InMemoryObjectWriter {
    fn write(&mut self, symbols: &[ObjectSymbol], metadata: &[u8]) -> Result<()> {
        self.symbols.extend_from_slice(symbols);
        self.metadata.extend_from_slice(metadata);
        Ok(())
    }
}
