//! The code generation seam.

use std::fmt::{self, Write};

use crate::{
    devirtualization::DevirtualizationQuery,
    il::{Instruction, MethodBody},
    typesystem::{MethodId, TypeSystemContext},
};

/// Bytes of the stub emitted for methods whose code could not be generated (`ud2`).
pub const TRAP_STUB: &[u8] = &[0x0F, 0x0B];

/// A reference from generated code to another method's symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relocation {
    /// Byte offset of the reference in the code block
    pub offset: usize,
    /// The referenced method
    pub target: MethodId,
}

/// Generated machine code for one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeCodeBlock {
    /// The code bytes
    pub bytes: Vec<u8>,
    /// References to other methods
    pub relocations: Vec<Relocation>,
}

impl NativeCodeBlock {
    /// Creates a block without relocations.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        NativeCodeBlock {
            bytes,
            relocations: Vec::new(),
        }
    }

    /// Returns a block that traps when executed.
    #[must_use]
    pub fn trap() -> Self {
        Self::new(TRAP_STUB.to_vec())
    }

    /// Returns `true` if the block is the trap stub.
    #[must_use]
    pub fn is_trap(&self) -> bool {
        self.bytes == TRAP_STUB && self.relocations.is_empty()
    }
}

/// Why a backend could not generate code for a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitFailure {
    /// Backend message
    pub message: String,
}

impl EmitFailure {
    /// Creates a failure with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        EmitFailure {
            message: message.into(),
        }
    }
}

impl fmt::Display for EmitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A backend turning IL bodies into native code.
///
/// Called concurrently for different methods. `devirtualization` is the scan-informed
/// manager; a backend may use it to lower virtual calls and type checks, and must not
/// assume anything it does not answer.
pub trait CodeGenerator: Send + Sync {
    /// Generates code for `method`, whose IL is `body`.
    ///
    /// # Errors
    ///
    /// Returns an [`EmitFailure`] for anything the backend cannot handle. The method is
    /// then replaced by a trap stub, or the compilation fails if the method is a required
    /// root.
    fn emit_code(
        &self,
        context: &TypeSystemContext,
        method: MethodId,
        body: &MethodBody,
        devirtualization: &dyn DevirtualizationQuery,
    ) -> Result<NativeCodeBlock, EmitFailure>;
}

/// A backend that emits a readable listing of the lowered body instead of machine code.
///
/// Every instruction becomes one line. Calls are written as `call <target>` when they are
/// direct or provably devirtualizable and as `callvirt <method>` otherwise; each call line
/// carries a relocation at its start. Meant for tests, diagnostics and as the default
/// backend when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingCodeGenerator;

impl ListingCodeGenerator {
    fn call_target(
        context: &TypeSystemContext,
        method: MethodId,
        devirtualization: &dyn DevirtualizationQuery,
    ) -> Result<Option<MethodId>, EmitFailure> {
        let desc = context.method(method);
        if !desc.is_virtual() {
            return Ok(Some(method));
        }
        let owner = desc.owning_type();
        if context.is_interface(owner) {
            return Ok(None);
        }
        if devirtualization.is_effectively_sealed_type(owner) {
            let target = devirtualization
                .resolve_virtual_method(method, owner)
                .map_err(|error| EmitFailure::new(error.to_string()))?;
            return Ok(Some(target));
        }
        if !desc.is_abstract() && devirtualization.is_effectively_sealed_method(method) {
            return Ok(Some(method));
        }
        Ok(None)
    }
}

impl CodeGenerator for ListingCodeGenerator {
    fn emit_code(
        &self,
        context: &TypeSystemContext,
        method: MethodId,
        body: &MethodBody,
        devirtualization: &dyn DevirtualizationQuery,
    ) -> Result<NativeCodeBlock, EmitFailure> {
        let mut listing = String::new();
        let mut relocations = Vec::new();
        let resolve = |reference: &crate::il::MethodRef| {
            reference
                .resolve(|| context.method_name(method))
                .map_err(|error| EmitFailure::new(error.to_string()))
        };

        for instruction in body.instructions() {
            let offset = listing.len();
            match instruction {
                Instruction::Call(callee) | Instruction::NewObj(callee) => {
                    let callee = resolve(callee)?;
                    relocations.push(Relocation {
                        offset,
                        target: callee,
                    });
                    let _ = writeln!(listing, "{} {}", instruction, context.method_name(callee));
                }
                Instruction::CallVirt { method: callee, .. } => {
                    let callee = resolve(callee)?;
                    match Self::call_target(context, callee, devirtualization)? {
                        Some(target) => {
                            relocations.push(Relocation { offset, target });
                            let _ = writeln!(listing, "call {}", context.method_name(target));
                        }
                        None => {
                            let _ =
                                writeln!(listing, "callvirt {}", context.method_name(callee));
                        }
                    }
                }
                _ => {
                    let _ = writeln!(listing, "{instruction}");
                }
            }
        }

        Ok(NativeCodeBlock {
            bytes: listing.into_bytes(),
            relocations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devirtualization::{MetadataDevirtualizationManager, ScannedDevirtualizationManager};
    use crate::test::TestWorld;

    #[test]
    fn trap_stub() {
        let stub = NativeCodeBlock::trap();
        assert!(stub.is_trap());
        assert!(!NativeCodeBlock::new(vec![0x90]).is_trap());
    }

    #[test]
    fn listing_lowers_sealed_calls() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let body = MethodBody::new(vec![
            Instruction::callvirt(world.derived_virtual),
            Instruction::Call(world.base_ctor.into()),
            Instruction::Ret,
        ]);

        let metadata = MetadataDevirtualizationManager::new(ctx);
        let code = ListingCodeGenerator
            .emit_code(ctx, world.base_ctor, &body, &metadata)
            .unwrap();
        let text = String::from_utf8(code.bytes).unwrap();
        assert_eq!(
            text,
            "callvirt App.Derived::Virtual\ncall App.Base::.ctor\nret\n"
        );
        assert_eq!(code.relocations.len(), 1);

        let scanned = ScannedDevirtualizationManager::new(ctx, [world.derived]);
        let code = ListingCodeGenerator
            .emit_code(ctx, world.base_ctor, &body, &scanned)
            .unwrap();
        let text = String::from_utf8(code.bytes).unwrap();
        assert!(text.starts_with("call App.Derived::Virtual\n"));
        assert_eq!(
            code.relocations[0],
            Relocation {
                offset: 0,
                target: world.derived_virtual
            }
        );
    }

    #[test]
    fn unresolved_operand_is_an_emit_failure() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let body = MethodBody::new(vec![Instruction::Call(
            crate::il::MethodRef::unresolved("Lib.Gone::Run"),
        )]);
        let metadata = MetadataDevirtualizationManager::new(ctx);
        let failure = ListingCodeGenerator
            .emit_code(ctx, world.base_ctor, &body, &metadata)
            .unwrap_err();
        assert!(failure.message.contains("Lib.Gone::Run"));
    }
}
