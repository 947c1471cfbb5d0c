//! Instructions and operand references.

use std::fmt;
use std::sync::Arc;

use crate::{
    typesystem::{FieldId, MethodId, TypeId},
    Error, Result,
};

/// An operand that either names a loaded entity or carries the symbol the reader could
/// not resolve.
///
/// Unresolved operands are legal in a body; they only become an error when the body is
/// actually scanned, which is the point at which the reference is known to be reachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef<T> {
    /// Resolved to a handle in the type system
    Resolved(T),
    /// Symbol name as written in metadata
    Unresolved(Arc<str>),
}

impl<T: Copy> EntityRef<T> {
    /// Creates an unresolved reference to `symbol`.
    #[must_use]
    pub fn unresolved(symbol: &str) -> Self {
        EntityRef::Unresolved(Arc::from(symbol))
    }

    /// Returns the resolved handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedReference`] naming `referenced_from` if the operand
    /// could not be resolved.
    pub fn resolve(&self, referenced_from: impl FnOnce() -> String) -> Result<T> {
        match self {
            EntityRef::Resolved(handle) => Ok(*handle),
            EntityRef::Unresolved(symbol) => Err(Error::UnresolvedReference {
                symbol: symbol.to_string(),
                referenced_from: referenced_from(),
            }),
        }
    }
}

impl<T> From<T> for EntityRef<T> {
    fn from(handle: T) -> Self {
        EntityRef::Resolved(handle)
    }
}

/// A type operand
pub type TypeRef = EntityRef<TypeId>;
/// A method operand
pub type MethodRef = EntityRef<MethodId>;
/// A field operand
pub type FieldRef = EntityRef<FieldId>;

/// Operand of `ldtoken`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenRef {
    /// A type handle
    Type(TypeRef),
    /// A method handle
    Method(MethodRef),
    /// A field handle
    Field(FieldRef),
}

/// One CIL instruction, reduced to what reachability analysis needs.
///
/// Operands of a generic method body are expressed over its generic parameters
/// (`!0`, `!!0`); the scanner substitutes them for the instantiation being compiled.
/// Opcodes that do not reference types, methods or fields are kept only as far as
/// they help make bodies readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// `nop`
    Nop,
    /// `ldarg`
    LdArg(u16),
    /// `ldloc`
    LdLoc(u16),
    /// `stloc`
    StLoc(u16),
    /// `ldnull`
    LdNull,
    /// `ldc.i4`
    LdcI4(i32),
    /// `ldstr`
    LdStr(Arc<str>),
    /// `dup`
    Dup,
    /// `pop`
    Pop,
    /// `throw`
    Throw,
    /// `ret`
    Ret,

    /// `call`: non-virtual call
    Call(MethodRef),
    /// `callvirt`: virtual call through the receiver
    CallVirt {
        /// The called method; its owning type is the static receiver type
        method: MethodRef,
        /// A more precise static receiver type, when the producer knows one
        receiver: Option<TypeRef>,
    },
    /// `constrained. T callvirt M`
    ConstrainedCallVirt {
        /// The constraint type, usually a generic parameter
        constraint: TypeRef,
        /// The called method
        method: MethodRef,
    },
    /// `newobj`
    NewObj(MethodRef),
    /// `newarr`: operand is the element type
    NewArr(TypeRef),
    /// `box`
    Box(TypeRef),
    /// `unbox.any`
    UnboxAny(TypeRef),
    /// `castclass`
    CastClass(TypeRef),
    /// `isinst`
    IsInst(TypeRef),
    /// `ldtoken`
    LdToken(TokenRef),
    /// `ldfld`
    LdFld(FieldRef),
    /// `ldflda`
    LdFldA(FieldRef),
    /// `stfld`
    StFld(FieldRef),
    /// `ldsfld`
    LdSFld(FieldRef),
    /// `ldsflda`
    LdSFldA(FieldRef),
    /// `stsfld`
    StSFld(FieldRef),
    /// `ldftn`
    LdFtn(MethodRef),
    /// `ldvirtftn`
    LdVirtFtn(MethodRef),
}

impl Instruction {
    /// `callvirt` with the method's owner as static receiver type.
    #[must_use]
    pub fn callvirt(method: impl Into<MethodRef>) -> Self {
        Instruction::CallVirt {
            method: method.into(),
            receiver: None,
        }
    }

    /// `callvirt` on a receiver statically known to be of type `receiver`.
    #[must_use]
    pub fn callvirt_on(method: impl Into<MethodRef>, receiver: impl Into<TypeRef>) -> Self {
        Instruction::CallVirt {
            method: method.into(),
            receiver: Some(receiver.into()),
        }
    }

    /// `constrained. constraint callvirt method`
    #[must_use]
    pub fn constrained(constraint: impl Into<TypeRef>, method: impl Into<MethodRef>) -> Self {
        Instruction::ConstrainedCallVirt {
            constraint: constraint.into(),
            method: method.into(),
        }
    }

    /// Returns the opcode mnemonic.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "nop",
            Instruction::LdArg(_) => "ldarg",
            Instruction::LdLoc(_) => "ldloc",
            Instruction::StLoc(_) => "stloc",
            Instruction::LdNull => "ldnull",
            Instruction::LdcI4(_) => "ldc.i4",
            Instruction::LdStr(_) => "ldstr",
            Instruction::Dup => "dup",
            Instruction::Pop => "pop",
            Instruction::Throw => "throw",
            Instruction::Ret => "ret",
            Instruction::Call(_) => "call",
            Instruction::CallVirt { .. } => "callvirt",
            Instruction::ConstrainedCallVirt { .. } => "constrained. callvirt",
            Instruction::NewObj(_) => "newobj",
            Instruction::NewArr(_) => "newarr",
            Instruction::Box(_) => "box",
            Instruction::UnboxAny(_) => "unbox.any",
            Instruction::CastClass(_) => "castclass",
            Instruction::IsInst(_) => "isinst",
            Instruction::LdToken(_) => "ldtoken",
            Instruction::LdFld(_) => "ldfld",
            Instruction::LdFldA(_) => "ldflda",
            Instruction::StFld(_) => "stfld",
            Instruction::LdSFld(_) => "ldsfld",
            Instruction::LdSFldA(_) => "ldsflda",
            Instruction::StSFld(_) => "stsfld",
            Instruction::LdFtn(_) => "ldftn",
            Instruction::LdVirtFtn(_) => "ldvirtftn",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// The instruction stream of one method, written against its typical definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodBody {
    instructions: Vec<Instruction>,
}

impl MethodBody {
    /// Creates a body from its instructions.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        MethodBody { instructions }
    }

    /// Returns the instructions in order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the body has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl FromIterator<Instruction> for MethodBody {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        MethodBody::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_reports_the_referencing_method() {
        let resolved: MethodRef = MethodId::from(3usize).into();
        assert_eq!(resolved.resolve(String::new).unwrap(), MethodId::from(3usize));

        let missing = MethodRef::unresolved("Lib.Gone::Call");
        match missing.resolve(|| "App.Program::Main".to_string()) {
            Err(Error::UnresolvedReference {
                symbol,
                referenced_from,
            }) => {
                assert_eq!(symbol, "Lib.Gone::Call");
                assert_eq!(referenced_from, "App.Program::Main");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn body_from_iterator() {
        let body: MethodBody = [Instruction::Nop, Instruction::Ret].into_iter().collect();
        assert_eq!(body.len(), 2);
        assert_eq!(body.instructions()[1].to_string(), "ret");
        assert!(MethodBody::default().is_empty());
    }
}
