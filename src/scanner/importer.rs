//! Turns one method body into graph dependencies.

use crate::{
    dependency::{EdgeLabel, Expansion},
    il::{FieldRef, Instruction, MethodBody, MethodRef, TokenRef, TypeRef},
    scanner::{MetadataTarget, NodeFactory, ScanNode},
    typesystem::{FieldId, MethodId, TypeId, TypeSystemContext},
    Error, Result,
};

/// How a call site is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatch {
    /// Non-virtual call to the method
    Direct(MethodId),
    /// Virtual call proven to always land on the method
    Devirtualized(MethodId),
    /// Virtual call through the slot of the method
    Virtual(MethodId),
}

impl Dispatch {
    /// Returns `true` unless the call goes through a vtable slot.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        !matches!(self, Dispatch::Virtual(_))
    }
}

/// A code generation decision taken for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteDecision {
    /// A call, `ldftn` or `ldvirtftn`
    Call {
        /// Instruction index in the body
        offset: usize,
        /// The method named by the instruction, instantiated
        callee: MethodId,
        /// The chosen dispatch
        dispatch: Dispatch,
    },
    /// A `castclass`, `isinst` or `unbox.any`
    Cast {
        /// Instruction index in the body
        offset: usize,
        /// The target type, instantiated
        target: TypeId,
        /// The target is effectively sealed, so the check is a type handle comparison
        exact_check: bool,
    },
}

impl SiteDecision {
    /// Returns the instruction index the decision belongs to.
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            SiteDecision::Call { offset, .. } | SiteDecision::Cast { offset, .. } => *offset,
        }
    }
}

/// Imports the body of one method, substituting its instantiation into every operand.
pub(crate) struct MethodImporter<'f, 'a> {
    factory: &'f NodeFactory<'a>,
    context: &'a TypeSystemContext,
    method: MethodId,
    type_args: Vec<TypeId>,
    method_args: Vec<TypeId>,
    canonical_body: bool,
    decisions: Vec<SiteDecision>,
}

impl<'f, 'a> MethodImporter<'f, 'a> {
    /// `canonical_body` is set when importing shared code, whose `__Canon` entities are
    /// left to the shadow methods of the exact instantiations.
    pub(crate) fn new(factory: &'f NodeFactory<'a>, method: MethodId, canonical_body: bool) -> Self {
        let context = factory.context();
        let (type_args, method_args) = context.instantiation_context(method);
        MethodImporter {
            factory,
            context,
            method,
            type_args,
            method_args,
            canonical_body: canonical_body && context.method(method).has_canon(),
            decisions: Vec::new(),
        }
    }

    /// Adds the dependencies of every instruction of `body` to `expansion` and returns
    /// the call and cast decisions taken.
    pub(crate) fn import(
        mut self,
        body: &MethodBody,
        expansion: &mut Expansion<ScanNode>,
    ) -> Result<Vec<SiteDecision>> {
        for (offset, instruction) in body.instructions().iter().enumerate() {
            self.import_instruction(offset, instruction, expansion)?;
        }
        Ok(self.decisions)
    }

    fn import_instruction(
        &mut self,
        offset: usize,
        instruction: &Instruction,
        expansion: &mut Expansion<ScanNode>,
    ) -> Result<()> {
        let ctx = self.context;
        match instruction {
            Instruction::Call(method) => {
                let method = self.resolve_method(method)?;
                self.direct_call(offset, method, "call", expansion);
            }
            Instruction::LdFtn(method) => {
                let method = self.resolve_method(method)?;
                self.direct_call(offset, method, "ldftn", expansion);
            }
            Instruction::CallVirt { method, receiver } => {
                let method = self.resolve_method(method)?;
                let receiver = receiver
                    .as_ref()
                    .map(|receiver| self.resolve_type(receiver))
                    .transpose()?;
                self.virtual_call(offset, method, receiver, "callvirt", expansion)?;
            }
            Instruction::LdVirtFtn(method) => {
                let method = self.resolve_method(method)?;
                self.virtual_call(offset, method, None, "ldvirtftn", expansion)?;
            }
            Instruction::ConstrainedCallVirt { constraint, method } => {
                let constraint = self.resolve_type(constraint)?;
                let method = self.resolve_method(method)?;
                self.constrained_call(offset, constraint, method, expansion)?;
            }
            Instruction::NewObj(ctor) => {
                let ctor = self.resolve_method(ctor)?;
                let owner = ctx.method(ctor).owning_type();
                if ctx.is_value_type(owner) {
                    self.add(expansion, ScanNode::TypeMetadata(owner), "newobj value type");
                } else {
                    self.add(expansion, ScanNode::ConstructedType(owner), "newobj");
                }
                self.direct_call(offset, ctor, "constructor", expansion);
            }
            Instruction::NewArr(element) => {
                let element = self.resolve_type(element)?;
                let array = ctx.get_array_type(element);
                self.add(expansion, ScanNode::ConstructedType(array), "newarr");
            }
            Instruction::Box(ty) => {
                let ty = self.resolve_type(ty)?;
                if ctx.is_value_type(ty) {
                    self.add(expansion, ScanNode::ConstructedType(ty), "box");
                } else {
                    self.add(expansion, ScanNode::TypeMetadata(ty), "box reference type");
                }
            }
            Instruction::UnboxAny(ty) | Instruction::CastClass(ty) | Instruction::IsInst(ty) => {
                let ty = self.resolve_type(ty)?;
                self.add(expansion, ScanNode::TypeMetadata(ty), instruction.mnemonic());
                self.decisions.push(SiteDecision::Cast {
                    offset,
                    target: ty,
                    exact_check: self.factory.devirtualization().is_effectively_sealed_type(ty),
                });
            }
            Instruction::LdToken(token) => self.import_token(token, expansion)?,
            Instruction::LdFld(field) | Instruction::LdFldA(field) | Instruction::StFld(field) => {
                let field = self.resolve_field(field)?;
                if let Some(owner) = self.field_owner(field) {
                    self.add(expansion, ScanNode::TypeMetadata(owner), "instance field access");
                }
            }
            Instruction::LdSFld(field)
            | Instruction::LdSFldA(field)
            | Instruction::StSFld(field) => {
                let field = self.resolve_field(field)?;
                if let Some(owner) = self.field_owner(field) {
                    self.add(expansion, ScanNode::StaticBase(owner), "static field access");
                }
            }
            Instruction::Nop
            | Instruction::LdArg(_)
            | Instruction::LdLoc(_)
            | Instruction::StLoc(_)
            | Instruction::LdNull
            | Instruction::LdcI4(_)
            | Instruction::LdStr(_)
            | Instruction::Dup
            | Instruction::Pop
            | Instruction::Throw
            | Instruction::Ret => {}
        }
        Ok(())
    }

    fn import_token(&mut self, token: &TokenRef, expansion: &mut Expansion<ScanNode>) -> Result<()> {
        let ctx = self.context;
        match token {
            TokenRef::Type(ty) => {
                let ty = self.resolve_type(ty)?;
                self.add(expansion, ScanNode::Metadata(MetadataTarget::Type(ty)), "ldtoken");
                self.add(expansion, ScanNode::TypeMetadata(ty), "ldtoken");
            }
            TokenRef::Method(method) => {
                let method = self.resolve_method(method)?;
                self.add(
                    expansion,
                    ScanNode::Metadata(MetadataTarget::Method(method)),
                    "ldtoken",
                );
                self.add(
                    expansion,
                    ScanNode::TypeMetadata(ctx.method(method).owning_type()),
                    "ldtoken",
                );
            }
            TokenRef::Field(field) => {
                let field = self.resolve_field(field)?;
                self.add(
                    expansion,
                    ScanNode::Metadata(MetadataTarget::Field(field)),
                    "ldtoken",
                );
                if let Some(owner) = self.field_owner(field) {
                    self.add(expansion, ScanNode::TypeMetadata(owner), "ldtoken");
                }
            }
        }
        Ok(())
    }

    fn direct_call(
        &mut self,
        offset: usize,
        method: MethodId,
        label: EdgeLabel,
        expansion: &mut Expansion<ScanNode>,
    ) {
        self.decisions.push(SiteDecision::Call {
            offset,
            callee: method,
            dispatch: Dispatch::Direct(method),
        });
        self.add_code(method, label, expansion);
    }

    fn add_code(&self, method: MethodId, label: EdgeLabel, expansion: &mut Expansion<ScanNode>) {
        let ctx = self.context;
        let desc = ctx.method(method);
        if desc.is_abstract() {
            return;
        }
        if desc.is_static() && ctx.class_constructor(desc.owning_type()).is_some() {
            self.add(
                expansion,
                ScanNode::StaticBase(desc.owning_type()),
                "static method class constructor",
            );
        }
        self.add(expansion, self.factory.method_code_node(method), label);
    }

    fn virtual_call(
        &mut self,
        offset: usize,
        method: MethodId,
        receiver: Option<TypeId>,
        label: EdgeLabel,
        expansion: &mut Expansion<ScanNode>,
    ) -> Result<()> {
        if !self.context.method(method).is_virtual() {
            self.direct_call(offset, method, label, expansion);
            return Ok(());
        }

        let dispatch = match self.devirtualize(method, receiver)? {
            Some(target) => {
                self.add_code(target, "devirtualized call", expansion);
                Dispatch::Devirtualized(target)
            }
            None => {
                let slot = self.factory.vtable_slot(method)?;
                self.add(expansion, ScanNode::VTableSlot(slot), label);
                Dispatch::Virtual(slot)
            }
        };
        self.decisions.push(SiteDecision::Call {
            offset,
            callee: method,
            dispatch,
        });
        Ok(())
    }

    /// Returns the only method a virtual call to `method` can land on, if there is one.
    fn devirtualize(&self, method: MethodId, receiver: Option<TypeId>) -> Result<Option<MethodId>> {
        let ctx = self.context;
        let devirt = self.factory.devirtualization();
        let owner = ctx.method(method).owning_type();
        let receiver = receiver.unwrap_or(owner);

        if !ctx.is_interface(receiver) && devirt.is_effectively_sealed_type(receiver) {
            let target = devirt.resolve_virtual_method(method, receiver)?;
            if !ctx.method(target).is_abstract() {
                return Ok(Some(target));
            }
        }
        if !ctx.is_interface(owner)
            && !ctx.method(method).is_abstract()
            && devirt.is_effectively_sealed_method(method)
        {
            return Ok(Some(method));
        }
        Ok(None)
    }

    fn constrained_call(
        &mut self,
        offset: usize,
        constraint: TypeId,
        method: MethodId,
        expansion: &mut Expansion<ScanNode>,
    ) -> Result<()> {
        let ctx = self.context;
        if !ctx.is_value_type(constraint) {
            return self.virtual_call(offset, method, Some(constraint), "constrained call", expansion);
        }

        let implementation = ctx.resolve_virtual_method(method, constraint)?;
        if ctx.method(implementation).owning_type() == constraint
            && !ctx.method(implementation).is_abstract()
        {
            self.direct_call(offset, implementation, "constrained call", expansion);
            return Ok(());
        }

        self.add(expansion, ScanNode::ConstructedType(constraint), "box for constrained call");
        self.virtual_call(offset, method, Some(constraint), "constrained call", expansion)
    }

    fn add(&self, expansion: &mut Expansion<ScanNode>, node: ScanNode, label: EdgeLabel) {
        if self.canonical_body && self.factory.mentions_canon(&node) {
            log::trace!(
                "{}: leaving {node} to the exact instantiations",
                self.context.method_name(self.method)
            );
            return;
        }
        expansion.add(node, label);
    }

    /// The instantiated owner of `field`.
    ///
    /// Field operands name the field definition. For a field of a generic type the owner
    /// is taken from the instantiation the importing method runs in; a field of a generic
    /// type the method cannot see an instantiation of is skipped.
    fn field_owner(&self, field: FieldId) -> Option<TypeId> {
        let ctx = self.context;
        let declared = ctx.field(field).owning_type;
        if !self.factory.is_open_type(declared) {
            return Some(declared);
        }
        let owner = ctx.method(self.method).owning_type();
        let instantiated = ctx
            .base_chain(owner)
            .find(|ty| ctx.type_definition(*ty) == declared);
        if instantiated.is_none() {
            log::debug!(
                "{}: no instantiation of {} in scope for {}",
                ctx.method_name(self.method),
                ctx.type_name(declared),
                ctx.field_name(field)
            );
        }
        instantiated
    }

    fn resolve_type(&self, ty: &TypeRef) -> Result<TypeId> {
        let ty = ty.resolve(|| self.context.method_name(self.method))?;
        let ty = self
            .context
            .instantiate_type(ty, &self.type_args, &self.method_args);
        if self.context.ty(ty).has_generic_parameters() {
            return Err(self.open_reference(self.context.type_name(ty)));
        }
        Ok(ty)
    }

    fn resolve_method(&self, method: &MethodRef) -> Result<MethodId> {
        let method = method.resolve(|| self.context.method_name(self.method))?;
        let method = self
            .context
            .instantiate_method(method, &self.type_args, &self.method_args);
        if self.factory.is_open_method(method) {
            return Err(self.open_reference(self.context.method_name(method)));
        }
        Ok(method)
    }

    fn resolve_field(&self, field: &FieldRef) -> Result<FieldId> {
        field.resolve(|| self.context.method_name(self.method))
    }

    fn open_reference(&self, entity: String) -> Error {
        Error::TypeError(format!(
            "'{}' references '{entity}' which is not fully instantiated",
            self.context.method_name(self.method)
        ))
    }
}
