//! Access to method bodies.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    il::MethodBody,
    typesystem::{MethodId, TypeSystemContext},
};

/// Supplies IL bodies to the scanner and the compiler.
///
/// Implementations must be deterministic: asking twice for the same method returns the
/// same body. Methods without IL (abstract, extern, runtime-provided) return `None`.
pub trait MethodBodyProvider: Send + Sync {
    /// Returns the body of `method`, looked up through its typical definition.
    fn method_body(&self, context: &TypeSystemContext, method: MethodId)
        -> Option<Arc<MethodBody>>;
}

/// A [`MethodBodyProvider`] over bodies registered in memory.
///
/// Bodies are stored per typical method definition and shared by every instantiation.
#[derive(Default)]
pub struct InMemoryMethodBodyProvider {
    bodies: DashMap<MethodId, Arc<MethodBody>>,
}

impl InMemoryMethodBodyProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `body` for the method definition `definition`, replacing any previous body.
    pub fn insert(&self, definition: MethodId, body: MethodBody) {
        self.bodies.insert(definition, Arc::new(body));
    }

    /// Returns the number of registered bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Returns `true` if no body is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl MethodBodyProvider for InMemoryMethodBodyProvider {
    fn method_body(
        &self,
        context: &TypeSystemContext,
        method: MethodId,
    ) -> Option<Arc<MethodBody>> {
        let definition = context.typical_method_definition(method);
        self.bodies.get(&definition).map(|body| body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::Instruction;
    use crate::test::TestWorld;

    #[test]
    fn bodies_are_shared_by_instantiations() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let provider = InMemoryMethodBodyProvider::new();
        provider.insert(world.generic_base_get, MethodBody::new(vec![Instruction::Ret]));

        let base_int = ctx
            .get_instantiated_type(world.generic_base, &[world.int32])
            .unwrap();
        let get_int = ctx
            .get_method_for_instantiated_type(world.generic_base_get, base_int)
            .unwrap();

        let typical = provider.method_body(ctx, world.generic_base_get).unwrap();
        let instantiated = provider.method_body(ctx, get_int).unwrap();
        assert!(Arc::ptr_eq(&typical, &instantiated));
        assert!(provider.method_body(ctx, world.base_virtual).is_none());
        assert_eq!(provider.len(), 1);
    }
}
