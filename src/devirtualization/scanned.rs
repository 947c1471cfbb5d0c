use std::collections::HashSet;

use crate::{
    devirtualization::{DevirtualizationQuery, ResolutionCache},
    typesystem::{MethodId, TypeId, TypeSystemContext},
    Result,
};

/// Devirtualization informed by the set of types a scan proved constructed.
///
/// Types are compared by canonical form, so an answer about `List<__Canon>` covers every
/// reference instantiation of `List<T>` the program allocates. Arrays are the exception:
/// they are compared exactly, because the canonical form of every reference array is
/// `__Canon[]` and array covariance is tracked per element type. The manager is immutable
/// once built; only the resolution cache fills up as it is queried.
pub struct ScannedDevirtualizationManager<'a> {
    context: &'a TypeSystemContext,
    constructed_types: Vec<TypeId>,
    constructed: HashSet<TypeId>,
    unsealed: HashSet<TypeId>,
    cache: ResolutionCache,
}

impl<'a> ScannedDevirtualizationManager<'a> {
    /// Builds a manager from the exact types proven constructed.
    ///
    /// Every proper base type of a constructed type is recorded as unsealed. A constructed
    /// array is also unsealed when another constructed array casts to it, since array
    /// covariance lets a `string[][]` flow into an `object[][]` location.
    #[must_use]
    pub fn new(
        context: &'a TypeSystemContext,
        constructed_types: impl IntoIterator<Item = TypeId>,
    ) -> Self {
        let constructed_types: Vec<TypeId> = constructed_types.into_iter().collect();
        let mut constructed = HashSet::new();
        let mut unsealed = HashSet::new();

        for &ty in &constructed_types {
            constructed.insert(sealing_key(context, ty));
            for base in context.base_chain(ty).skip(1) {
                unsealed.insert(sealing_key(context, base));
            }
        }

        // Only constructed arrays can be sealed, so pairwise casts cover covariance at
        // every nesting depth.
        let arrays: Vec<TypeId> = constructed_types
            .iter()
            .copied()
            .filter(|&ty| context.is_array(ty))
            .collect();
        for &source in &arrays {
            for &target in &arrays {
                if source != target && context.can_cast_to(source, target) {
                    unsealed.insert(target);
                }
            }
        }

        log::debug!(
            "devirtualization manager built from {} constructed types ({} canonical, {} unsealed)",
            constructed_types.len(),
            constructed.len(),
            unsealed.len()
        );

        ScannedDevirtualizationManager {
            context,
            constructed_types,
            constructed,
            unsealed,
            cache: ResolutionCache::default(),
        }
    }

    /// Returns `true` if `ty`, up to canonical form, was constructed.
    #[must_use]
    pub fn is_constructed(&self, ty: TypeId) -> bool {
        self.constructed.contains(&sealing_key(self.context, ty))
    }

    /// Returns the exact constructed types the manager was built from.
    #[must_use]
    pub fn constructed_types(&self) -> &[TypeId] {
        &self.constructed_types
    }

    /// Returns `true` if some constructed type other than `owner` (up to canonical form)
    /// derives from it and dispatches `method`'s slot to a different method.
    fn has_overriding_subtype(&self, method: MethodId, owner: TypeId) -> Result<bool> {
        let ctx = self.context;
        let owner_key = sealing_key(ctx, owner);
        for &ty in &self.constructed_types {
            if sealing_key(ctx, ty) == owner_key
                || !ctx.derives_from_up_to_canon(ty, owner)
            {
                continue;
            }
            let target = self.cache.resolve(ctx, method, ty)?;
            if !ctx.same_method_up_to_canon(target, method) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn sealing_key(context: &TypeSystemContext, ty: TypeId) -> TypeId {
    if context.is_array(ty) {
        ty
    } else {
        context.convert_to_canon_form(ty)
    }
}

impl DevirtualizationQuery for ScannedDevirtualizationManager<'_> {
    fn resolve_virtual_method(
        &self,
        decl: MethodId,
        implementing_type: TypeId,
    ) -> Result<MethodId> {
        self.cache.resolve(self.context, decl, implementing_type)
    }

    fn is_effectively_sealed_type(&self, ty: TypeId) -> bool {
        let ctx = self.context;
        if ctx.is_interface(ty) || ctx.is_abstract(ty) {
            return false;
        }
        let key = sealing_key(ctx, ty);
        self.constructed.contains(&key) && !self.unsealed.contains(&key)
    }

    fn is_effectively_sealed_method(&self, method: MethodId) -> bool {
        let desc = self.context.method(method);
        let owner = desc.owning_type();
        if !self.is_constructed(owner) {
            return false;
        }
        if desc.is_final() || self.is_effectively_sealed_type(owner) {
            return true;
        }
        match self.has_overriding_subtype(method, owner) {
            Ok(overridden) => !overridden,
            Err(error) => {
                log::warn!(
                    "treating {} as unsealed: {error}",
                    self.context.method_name(method)
                );
                false
            }
        }
    }

    fn can_constructed_type_exist(&self, ty: TypeId) -> bool {
        self.is_constructed(ty)
    }
}
