//! MethodImpl records: explicit overrides declared in metadata.
//!
//! A [`MethodImplRecord`] maps a declaration (a base class or interface method) to
//! the body that implements it on a particular type. Defined types take their
//! records straight from metadata; instantiated types derive theirs by instantiating
//! the definition's records. Either way the result is computed once per type and
//! cached for the lifetime of the context.

use std::sync::Arc;

use crate::{
    typesystem::{MethodId, TypeId, TypeKind, TypeSystemContext},
    Result,
};

/// An explicit `decl → body` override on a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodImplRecord {
    /// The overridden declaration (base class or interface method)
    pub decl: MethodId,
    /// The implementing method
    pub body: MethodId,
}

impl TypeSystemContext {
    /// Returns every MethodImpl record of `ty`, computing and caching them on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeLoad`] if two records override the same declaration with
    /// bodies from different types. Records whose bodies come from the same type are resolved
    /// in favour of the first declared.
    pub fn compute_all_virtual_method_impls_for_type(
        &self,
        ty: TypeId,
    ) -> Result<Arc<[MethodImplRecord]>> {
        self.ty(ty)
            .virtual_method_impls
            .get_or_init(|| self.compute_method_impls(ty, None))
            .clone()
    }

    /// Returns the MethodImpl records of `ty` whose declaration is named `name`.
    ///
    /// Only the matching records are instantiated; the full set is not forced.
    ///
    /// # Errors
    ///
    /// See [`TypeSystemContext::compute_all_virtual_method_impls_for_type`].
    pub fn find_method_impls_with_matching_decl_name(
        &self,
        ty: TypeId,
        name: &str,
    ) -> Result<Vec<MethodImplRecord>> {
        if let Some(cached) = self.ty(ty).virtual_method_impls.get() {
            return Ok(cached
                .clone()?
                .iter()
                .filter(|record| self.method(record.decl).name() == name)
                .copied()
                .collect());
        }
        Ok(self.compute_method_impls(ty, Some(name))?.to_vec())
    }

    fn compute_method_impls(
        &self,
        ty: TypeId,
        name: Option<&str>,
    ) -> Result<Arc<[MethodImplRecord]>> {
        let matches = |record: &MethodImplRecord| {
            name.map_or(true, |name| self.method(record.decl).name() == name)
        };

        match self.ty(ty).kind() {
            TypeKind::Defined(defined) => {
                self.resolve_method_impl_conflicts(defined.declared_method_impls().filter(matches))
            }
            TypeKind::Instantiated {
                definition,
                instantiation,
            } => {
                let uninstantiated = match name {
                    Some(name) => self.find_method_impls_with_matching_decl_name(*definition, name)?,
                    None => self
                        .compute_all_virtual_method_impls_for_type(*definition)?
                        .to_vec(),
                };
                Ok(uninstantiated
                    .into_iter()
                    .map(|record| MethodImplRecord {
                        decl: self.instantiate_method(record.decl, instantiation, &[]),
                        body: self.instantiate_method(record.body, instantiation, &[]),
                    })
                    .collect())
            }
            _ => Ok(Arc::from(Vec::new())),
        }
    }

    fn resolve_method_impl_conflicts(
        &self,
        records: impl Iterator<Item = MethodImplRecord>,
    ) -> Result<Arc<[MethodImplRecord]>> {
        let mut resolved: Vec<MethodImplRecord> = Vec::new();
        for record in records {
            match resolved.iter().find(|existing| existing.decl == record.decl) {
                None => resolved.push(record),
                Some(existing) if existing.body == record.body => {}
                Some(existing) => {
                    let first_owner = self.method(existing.body).owning_type();
                    let second_owner = self.method(record.body).owning_type();
                    if first_owner != second_owner {
                        return Err(type_load_error!(
                            "conflicting overrides of {}: {} and {}",
                            self.method_name(record.decl),
                            self.method_name(existing.body),
                            self.method_name(record.body)
                        ));
                    }
                    log::debug!(
                        "ignoring second override {} of {}, keeping {}",
                        self.method_name(record.body),
                        self.method_name(record.decl),
                        self.method_name(existing.body)
                    );
                }
            }
        }
        Ok(Arc::from(resolved))
    }
}
