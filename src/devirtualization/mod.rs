//! Whole-program devirtualization queries.
//!
//! A [`DevirtualizationQuery`] answers whether a virtual call or type check can be
//! lowered to something direct. Two implementations exist:
//!
//! - [`MetadataDevirtualizationManager`] knows only declared `sealed` and `final` flags and
//!   is safe without any whole-program knowledge
//! - [`ScannedDevirtualizationManager`] is built from the set of types a scan proved
//!   constructed, and treats any type without constructed subtypes as effectively sealed
//!
//! The scan-informed manager is more precise for members of constructed types but answers
//! `false` for types no code ever constructs, because nothing is proven about them.
//! Both must err on the side of `false`: calling a member sealed while an allocated type
//! overrides it would miscompile the program.
//!
//! # Examples
//!
//! ```rust
//! use dotaot::devirtualization::{DevirtualizationQuery, MetadataDevirtualizationManager};
//! use dotaot::typesystem::{MethodBuilder, TypeBuilder, TypeSystemContext};
//!
//! let context = TypeSystemContext::new();
//! let base = TypeBuilder::new(&context, "App", "Base").build()?;
//! let virt = MethodBuilder::new(&context, base, "Virtual").virtual_method().build()?;
//! let leaf = TypeBuilder::new(&context, "App", "Leaf").extends(base).sealed().build()?;
//! let over = MethodBuilder::new(&context, leaf, "Virtual").override_method().build()?;
//!
//! let manager = MetadataDevirtualizationManager::new(&context);
//! assert!(manager.is_effectively_sealed_type(leaf));
//! assert!(manager.is_effectively_sealed_method(over));
//! assert!(!manager.is_effectively_sealed_method(virt));
//! assert_eq!(manager.resolve_virtual_method(virt, leaf)?, over);
//! # Ok::<(), dotaot::Error>(())
//! ```

mod metadata;
mod scanned;

use dashmap::DashMap;

use crate::{
    typesystem::{MethodId, TypeId, TypeSystemContext},
    Result,
};

pub use metadata::MetadataDevirtualizationManager;
pub use scanned::ScannedDevirtualizationManager;

/// The read-only devirtualization surface handed to code generators.
pub trait DevirtualizationQuery: Send + Sync {
    /// Returns the method that dispatching `decl` on an object of exact type
    /// `implementing_type` invokes.
    ///
    /// MethodImpl records are consulted first, then name and signature matches up the
    /// base chain; interface declarations go through interface resolution. Returns `decl`
    /// unchanged when nothing overrides it, meaning the call has to stay virtual.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeLoad`] for conflicting MethodImpl records.
    fn resolve_virtual_method(&self, decl: MethodId, implementing_type: TypeId)
        -> Result<MethodId>;

    /// Returns `true` if no object whose exact type differs from `ty` can be observed
    /// through a reference of static type `ty`.
    fn is_effectively_sealed_type(&self, ty: TypeId) -> bool;

    /// Returns `true` if every dispatch of `method` on a receiver of its owning type lands
    /// on `method` itself.
    fn is_effectively_sealed_method(&self, method: MethodId) -> bool;

    /// Returns `false` only if it is known that no instance of `ty` is ever created.
    fn can_constructed_type_exist(&self, ty: TypeId) -> bool;
}

/// Memoized `(decl, implementing type) → target` resolutions.
#[derive(Default)]
pub(crate) struct ResolutionCache {
    resolved: DashMap<(MethodId, TypeId), MethodId>,
}

impl ResolutionCache {
    pub(crate) fn resolve(
        &self,
        context: &TypeSystemContext,
        decl: MethodId,
        implementing_type: TypeId,
    ) -> Result<MethodId> {
        if let Some(hit) = self.resolved.get(&(decl, implementing_type)) {
            return Ok(*hit);
        }
        let target = context.resolve_virtual_method(decl, implementing_type)?;
        self.resolved.insert((decl, implementing_type), target);
        Ok(target)
    }

    pub(crate) fn len(&self) -> usize {
        self.resolved.len()
    }
}
