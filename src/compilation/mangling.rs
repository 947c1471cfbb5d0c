//! Deterministic symbol names.
//!
//! Symbols are derived from display names only, so they are stable across runs and
//! independent of handle numbering or thread scheduling. The encoding keeps ASCII
//! letters and digits, doubles `_`, and writes every other character as `_xx_` with
//! its hexadecimal code point, which makes it injective.

use std::fmt::Write;

use crate::typesystem::{MethodId, TypeId, TypeSystemContext};

/// Produces linker symbol names for compiled entities.
#[derive(Debug, Clone)]
pub struct NameMangler {
    prefix: String,
}

impl Default for NameMangler {
    fn default() -> Self {
        NameMangler {
            prefix: "_D".to_string(),
        }
    }
}

impl NameMangler {
    /// Creates a mangler with the default `_D` prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mangler whose symbols start with `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        NameMangler {
            prefix: prefix.to_string(),
        }
    }

    /// Symbol of the code of `method`. Parameter and return types are part of the
    /// symbol, so overloads get distinct names.
    #[must_use]
    pub fn mangle_method(&self, context: &TypeSystemContext, method: MethodId) -> String {
        let signature = context.method(method).signature();
        let name = format!(
            "{}({}){}",
            context.method_name(method),
            context.type_list_name(&signature.parameters),
            context.type_name(signature.return_type)
        );
        format!("{}M{}", self.prefix, encode(&name))
    }

    /// Symbol of the type handle of `ty`.
    #[must_use]
    pub fn mangle_type(&self, context: &TypeSystemContext, ty: TypeId) -> String {
        format!("{}T{}", self.prefix, encode(&context.type_name(ty)))
    }
}

fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => out.push(c),
            '_' => out.push_str("__"),
            other => {
                let _ = write!(out, "_{:x}_", other as u32);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestWorld;

    #[test]
    fn encoding_is_readable_and_injective() {
        assert_eq!(encode("App.Base::Virtual"), "App_2e_Base_3a__3a_Virtual");
        assert_eq!(encode("a_b"), "a__b");
        assert_ne!(encode("a_2e_b"), encode("a.b"));
    }

    #[test]
    fn symbols_are_stable() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let mangler = NameMangler::new();
        let list_int = ctx
            .get_instantiated_type(world.generic_base, &[world.int32])
            .unwrap();
        assert_eq!(
            mangler.mangle_type(ctx, list_int),
            "_DTApp_2e_GenericBase_60_1_3c_System_2e_Int32_3e_"
        );
        assert_eq!(
            mangler.mangle_method(ctx, world.base_virtual),
            mangler.mangle_method(ctx, world.base_virtual)
        );
        assert_eq!(
            mangler.mangle_method(ctx, world.base_virtual),
            "_DMApp_2e_Base_3a__3a_Virtual_28__29_System_2e_Void"
        );
        assert!(NameMangler::with_prefix("x")
            .mangle_method(ctx, world.base_virtual)
            .starts_with("xM"));
    }
}
