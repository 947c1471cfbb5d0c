//! Strongly-typed handles into the arenas of a [`TypeSystemContext`](crate::typesystem::TypeSystemContext).
//!
//! Every type, method and field is owned by the context that created it and is
//! referred to everywhere else through one of the handles defined here. Because the
//! context interns entities, two handles compare equal exactly when they describe the
//! same structural entity, which is what allows them to serve as graph and map keys.

use std::fmt;

macro_rules! entity_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Returns the raw arena index of this handle.
            #[must_use]
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<usize> for $name {
            #[allow(clippy::cast_possible_truncation)]
            fn from(index: usize) -> Self {
                $name(index as u32)
            }
        }

        impl From<$name> for usize {
            fn from(id: $name) -> Self {
                id.index()
            }
        }
    };
}

entity_handle!(
    /// Handle of an interned type (defined, instantiated, array, pointer, byref,
    /// generic parameter or the canonical placeholder).
    TypeId,
    "t"
);

entity_handle!(
    /// Handle of an interned method (definition, method on an instantiated type, or
    /// instantiated generic method).
    MethodId,
    "m"
);

entity_handle!(
    /// Handle of a field declared on a defined type.
    FieldId,
    "f"
);
