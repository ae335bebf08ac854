//! Handles for live UI entities
//!
//! Both handle kinds wrap a random UUID. They print in a shortened form
//! (`Context(1f2e3d4c)`) since they mostly show up in logs; `Debug` keeps the
//! full value.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Hex digits kept by the short form of a handle
const SHORT_LEN: usize = 8;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Leading hex digits of the handle, enough to tell handles
            /// apart in a log
            pub fn short(&self) -> String {
                let mut hex = self.0.simple().to_string();
                hex.truncate(SHORT_LEN);
                hex
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.short())
            }
        }
    };
}

handle!(
    /// Handle to a live UI context (activity or application)
    ///
    /// A handle never owns the context it names. It is resolved through the
    /// host's registry and may go stale when the context is destroyed; a
    /// stale handle resolves to nothing rather than to a dangling instance.
    ContextId,
    "Context"
);

handle!(
    /// Handle to a fragment instance inside a context's fragment manager
    ///
    /// Fragment instances are replaced on recreation unless they are
    /// retained, so a `FragmentId` is only meaningful for one instance.
    /// Durable identity is the fragment's tag or container id.
    FragmentId,
    "Fragment"
);

impl ContextId {
    /// Follows a handle through a recreation or restore mapping
    ///
    /// `mapping` holds `(old, new)` pairs as reported by the host. A handle
    /// missing from it was not replaced and maps to itself.
    pub fn follow(self, mapping: &[(ContextId, ContextId)]) -> ContextId {
        mapping
            .iter()
            .find(|(old, _)| *old == self)
            .map_or(self, |&(_, new)| new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        assert_ne!(ContextId::new(), ContextId::new());
        assert_ne!(FragmentId::new(), FragmentId::new());
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(ContextId::from_uuid(uuid).as_uuid(), uuid);
        assert_eq!(FragmentId::from_uuid(uuid).as_uuid(), uuid);
    }

    #[test]
    fn test_display_uses_short_form() {
        let uuid = Uuid::parse_str("1f2e3d4c-5b6a-4798-8a9b-0c1d2e3f4a5b").unwrap();
        let context = ContextId::from_uuid(uuid);
        assert_eq!(context.short(), "1f2e3d4c");
        assert_eq!(context.to_string(), "Context(1f2e3d4c)");
        assert_eq!(FragmentId::from_uuid(uuid).to_string(), "Fragment(1f2e3d4c)");
    }

    #[test]
    fn test_follow_mapping() {
        let (old, new, other) = (ContextId::new(), ContextId::new(), ContextId::new());
        let mapping = [(old, new)];
        assert_eq!(old.follow(&mapping), new);
        assert_eq!(other.follow(&mapping), other);
        assert_eq!(new.follow(&[]), new);
    }
}
