// src/event.rs

//! Normalized change events and the identities they carry.
//!
//! Both detection channels produce a [`ChangeEvent`]. The identity types are
//! cheap to clone (`Arc<str>` inside) because every event, pending command and
//! registry entry holds a copy.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::Instant;

use crate::types::ChannelKind;

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(value: impl AsRef<str>) -> Self {
                Self(Arc::from(value.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), &*self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(Arc::from(value))
            }
        }
    };
}

identity!(
    /// Opaque identity of the isolated loading scope a unit belongs to.
    ContextId
);

identity!(
    /// Stable, representation-independent name of a unit, e.g. `com.example.Foo`.
    UnitId
);

identity!(
    /// Base package a scope was registered for, e.g. `com.example`.
    ///
    /// The empty string is the default package and contains every unit.
    BaseScope
);

impl BaseScope {
    /// True if `unit` lives in this package or one of its subpackages.
    pub fn contains(&self, unit: &UnitId) -> bool {
        let scope = self.as_str();
        if scope.is_empty() {
            return true;
        }
        let unit = unit.as_str();
        unit.len() > scope.len()
            && unit.starts_with(scope)
            && unit.as_bytes()[scope.len()] == b'.'
    }

    /// Relative directory of this package inside a class root.
    pub fn as_path(&self) -> PathBuf {
        self.as_str().split('.').filter(|s| !s.is_empty()).collect()
    }
}

/// The representation carried with an event.
///
/// Live redefinitions always carry the new bytes. File events only carry a
/// reference to the artifact; whoever reconciles reads it when the command
/// fires, so it sees the final content rather than a half-written one.
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

impl Payload {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(b) => Some(&b[..]),
            Payload::File(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Payload::Bytes(_) => None,
            Payload::File(p) => Some(p.as_path()),
        }
    }

    /// blake3 digest of an in-memory payload.
    pub fn digest(&self) -> Option<String> {
        self.bytes()
            .map(|b| blake3::hash(b).to_hex().to_string())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Payload::File(p) => write!(f, "File({:?})", p),
        }
    }
}

/// Merge identity: two events with the same key collapse into one command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconciliationKey {
    pub context: ContextId,
    pub scope: BaseScope,
    pub unit: UnitId,
}

impl ReconciliationKey {
    pub fn new(context: ContextId, scope: BaseScope, unit: UnitId) -> Self {
        Self {
            context,
            scope,
            unit,
        }
    }
}

impl fmt::Display for ReconciliationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.context, self.scope, self.unit)
    }
}

/// One observation from either channel, after translation.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub source: ChannelKind,
    pub context: ContextId,
    pub scope: BaseScope,
    pub unit: UnitId,
    pub payload: Payload,
    pub observed_at: Instant,
}

impl ChangeEvent {
    pub fn key(&self) -> ReconciliationKey {
        ReconciliationKey::new(self.context.clone(), self.scope.clone(), self.unit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_contains_only_whole_package_segments() {
        let scope = BaseScope::from("com.example");
        assert!(scope.contains(&UnitId::from("com.example.Foo")));
        assert!(scope.contains(&UnitId::from("com.example.web.Bar")));
        assert!(!scope.contains(&UnitId::from("com.examples.Foo")));
        assert!(!scope.contains(&UnitId::from("com.example")));
        assert!(!scope.contains(&UnitId::from("org.other.Foo")));
    }

    #[test]
    fn default_package_contains_everything() {
        let scope = BaseScope::from("");
        assert!(scope.contains(&UnitId::from("Foo")));
        assert_eq!(scope.as_path(), PathBuf::new());
    }

    #[test]
    fn scope_path_uses_package_directories() {
        let scope = BaseScope::from("com.example.web");
        assert_eq!(scope.as_path(), PathBuf::from("com").join("example").join("web"));
    }

    #[test]
    fn digest_only_for_bytes() {
        let bytes = Payload::Bytes(Arc::from(&b"abc"[..]));
        assert_eq!(bytes.digest().map(|d| d.len()), Some(64));
        assert_eq!(Payload::File(PathBuf::from("Foo.class")).digest(), None);
    }
}
