//! Strong type definitions for scoped identifiers.
//!
//! All identifiers are newtypes validated on construction, so a value of
//! [`RegistrationId`] or [`InstanceId`] always carries an extractable scope.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::codec::{self, DELIMITER};
use crate::error::{CoreError, Result};

/// The tenant/caller-ownership token embedded in identifiers.
///
/// Non-empty, no whitespace, and never contains the codec delimiter.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessScope(String);

impl AccessScope {
    /// Validate and wrap a scope token.
    pub fn new(scope: impl Into<String>) -> Result<Self> {
        let scope = scope.into();
        if scope.is_empty()
            || scope.contains(DELIMITER)
            || scope.chars().any(char::is_whitespace)
        {
            return Err(CoreError::InvalidScope(scope));
        }
        Ok(Self(scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessScope({})", self.0)
    }
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccessScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccessScope {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<AccessScope> for String {
    fn from(scope: AccessScope) -> Self {
        scope.0
    }
}

macro_rules! scoped_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Build an identifier from a scope and a local part.
            pub fn new(scope: &AccessScope, local: &str) -> Result<Self> {
                if local.is_empty() {
                    return Err(CoreError::MalformedIdentifier(
                        "empty local part".into(),
                    ));
                }
                Ok(Self(codec::encode(scope, local)))
            }

            /// Parse a composite identifier, validating its structure.
            pub fn parse(id: &str) -> Result<Self> {
                codec::split(id)?;
                Ok(Self(id.to_owned()))
            }

            /// The access scope embedded in this identifier.
            pub fn scope(&self) -> AccessScope {
                let (scope, _) = self.0.split_once(DELIMITER).unwrap_or((&self.0, ""));
                AccessScope(scope.to_owned())
            }

            /// The local part (everything after the first delimiter).
            pub fn local(&self) -> &str {
                self.0
                    .split_once(DELIMITER)
                    .map(|(_, local)| local)
                    .unwrap_or_default()
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(s: String) -> Result<Self> {
                codec::split(&s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

scoped_id!(
    /// Identifies a workflow registration (a definition under which instances run).
    RegistrationId
);

scoped_id!(
    /// Identifies one workflow execution.
    InstanceId
);

impl RegistrationId {
    /// Derive a registration ID from a workflow name and version.
    ///
    /// The local part is Blake3(scope || name || version), truncated to 16
    /// bytes and hex encoded, so the same registration always maps to the
    /// same identifier.
    pub fn derive(scope: &AccessScope, workflow_name: &str, version: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"nebula-registration-v0:");
        hasher.update(scope.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(workflow_name.as_bytes());
        hasher.update(b":");
        hasher.update(version.as_bytes());
        let digest = hasher.finalize();
        Self(codec::encode(scope, &hex::encode(&digest.as_bytes()[..16])))
    }
}

impl InstanceId {
    /// Generate a fresh random instance ID under a scope.
    pub fn generate(scope: &AccessScope) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(codec::encode(scope, &hex::encode(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc1() -> AccessScope {
        AccessScope::new("acc1").unwrap()
    }

    #[test]
    fn test_scope_validation() {
        assert!(AccessScope::new("acc1").is_ok());
        assert!(matches!(AccessScope::new(""), Err(CoreError::InvalidScope(_))));
        assert!(matches!(AccessScope::new("a:b"), Err(CoreError::InvalidScope(_))));
        assert!(matches!(AccessScope::new("a b"), Err(CoreError::InvalidScope(_))));
    }

    #[test]
    fn test_instance_id_scope() {
        let id = InstanceId::new(&acc1(), "run-1").unwrap();
        assert_eq!(id.as_str(), "acc1:run-1");
        assert_eq!(id.scope(), acc1());
        assert_eq!(id.local(), "run-1");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(InstanceId::parse("no-delimiter").is_err());
        assert!(RegistrationId::parse(":local").is_err());
        assert!("acc1:".parse::<InstanceId>().is_err());
    }

    #[test]
    fn test_registration_derive_deterministic() {
        let r1 = RegistrationId::derive(&acc1(), "order", "1.0");
        let r2 = RegistrationId::derive(&acc1(), "order", "1.0");
        let r3 = RegistrationId::derive(&acc1(), "order", "2.0");
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);
        assert_eq!(r1.scope(), acc1());
        assert_eq!(r1.local().len(), 32);
    }

    #[test]
    fn test_generated_instances_differ() {
        let a = InstanceId::generate(&acc1());
        let b = InstanceId::generate(&acc1());
        assert_ne!(a, b);
        assert_eq!(a.scope(), acc1());
    }

    #[test]
    fn test_serde_validates() {
        let id: InstanceId = serde_json::from_str("\"acc1:run-9\"").unwrap();
        assert_eq!(id.local(), "run-9");

        let bad = serde_json::from_str::<InstanceId>("\"run-9\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_debug_format() {
        let id = RegistrationId::parse("acc1:flow").unwrap();
        assert_eq!(format!("{:?}", id), "RegistrationId(acc1:flow)");
    }
}
