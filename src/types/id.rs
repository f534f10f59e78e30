// ABOUTME: Identifiers handed out by the provisioning service or minted locally.
// ABOUTME: A marker type parameter keeps stack ARNs, change set ids and manifest ids apart.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

pub enum StackMarker {}
pub enum ChangeSetMarker {}
pub enum ManifestMarker {}
pub enum MonitorMarker {}

/// ARN of a deployed stack.
pub type StackId = Id<StackMarker>;
/// ARN of a change set.
pub type ChangeSetId = Id<ChangeSetMarker>;
/// Identity of one asset manifest instance; keys the publisher cache.
pub type ManifestId = Id<ManifestMarker>;
/// Identity of one activity monitor run.
pub type MonitorId = Id<MonitorMarker>;

/// An opaque string identifier tagged with what it identifies.
///
/// Service ids are stored as returned. Local ids come from [`Id::generate`].
#[must_use]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// A random v4 UUID.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

// The marker never holds data, so none of these may require bounds on `T`.

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_manifest_gets_its_own_identity() {
        assert_ne!(ManifestId::generate(), ManifestId::generate());
        assert_ne!(MonitorId::generate(), MonitorId::generate());
    }

    #[test]
    fn stack_arn_round_trips_as_a_bare_string() {
        let arn = "arn:aws:cloudformation:eu-west-1:123456789012:stack/Orders/1";
        let id = StackId::new(arn);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{arn}\""));
        assert_eq!(serde_json::from_str::<StackId>(&json).unwrap(), id);
        assert_eq!(id.to_string(), arn);
    }
}
