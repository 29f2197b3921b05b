/// Entity identifier utilities.
///
/// The REST API and the push channel disagree on id encoding: one path sends
/// `7`, the other `"7"`. Ids are normalized to their textual form on the way
/// in so equality never depends on the transport.
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        EntityId(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Textual form of a JSON number, matching how a browser prints it:
    /// integral floats lose their fraction.
    fn from_f64(value: f64) -> Self {
        if value.fract() == 0.0 && value.is_finite() && value.abs() < 9_007_199_254_740_992.0 {
            EntityId((value as i64).to_string())
        } else {
            EntityId(value.to_string())
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        EntityId::new(raw)
    }
}

impl From<String> for EntityId {
    fn from(raw: String) -> Self {
        EntityId::new(raw)
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        EntityId(raw.to_string())
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        EntityId(raw.to_string())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

struct EntityIdVisitor;

impl<'de> Visitor<'de> for EntityIdVisitor {
    type Value = EntityId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or numeric entity id")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<EntityId, E> {
        if v.trim().is_empty() {
            return Err(E::invalid_value(de::Unexpected::Str(v), &self));
        }
        Ok(EntityId::new(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntityId, E> {
        Ok(EntityId::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntityId, E> {
        Ok(EntityId::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<EntityId, E> {
        Ok(EntityId::from_f64(v))
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EntityIdVisitor)
    }
}
