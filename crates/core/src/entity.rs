use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Entity type → every value recorded for it, in reading order.
///
/// Types keep the order in which they were first seen, so serialized output
/// lists them top-to-bottom the way they appear on the receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityMap {
    groups: Vec<(String, Vec<String>)>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: &str, value: String) {
        match self.groups.iter_mut().find(|(k, _)| k == kind) {
            Some((_, values)) => values.push(value),
            None => self.groups.push((kind.to_string(), vec![value])),
        }
    }

    pub fn get(&self, kind: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, values)| values.as_slice())
    }

    pub fn first(&self, kind: &str) -> Option<&str> {
        self.get(kind)?.first().map(String::as_str)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.get(kind).is_some()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rename entity types through `aliases`. Types that collapse onto the
    /// same name are merged at the position of the first one seen.
    pub fn remap(self, aliases: &HashMap<String, String>) -> Self {
        if aliases.is_empty() {
            return self;
        }
        let mut out = EntityMap::new();
        for (kind, values) in self.groups {
            let target = aliases.get(&kind).map(String::as_str).unwrap_or(&kind);
            for value in values {
                out.push(target, value);
            }
        }
        out
    }
}

impl Serialize for EntityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (kind, values) in self.iter() {
            map.serialize_entry(kind, values)?;
        }
        map.end()
    }
}

struct EntityMapVisitor;

impl<'de> Visitor<'de> for EntityMapVisitor {
    type Value = EntityMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of entity type to a list of strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = EntityMap::new();
        while let Some((kind, values)) = access.next_entry::<String, Vec<String>>()? {
            for value in values {
                out.push(&kind, value);
            }
        }
        Ok(out)
    }
}

impl<'de> Deserialize<'de> for EntityMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EntityMapVisitor)
    }
}
