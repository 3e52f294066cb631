//! Frame and decoded-value types.

use bytes::Bytes;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::DecodeError;

/// An immutable application-layer frame.
///
/// Invariant: `byte[0]` is the command class key and `byte[1]` the command
/// id, for created and received frames alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    /// Wrap received bytes, rejecting anything shorter than the two-byte
    /// command header.
    pub fn new(bytes: Bytes) -> Result<Self, DecodeError> {
        if bytes.len() < 2 {
            return Err(DecodeError::MissingHeader);
        }
        Ok(Self(bytes))
    }

    /// Command class key (byte 0).
    pub fn class_key(&self) -> u8 {
        self.0[0]
    }

    /// Command id (byte 1).
    pub fn command_id(&self) -> u8 {
        self.0[1]
    }

    /// Schema-defined payload (bytes 2..).
    pub fn payload(&self) -> &[u8] {
        &self.0[2..]
    }

    /// The complete frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Total frame length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A frame is never empty; present for clippy's `len` convention.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl TryFrom<Vec<u8>> for Frame {
    type Error = DecodeError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(Bytes::from(bytes))
    }
}

/// One decoded or to-be-encoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Fixed-width integer or bit-packed sub-field
    Uint(u64),
    /// Single-bit flag
    Flag(bool),
    /// Enumerated symbol
    Symbol(String),
    /// Variable-length blob
    Bytes(Bytes),
    /// Bitmask-to-set members, ordered by bit position
    Set(Vec<String>),
    /// Variant group repetitions
    Groups(Vec<FieldMap>),
}

impl Value {
    /// Convenience constructor for symbol values.
    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Symbol(s.into())
    }

    /// Convenience constructor for blob values.
    pub fn bytes(b: impl Into<Bytes>) -> Self {
        Value::Bytes(b.into())
    }

    /// The integer inside a `Uint`, if that is what this is.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// The symbol inside a `Symbol`, if that is what this is.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Uint(v) => serializer.serialize_u64(*v),
            Value::Flag(b) => serializer.serialize_bool(*b),
            Value::Symbol(s) => serializer.serialize_str(s),
            Value::Bytes(b) => {
                let mut seq = serializer.serialize_seq(Some(b.len()))?;
                for byte in b.iter() {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
            Value::Set(members) => {
                let mut seq = serializer.serialize_seq(Some(members.len()))?;
                for member in members {
                    seq.serialize_element(member)?;
                }
                seq.end()
            }
            Value::Groups(groups) => {
                let mut seq = serializer.serialize_seq(Some(groups.len()))?;
                for group in groups {
                    seq.serialize_element(group)?;
                }
                seq.end()
            }
        }
    }
}

/// An ordered field-name → value mapping.
///
/// Insertion order is schema order, preserved through decode so callers can
/// walk a frame's fields in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, Value)>,
}

impl FieldMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any existing entry of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a value by field name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A fully decoded frame: command identity plus its field values.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedFrame {
    /// Symbolic command name, or `"UNKNOWN"` for unregistered commands
    pub command: String,
    /// Schema version the frame was decoded against (0 when raw)
    pub version: u8,
    /// Command class key
    pub class_key: u8,
    /// Command id
    pub command_id: u8,
    /// Decoded fields in schema order
    pub fields: FieldMap,
}

impl DecodedFrame {
    /// A raw rendition of a frame no schema is registered for: the payload
    /// is preserved as a single blob so higher layers still see it.
    pub fn raw(frame: &Frame) -> Self {
        let mut fields = FieldMap::new();
        fields.insert("payload", Value::Bytes(Bytes::copy_from_slice(frame.payload())));
        Self {
            command: "UNKNOWN".to_string(),
            version: 0,
            class_key: frame.class_key(),
            command_id: frame.command_id(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_missing_header() {
        assert!(Frame::try_from(vec![0x62]).is_err());
        let frame = Frame::try_from(vec![0x62, 0x01, 0xFF]).unwrap();
        assert_eq!(frame.class_key(), 0x62);
        assert_eq!(frame.command_id(), 0x01);
        assert_eq!(frame.payload(), &[0xFF]);
    }

    #[test]
    fn field_map_preserves_insertion_order() {
        let mut map = FieldMap::new();
        map.insert("zulu", Value::Uint(1));
        map.insert("alpha", Value::Uint(2));
        map.insert("mike", Value::Uint(3));
        let names: Vec<&str> = map.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["zulu", "alpha", "mike"]);
    }

    #[test]
    fn field_map_insert_replaces() {
        let mut map = FieldMap::new();
        map.insert("a", Value::Uint(1));
        map.insert("a", Value::Uint(2));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&Value::Uint(2)));
    }

    #[test]
    fn values_serialize_to_json() {
        let mut map = FieldMap::new();
        map.insert("mode", Value::symbol("DOOR_SECURED"));
        map.insert("level", Value::Uint(99));
        map.insert("locked", Value::Flag(true));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"mode":"DOOR_SECURED","level":99,"locked":true}"#
        );
    }
}
