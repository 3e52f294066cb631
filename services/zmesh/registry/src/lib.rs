//! Command registry: the lookup tables binding symbolic command names and
//! `(class-key, command-id)` pairs to their payload schemas.
//!
//! The registry is populated once at startup from static data and shared
//! read-only for the session lifetime. Each entry records whether it is a
//! *request* (constructed by callers to send) or a *report* (decoded on
//! receipt), and a protocol version tag: later versions may supersede the
//! field set of an earlier version for the same command id, and lookups
//! prefer the highest version not exceeding the destination's negotiated
//! capability.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::debug;
use zmesh_wire::{codec, DecodedFrame, DecodeError, EncodeError, FieldMap, Frame, FrameSchema, SchemaError};

pub mod classes;

/// Whether a command is constructed locally or only decoded on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Callers construct this command to send
    Request,
    /// Devices send this command; callers only decode it
    Report,
}

/// One registered command: identity, version, direction and payload schema.
#[derive(Debug, Clone)]
pub struct CommandDef {
    /// Symbolic command name, e.g. `DOOR_LOCK_OPERATION_SET`
    pub name: &'static str,
    /// Protocol version of this field set
    pub version: u8,
    /// Request or report
    pub direction: Direction,
    /// For requests answered by a report: the report's command id within the
    /// same class (the uniform GET → REPORT pairing)
    pub expected_report: Option<u8>,
    /// Payload schema; carries the class key and command id
    pub schema: FrameSchema,
}

impl CommandDef {
    /// A request command at version 1.
    pub fn request(name: &'static str, schema: FrameSchema) -> Self {
        Self {
            name,
            version: 1,
            direction: Direction::Request,
            expected_report: None,
            schema,
        }
    }

    /// A report command at version 1.
    pub fn report(name: &'static str, schema: FrameSchema) -> Self {
        Self {
            name,
            version: 1,
            direction: Direction::Report,
            expected_report: None,
            schema,
        }
    }

    /// Override the version tag.
    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Declare the report command id that answers this request.
    pub fn expects(mut self, report_command_id: u8) -> Self {
        self.expected_report = Some(report_command_id);
        self
    }

    /// Command class key of this command.
    pub fn class_key(&self) -> u8 {
        self.schema.class_key
    }

    /// Command id of this command.
    pub fn command_id(&self) -> u8 {
        self.schema.command_id
    }
}

/// Registry load errors. These are fatal configuration errors: the command
/// tables are static data, so a violation means the build is wrong, not the
/// network.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A command's schema failed structural validation
    #[error("invalid schema for command '{name}': {source}")]
    Schema {
        /// Offending command name
        name: &'static str,
        /// Underlying schema violation
        #[source]
        source: SchemaError,
    },

    /// Two commands share a `(class-key, command-id, version)` triple
    #[error(
        "duplicate registration for class {class_key:#04x} command {command_id:#04x} version {version}"
    )]
    DuplicateKey {
        /// Command class key
        class_key: u8,
        /// Command id
        command_id: u8,
        /// Version tag
        version: u8,
    },

    /// Two commands share a name and version
    #[error("duplicate registration for command '{name}' version {version}")]
    DuplicateName {
        /// Command name
        name: &'static str,
        /// Version tag
        version: u8,
    },
}

/// Read-only command lookup table.
#[derive(Debug, Default)]
pub struct Registry {
    defs: Vec<CommandDef>,
    /// Name → def indices, ascending by version
    by_name: HashMap<&'static str, Vec<usize>>,
    /// (class, command) → def indices, ascending by version
    by_key: HashMap<(u8, u8), Vec<usize>>,
}

/// The catalogue shipped with this crate, loaded once and shared.
static BUILTIN: Lazy<Arc<Registry>> = Lazy::new(|| {
    Arc::new(
        Registry::from_defs(classes::defs()).expect("built-in command tables are statically valid"),
    )
});

impl Registry {
    /// Build a registry from command definitions, validating every schema
    /// and rejecting duplicate registrations.
    pub fn from_defs(defs: Vec<CommandDef>) -> Result<Self, RegistryError> {
        let mut registry = Registry::default();
        for def in defs {
            def.schema
                .validate()
                .map_err(|source| RegistryError::Schema {
                    name: def.name,
                    source,
                })?;

            let key = (def.class_key(), def.command_id());
            let keyed = registry.by_key.entry(key).or_default();
            if keyed
                .iter()
                .any(|&i| registry.defs[i].version == def.version)
            {
                return Err(RegistryError::DuplicateKey {
                    class_key: key.0,
                    command_id: key.1,
                    version: def.version,
                });
            }
            let named = registry.by_name.entry(def.name).or_default();
            if named
                .iter()
                .any(|&i| registry.defs[i].version == def.version)
            {
                return Err(RegistryError::DuplicateName {
                    name: def.name,
                    version: def.version,
                });
            }

            let index = registry.defs.len();
            keyed.push(index);
            named.push(index);
            registry.defs.push(def);
        }

        // Keep the per-key and per-name lists ordered by version so lookup
        // can binary-pick the right entry.
        let defs = &registry.defs;
        for indices in registry.by_key.values_mut() {
            indices.sort_by_key(|&i| defs[i].version);
        }
        for indices in registry.by_name.values_mut() {
            indices.sort_by_key(|&i| defs[i].version);
        }
        Ok(registry)
    }

    /// The catalogue shipped with this crate.
    pub fn builtin() -> Arc<Registry> {
        Arc::clone(&BUILTIN)
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// True when no command is registered.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterate every registered command.
    pub fn iter(&self) -> impl Iterator<Item = &CommandDef> {
        self.defs.iter()
    }

    /// Latest version of a command by name.
    pub fn get(&self, name: &str) -> Option<&CommandDef> {
        let indices = self.by_name.get(name)?;
        indices.last().map(|&i| &self.defs[i])
    }

    /// Highest version of a command not exceeding `version_cap`, falling
    /// back to the lowest registered version when the destination's
    /// capability predates every known field set.
    pub fn get_capped(&self, name: &str, version_cap: u8) -> Option<&CommandDef> {
        let indices = self.by_name.get(name)?;
        Self::pick_version(&self.defs, indices, version_cap)
    }

    /// Latest definition for a `(class-key, command-id)` pair.
    pub fn resolve(&self, class_key: u8, command_id: u8) -> Option<&CommandDef> {
        let indices = self.by_key.get(&(class_key, command_id))?;
        indices.last().map(|&i| &self.defs[i])
    }

    /// Definition for a `(class-key, command-id)` pair honoring a version
    /// capability.
    pub fn resolve_capped(
        &self,
        class_key: u8,
        command_id: u8,
        version_cap: u8,
    ) -> Option<&CommandDef> {
        let indices = self.by_key.get(&(class_key, command_id))?;
        Self::pick_version(&self.defs, indices, version_cap)
    }

    fn pick_version<'a>(
        defs: &'a [CommandDef],
        indices: &[usize],
        version_cap: u8,
    ) -> Option<&'a CommandDef> {
        indices
            .iter()
            .rev()
            .map(|&i| &defs[i])
            .find(|def| def.version <= version_cap)
            .or_else(|| indices.first().map(|&i| &defs[i]))
    }

    /// Encode a parameter set for the named command (latest version).
    pub fn encode(&self, name: &str, params: &FieldMap) -> Result<Frame, EncodeError> {
        let def = self
            .get(name)
            .ok_or_else(|| EncodeError::UnknownCommand(name.to_string()))?;
        codec::encode(&def.schema, params)
    }

    /// Encode a parameter set for the named command at the destination's
    /// negotiated capability.
    pub fn encode_capped(
        &self,
        name: &str,
        version_cap: u8,
        params: &FieldMap,
    ) -> Result<Frame, EncodeError> {
        let def = self
            .get_capped(name, version_cap)
            .ok_or_else(|| EncodeError::UnknownCommand(name.to_string()))?;
        codec::encode(&def.schema, params)
    }

    /// Strict decode: unknown `(class-key, command-id)` pairs are an error.
    pub fn decode(&self, frame: &Frame) -> Result<DecodedFrame, DecodeError> {
        self.decode_capped(frame, u8::MAX)
    }

    /// Strict decode honoring a version capability.
    pub fn decode_capped(
        &self,
        frame: &Frame,
        version_cap: u8,
    ) -> Result<DecodedFrame, DecodeError> {
        let def = self
            .resolve_capped(frame.class_key(), frame.command_id(), version_cap)
            .ok_or(DecodeError::Unrecognized {
                class_key: frame.class_key(),
                command_id: frame.command_id(),
            })?;
        let fields = codec::decode(&def.schema, frame)?;
        Ok(DecodedFrame {
            command: def.name.to_string(),
            version: def.version,
            class_key: frame.class_key(),
            command_id: frame.command_id(),
            fields,
        })
    }

    /// Permissive decode: a frame with no registered schema degrades to a
    /// raw rendition instead of failing, so a misbehaving or newer remote
    /// never takes the session down.
    pub fn decode_or_raw(&self, frame: &Frame, version_cap: u8) -> DecodedFrame {
        match self.decode_capped(frame, version_cap) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!(
                    class_key = frame.class_key(),
                    command_id = frame.command_id(),
                    %err,
                    "decoding inbound frame as raw payload"
                );
                DecodedFrame::raw(frame)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmesh_wire::{FieldDescriptor, Value};

    #[test]
    fn builtin_catalogue_loads() {
        let registry = Registry::builtin();
        assert!(!registry.is_empty());
        assert!(registry.get("DOOR_LOCK_OPERATION_SET").is_some());
    }

    #[test]
    fn duplicate_key_is_a_load_error() {
        let defs = vec![
            CommandDef::request("A_SET", FrameSchema::new(0x10, 0x01)),
            CommandDef::request("B_SET", FrameSchema::new(0x10, 0x01)),
        ];
        assert!(matches!(
            Registry::from_defs(defs),
            Err(RegistryError::DuplicateKey {
                class_key: 0x10,
                command_id: 0x01,
                version: 1
            })
        ));
    }

    #[test]
    fn same_command_id_may_carry_several_versions() {
        let defs = vec![
            CommandDef::request(
                "A_SET",
                FrameSchema::new(0x10, 0x01).field(FieldDescriptor::byte("value")),
            ),
            CommandDef::request(
                "A_SET",
                FrameSchema::new(0x10, 0x01)
                    .field(FieldDescriptor::byte("value"))
                    .field(FieldDescriptor::byte("duration")),
            )
            .version(2),
        ];
        let registry = Registry::from_defs(defs).unwrap();

        // Latest wins by default, the capability cap selects older sets.
        assert_eq!(registry.get("A_SET").unwrap().version, 2);
        assert_eq!(registry.get_capped("A_SET", 1).unwrap().version, 1);
        assert_eq!(registry.resolve_capped(0x10, 0x01, 1).unwrap().version, 1);
        // A capability below every registered version falls back to the
        // oldest known field set.
        let defs_v2 = vec![CommandDef::request(
            "B_SET",
            FrameSchema::new(0x11, 0x01),
        )
        .version(2)];
        let registry = Registry::from_defs(defs_v2).unwrap();
        assert_eq!(registry.get_capped("B_SET", 1).unwrap().version, 2);
    }

    #[test]
    fn invalid_schema_is_rejected_at_load() {
        let defs = vec![CommandDef::request(
            "BROKEN_SET",
            FrameSchema::new(0x10, 0x01)
                .field(FieldDescriptor::blob_remainder("data"))
                .field(FieldDescriptor::byte("tail")),
        )];
        assert!(matches!(
            Registry::from_defs(defs),
            Err(RegistryError::Schema {
                name: "BROKEN_SET",
                ..
            })
        ));
    }

    #[test]
    fn unknown_frame_decodes_as_raw() {
        let registry = Registry::builtin();
        let frame = Frame::try_from(vec![0xEE, 0x77, 0x01, 0x02]).unwrap();
        assert!(matches!(
            registry.decode(&frame),
            Err(DecodeError::Unrecognized {
                class_key: 0xEE,
                command_id: 0x77
            })
        ));

        let raw = registry.decode_or_raw(&frame, u8::MAX);
        assert_eq!(raw.command, "UNKNOWN");
        assert_eq!(raw.class_key, 0xEE);
        assert_eq!(
            raw.fields.get("payload"),
            Some(&Value::bytes(vec![0x01, 0x02]))
        );
    }
}
