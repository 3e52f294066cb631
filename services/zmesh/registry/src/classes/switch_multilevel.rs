//! `COMMAND_CLASS_SWITCH_MULTILEVEL`, versions 1 and 4.
//!
//! Version 4 supersedes the version 1 SET/REPORT field sets for the same
//! command ids, which exercises the registry's capability-aware version
//! resolution.

use zmesh_wire::{BitPart, FieldDescriptor, FrameSchema};

use crate::CommandDef;

/// Command class key.
pub const CLASS_KEY: u8 = 0x26;

const SET: u8 = 0x01;
const GET: u8 = 0x02;
const REPORT: u8 = 0x03;
const START_LEVEL_CHANGE: u8 = 0x04;
const STOP_LEVEL_CHANGE: u8 = 0x05;

const DIMMING_DURATION: &[(u8, &str)] = &[(0x00, "INSTANTLY"), (0xFF, "DEFAULT")];

const DURATION: &[(u8, &str)] = &[
    (0x00, "ALREADY_AT_THE_TARGET_VALUE"),
    (0xFE, "UNKNOWN_DURATION"),
];

/// Switch multilevel command definitions.
pub fn defs() -> Vec<CommandDef> {
    vec![
        // Version 1: bare level.
        CommandDef::request(
            "SWITCH_MULTILEVEL_SET",
            FrameSchema::new(CLASS_KEY, SET).field(FieldDescriptor::byte("value")),
        ),
        CommandDef::request("SWITCH_MULTILEVEL_GET", FrameSchema::new(CLASS_KEY, GET))
            .expects(REPORT),
        CommandDef::report(
            "SWITCH_MULTILEVEL_REPORT",
            FrameSchema::new(CLASS_KEY, REPORT).field(FieldDescriptor::byte("value")),
        ),
        // Version 4 adds dimming durations and the target value.
        CommandDef::request(
            "SWITCH_MULTILEVEL_SET",
            FrameSchema::new(CLASS_KEY, SET)
                .field(FieldDescriptor::byte("value"))
                .field(FieldDescriptor::enum_byte("dimming_duration", DIMMING_DURATION)),
        )
        .version(4),
        CommandDef::request("SWITCH_MULTILEVEL_GET", FrameSchema::new(CLASS_KEY, GET))
            .version(4)
            .expects(REPORT),
        CommandDef::report(
            "SWITCH_MULTILEVEL_REPORT",
            FrameSchema::new(CLASS_KEY, REPORT)
                .field(FieldDescriptor::byte("current_value"))
                .field(FieldDescriptor::byte("target_value"))
                .field(FieldDescriptor::enum_byte("duration", DURATION)),
        )
        .version(4),
        CommandDef::request(
            "SWITCH_MULTILEVEL_START_LEVEL_CHANGE",
            FrameSchema::new(CLASS_KEY, START_LEVEL_CHANGE)
                .field(FieldDescriptor::bits(
                    "properties",
                    vec![
                        BitPart::uint("inc_dec", 0x18),
                        BitPart::flag("ignore_start_level", 0x20),
                        BitPart::uint("up_down", 0xC0),
                    ],
                ))
                .field(FieldDescriptor::byte("start_level"))
                .field(FieldDescriptor::byte("dimming_duration"))
                .field(FieldDescriptor::byte("step_size")),
        )
        .version(4),
        CommandDef::request(
            "SWITCH_MULTILEVEL_STOP_LEVEL_CHANGE",
            FrameSchema::new(CLASS_KEY, STOP_LEVEL_CHANGE),
        )
        .version(4),
    ]
}

#[cfg(test)]
mod tests {
    use crate::Registry;
    use zmesh_wire::{FieldMap, Value};

    #[test]
    fn set_wire_bytes_at_latest_version() {
        let registry = Registry::builtin();
        let frame = registry
            .encode(
                "SWITCH_MULTILEVEL_SET",
                &FieldMap::new()
                    .with("value", Value::Uint(99))
                    .with("dimming_duration", Value::symbol("DEFAULT")),
            )
            .unwrap();
        assert_eq!(frame.as_bytes(), &[0x26, 0x01, 99, 0xFF]);

        let decoded = registry.decode(&frame).unwrap();
        assert_eq!(decoded.version, 4);
        assert_eq!(decoded.fields.get("value"), Some(&Value::Uint(99)));
        assert_eq!(
            decoded.fields.get("dimming_duration"),
            Some(&Value::symbol("DEFAULT"))
        );
    }

    #[test]
    fn capability_selects_the_version_1_field_set() {
        let registry = Registry::builtin();
        let frame = registry
            .encode_capped(
                "SWITCH_MULTILEVEL_SET",
                1,
                &FieldMap::new().with("value", Value::Uint(20)),
            )
            .unwrap();
        assert_eq!(frame.as_bytes(), &[0x26, 0x01, 20]);

        let decoded = registry.decode_capped(&frame, 1).unwrap();
        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.fields.get("value"), Some(&Value::Uint(20)));
    }

    #[test]
    fn start_level_change_bit_packing() {
        let registry = Registry::builtin();
        let frame = registry
            .encode(
                "SWITCH_MULTILEVEL_START_LEVEL_CHANGE",
                &FieldMap::new()
                    .with("inc_dec", Value::Uint(0x01))
                    .with("ignore_start_level", Value::Flag(true))
                    .with("up_down", Value::Uint(0x01))
                    .with("start_level", Value::Uint(10))
                    .with("dimming_duration", Value::Uint(5))
                    .with("step_size", Value::Uint(2)),
            )
            .unwrap();
        // 0x01<<3 | 0x20 | 0x01<<6 = 0x68
        assert_eq!(frame.as_bytes(), &[0x26, 0x04, 0x68, 10, 5, 2]);
    }
}
