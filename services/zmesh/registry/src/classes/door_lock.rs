//! `COMMAND_CLASS_DOOR_LOCK`, version 3.

use zmesh_wire::{BitPart, FieldDescriptor, FrameSchema};

use crate::CommandDef;

/// Command class key.
pub const CLASS_KEY: u8 = 0x62;

const OPERATION_SET: u8 = 0x01;
const OPERATION_GET: u8 = 0x02;
const OPERATION_REPORT: u8 = 0x03;
const CONFIGURATION_SET: u8 = 0x04;
const CONFIGURATION_GET: u8 = 0x05;
const CONFIGURATION_REPORT: u8 = 0x06;

const DOOR_LOCK_MODE: &[(u8, &str)] = &[
    (0x00, "DOOR_UNSECURED"),
    (0x01, "DOOR_UNSECURED_WITH_TIMEOUT"),
    (0x10, "DOOR_UNSECURED_FOR_INSIDE_DOOR_HANDLES"),
    (0x11, "DOOR_UNSECURED_FOR_INSIDE_DOOR_HANDLES_WITH_TIMEOUT"),
    (0x20, "DOOR_UNSECURED_FOR_OUTSIDE_DOOR_HANDLES"),
    (0x21, "DOOR_UNSECURED_FOR_OUTSIDE_DOOR_HANDLES_WITH_TIMEOUT"),
    (0xFE, "DOOR_LOCK_STATE_UNKNOWN"),
    (0xFF, "DOOR_SECURED"),
];

const OPERATION_TYPE: &[(u8, &str)] = &[
    (0x01, "CONSTANT_OPERATION"),
    (0x02, "TIMED_OPERATION"),
];

const DURATION: &[(u8, &str)] = &[
    (0x00, "ALREADY_AT_THE_TARGET_VALUE"),
    (0xFE, "UNKNOWN_DURATION"),
];

fn handle_modes(name: &'static str, inside: &'static str, outside: &'static str) -> FieldDescriptor {
    FieldDescriptor::bits(
        name,
        vec![BitPart::uint(inside, 0x0F), BitPart::uint(outside, 0xF0)],
    )
}

fn configuration_fields(schema: FrameSchema) -> FrameSchema {
    schema
        .field(FieldDescriptor::enum_byte("operation_type", OPERATION_TYPE))
        .field(handle_modes(
            "handle_states",
            "inside_handles_state",
            "outside_handles_state",
        ))
        .field(FieldDescriptor::byte("lock_timeout_minutes"))
        .field(FieldDescriptor::byte("lock_timeout_seconds"))
}

/// Door lock command definitions.
pub fn defs() -> Vec<CommandDef> {
    vec![
        CommandDef::request(
            "DOOR_LOCK_OPERATION_SET",
            FrameSchema::new(CLASS_KEY, OPERATION_SET)
                .field(FieldDescriptor::enum_byte("mode", DOOR_LOCK_MODE)),
        )
        .version(3),
        CommandDef::request(
            "DOOR_LOCK_OPERATION_GET",
            FrameSchema::new(CLASS_KEY, OPERATION_GET),
        )
        .version(3)
        .expects(OPERATION_REPORT),
        CommandDef::report(
            "DOOR_LOCK_OPERATION_REPORT",
            FrameSchema::new(CLASS_KEY, OPERATION_REPORT)
                .field(FieldDescriptor::enum_byte("current_mode", DOOR_LOCK_MODE))
                .field(handle_modes(
                    "handle_modes",
                    "inside_handles_mode",
                    "outside_handles_mode",
                ))
                .field(FieldDescriptor::byte("door_condition"))
                .field(FieldDescriptor::byte("lock_timeout_minutes"))
                .field(FieldDescriptor::byte("lock_timeout_seconds"))
                .field(FieldDescriptor::enum_byte("target_mode", DOOR_LOCK_MODE))
                .field(FieldDescriptor::enum_byte("duration", DURATION)),
        )
        .version(3),
        CommandDef::request(
            "DOOR_LOCK_CONFIGURATION_SET",
            configuration_fields(FrameSchema::new(CLASS_KEY, CONFIGURATION_SET)),
        )
        .version(3),
        CommandDef::request(
            "DOOR_LOCK_CONFIGURATION_GET",
            FrameSchema::new(CLASS_KEY, CONFIGURATION_GET),
        )
        .version(3)
        .expects(CONFIGURATION_REPORT),
        CommandDef::report(
            "DOOR_LOCK_CONFIGURATION_REPORT",
            configuration_fields(FrameSchema::new(CLASS_KEY, CONFIGURATION_REPORT)),
        )
        .version(3),
    ]
}

#[cfg(test)]
mod tests {
    use crate::Registry;
    use zmesh_wire::{FieldMap, Frame, Value};

    #[test]
    fn operation_set_wire_bytes() {
        let registry = Registry::builtin();
        let frame = registry
            .encode(
                "DOOR_LOCK_OPERATION_SET",
                &FieldMap::new().with("mode", Value::symbol("DOOR_SECURED")),
            )
            .unwrap();
        assert_eq!(frame.as_bytes(), &[0x62, 0x01, 0xFF]);

        let decoded = registry.decode(&frame).unwrap();
        assert_eq!(decoded.command, "DOOR_LOCK_OPERATION_SET");
        assert_eq!(
            decoded.fields.get("mode"),
            Some(&Value::symbol("DOOR_SECURED"))
        );
    }

    #[test]
    fn operation_report_round_trip() {
        let registry = Registry::builtin();
        let params = FieldMap::new()
            .with("current_mode", Value::symbol("DOOR_UNSECURED"))
            .with("inside_handles_mode", Value::Uint(0x03))
            .with("outside_handles_mode", Value::Uint(0x0C))
            .with("door_condition", Value::Uint(0x02))
            .with("lock_timeout_minutes", Value::Uint(1))
            .with("lock_timeout_seconds", Value::Uint(30))
            .with("target_mode", Value::symbol("DOOR_SECURED"))
            .with("duration", Value::symbol("UNKNOWN_DURATION"));
        let frame = registry.encode("DOOR_LOCK_OPERATION_REPORT", &params).unwrap();
        assert_eq!(
            frame.as_bytes(),
            &[0x62, 0x03, 0x00, 0xC3, 0x02, 0x01, 0x1E, 0xFF, 0xFE]
        );
        let decoded = registry.decode(&frame).unwrap();
        assert_eq!(decoded.fields, params);
    }

    #[test]
    fn operation_get_expects_the_report() {
        let registry = Registry::builtin();
        let get = registry.get("DOOR_LOCK_OPERATION_GET").unwrap();
        assert_eq!(get.expected_report, Some(0x03));
    }
}
