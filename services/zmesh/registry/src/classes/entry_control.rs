//! `COMMAND_CLASS_ENTRY_CONTROL`, version 1.

use zmesh_wire::{BitPart, FieldDescriptor, FrameSchema};

use crate::CommandDef;

/// Command class key.
pub const CLASS_KEY: u8 = 0x6F;

const NOTIFICATION: u8 = 0x01;
const KEY_SUPPORTED_GET: u8 = 0x02;
const KEY_SUPPORTED_REPORT: u8 = 0x03;

const EVENT_TYPE: &[(u8, &str)] = &[
    (0x00, "CACHING"),
    (0x01, "CACHED_KEYS"),
    (0x02, "ENTER"),
    (0x03, "DISARM_ALL"),
    (0x04, "ARM_ALL"),
    (0x05, "ARM_AWAY"),
    (0x06, "ARM_HOME"),
    (0x07, "EXIT_DELAY"),
    (0x08, "ARM_1"),
    (0x09, "ARM_2"),
    (0x0A, "ARM_3"),
    (0x0B, "ARM_4"),
    (0x0C, "ARM_5"),
    (0x0D, "ARM_6"),
    (0x0E, "RFID"),
    (0x0F, "BELL"),
    (0x10, "FIRE"),
    (0x11, "POLICE"),
    (0x12, "ALERT_PANIC"),
    (0x13, "ALERT_MEDICAL"),
    (0x14, "GATE_OPEN"),
    (0x15, "GATE_CLOSE"),
    (0x16, "LOCK"),
    (0x17, "UNLOCK"),
    (0x18, "TEST"),
    (0x19, "CANCEL"),
];

/// The key-supported mask reuses the event codes as bit positions.
const EVENT_POSITIONS: &[(u16, &str)] = &[
    (0x00, "CACHING"),
    (0x01, "CACHED_KEYS"),
    (0x02, "ENTER"),
    (0x03, "DISARM_ALL"),
    (0x04, "ARM_ALL"),
    (0x05, "ARM_AWAY"),
    (0x06, "ARM_HOME"),
    (0x07, "EXIT_DELAY"),
    (0x08, "ARM_1"),
    (0x09, "ARM_2"),
    (0x0A, "ARM_3"),
    (0x0B, "ARM_4"),
    (0x0C, "ARM_5"),
    (0x0D, "ARM_6"),
    (0x0E, "RFID"),
    (0x0F, "BELL"),
    (0x10, "FIRE"),
    (0x11, "POLICE"),
    (0x12, "ALERT_PANIC"),
    (0x13, "ALERT_MEDICAL"),
    (0x14, "GATE_OPEN"),
    (0x15, "GATE_CLOSE"),
    (0x16, "LOCK"),
    (0x17, "UNLOCK"),
    (0x18, "TEST"),
    (0x19, "CANCEL"),
];

/// Entry control command definitions.
pub fn defs() -> Vec<CommandDef> {
    vec![
        CommandDef::report(
            "ENTRY_CONTROL_NOTIFICATION",
            FrameSchema::new(CLASS_KEY, NOTIFICATION)
                .field(FieldDescriptor::byte("sequence_number"))
                .field(FieldDescriptor::bits(
                    "properties",
                    vec![BitPart::uint("data_type", 0x03)],
                ))
                .field(FieldDescriptor::enum_byte("event_type", EVENT_TYPE))
                .field(FieldDescriptor::blob_prefixed("event_data", 1)),
        ),
        CommandDef::request(
            "ENTRY_CONTROL_KEY_SUPPORTED_GET",
            FrameSchema::new(CLASS_KEY, KEY_SUPPORTED_GET),
        )
        .expects(KEY_SUPPORTED_REPORT),
        CommandDef::report(
            "ENTRY_CONTROL_KEY_SUPPORTED_REPORT",
            FrameSchema::new(CLASS_KEY, KEY_SUPPORTED_REPORT)
                .field(FieldDescriptor::bitmask_prefixed("keys", 1, EVENT_POSITIONS)),
        ),
    ]
}
