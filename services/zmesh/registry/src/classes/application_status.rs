//! `COMMAND_CLASS_APPLICATION_STATUS`, version 1.
//!
//! `APPLICATION_REJECTED_REQUEST` is the explicit negative acknowledgement a
//! device sends when it refuses a command; the dispatcher's clients use it
//! to fail the in-flight transaction instead of waiting out the timeout.

use zmesh_wire::{FieldDescriptor, FrameSchema};

use crate::CommandDef;

/// Command class key.
pub const CLASS_KEY: u8 = 0x22;

/// Command id of `APPLICATION_BUSY`.
pub const APPLICATION_BUSY: u8 = 0x01;
/// Command id of `APPLICATION_REJECTED_REQUEST`.
pub const APPLICATION_REJECTED_REQUEST: u8 = 0x02;

const BUSY_STATUS: &[(u8, &str)] = &[
    (0x00, "TRY_AGAIN_LATER"),
    (0x01, "TRY_AGAIN_IN_WAIT_TIME_SECONDS"),
    (0x02, "REQUEST_QUEUED_EXECUTED_LATER"),
];

/// Application status command definitions.
pub fn defs() -> Vec<CommandDef> {
    vec![
        CommandDef::report(
            "APPLICATION_BUSY",
            FrameSchema::new(CLASS_KEY, APPLICATION_BUSY)
                .field(FieldDescriptor::enum_byte("status", BUSY_STATUS))
                .field(FieldDescriptor::byte("wait_time")),
        ),
        CommandDef::report(
            "APPLICATION_REJECTED_REQUEST",
            FrameSchema::new(CLASS_KEY, APPLICATION_REJECTED_REQUEST)
                .field(FieldDescriptor::byte("status")),
        ),
    ]
}
