//! `COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION`, version 1.
//!
//! Network-management commands carry the wrapping 1–255 sequence number
//! handed out by the session's sequence counter.

use zmesh_wire::{FieldDescriptor, FrameSchema};

use crate::CommandDef;

/// Command class key.
pub const CLASS_KEY: u8 = 0x34;

const NODE_ADD: u8 = 0x01;
const NODE_ADD_STATUS: u8 = 0x02;
const NODE_REMOVE: u8 = 0x03;
const NODE_REMOVE_STATUS: u8 = 0x04;

const ADD_MODE: &[(u8, &str)] = &[
    (0x01, "NODE_ADD_ANY"),
    (0x05, "NODE_ADD_STOP"),
    (0x06, "NODE_ADD_STOP_FAILED"),
];

const ADD_STATUS: &[(u8, &str)] = &[
    (0x06, "NODE_ADD_STATUS_DONE"),
    (0x07, "NODE_ADD_STATUS_FAILED"),
    (0x09, "NODE_ADD_STATUS_SECURITY_FAILED"),
];

const REMOVE_MODE: &[(u8, &str)] = &[(0x01, "NODE_REMOVE_ANY"), (0x05, "NODE_REMOVE_STOP")];

const REMOVE_STATUS: &[(u8, &str)] = &[
    (0x06, "NODE_REMOVE_STATUS_DONE"),
    (0x07, "NODE_REMOVE_STATUS_FAILED"),
];

const TRANSMIT_OPTIONS: &[(u16, &str)] = &[
    (0, "TRANSMIT_OPTION_ACK"),
    (1, "TRANSMIT_OPTION_LOW_POWER"),
    (2, "TRANSMIT_OPTION_AUTO_ROUTE"),
    (4, "TRANSMIT_OPTION_NO_ROUTE"),
    (5, "TRANSMIT_OPTION_EXPLORE"),
];

/// Network management inclusion command definitions.
pub fn defs() -> Vec<CommandDef> {
    vec![
        CommandDef::request(
            "NODE_ADD",
            FrameSchema::new(CLASS_KEY, NODE_ADD)
                .field(FieldDescriptor::byte("seq_no"))
                .field(FieldDescriptor::byte("reserved"))
                .field(FieldDescriptor::enum_byte("mode", ADD_MODE))
                .field(FieldDescriptor::bitmask_fixed("tx_options", 1, TRANSMIT_OPTIONS)),
        )
        .expects(NODE_ADD_STATUS),
        CommandDef::report(
            "NODE_ADD_STATUS",
            FrameSchema::new(CLASS_KEY, NODE_ADD_STATUS)
                .field(FieldDescriptor::byte("seq_no"))
                .field(FieldDescriptor::enum_byte("status", ADD_STATUS))
                .field(FieldDescriptor::byte("reserved"))
                .field(FieldDescriptor::node_id("new_node_id"))
                .field(FieldDescriptor::blob_prefixed("node_info", 1)),
        ),
        CommandDef::request(
            "NODE_REMOVE",
            FrameSchema::new(CLASS_KEY, NODE_REMOVE)
                .field(FieldDescriptor::byte("seq_no"))
                .field(FieldDescriptor::byte("reserved"))
                .field(FieldDescriptor::enum_byte("mode", REMOVE_MODE)),
        )
        .expects(NODE_REMOVE_STATUS),
        CommandDef::report(
            "NODE_REMOVE_STATUS",
            FrameSchema::new(CLASS_KEY, NODE_REMOVE_STATUS)
                .field(FieldDescriptor::byte("seq_no"))
                .field(FieldDescriptor::enum_byte("status", REMOVE_STATUS))
                .field(FieldDescriptor::node_id("node_id")),
        ),
    ]
}
