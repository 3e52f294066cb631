//! `COMMAND_CLASS_ASSOCIATION`, version 2.

use zmesh_wire::{FieldDescriptor, FrameSchema};

use crate::CommandDef;

/// Command class key.
pub const CLASS_KEY: u8 = 0x85;

const SET: u8 = 0x01;
const GET: u8 = 0x02;
const REPORT: u8 = 0x03;
const REMOVE: u8 = 0x04;
const GROUPINGS_GET: u8 = 0x05;
const GROUPINGS_REPORT: u8 = 0x06;

/// Association command definitions.
pub fn defs() -> Vec<CommandDef> {
    vec![
        CommandDef::request(
            "ASSOCIATION_SET",
            FrameSchema::new(CLASS_KEY, SET)
                .field(FieldDescriptor::byte("grouping_identifier"))
                .field(FieldDescriptor::blob_remainder("node_ids")),
        )
        .version(2),
        CommandDef::request(
            "ASSOCIATION_GET",
            FrameSchema::new(CLASS_KEY, GET)
                .field(FieldDescriptor::byte("grouping_identifier")),
        )
        .version(2)
        .expects(REPORT),
        CommandDef::report(
            "ASSOCIATION_REPORT",
            FrameSchema::new(CLASS_KEY, REPORT)
                .field(FieldDescriptor::byte("grouping_identifier"))
                .field(FieldDescriptor::byte("max_nodes_supported"))
                .field(FieldDescriptor::byte("reports_to_follow"))
                .field(FieldDescriptor::blob_remainder("node_ids")),
        )
        .version(2),
        CommandDef::request(
            "ASSOCIATION_REMOVE",
            FrameSchema::new(CLASS_KEY, REMOVE)
                .field(FieldDescriptor::byte("grouping_identifier"))
                .field(FieldDescriptor::blob_remainder("node_ids")),
        )
        .version(2),
        CommandDef::request(
            "ASSOCIATION_GROUPINGS_GET",
            FrameSchema::new(CLASS_KEY, GROUPINGS_GET),
        )
        .version(2)
        .expects(GROUPINGS_REPORT),
        CommandDef::report(
            "ASSOCIATION_GROUPINGS_REPORT",
            FrameSchema::new(CLASS_KEY, GROUPINGS_REPORT)
                .field(FieldDescriptor::byte("supported_groupings")),
        )
        .version(2),
    ]
}
