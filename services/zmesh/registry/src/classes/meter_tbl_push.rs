//! `COMMAND_CLASS_METER_TBL_PUSH`, version 1.
//!
//! The push node id carries a declared 1–232 domain, so a bad node id fails
//! encoding with a typed error instead of producing an unusable frame.

use zmesh_wire::{BitPart, FieldDescriptor, FrameSchema};

use crate::CommandDef;

/// Command class key.
pub const CLASS_KEY: u8 = 0x3C;

const PUSH_CONFIGURATION_SET: u8 = 0x01;
const PUSH_CONFIGURATION_GET: u8 = 0x02;
const PUSH_CONFIGURATION_REPORT: u8 = 0x03;

fn configuration_fields(schema: FrameSchema) -> FrameSchema {
    schema
        .field(FieldDescriptor::bits(
            "properties",
            vec![
                BitPart::uint("operating_status_push_mode", 0x0F),
                BitPart::flag("ps", 0x10),
            ],
        ))
        .field(FieldDescriptor::byte("interval_months"))
        .field(FieldDescriptor::byte("interval_days"))
        .field(FieldDescriptor::byte("interval_hours"))
        .field(FieldDescriptor::byte("interval_minutes"))
        .field(FieldDescriptor::node_id("push_node_id"))
}

/// Meter table push command definitions.
pub fn defs() -> Vec<CommandDef> {
    vec![
        CommandDef::request(
            "METER_TBL_PUSH_CONFIGURATION_SET",
            configuration_fields(FrameSchema::new(CLASS_KEY, PUSH_CONFIGURATION_SET)),
        ),
        CommandDef::request(
            "METER_TBL_PUSH_CONFIGURATION_GET",
            FrameSchema::new(CLASS_KEY, PUSH_CONFIGURATION_GET),
        )
        .expects(PUSH_CONFIGURATION_REPORT),
        CommandDef::report(
            "METER_TBL_PUSH_CONFIGURATION_REPORT",
            configuration_fields(FrameSchema::new(CLASS_KEY, PUSH_CONFIGURATION_REPORT)),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use crate::Registry;
    use zmesh_wire::{EncodeError, FieldMap, Value};

    fn params(push_node_id: u64) -> FieldMap {
        FieldMap::new()
            .with("operating_status_push_mode", Value::Uint(1))
            .with("ps", Value::Flag(false))
            .with("interval_months", Value::Uint(0))
            .with("interval_days", Value::Uint(1))
            .with("interval_hours", Value::Uint(12))
            .with("interval_minutes", Value::Uint(30))
            .with("push_node_id", Value::Uint(push_node_id))
    }

    #[test]
    fn bad_push_node_id_fails_validation() {
        let registry = Registry::builtin();
        let result = registry.encode("METER_TBL_PUSH_CONFIGURATION_SET", &params(0));
        assert!(matches!(
            result,
            Err(EncodeError::OutOfRange {
                field: "push_node_id",
                value: 0
            })
        ));
        assert!(registry
            .encode("METER_TBL_PUSH_CONFIGURATION_SET", &params(233))
            .is_err());
        assert!(registry
            .encode("METER_TBL_PUSH_CONFIGURATION_SET", &params(232))
            .is_ok());
    }
}
