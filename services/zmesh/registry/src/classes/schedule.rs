//! `COMMAND_CLASS_SCHEDULE`, version 3.
//!
//! The schedule report ends in a variant group: one repetition per embedded
//! command, each a length-prefixed blob, repeated until the payload runs
//! out.

use zmesh_wire::{BitPart, FieldDescriptor, FrameSchema, VariantGroup};

use crate::CommandDef;

/// Command class key.
pub const CLASS_KEY: u8 = 0x53;

const COMMAND_SCHEDULE_GET: u8 = 0x04;
const COMMAND_SCHEDULE_REPORT: u8 = 0x05;

/// Schedule command definitions.
pub fn defs() -> Vec<CommandDef> {
    vec![
        CommandDef::request(
            "COMMAND_SCHEDULE_GET",
            FrameSchema::new(CLASS_KEY, COMMAND_SCHEDULE_GET)
                .field(FieldDescriptor::byte("schedule_id")),
        )
        .version(3)
        .expects(COMMAND_SCHEDULE_REPORT),
        CommandDef::report(
            "COMMAND_SCHEDULE_REPORT",
            FrameSchema::new(CLASS_KEY, COMMAND_SCHEDULE_REPORT)
                .field(FieldDescriptor::byte("schedule_id"))
                .field(FieldDescriptor::byte("schedule_id_block"))
                .field(FieldDescriptor::byte("start_year"))
                .field(FieldDescriptor::bits(
                    "properties1",
                    vec![
                        BitPart::uint("start_month", 0x0F),
                        BitPart::uint("aid_ro", 0xF0),
                    ],
                ))
                .field(FieldDescriptor::bits(
                    "properties2",
                    vec![
                        BitPart::uint("start_day_of_month", 0x1F),
                        BitPart::uint("recurrence_mode", 0x60),
                        BitPart::flag("aid_ro_ctl", 0x80),
                    ],
                ))
                .field(FieldDescriptor::bits(
                    "properties3",
                    vec![BitPart::uint("start_weekday", 0x7F)],
                ))
                .field(FieldDescriptor::bits(
                    "properties4",
                    vec![
                        BitPart::uint("start_hour", 0x1F),
                        BitPart::uint("duration_type", 0xE0),
                    ],
                ))
                .field(FieldDescriptor::bits(
                    "properties5",
                    vec![
                        BitPart::uint("start_minute", 0x3F),
                        BitPart::flag("relative", 0x40),
                    ],
                ))
                .field(FieldDescriptor::uint("duration_byte", 2))
                .field(FieldDescriptor::byte("reports_to_follow"))
                .field(FieldDescriptor::byte("number_of_cmd_to_follow"))
                .variant(VariantGroup::new(
                    "commands",
                    vec![FieldDescriptor::blob_prefixed("command", 1)],
                )),
        )
        .version(3),
    ]
}

#[cfg(test)]
mod tests {
    use crate::Registry;
    use zmesh_wire::{FieldMap, Value};

    #[test]
    fn report_round_trip_with_embedded_commands() {
        let registry = Registry::builtin();
        let params = FieldMap::new()
            .with("schedule_id", Value::Uint(1))
            .with("schedule_id_block", Value::Uint(0))
            .with("start_year", Value::Uint(26))
            .with("start_month", Value::Uint(8))
            .with("aid_ro", Value::Uint(1))
            .with("start_day_of_month", Value::Uint(6))
            .with("recurrence_mode", Value::Uint(1))
            .with("aid_ro_ctl", Value::Flag(false))
            .with("start_weekday", Value::Uint(4))
            .with("start_hour", Value::Uint(12))
            .with("duration_type", Value::Uint(0))
            .with("start_minute", Value::Uint(30))
            .with("relative", Value::Flag(true))
            .with("duration_byte", Value::Uint(0x0102))
            .with("reports_to_follow", Value::Uint(0))
            .with("number_of_cmd_to_follow", Value::Uint(2))
            .with(
                "commands",
                Value::Groups(vec![
                    FieldMap::new().with("command", Value::bytes(vec![0x26, 0x01, 0x63])),
                    FieldMap::new().with("command", Value::bytes(vec![0x25, 0x02])),
                ]),
            );
        let frame = registry.encode("COMMAND_SCHEDULE_REPORT", &params).unwrap();
        let decoded = registry.decode(&frame).unwrap();
        assert_eq!(decoded.fields, params);
        // The two-byte duration sits big-endian on the wire.
        let payload = frame.payload();
        assert_eq!(&payload[8..10], &[0x01, 0x02]);
    }
}
