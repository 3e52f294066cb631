//! Declarative payload schemas.
//!
//! A [`FrameSchema`] describes one command's payload as an ordered list of
//! [`FieldDescriptor`]s plus an optional trailing [`VariantGroup`]. Schemas
//! are data: the encode/decode engine in [`crate::codec`] interprets them, so
//! no command ever needs hand-written offset arithmetic.

use std::collections::HashMap;

use crate::error::SchemaError;

/// How a sub-byte part is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitKind {
    /// An unsigned integer occupying the masked bits
    Uint,
    /// A single-bit boolean flag
    Flag,
}

/// One named sub-field within a bit-packed byte.
///
/// The shift is derived from the mask (`mask.trailing_zeros()`), so the
/// mask-then-shift order is a property of the type: a call site cannot apply
/// the operations the wrong way round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPart {
    /// Decoded field name
    pub name: &'static str,
    /// Bit mask within the containing byte
    pub mask: u8,
    /// Interpretation of the masked bits
    pub kind: BitKind,
}

impl BitPart {
    /// An unsigned integer part.
    pub fn uint(name: &'static str, mask: u8) -> Self {
        Self {
            name,
            mask,
            kind: BitKind::Uint,
        }
    }

    /// A single-bit flag part.
    pub fn flag(name: &'static str, mask: u8) -> Self {
        Self {
            name,
            mask,
            kind: BitKind::Flag,
        }
    }

    /// Shift distance implied by the mask.
    pub fn shift(&self) -> u32 {
        self.mask.trailing_zeros()
    }

    /// Largest value the masked bits can hold.
    pub fn max_value(&self) -> u8 {
        self.mask >> self.shift()
    }

    /// Pack a value into its position: shift into place, then mask.
    pub fn pack(&self, value: u8) -> u8 {
        (value << self.shift()) & self.mask
    }

    /// Extract a value from the byte: mask first, then shift down.
    pub fn unpack(&self, byte: u8) -> u8 {
        (byte & self.mask) >> self.shift()
    }
}

/// Bidirectional value ↔ symbol table for enumerated byte fields.
#[derive(Debug, Clone, Default)]
pub struct EnumTable {
    by_value: HashMap<u8, &'static str>,
    by_symbol: HashMap<&'static str, u8>,
}

impl EnumTable {
    /// Build a table from `(value, symbol)` pairs.
    pub fn new(entries: &[(u8, &'static str)]) -> Self {
        let mut by_value = HashMap::with_capacity(entries.len());
        let mut by_symbol = HashMap::with_capacity(entries.len());
        for (value, symbol) in entries {
            by_value.insert(*value, *symbol);
            by_symbol.insert(*symbol, *value);
        }
        Self {
            by_value,
            by_symbol,
        }
    }

    /// Symbol for a byte value, if mapped.
    pub fn symbol(&self, value: u8) -> Option<&'static str> {
        self.by_value.get(&value).copied()
    }

    /// Byte value for a symbol, if mapped.
    pub fn value(&self, symbol: &str) -> Option<u8> {
        self.by_symbol.get(symbol).copied()
    }

    /// Decode a byte into its symbol, or the `UNKNOWN_<hex>` fallback.
    pub fn decode(&self, value: u8) -> String {
        match self.symbol(value) {
            Some(symbol) => symbol.to_string(),
            None => unknown_symbol(value),
        }
    }
}

/// Fallback marker for an enumerated byte with no table entry.
pub fn unknown_symbol(value: u8) -> String {
    format!("UNKNOWN_{value:02X}")
}

/// Placeholder symbol for a set bit position with no table entry.
pub fn bitmask_placeholder(position: u16) -> String {
    format!("BITMASK_{position}")
}

/// Bidirectional bit-position ↔ symbol table for bitmask-to-set fields.
#[derive(Debug, Clone, Default)]
pub struct BitmaskTable {
    by_position: HashMap<u16, &'static str>,
    by_symbol: HashMap<&'static str, u16>,
}

impl BitmaskTable {
    /// Build a table from `(bit position, symbol)` pairs.
    pub fn new(entries: &[(u16, &'static str)]) -> Self {
        let mut by_position = HashMap::with_capacity(entries.len());
        let mut by_symbol = HashMap::with_capacity(entries.len());
        for (position, symbol) in entries {
            by_position.insert(*position, *symbol);
            by_symbol.insert(*symbol, *position);
        }
        Self {
            by_position,
            by_symbol,
        }
    }

    /// Symbol for a set bit position, or the `BITMASK_<n>` placeholder.
    pub fn symbol(&self, position: u16) -> String {
        match self.by_position.get(&position) {
            Some(symbol) => (*symbol).to_string(),
            None => bitmask_placeholder(position),
        }
    }

    /// Bit position for a symbol. `BITMASK_<n>` placeholders resolve back to
    /// position `n`, so decoded sets re-encode losslessly.
    pub fn position(&self, symbol: &str) -> Option<u16> {
        if let Some(position) = self.by_symbol.get(symbol) {
            return Some(*position);
        }
        symbol.strip_prefix("BITMASK_")?.parse().ok()
    }
}

/// Length discipline of a variable-length blob field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobLength {
    /// An explicit length prefix of the given byte width precedes the data
    Prefixed {
        /// Width of the length prefix in bytes
        width: u8,
    },
    /// The blob consumes every remaining byte of its scope
    Remainder,
}

/// Width discipline of a bitmask-to-set field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmaskWidth {
    /// A fixed number of mask bytes
    Fixed(u8),
    /// An explicit length prefix of the given byte width precedes the mask
    Prefixed {
        /// Width of the length prefix in bytes
        width: u8,
    },
    /// The mask consumes every remaining byte of its scope
    Remainder,
}

/// The wire representation of one schema field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Fixed-width big-endian unsigned integer with an optional declared
    /// value domain checked at encode time
    Uint {
        /// Width in bytes (1, 2 or 4)
        width: u8,
        /// Inclusive value domain, if narrower than the width allows
        range: Option<(u64, u64)>,
    },
    /// One byte packing several named sub-fields
    Bits {
        /// Non-overlapping sub-fields of the byte
        parts: Vec<BitPart>,
    },
    /// Enumerated byte with a bidirectional symbol table
    Enum {
        /// Value ↔ symbol table
        table: EnumTable,
    },
    /// Variable-length byte blob
    Blob {
        /// Length discipline
        length: BlobLength,
    },
    /// Multi-byte bitmask mapped to a set of symbols
    Bitmask {
        /// Position ↔ symbol table
        table: BitmaskTable,
        /// Width discipline
        width: BitmaskWidth,
    },
}

/// A named field within a frame schema.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name as it appears in parameter sets and decoded frames
    pub name: &'static str,
    /// Wire representation
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// A fixed-width unsigned integer field.
    pub fn uint(name: &'static str, width: u8) -> Self {
        Self {
            name,
            kind: FieldKind::Uint { width, range: None },
        }
    }

    /// A single byte field.
    pub fn byte(name: &'static str) -> Self {
        Self::uint(name, 1)
    }

    /// A fixed-width unsigned integer with a declared inclusive domain.
    pub fn uint_range(name: &'static str, width: u8, min: u64, max: u64) -> Self {
        Self {
            name,
            kind: FieldKind::Uint {
                width,
                range: Some((min, max)),
            },
        }
    }

    /// A node-id field: one byte, valid values 1–232.
    pub fn node_id(name: &'static str) -> Self {
        Self::uint_range(name, 1, 1, 232)
    }

    /// A bit-packed byte.
    pub fn bits(name: &'static str, parts: Vec<BitPart>) -> Self {
        Self {
            name,
            kind: FieldKind::Bits { parts },
        }
    }

    /// An enumerated byte.
    pub fn enum_byte(name: &'static str, entries: &[(u8, &'static str)]) -> Self {
        Self {
            name,
            kind: FieldKind::Enum {
                table: EnumTable::new(entries),
            },
        }
    }

    /// A blob with an explicit length prefix.
    pub fn blob_prefixed(name: &'static str, width: u8) -> Self {
        Self {
            name,
            kind: FieldKind::Blob {
                length: BlobLength::Prefixed { width },
            },
        }
    }

    /// A blob consuming the remainder of its scope.
    pub fn blob_remainder(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Blob {
                length: BlobLength::Remainder,
            },
        }
    }

    /// A fixed-width bitmask-to-set field.
    pub fn bitmask_fixed(name: &'static str, width: u8, entries: &[(u16, &'static str)]) -> Self {
        Self {
            name,
            kind: FieldKind::Bitmask {
                table: BitmaskTable::new(entries),
                width: BitmaskWidth::Fixed(width),
            },
        }
    }

    /// A bitmask-to-set field with an explicit length prefix.
    pub fn bitmask_prefixed(name: &'static str, width: u8, entries: &[(u16, &'static str)]) -> Self {
        Self {
            name,
            kind: FieldKind::Bitmask {
                table: BitmaskTable::new(entries),
                width: BitmaskWidth::Prefixed { width },
            },
        }
    }

    /// A bitmask-to-set field consuming the remainder of its scope.
    pub fn bitmask_remainder(name: &'static str, entries: &[(u16, &'static str)]) -> Self {
        Self {
            name,
            kind: FieldKind::Bitmask {
                table: BitmaskTable::new(entries),
                width: BitmaskWidth::Remainder,
            },
        }
    }

    /// True when the field consumes every remaining byte of its scope.
    pub fn consumes_remainder(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Blob {
                length: BlobLength::Remainder
            } | FieldKind::Bitmask {
                width: BitmaskWidth::Remainder,
                ..
            }
        )
    }

    /// Minimum number of payload bytes the field occupies.
    pub fn min_width(&self) -> usize {
        match &self.kind {
            FieldKind::Uint { width, .. } => *width as usize,
            FieldKind::Bits { .. } | FieldKind::Enum { .. } => 1,
            FieldKind::Blob { length } => match length {
                BlobLength::Prefixed { width } => *width as usize,
                BlobLength::Remainder => 0,
            },
            FieldKind::Bitmask { width, .. } => match width {
                BitmaskWidth::Fixed(n) => *n as usize,
                BitmaskWidth::Prefixed { width } => *width as usize,
                BitmaskWidth::Remainder => 0,
            },
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        match &self.kind {
            FieldKind::Uint { width, .. } => {
                if !matches!(width, 1 | 2 | 4) {
                    return Err(SchemaError::BadWidth {
                        name: self.name,
                        width: *width,
                    });
                }
            }
            FieldKind::Bits { parts } => {
                let mut claimed: u8 = 0;
                for part in parts {
                    if part.mask == 0 {
                        return Err(SchemaError::EmptyMask(part.name));
                    }
                    if claimed & part.mask != 0 {
                        return Err(SchemaError::OverlappingBits(self.name));
                    }
                    claimed |= part.mask;
                }
            }
            FieldKind::Blob {
                length: BlobLength::Prefixed { width },
            }
            | FieldKind::Bitmask {
                width: BitmaskWidth::Prefixed { width },
                ..
            } => {
                if !matches!(width, 1 | 2 | 4) {
                    return Err(SchemaError::BadWidth {
                        name: self.name,
                        width: *width,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// A repeated sub-structure filling the remainder of a payload.
///
/// Each repetition decodes the group's fields in order; a repetition's length
/// is therefore either fixed (all fixed-width fields) or determined by a
/// length-prefixed blob inside the repetition. Repetitions repeat until the
/// payload is exhausted.
#[derive(Debug, Clone)]
pub struct VariantGroup {
    /// Name of the decoded repetition list
    pub name: &'static str,
    /// Fields of one repetition
    pub fields: Vec<FieldDescriptor>,
}

impl VariantGroup {
    /// Create a variant group from its per-repetition fields.
    pub fn new(name: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        Self { name, fields }
    }
}

/// Declarative description of one command's payload.
#[derive(Debug, Clone)]
pub struct FrameSchema {
    /// Command class key (byte 0 of every frame)
    pub class_key: u8,
    /// Command id (byte 1 of every frame)
    pub command_id: u8,
    /// Ordered payload fields
    pub fields: Vec<FieldDescriptor>,
    /// Optional trailing repeated group
    pub variant: Option<VariantGroup>,
}

impl FrameSchema {
    /// Create an empty schema for the given command.
    pub fn new(class_key: u8, command_id: u8) -> Self {
        Self {
            class_key,
            command_id,
            fields: Vec::new(),
            variant: None,
        }
    }

    /// Append a field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Attach the trailing variant group.
    pub fn variant(mut self, group: VariantGroup) -> Self {
        self.variant = Some(group);
        self
    }

    /// Minimum payload length implied by the fixed fields.
    pub fn min_len(&self) -> usize {
        self.fields.iter().map(FieldDescriptor::min_width).sum()
    }

    /// Check the schema's structural invariants.
    ///
    /// Called once at registry load; a violation is a fatal configuration
    /// error, not a runtime condition.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (index, field) in self.fields.iter().enumerate() {
            field.validate()?;
            if field.consumes_remainder() {
                if index != self.fields.len() - 1 {
                    return Err(SchemaError::RemainderNotLast(field.name));
                }
                if self.variant.is_some() {
                    return Err(SchemaError::RemainderWithVariant {
                        class_key: self.class_key,
                        command_id: self.command_id,
                    });
                }
            }
        }
        if let Some(group) = &self.variant {
            if group.fields.is_empty() {
                return Err(SchemaError::EmptyVariant {
                    class_key: self.class_key,
                    command_id: self.command_id,
                });
            }
            for field in &group.fields {
                field.validate()?;
                if field.consumes_remainder() {
                    return Err(SchemaError::RemainderInVariant(field.name));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_part_masks_before_shifting() {
        // The upper nibble of 0xA5 is 0xA; a shift-before-mask bug would
        // yield 0x05 (0xA5 >> 4 = 0x0A masked with 0xF0 = 0x00) or garbage.
        let part = BitPart::uint("upper", 0xF0);
        assert_eq!(part.unpack(0xA5), 0x0A);
        assert_eq!(part.pack(0x0A), 0xA0);

        let lower = BitPart::uint("lower", 0x0F);
        assert_eq!(lower.unpack(0xA5), 0x05);
        assert_eq!(lower.pack(0x05), 0x05);
    }

    #[test]
    fn enum_table_is_bidirectional() {
        let table = EnumTable::new(&[(0x00, "OFF"), (0xFF, "ON")]);
        assert_eq!(table.value("ON"), Some(0xFF));
        assert_eq!(table.symbol(0x00), Some("OFF"));
        assert_eq!(table.decode(0x42), "UNKNOWN_42");
        assert_eq!(table.value("UNKNOWN_42"), None);
    }

    #[test]
    fn bitmask_table_round_trips_placeholders() {
        let table = BitmaskTable::new(&[(0, "A"), (3, "B")]);
        assert_eq!(table.symbol(3), "B");
        assert_eq!(table.symbol(9), "BITMASK_9");
        assert_eq!(table.position("BITMASK_9"), Some(9));
        assert_eq!(table.position("A"), Some(0));
        assert_eq!(table.position("NOPE"), None);
    }

    #[test]
    fn overlapping_bit_masks_are_rejected() {
        let schema = FrameSchema::new(0x10, 0x01).field(FieldDescriptor::bits(
            "props",
            vec![BitPart::uint("low", 0x0F), BitPart::uint("mid", 0x3C)],
        ));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::OverlappingBits("props"))
        ));
    }

    #[test]
    fn remainder_must_be_last() {
        let schema = FrameSchema::new(0x10, 0x01)
            .field(FieldDescriptor::blob_remainder("data"))
            .field(FieldDescriptor::byte("tail"));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::RemainderNotLast("data"))
        ));
    }

    #[test]
    fn remainder_and_variant_group_are_exclusive() {
        let schema = FrameSchema::new(0x10, 0x01)
            .field(FieldDescriptor::blob_remainder("data"))
            .variant(VariantGroup::new("entries", vec![FieldDescriptor::byte("entry")]));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::RemainderWithVariant { .. })
        ));
    }

    #[test]
    fn variant_group_may_not_contain_remainder_fields() {
        let schema = FrameSchema::new(0x10, 0x01).variant(VariantGroup::new(
            "entries",
            vec![FieldDescriptor::blob_remainder("data")],
        ));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::RemainderInVariant("data"))
        ));
    }

    #[test]
    fn min_len_sums_fixed_widths() {
        let schema = FrameSchema::new(0x10, 0x01)
            .field(FieldDescriptor::byte("a"))
            .field(FieldDescriptor::uint("b", 2))
            .field(FieldDescriptor::blob_prefixed("c", 1))
            .field(FieldDescriptor::blob_remainder("d"));
        // 1 + 2 + length prefix, remainder contributes nothing.
        assert_eq!(schema.min_len(), 4);
    }
}
