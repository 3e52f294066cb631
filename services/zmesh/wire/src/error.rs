//! Wire codec error types.

use thiserror::Error;

/// Schema definition errors, surfaced at registry load time.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Two bit parts of the same byte claim overlapping mask bits
    #[error("overlapping bit masks in field '{0}'")]
    OverlappingBits(&'static str),

    /// A bit part was declared with an all-zero mask
    #[error("empty bit mask for part '{0}'")]
    EmptyMask(&'static str),

    /// Unsupported fixed integer width (only 1, 2 and 4 are valid)
    #[error("unsupported width {width} for field '{name}'")]
    BadWidth {
        /// Field name
        name: &'static str,
        /// Declared width in bytes
        width: u8,
    },

    /// A remainder-consuming field is not the last field of its scope
    #[error("remainder field '{0}' must be the last field")]
    RemainderNotLast(&'static str),

    /// A schema declares both a remainder field and a variant group
    #[error("schema {class_key:#04x}/{command_id:#04x} has both a remainder field and a variant group")]
    RemainderWithVariant {
        /// Command class key
        class_key: u8,
        /// Command id
        command_id: u8,
    },

    /// A variant group contains a remainder-consuming field, so a
    /// repetition's length would be undefined
    #[error("variant group field '{0}' may not consume the remainder")]
    RemainderInVariant(&'static str),

    /// A variant group with no fields would never advance the cursor
    #[error("variant group of schema {class_key:#04x}/{command_id:#04x} has no fields")]
    EmptyVariant {
        /// Command class key
        class_key: u8,
        /// Command id
        command_id: u8,
    },
}

/// Errors raised while encoding a parameter set into a frame.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// No parameter was supplied for a schema field
    #[error("missing parameter '{0}'")]
    MissingField(&'static str),

    /// The supplied parameter has the wrong value kind
    #[error("parameter '{field}' expects a {expected} value")]
    WrongType {
        /// Field name
        field: &'static str,
        /// Expected value kind
        expected: &'static str,
    },

    /// A symbol has no entry in the field's value table
    #[error("unknown symbol '{symbol}' for field '{field}'")]
    UnknownSymbol {
        /// Field name
        field: &'static str,
        /// Rejected symbol
        symbol: String,
    },

    /// A numeric value does not fit the field's width or declared range
    #[error("value {value} out of range for field '{field}'")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Rejected value
        value: u64,
    },

    /// A blob is longer than its length prefix can express
    #[error("blob of {len} bytes exceeds the {width}-byte length prefix of field '{field}'")]
    BlobTooLong {
        /// Field name
        field: &'static str,
        /// Supplied blob length
        len: usize,
        /// Length prefix width in bytes
        width: u8,
    },

    /// The command name is not present in the registry
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

/// Errors raised while decoding a received frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The byte sequence is shorter than the two-byte command header
    #[error("frame shorter than the two-byte command header")]
    MissingHeader,

    /// The payload ends before the schema's fixed fields do
    #[error("payload truncated at offset {offset}: {needed} more bytes required")]
    Truncated {
        /// Cursor position where the read was attempted
        offset: usize,
        /// Number of missing bytes
        needed: usize,
    },

    /// No schema is registered for the frame's class-key/command-id pair
    #[error("no schema registered for class {class_key:#04x} command {command_id:#04x}")]
    Unrecognized {
        /// Command class key
        class_key: u8,
        /// Command id
        command_id: u8,
    },
}
