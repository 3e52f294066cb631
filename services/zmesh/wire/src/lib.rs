//! Schema-driven framing for the mesh device-control protocol.
//!
//! Every application-layer message is a short byte sequence whose first two
//! bytes identify a command class and command, followed by a payload whose
//! layout is described declaratively by a [`FrameSchema`]. This crate holds
//! the layout vocabulary (fixed big-endian integers, bit-packed bytes,
//! enumerated bytes, variable-length blobs, bitmask-to-set fields and
//! repeated variant groups) and the generic engine that encodes parameter
//! sets into frames and decodes frames back into named values.
//!
//! ## Wire format
//!
//! ```text
//! +-----------+------------+---------------------------+
//! | class key | command id | schema-defined payload    |
//! |  (1 byte) |  (1 byte)  | (0..N bytes)              |
//! +-----------+------------+---------------------------+
//! ```
//!
//! Multi-byte integers are big-endian. Bit-packed fields sit at the
//! mask/shift given by their schema, least-significant bit first within the
//! containing byte.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod field;
pub mod frame;
pub mod schema;

pub use codec::{decode, encode};
pub use error::{DecodeError, EncodeError, SchemaError};
pub use field::Cursor;
pub use frame::{DecodedFrame, FieldMap, Frame, Value};
pub use schema::{
    bitmask_placeholder, unknown_symbol, BitKind, BitPart, BitmaskTable, BitmaskWidth,
    BlobLength, EnumTable, FieldDescriptor, FieldKind, FrameSchema, VariantGroup,
};
