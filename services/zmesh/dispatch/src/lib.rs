//! Transaction dispatch for the mesh device-control protocol.
//!
//! Callers submit [`Transaction`]s; the [`Dispatcher`] owns them from
//! submission to a terminal state, serializing transmission per destination
//! (at most one transaction outstanding toward any node), correlating
//! asynchronous replies, and retrying timed-out attempts until the retry
//! budget runs out. The [`SequenceCounter`] hands out the wrapping 1–255
//! sequence numbers the network-management commands carry.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatcher;
pub mod error;
pub mod sequence;
pub mod transaction;

pub use dispatcher::{Dispatcher, DispatcherConfig, OutboundFrame, TransactionHandle};
pub use error::DispatchError;
pub use sequence::SequenceCounter;
pub use transaction::{
    NodeId, Priority, ResponseSpec, Transaction, TransactionState, TransactionStatus,
    TransmitOptions, DEFAULT_RETRIES,
};
