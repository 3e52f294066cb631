//! Transactions: one outbound frame plus its lifecycle metadata.

use std::fmt;

use bitflags::bitflags;
use zmesh_wire::Frame;

use crate::error::DispatchError;

/// Default per-transaction retry budget.
pub const DEFAULT_RETRIES: u32 = 2;

/// An addressable endpoint in the mesh network.
///
/// Valid ids are 1–232 inclusive; 0 and anything from 233 up are rejected at
/// construction, so a `NodeId` in hand is always addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u8);

impl NodeId {
    /// Lowest valid destination id.
    pub const MIN: u8 = 1;
    /// Highest valid destination id.
    pub const MAX: u8 = 232;

    /// Validate and wrap a destination id.
    pub fn new(id: u8) -> Result<Self, DispatchError> {
        if !(Self::MIN..=Self::MAX).contains(&id) {
            return Err(DispatchError::InvalidDestination(id));
        }
        Ok(Self(id))
    }

    /// The raw id.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NodeId {
    type Error = DispatchError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Link-layer transmit options carried opaquely on a transaction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TransmitOptions: u8 {
        /// Request a link-layer acknowledgement
        const ACK = 0x01;
        /// Transmit at low power (inclusion-range security)
        const LOW_POWER = 0x02;
        /// Let the transport pick a route
        const AUTO_ROUTE = 0x04;
        /// Forbid routed delivery
        const NO_ROUTE = 0x10;
        /// Allow explorer-frame fallback routing
        const EXPLORE = 0x20;
    }
}

impl Default for TransmitOptions {
    fn default() -> Self {
        TransmitOptions::ACK | TransmitOptions::AUTO_ROUTE | TransmitOptions::EXPLORE
    }
}

/// Transmission priority. Higher priorities are served first; transactions
/// within one tier keep their enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Background polling
    Poll,
    /// Device configuration
    Config,
    /// State changes
    Set,
    /// State queries
    Get,
    /// Elevated
    High,
    /// Ahead of everything but real-time traffic
    Immediate,
    /// Real-time control
    RealTime,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Get
    }
}

/// Which inbound frame counts as the response to a request.
///
/// The destination match is implicit: responses are correlated within the
/// destination's own queue slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSpec {
    /// Expected command class key
    pub class_key: u8,
    /// Expected command id
    pub command_id: u8,
}

impl ResponseSpec {
    /// True when `frame` satisfies this expectation.
    pub fn matches(&self, frame: &Frame) -> bool {
        frame.class_key() == self.class_key && frame.command_id() == self.command_id
    }
}

/// Transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Built but not yet submitted
    Created,
    /// Waiting in the destination's queue
    Queued,
    /// Handed to the transport
    Sent,
    /// Sent and waiting for the matching response
    AwaitingResponse,
    /// Response received (or fire-and-forget sent)
    Completed,
    /// Retry budget exhausted or negatively acknowledged
    Failed,
    /// One attempt timed out; the transaction is re-queued
    TimedOut,
    /// Cancelled by the caller
    Cancelled,
}

impl TransactionState {
    /// True for the states a transaction never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionState::Completed | TransactionState::Failed | TransactionState::Cancelled
        )
    }
}

/// Observable status of a submitted transaction.
#[derive(Debug, Clone)]
pub struct TransactionStatus {
    /// Current lifecycle state
    pub state: TransactionState,
    /// The matching response frame, once completed
    pub response: Option<Frame>,
    /// Send attempts made so far
    pub attempts: u32,
}

impl TransactionStatus {
    pub(crate) fn queued() -> Self {
        Self {
            state: TransactionState::Queued,
            response: None,
            attempts: 0,
        }
    }
}

/// One outbound frame plus its dispatch metadata.
///
/// Ownership passes to the dispatcher at submission and returns to the
/// caller as a [`TransactionStatus`] when a terminal state is reached.
#[derive(Debug, Clone)]
pub struct Transaction {
    destination: NodeId,
    frame: Frame,
    priority: Priority,
    response: Option<ResponseSpec>,
    retries: u32,
    transmit_options: TransmitOptions,
}

impl Transaction {
    /// Build a transaction toward `destination`, validating the id range.
    pub fn new(destination: u8, frame: Frame) -> Result<Self, DispatchError> {
        Ok(Self {
            destination: NodeId::new(destination)?,
            frame,
            priority: Priority::default(),
            response: None,
            retries: DEFAULT_RETRIES,
            transmit_options: TransmitOptions::default(),
        })
    }

    /// Override the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Declare the response this transaction waits for. Without one the
    /// transaction is fire-and-forget and completes as soon as it is sent.
    pub fn expect_response(mut self, response: ResponseSpec) -> Self {
        self.response = Some(response);
        self
    }

    /// Override the retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Override the link-layer transmit options.
    pub fn with_transmit_options(mut self, options: TransmitOptions) -> Self {
        self.transmit_options = options;
        self
    }

    /// Target destination.
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// The frame to send.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Transmission priority.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Expected response, if any.
    pub fn response(&self) -> Option<ResponseSpec> {
        self.response
    }

    /// Remaining retry budget at submission.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Link-layer transmit options.
    pub fn transmit_options(&self) -> TransmitOptions {
        self.transmit_options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame() -> Frame {
        Frame::new(Bytes::from_static(&[0x26, 0x02])).unwrap()
    }

    #[test]
    fn destination_bounds_are_enforced() {
        assert_eq!(
            Transaction::new(0, frame()).unwrap_err(),
            DispatchError::InvalidDestination(0)
        );
        assert_eq!(
            Transaction::new(233, frame()).unwrap_err(),
            DispatchError::InvalidDestination(233)
        );
        assert!(Transaction::new(1, frame()).is_ok());
        assert!(Transaction::new(232, frame()).is_ok());
    }

    #[test]
    fn priorities_order_ascending() {
        assert!(Priority::RealTime > Priority::Immediate);
        assert!(Priority::Immediate > Priority::High);
        assert!(Priority::High > Priority::Get);
        assert!(Priority::Get > Priority::Set);
        assert!(Priority::Set > Priority::Config);
        assert!(Priority::Config > Priority::Poll);
    }

    #[test]
    fn response_spec_matches_on_both_header_bytes() {
        let spec = ResponseSpec {
            class_key: 0x26,
            command_id: 0x03,
        };
        let report = Frame::new(Bytes::from_static(&[0x26, 0x03, 0x63])).unwrap();
        let other = Frame::new(Bytes::from_static(&[0x26, 0x01, 0x63])).unwrap();
        assert!(spec.matches(&report));
        assert!(!spec.matches(&other));
    }

    #[test]
    fn default_transmit_options() {
        let options = TransmitOptions::default();
        assert!(options.contains(TransmitOptions::ACK));
        assert!(options.contains(TransmitOptions::AUTO_ROUTE));
        assert!(options.contains(TransmitOptions::EXPLORE));
        assert!(!options.contains(TransmitOptions::NO_ROUTE));
    }
}
