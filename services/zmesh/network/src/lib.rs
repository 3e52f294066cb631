//! The network facade: the thin API callers use to talk to the mesh.
//!
//! A [`Network`] owns the session state the lower layers need — the shared
//! command registry, the per-destination dispatcher, the wrapping sequence
//! counter and the per-destination capability map — and exposes the boundary
//! surface: encode, decode, enqueue, blocking send, queue introspection and
//! sequence numbers. It is created per network session; nothing here is
//! process-global.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;
use zmesh_dispatch::{
    DispatchError, Dispatcher, DispatcherConfig, NodeId, OutboundFrame, ResponseSpec,
    SequenceCounter, Transaction, TransactionHandle, TransactionStatus,
};
use zmesh_registry::Registry;
use zmesh_wire::{DecodeError, DecodedFrame, EncodeError, FieldMap, Frame};

/// Facade-level errors: anything the boundary API can reject.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Encoding the command failed
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Decoding a frame failed
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Dispatching failed
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Session configuration.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    /// Dispatcher tuning
    pub dispatcher: DispatcherConfig,
}

/// One mesh network session.
pub struct Network {
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    sequence: SequenceCounter,
    /// Negotiated protocol version per (destination, command class)
    capabilities: DashMap<(u8, u8), u8>,
}

impl Network {
    /// Create a session over the built-in command catalogue. Returns the
    /// session and the channel of frames the link layer must transmit.
    pub fn new(config: NetworkConfig) -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        Self::with_registry(Registry::builtin(), config)
    }

    /// Create a session over a caller-supplied registry.
    pub fn with_registry(
        registry: Arc<Registry>,
        config: NetworkConfig,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (dispatcher, outbound_rx) = Dispatcher::new(config.dispatcher);
        info!(commands = registry.len(), "network session started");
        (
            Self {
                registry,
                dispatcher,
                sequence: SequenceCounter::new(),
                capabilities: DashMap::new(),
            },
            outbound_rx,
        )
    }

    /// The session's command registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the negotiated version for one command class of a destination.
    pub fn set_capability(&self, destination: NodeId, class_key: u8, version: u8) {
        self.capabilities
            .insert((destination.get(), class_key), version);
    }

    fn capability(&self, destination: NodeId, class_key: u8) -> u8 {
        self.capabilities
            .get(&(destination.get(), class_key))
            .map_or(u8::MAX, |v| *v)
    }

    /// Encode a named command at the latest registered version.
    pub fn encode(&self, command: &str, params: &FieldMap) -> Result<Frame, EncodeError> {
        self.registry.encode(command, params)
    }

    /// Encode a named command at the destination's negotiated capability.
    pub fn encode_for(
        &self,
        destination: NodeId,
        command: &str,
        params: &FieldMap,
    ) -> Result<Frame, EncodeError> {
        let def = self
            .registry
            .get(command)
            .ok_or_else(|| EncodeError::UnknownCommand(command.to_string()))?;
        let cap = self.capability(destination, def.class_key());
        self.registry.encode_capped(command, cap, params)
    }

    /// Strict decode against the latest registered schemas.
    pub fn decode(&self, frame: &Frame) -> Result<DecodedFrame, DecodeError> {
        self.registry.decode(frame)
    }

    /// Decode a frame received from `source`, honoring its negotiated
    /// capability and degrading unknown commands to a raw rendition.
    pub fn decode_from(&self, source: NodeId, frame: &Frame) -> DecodedFrame {
        let cap = self.capability(source, frame.class_key());
        self.registry.decode_or_raw(frame, cap)
    }

    /// Build a transaction for a named request command: the frame is encoded
    /// at the destination's capability and the expected response comes from
    /// the command's report pairing. Fire-and-forget commands produce a
    /// transaction with no expected response.
    pub fn request(
        &self,
        destination: u8,
        command: &str,
        params: &FieldMap,
    ) -> Result<Transaction, NetworkError> {
        let destination = NodeId::new(destination)?;
        let def = self
            .registry
            .get(command)
            .ok_or_else(|| EncodeError::UnknownCommand(command.to_string()))?;
        let cap = self.capability(destination, def.class_key());
        let def = self
            .registry
            .get_capped(command, cap)
            .ok_or_else(|| EncodeError::UnknownCommand(command.to_string()))?;
        let frame = zmesh_wire::codec::encode(&def.schema, params)?;
        let mut transaction = Transaction::new(destination.get(), frame)?;
        if let Some(report_id) = def.expected_report {
            transaction = transaction.expect_response(ResponseSpec {
                class_key: def.class_key(),
                command_id: report_id,
            });
        }
        Ok(transaction)
    }

    /// Fire-and-forget submission.
    pub fn enqueue(&self, transaction: Transaction) -> TransactionHandle {
        self.dispatcher.enqueue(transaction)
    }

    /// Blocking submission: resolves with the terminal status or a timeout.
    pub async fn send_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<TransactionStatus, DispatchError> {
        self.dispatcher.send_transaction(transaction).await
    }

    /// Cancel a submitted transaction.
    pub fn cancel(&self, handle: &TransactionHandle) -> bool {
        self.dispatcher.cancel(handle)
    }

    /// Feed a frame received from `source` into response correlation.
    /// Returns the frame when it is unsolicited.
    pub fn handle_frame(&self, source: NodeId, frame: Frame) -> Option<Frame> {
        self.dispatcher.handle_frame(source, frame)
    }

    /// Fail the destination's in-flight transaction on an explicit negative
    /// acknowledgement.
    pub fn fail_in_flight(&self, destination: NodeId) -> bool {
        self.dispatcher.fail_in_flight(destination)
    }

    /// Unfinished transactions toward a destination.
    pub fn queue_length(&self, destination: NodeId) -> usize {
        self.dispatcher.queue_length(destination)
    }

    /// Next network-management sequence number (1–255, wrapping, never 0).
    pub fn next_sequence(&self) -> u8 {
        self.sequence.next()
    }
}
