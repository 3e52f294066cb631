//! Per-destination transaction dispatcher.
//!
//! Submissions land in a per-destination priority queue; the dispatcher
//! serializes actual transmission so that at most one transaction per
//! destination is ever outstanding, reflecting the half-duplex link. Replies
//! are correlated against the in-flight slot, and an interval-driven sweeper
//! re-queues timed-out transactions until their retry budget runs out.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, warn};
use zmesh_wire::Frame;

use crate::error::DispatchError;
use crate::transaction::{
    NodeId, Transaction, TransactionState, TransactionStatus, TransmitOptions,
};

/// Dispatcher tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long one attempt waits for its response before retrying
    pub response_timeout: Duration,
    /// Overall budget for a blocking [`Dispatcher::send_transaction`]
    pub send_timeout: Duration,
    /// Tick of the timeout sweeper
    pub sweep_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_millis(250),
        }
    }
}

/// A frame handed to the link layer for transmission.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Target destination
    pub destination: NodeId,
    /// The frame bytes
    pub frame: Frame,
    /// Link-layer transmit options
    pub transmit_options: TransmitOptions,
    /// Dispatcher-assigned transaction id, for transport-level tracing
    pub transaction_id: u64,
}

/// Caller-side handle to a submitted transaction.
#[derive(Debug)]
pub struct TransactionHandle {
    id: u64,
    destination: NodeId,
    status: watch::Receiver<TransactionStatus>,
}

impl TransactionHandle {
    /// Dispatcher-assigned transaction id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The transaction's destination.
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Current status snapshot.
    pub fn status(&self) -> TransactionStatus {
        self.status.borrow().clone()
    }

    /// Wait for a terminal state. This awaits the transaction's completion
    /// signal; there is no polling loop. If the dispatcher goes away before
    /// resolution the transaction reports `Cancelled`.
    pub async fn wait(&mut self) -> TransactionStatus {
        loop {
            let current = self.status.borrow().clone();
            if current.state.is_terminal() {
                return current;
            }
            if self.status.changed().await.is_err() {
                let last = self.status.borrow().clone();
                if last.state.is_terminal() {
                    return last;
                }
                return TransactionStatus {
                    state: TransactionState::Cancelled,
                    ..last
                };
            }
        }
    }
}

struct TxEntry {
    id: u64,
    /// Monotonic enqueue stamp; preserved across re-queues so a retried
    /// transaction keeps its place within its priority tier.
    seq: u64,
    tx: Transaction,
    retries_left: u32,
    attempts: u32,
    status_tx: watch::Sender<TransactionStatus>,
}

impl TxEntry {
    fn publish(&self, state: TransactionState, response: Option<Frame>) {
        self.status_tx.send_replace(TransactionStatus {
            state,
            response,
            attempts: self.attempts,
        });
    }
}

struct QueuedEntry {
    entry: TxEntry,
}

impl QueuedEntry {
    fn key(&self) -> (crate::transaction::Priority, Reverse<u64>) {
        (self.entry.tx.priority(), Reverse(self.entry.seq))
    }
}

impl PartialEq for QueuedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedEntry {}

impl PartialOrd for QueuedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key().cmp(&other.key())
    }
}

struct InFlight {
    entry: TxEntry,
    deadline: Instant,
    /// Set when the caller cancelled after transmission; the resolution is
    /// discarded instead of delivered.
    discard: bool,
}

#[derive(Default)]
struct DestQueue {
    heap: BinaryHeap<QueuedEntry>,
    in_flight: Option<InFlight>,
    /// Ids cancelled while still queued; dropped lazily when popped.
    cancelled: HashSet<u64>,
}

struct Inner {
    config: DispatcherConfig,
    queues: DashMap<NodeId, DestQueue>,
    outbound_tx: mpsc::UnboundedSender<OutboundFrame>,
    next_id: AtomicU64,
    next_seq: AtomicU64,
}

impl Inner {
    /// Fill the destination's slot from its queue. Runs after every event
    /// that can free the slot.
    fn pump(&self, queue: &mut DestQueue, destination: NodeId) {
        while queue.in_flight.is_none() {
            let Some(QueuedEntry { mut entry }) = queue.heap.pop() else {
                break;
            };
            if queue.cancelled.remove(&entry.id) {
                // Already resolved by cancel(); drop silently.
                continue;
            }
            entry.attempts += 1;
            entry.publish(TransactionState::Sent, None);
            let outbound = OutboundFrame {
                destination,
                frame: entry.tx.frame().clone(),
                transmit_options: entry.tx.transmit_options(),
                transaction_id: entry.id,
            };
            if self.outbound_tx.send(outbound).is_err() {
                warn!(
                    %destination,
                    id = entry.id,
                    "transport channel closed, failing transaction"
                );
                entry.publish(TransactionState::Failed, None);
                continue;
            }
            if entry.tx.response().is_some() {
                entry.publish(TransactionState::AwaitingResponse, None);
                let deadline = Instant::now() + self.config.response_timeout;
                queue.in_flight = Some(InFlight {
                    entry,
                    deadline,
                    discard: false,
                });
            } else {
                debug!(%destination, id = entry.id, "fire-and-forget transaction sent");
                entry.publish(TransactionState::Completed, None);
            }
        }
    }

    /// Resolve expired in-flight slots: re-queue while retries remain,
    /// otherwise fail.
    fn sweep(&self) {
        let now = Instant::now();
        for mut item in self.queues.iter_mut() {
            let destination = *item.key();
            let queue = item.value_mut();
            let expired = matches!(&queue.in_flight, Some(f) if f.deadline <= now);
            if !expired {
                continue;
            }
            let Some(InFlight {
                mut entry, discard, ..
            }) = queue.in_flight.take()
            else {
                continue;
            };
            if discard {
                entry.publish(TransactionState::Cancelled, None);
            } else if entry.retries_left > 0 {
                entry.retries_left -= 1;
                debug!(
                    %destination,
                    id = entry.id,
                    attempts = entry.attempts,
                    retries_left = entry.retries_left,
                    "response timeout, re-queueing"
                );
                entry.publish(TransactionState::TimedOut, None);
                entry.publish(TransactionState::Queued, None);
                queue.heap.push(QueuedEntry { entry });
            } else {
                warn!(
                    %destination,
                    id = entry.id,
                    attempts = entry.attempts,
                    "retry budget exhausted, failing transaction"
                );
                entry.publish(TransactionState::Failed, None);
            }
            self.pump(queue, destination);
        }
    }
}

/// The per-destination transaction dispatcher.
///
/// Created together with the outbound frame channel the (external) link
/// layer consumes. Must be constructed inside a tokio runtime; the timeout
/// sweeper runs as a background task for the dispatcher's lifetime.
pub struct Dispatcher {
    inner: Arc<Inner>,
    sweeper: tokio::task::JoinHandle<()>,
}

impl Dispatcher {
    /// Create a dispatcher and the channel of frames to transmit.
    pub fn new(config: DispatcherConfig) -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let sweep_interval = config.sweep_interval;
        let inner = Arc::new(Inner {
            config,
            queues: DashMap::new(),
            outbound_tx,
            next_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(0),
        });
        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(inner) => inner.sweep(),
                    None => break,
                }
            }
        });
        (Self { inner, sweeper }, outbound_rx)
    }

    /// Non-blocking submission. The transaction enters its destination's
    /// queue and is transmitted as soon as the single in-flight slot frees
    /// up and it wins the priority pick.
    pub fn enqueue(&self, transaction: Transaction) -> TransactionHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let destination = transaction.destination();
        let retries_left = transaction.retries();
        let (status_tx, status_rx) = watch::channel(TransactionStatus::queued());
        let entry = TxEntry {
            id,
            seq,
            tx: transaction,
            retries_left,
            attempts: 0,
            status_tx,
        };
        let mut queue = self.inner.queues.entry(destination).or_default();
        queue.heap.push(QueuedEntry { entry });
        self.inner.pump(&mut queue, destination);
        TransactionHandle {
            id,
            destination,
            status: status_rx,
        }
    }

    /// Blocking submission: waits on the transaction's completion signal
    /// until a terminal state or the overall send timeout.
    pub async fn send_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<TransactionStatus, DispatchError> {
        let mut handle = self.enqueue(transaction);
        let outcome =
            match tokio::time::timeout(self.inner.config.send_timeout, handle.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    self.cancel(&handle);
                    return Err(DispatchError::Timeout);
                }
            };
        match outcome.state {
            TransactionState::Completed => Ok(outcome),
            TransactionState::Failed => Err(DispatchError::Failed {
                attempts: outcome.attempts,
            }),
            TransactionState::Cancelled => Err(DispatchError::Cancelled),
            _ => Err(DispatchError::Timeout),
        }
    }

    /// Correlate an inbound frame from `source` against that destination's
    /// in-flight transaction. Returns the frame back when it is not the
    /// awaited response, so the caller can deliver it as an unsolicited
    /// report.
    pub fn handle_frame(&self, source: NodeId, frame: Frame) -> Option<Frame> {
        let Some(mut queue) = self.inner.queues.get_mut(&source) else {
            return Some(frame);
        };
        let is_match = matches!(
            &queue.in_flight,
            Some(f) if f.entry.tx.response().is_some_and(|spec| spec.matches(&frame))
        );
        if !is_match {
            return Some(frame);
        }
        if let Some(InFlight { entry, discard, .. }) = queue.in_flight.take() {
            if discard {
                debug!(%source, id = entry.id, "discarding response for cancelled transaction");
                entry.publish(TransactionState::Cancelled, None);
            } else {
                entry.publish(TransactionState::Completed, Some(frame));
            }
        }
        self.inner.pump(&mut queue, source);
        None
    }

    /// Fail the destination's in-flight transaction immediately. Called by
    /// the link layer (or a higher layer) when it observes an explicit
    /// negative acknowledgement.
    pub fn fail_in_flight(&self, destination: NodeId) -> bool {
        let Some(mut queue) = self.inner.queues.get_mut(&destination) else {
            return false;
        };
        let Some(InFlight { entry, discard, .. }) = queue.in_flight.take() else {
            return false;
        };
        if discard {
            entry.publish(TransactionState::Cancelled, None);
        } else {
            warn!(%destination, id = entry.id, "negative acknowledgement, failing transaction");
            entry.publish(TransactionState::Failed, None);
        }
        self.inner.pump(&mut queue, destination);
        true
    }

    /// Cancel a submitted transaction. A queued transaction resolves
    /// `Cancelled` immediately; one already handed to the transport cannot
    /// be recalled and is discarded at its eventual resolution or timeout.
    pub fn cancel(&self, handle: &TransactionHandle) -> bool {
        let Some(mut queue) = self.inner.queues.get_mut(&handle.destination) else {
            return false;
        };
        if let Some(in_flight) = queue.in_flight.as_mut() {
            if in_flight.entry.id == handle.id {
                in_flight.discard = true;
                return true;
            }
        }
        if let Some(queued) = queue.heap.iter().find(|q| q.entry.id == handle.id) {
            queued.entry.publish(TransactionState::Cancelled, None);
            queue.cancelled.insert(handle.id);
            return true;
        }
        false
    }

    /// Number of unfinished transactions toward a destination (queued plus
    /// in-flight).
    pub fn queue_length(&self, destination: NodeId) -> usize {
        self.inner.queues.get(&destination).map_or(0, |queue| {
            queue.heap.len() - queue.cancelled.len() + usize::from(queue.in_flight.is_some())
        })
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Priority, ResponseSpec};
    use bytes::Bytes;

    fn get_frame() -> Frame {
        Frame::new(Bytes::from_static(&[0x26, 0x02])).unwrap()
    }

    fn report_frame() -> Frame {
        Frame::new(Bytes::from_static(&[0x26, 0x03, 0x63])).unwrap()
    }

    fn get_tx(destination: u8) -> Transaction {
        Transaction::new(destination, get_frame())
            .unwrap()
            .expect_response(ResponseSpec {
                class_key: 0x26,
                command_id: 0x03,
            })
    }

    fn node(id: u8) -> NodeId {
        NodeId::new(id).unwrap()
    }

    fn test_config() -> DispatcherConfig {
        DispatcherConfig {
            response_timeout: Duration::from_millis(100),
            send_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_millis(25),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_transaction_in_flight_per_destination() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        let handles: Vec<_> = (0..3).map(|_| dispatcher.enqueue(get_tx(5))).collect();
        assert_eq!(dispatcher.queue_length(node(5)), 3);

        // Exactly one frame reaches the transport until its reply arrives.
        let first = outbound.recv().await.unwrap();
        assert_eq!(first.transaction_id, handles[0].id());
        assert!(outbound.try_recv().is_err());

        assert!(dispatcher.handle_frame(node(5), report_frame()).is_none());
        let second = outbound.recv().await.unwrap();
        assert_eq!(second.transaction_id, handles[1].id());
        assert!(outbound.try_recv().is_err());
        assert_eq!(dispatcher.queue_length(node(5)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn destinations_do_not_block_each_other() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        dispatcher.enqueue(get_tx(5));
        dispatcher.enqueue(get_tx(6));

        let first = outbound.recv().await.unwrap();
        let second = outbound.recv().await.unwrap();
        assert_ne!(first.destination, second.destination);
    }

    #[tokio::test(start_paused = true)]
    async fn priority_order_with_fifo_ties() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        // Occupy the slot first so later submissions stay queued.
        dispatcher.enqueue(get_tx(9));
        let _ = outbound.recv().await.unwrap();

        let set_a = dispatcher.enqueue(get_tx(9).with_priority(Priority::Set));
        let high = dispatcher.enqueue(get_tx(9).with_priority(Priority::High));
        let set_b = dispatcher.enqueue(get_tx(9).with_priority(Priority::Set));

        let mut order = Vec::new();
        for _ in 0..3 {
            dispatcher.handle_frame(node(9), report_frame());
            order.push(outbound.recv().await.unwrap().transaction_id);
        }
        assert_eq!(order, vec![high.id(), set_a.id(), set_b.id()]);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_and_forget_completes_on_send() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        let transaction = Transaction::new(3, get_frame()).unwrap();
        let mut handle = dispatcher.enqueue(transaction);

        let status = handle.wait().await;
        assert_eq!(status.state, TransactionState::Completed);
        assert_eq!(status.attempts, 1);
        assert!(status.response.is_none());
        assert!(outbound.recv().await.is_some());
        assert_eq!(dispatcher.queue_length(node(3)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_two_fails_on_third_timeout() {
        let (dispatcher, mut outbound) = Dispatcher::new(test_config());
        let mut handle = dispatcher.enqueue(get_tx(4).with_retries(2));

        let status = handle.wait().await;
        assert_eq!(status.state, TransactionState::Failed);
        assert_eq!(status.attempts, 3);

        // Every attempt reached the transport; nothing was retried beyond
        // the budget.
        for _ in 0..3 {
            assert_eq!(outbound.recv().await.unwrap().transaction_id, handle.id());
        }
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempt_is_requeued_then_completed() {
        let (dispatcher, mut outbound) = Dispatcher::new(test_config());
        let mut handle = dispatcher.enqueue(get_tx(4));

        let first = outbound.recv().await.unwrap();
        // No reply: the sweeper re-queues and resends.
        let second = outbound.recv().await.unwrap();
        assert_eq!(first.transaction_id, second.transaction_id);

        assert!(dispatcher.handle_frame(node(4), report_frame()).is_none());
        let status = handle.wait().await;
        assert_eq!(status.state, TransactionState::Completed);
        assert_eq!(status.attempts, 2);
        assert!(status.response.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_queued_transaction() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        dispatcher.enqueue(get_tx(8));
        let _ = outbound.recv().await.unwrap();

        let mut queued = dispatcher.enqueue(get_tx(8));
        assert!(dispatcher.cancel(&queued));
        assert_eq!(queued.wait().await.state, TransactionState::Cancelled);
        assert_eq!(dispatcher.queue_length(node(8)), 1);

        // The cancelled transaction never reaches the transport.
        dispatcher.handle_frame(node(8), report_frame());
        assert!(outbound.try_recv().is_err());
        assert_eq!(dispatcher.queue_length(node(8)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_in_flight_discards_the_response() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        let mut handle = dispatcher.enqueue(get_tx(8));
        let _ = outbound.recv().await.unwrap();

        assert!(dispatcher.cancel(&handle));
        // The response still correlates (it is consumed), but the caller
        // sees a cancellation.
        assert!(dispatcher.handle_frame(node(8), report_frame()).is_none());
        assert_eq!(handle.wait().await.state, TransactionState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn negative_acknowledgement_fails_in_flight() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        let mut handle = dispatcher.enqueue(get_tx(2));
        let _ = outbound.recv().await.unwrap();

        assert!(dispatcher.fail_in_flight(node(2)));
        let status = handle.wait().await;
        assert_eq!(status.state, TransactionState::Failed);
        assert_eq!(status.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unsolicited_frames_are_returned() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        // No queue for this destination at all.
        assert!(dispatcher.handle_frame(node(30), report_frame()).is_some());

        // A non-matching frame is not swallowed either.
        dispatcher.enqueue(get_tx(5));
        let _ = outbound.recv().await.unwrap();
        let other = Frame::new(Bytes::from_static(&[0x62, 0x03, 0x00])).unwrap();
        assert!(dispatcher.handle_frame(node(5), other).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn send_transaction_blocks_until_the_response() {
        let (dispatcher, mut outbound) = Dispatcher::new(test_config());
        let dispatcher = Arc::new(dispatcher);

        let responder = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            while let Some(out) = outbound.recv().await {
                responder.handle_frame(out.destination, report_frame());
            }
        });

        let status = dispatcher.send_transaction(get_tx(7)).await.unwrap();
        assert_eq!(status.state, TransactionState::Completed);
        assert_eq!(
            status.response.unwrap().as_bytes(),
            report_frame().as_bytes()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_transaction_reports_failure_and_overall_timeout() {
        let (dispatcher, _outbound) = Dispatcher::new(test_config());

        // Budget exhaustion surfaces as Failed.
        let err = dispatcher.send_transaction(get_tx(7)).await.unwrap_err();
        assert_eq!(err, DispatchError::Failed { attempts: 3 });

        // An unbounded retry budget runs into the overall send timeout.
        let err = dispatcher
            .send_transaction(get_tx(7).with_retries(u32::MAX))
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submissions_keep_the_invariant() {
        let (dispatcher, mut outbound) = Dispatcher::new(DispatcherConfig::default());
        let dispatcher = Arc::new(dispatcher);

        let submitters: Vec<_> = (0..8)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.enqueue(get_tx(11)) })
            })
            .collect();
        for submitter in submitters {
            submitter.await.unwrap();
        }

        // Drain: at every instant exactly one frame is outstanding.
        for _ in 0..8 {
            let _ = outbound.recv().await.unwrap();
            assert!(outbound.try_recv().is_err());
            assert!(dispatcher.handle_frame(node(11), report_frame()).is_none());
        }
        assert_eq!(dispatcher.queue_length(node(11)), 0);
    }
}
