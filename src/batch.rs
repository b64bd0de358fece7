//! The adaptive batch engine.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::BatchConfiguration;
use crate::processor::{Chunk, ChunkProcessor, ErrorDecision};
use crate::signal::{AsyncSignal, SignalWaiter};
use crate::token::AggregatorToken;
use crate::{Error, Result};

/// Outcome of one round, shared by every caller awaiting it.
type RoundOutcome = std::result::Result<(), Arc<Error>>;
type OutcomeSlot = Arc<OnceCell<RoundOutcome>>;

/// Observable state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Admitting items for the current round.
    Open,
    /// A round is being closed; items are briefly gated.
    Executing,
}

struct BatchState<T> {
    items: Vec<T>,
    aggregators: HashSet<Uuid>,
    status: BatchStatus,
    /// Outcome slot of the round currently collecting. Replaced with a
    /// fresh slot at every round close; waiters hold a clone of the slot
    /// their contribution belongs to.
    outcome: OutcomeSlot,
}

/// What a completion call does after the quiescence delay.
enum ClosePlan<T> {
    /// This caller closes the round and runs the processor.
    Execute { chunk: Chunk<T>, slot: OutcomeSlot },
    /// Someone else will close the round; await its outcome.
    Await { waiter: SignalWaiter, slot: OutcomeSlot },
}

/// Time- and size-bounded collection round shared by concurrent producers.
///
/// Producers acquire an [`AggregatorToken`], [`add`](Batch::add) items, and
/// signal completion with [`complete_submission`](Batch::complete_submission)
/// (or [`add_last`](Batch::add_last)). The engine closes the round once a
/// continuous idle window elapses with no activity and every token has
/// completed, or immediately when the buffer reaches the configured chunk
/// size. The buffered items are then split into chunks and handed to the
/// configured [`ChunkProcessor`]; failures are routed through its error
/// policy.
///
/// Round *N*'s processing may still be in flight while round *N+1* is
/// already accepting items: the gate reopens before the processor is
/// awaited, and the two buffers never overlap.
pub struct Batch<T> {
    id: String,
    idle_window: Duration,
    chunk_size: usize,
    processor: Arc<dyn ChunkProcessor<T>>,
    state: Mutex<BatchState<T>>,
    /// Quiescence marker: bumped on every add/registration, compared by
    /// value during the debounce delay.
    last_operation: AtomicU64,
    /// Gates mutation during the brief round-close transition.
    allow_items: AsyncSignal,
    /// Pulsed (set then reset) after each round's processing settles.
    round_complete: AsyncSignal,
    cancel: CancellationToken,
}

impl<T: Send + 'static> Batch<T> {
    /// Create a batch from its configuration.
    pub fn new(configuration: BatchConfiguration<T>) -> Result<Self> {
        let (id, idle_window, chunk_size, processor) = configuration.into_parts();
        if id.is_empty() {
            return Err(Error::configuration("batch identifier must not be empty"));
        }
        Ok(Self {
            id,
            idle_window,
            chunk_size,
            processor,
            state: Mutex::new(BatchState {
                items: Vec::new(),
                aggregators: HashSet::new(),
                status: BatchStatus::Open,
                outcome: Arc::new(OnceCell::new()),
            }),
            last_operation: AtomicU64::new(0),
            allow_items: AsyncSignal::new(true),
            round_complete: AsyncSignal::new(false),
            cancel: CancellationToken::new(),
        })
    }

    /// Register a new aggregator for the currently open round.
    ///
    /// Suspends while a round-close transition is in progress. Fails with
    /// [`Error::Cancelled`] if the batch is disposed.
    pub async fn new_aggregator_token(&self) -> Result<AggregatorToken> {
        self.allow_items.wait(&self.cancel).await?;
        let token = AggregatorToken::new(self.id.clone());
        self.state.lock().unwrap().aggregators.insert(token.id());
        self.touch();
        debug!(batch = %self.id, token = %token.id(), "aggregator registered");
        Ok(token)
    }

    /// Add an item to the current round; the holder intends to add more.
    ///
    /// If a chunk-size threshold is configured and the buffer has reached
    /// it, this triggers an immediate round close without removing the
    /// token from the active set: the holder is expected to keep
    /// contributing to the next round.
    pub async fn add(&self, item: T, token: &AggregatorToken) -> Result<()> {
        self.add_inner(item, token, true).await
    }

    /// Add a final item and immediately run the completion protocol for
    /// this token. Equivalent to [`add`](Batch::add) followed by
    /// [`complete_submission`](Batch::complete_submission).
    pub async fn add_last(&self, item: T, token: &AggregatorToken) -> Result<()> {
        self.add_inner(item, token, false).await
    }

    async fn add_inner(&self, item: T, token: &AggregatorToken, more_coming: bool) -> Result<()> {
        {
            let st = self.state.lock().unwrap();
            self.check_token(&st, token)?;
        }
        self.allow_items.wait(&self.cancel).await?;
        let chunk_reached = {
            let mut st = self.state.lock().unwrap();
            st.items.push(item);
            self.chunk_size > 0 && st.items.len() >= self.chunk_size
        };
        self.touch();
        trace!(batch = %self.id, "item enlisted");

        if !more_coming {
            self.complete_round(token, false).await
        } else if chunk_reached {
            self.complete_round(token, true).await
        } else {
            Ok(())
        }
    }

    /// Signal that this aggregator has no more items for the current round.
    ///
    /// Waits out the idle window, then either closes the round (when every
    /// other token has completed too) or suspends until whichever caller
    /// ultimately closes it has finished, surfacing that round's outcome.
    pub async fn complete_submission(&self, token: &AggregatorToken) -> Result<()> {
        self.complete_round(token, false).await
    }

    async fn complete_round(&self, token: &AggregatorToken, chunk_triggered: bool) -> Result<()> {
        self.await_quiescence().await?;

        let plan = {
            let mut st = self.state.lock().unwrap();
            self.check_token(&st, token)?;

            if !chunk_triggered {
                st.aggregators.remove(&token.id());
            }

            let execute_now = chunk_triggered || st.aggregators.is_empty();
            if execute_now {
                self.allow_items.reset();
                st.status = BatchStatus::Executing;

                let buffered = std::mem::take(&mut st.items);
                let (to_process, remainder) = self.split(buffered);
                st.items = remainder;
                let slot = std::mem::replace(&mut st.outcome, Arc::new(OnceCell::new()));

                // Reopen before the processor is awaited: the next round
                // starts collecting concurrently with this round's
                // processing.
                st.status = BatchStatus::Open;
                self.allow_items.set();

                ClosePlan::Execute {
                    chunk: Chunk::new(to_process),
                    slot,
                }
            } else {
                // Capture the waiter under the mutex so the closing
                // caller's pulse cannot slip by before we start waiting.
                ClosePlan::Await {
                    waiter: self.round_complete.waiter(),
                    slot: st.outcome.clone(),
                }
            }
        };

        match plan {
            ClosePlan::Execute { chunk, slot } => {
                debug!(
                    batch = %self.id,
                    size = chunk.len(),
                    chunk_triggered,
                    "round closed, dispatching chunk"
                );
                let outcome: RoundOutcome = match self.run_chunk(chunk).await {
                    Ok(()) => Ok(()),
                    Err(err) => Err(Arc::new(err)),
                };
                let _ = slot.set(outcome.clone());
                self.round_complete.set();
                self.round_complete.reset();
                outcome.map_err(Error::Aborted)
            }
            ClosePlan::Await { mut waiter, slot } => {
                loop {
                    // The slot is filled before the pulse, so a filled slot
                    // is final. An empty slot after a wakeup means the
                    // pulse belonged to a different round; re-arm and keep
                    // waiting.
                    if let Some(outcome) = slot.get() {
                        return outcome.clone().map_err(Error::Aborted);
                    }
                    waiter.wait(&self.cancel).await?;
                    waiter = self.round_complete.waiter();
                }
            }
        }
    }

    /// Trailing-edge debounce: one full idle window must elapse with the
    /// quiescence marker unchanged before the round may close.
    async fn await_quiescence(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut observed = self.last_operation.load(Ordering::Acquire);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.idle_window) => {}
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            }
            let current = self.last_operation.load(Ordering::Acquire);
            if current == observed {
                return Ok(());
            }
            observed = current;
        }
    }

    async fn run_chunk(&self, mut chunk: Chunk<T>) -> Result<()> {
        loop {
            match self.processor.process(&chunk, &self.cancel).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        batch = %self.id,
                        attempt = chunk.attempt(),
                        error = %err,
                        "chunk processing failed"
                    );
                    match self.processor.handle_error(&chunk, &err) {
                        ErrorDecision::Continue => {
                            debug!(batch = %self.id, "error policy chose continue, chunk treated as handled");
                            return Ok(());
                        }
                        ErrorDecision::Retry => chunk.bump_attempt(),
                        ErrorDecision::AbortAndRethrow => return Err(err),
                    }
                }
            }
        }
    }

    fn split(&self, mut buffered: Vec<T>) -> (Vec<T>, Vec<T>) {
        if self.chunk_size == 0 || buffered.len() <= self.chunk_size {
            (buffered, Vec::new())
        } else {
            let remainder = buffered.split_off(self.chunk_size);
            (buffered, remainder)
        }
    }

    fn check_token(&self, st: &BatchState<T>, token: &AggregatorToken) -> Result<()> {
        if token.is_disposed() {
            return Err(Error::TokenDisposed);
        }
        if token.batch_id() != self.id {
            return Err(Error::invalid_token(format!(
                "token belongs to batch '{}', not '{}'",
                token.batch_id(),
                self.id
            )));
        }
        if !st.aggregators.contains(&token.id()) {
            return Err(Error::invalid_token(
                "the aggregator is not part of the current batch",
            ));
        }
        Ok(())
    }

    fn touch(&self) {
        self.last_operation.fetch_add(1, Ordering::AcqRel);
    }

    /// Point-in-time snapshot of the current round's buffer. Empty right
    /// after a round executes, except for any chunk remainder.
    pub fn enlisted_items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.state.lock().unwrap().items.clone()
    }

    /// Current status. `Executing` is only held during the brief gated
    /// transition; the batch reopens before the processor is awaited.
    pub fn status(&self) -> BatchStatus {
        self.state.lock().unwrap().status
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn idle_window(&self) -> Duration {
        self.idle_window
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Cancel every pending wait and any in-flight processor invocation.
    /// Absorbing: all later suspending calls fail with
    /// [`Error::Cancelled`].
    pub fn dispose(&self) {
        debug!(batch = %self.id, "batch disposed");
        self.cancel.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
