//! Settlement substrate
//!
//! The substrate holds a single committed root and action cursor, queues
//! actions with their running hash, and accepts a new root only through a
//! compare-and-swap on the cursor.

use crate::action::{Action, PendingAction};
use crate::chain::{PartialProof, ProofVerifier, TranscriptVerifier};
use crate::errors::RollupError;
use crate::state::{ActionCursor, Commitment, RollupState};
use crate::RollupResult;
use parking_lot::Mutex;
use quorum_hash::Field;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default bound on queued actions
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

pub trait Substrate: Send + Sync {
    /// Currently committed root and cursor
    fn committed(&self) -> Commitment;

    /// Append an action to the queue
    fn queue_action(&self, action: Action) -> RollupResult<PendingAction>;

    /// Queued actions not yet covered by a commit, oldest first
    fn pending_actions(&self) -> Vec<PendingAction>;

    fn verify_proof(&self, proof: &PartialProof) -> bool;

    /// Replace the committed root iff `previous_cursor` is still current.
    /// Returns whether the swap happened.
    fn commit_root(&self, new_root: Field, previous_cursor: ActionCursor, new_cursor: ActionCursor) -> bool;
}

struct Inner {
    committed: Commitment,
    /// Cursor after the last queued action
    tail: ActionCursor,
    next_sequence: u64,
    queue: VecDeque<PendingAction>,
}

/// In-process substrate
pub struct LocalSubstrate {
    inner: Mutex<Inner>,
    capacity: usize,
    verifier: Arc<dyn ProofVerifier>,
}

impl LocalSubstrate {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_verifier(capacity, Arc::new(TranscriptVerifier))
    }

    pub fn with_verifier(capacity: usize, verifier: Arc<dyn ProofVerifier>) -> Self {
        let committed = Commitment {
            root: RollupState::default().commitment(),
            cursor: ActionCursor::genesis(),
        };
        Self {
            inner: Mutex::new(Inner {
                committed,
                tail: committed.cursor,
                next_sequence: 0,
                queue: VecDeque::new(),
            }),
            capacity,
            verifier,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

impl Default for LocalSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalSubstrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LocalSubstrate")
            .field("committed", &inner.committed)
            .field("queued", &inner.queue.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Substrate for LocalSubstrate {
    fn committed(&self) -> Commitment {
        self.inner.lock().committed
    }

    fn queue_action(&self, action: Action) -> RollupResult<PendingAction> {
        let digest = action.digest()?;
        let mut inner = self.inner.lock();
        if inner.queue.len() >= self.capacity {
            warn!("Rejected {}: queue full", action.kind());
            return Err(RollupError::QueueFull {
                capacity: self.capacity,
            });
        }

        let cursor_after = inner.tail.advance(&digest);
        let pending = PendingAction {
            action,
            sequence: inner.next_sequence,
            cursor_after,
        };
        debug!("Queued {} as #{}", pending.action.kind(), pending.sequence);

        inner.tail = cursor_after;
        inner.next_sequence += 1;
        inner.queue.push_back(pending.clone());
        Ok(pending)
    }

    fn pending_actions(&self) -> Vec<PendingAction> {
        self.inner.lock().queue.iter().cloned().collect()
    }

    fn verify_proof(&self, proof: &PartialProof) -> bool {
        self.verifier.verify(proof)
    }

    fn commit_root(&self, new_root: Field, previous_cursor: ActionCursor, new_cursor: ActionCursor) -> bool {
        let mut inner = self.inner.lock();
        if inner.committed.cursor != previous_cursor {
            warn!(
                "Commit rejected: expected cursor {}, committed is {}",
                previous_cursor, inner.committed.cursor
            );
            return false;
        }

        if new_cursor == previous_cursor {
            if new_root != inner.committed.root {
                warn!("Commit rejected: empty chain with a different root");
                return false;
            }
            return true;
        }

        let Some(position) = inner
            .queue
            .iter()
            .position(|p| p.cursor_after == new_cursor)
        else {
            warn!("Commit rejected: cursor {} was never queued", new_cursor);
            return false;
        };

        inner.queue.drain(..=position);
        inner.committed = Commitment {
            root: new_root,
            cursor: new_cursor,
        };
        info!(
            "Root committed at cursor {}, {} actions still queued",
            new_cursor,
            inner.queue.len()
        );
        true
    }
}
