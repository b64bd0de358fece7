//! Aggregator capability tokens.

use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

/// Capability handle identifying one producer's membership in the currently
/// open round of a [`Batch`](crate::Batch).
///
/// Tokens are issued by
/// [`Batch::new_aggregator_token`](crate::Batch::new_aggregator_token) and
/// are valid while they remain in the batch's active aggregator set and
/// have not been disposed. Release is
/// explicit: call [`dispose`](AggregatorToken::dispose) when done; there is
/// no implicit cleanup on drop.
#[derive(Debug)]
pub struct AggregatorToken {
    id: Uuid,
    batch_id: String,
    disposed: AtomicBool,
}

impl AggregatorToken {
    pub(crate) fn new(batch_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_id,
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Identifier of the batch this token was issued by. Used only for
    /// validity checks; holding a token does not keep the batch alive.
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Consume the token. One-way and idempotent: any later `add` or
    /// completion call with this token fails with
    /// [`Error::TokenDisposed`](crate::Error::TokenDisposed).
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    /// Whether the holder has disposed this token.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl PartialEq for AggregatorToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AggregatorToken {}

impl std::hash::Hash for AggregatorToken {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_have_identity_equality() {
        let a = AggregatorToken::new("batch".into());
        let b = AggregatorToken::new("batch".into());
        assert_eq!(a, a);
        assert_ne!(a, b);
    }

    #[test]
    fn dispose_is_one_way_and_idempotent() {
        let token = AggregatorToken::new("batch".into());
        assert!(!token.is_disposed());
        token.dispose();
        assert!(token.is_disposed());
        token.dispose();
        assert!(token.is_disposed());
    }

    #[test]
    fn token_remembers_owning_batch() {
        let token = AggregatorToken::new("orders".into());
        assert_eq!(token.batch_id(), "orders");
    }
}
