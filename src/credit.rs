//! In-process credit ledger (spec.md §4.7).
//!
//! Production billing state lives outside this service (spec.md §1); what's
//! specified in full is the reserve/commit/refund contract the Gateway
//! drives around every operation. This is a minimal, idempotent in-memory
//! implementation of that contract: a `DashMap` of balances plus a
//! `DashMap` of outstanding reservations, so a retried commit/refund against
//! an already-settled reservation id is a logged no-op rather than a double
//! charge or double refund.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationId(pub Uuid);

#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: String,
    pub cost: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("insufficient credit balance")]
    Insufficient,
}

#[derive(Clone)]
enum ReservationState {
    Outstanding,
    Committed,
    Refunded,
}

/// Per-user credit balances plus outstanding reservations. Cheap to clone
/// (an `Arc` internally) so it can be held in `AppState` alongside other
/// shared collaborators.
#[derive(Clone)]
pub struct CreditLedger {
    balances: Arc<DashMap<String, AtomicI64>>,
    reservations: Arc<DashMap<Uuid, (Reservation, ReservationState)>>,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self {
            balances: Arc::new(DashMap::new()),
            reservations: Arc::new(DashMap::new()),
        }
    }

    /// Seed (or top up) a user's balance. Used by tests and by whatever
    /// out-of-process billing sync eventually drives production balances.
    pub fn grant(&self, user_id: &str, amount: i64) {
        self.balances
            .entry(user_id.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(amount, Ordering::SeqCst);
    }

    pub fn balance(&self, user_id: &str) -> i64 {
        self.balances
            .get(user_id)
            .map(|b| b.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Reserve `cost` credits for `user_id`. Debits the balance immediately
    /// (an optimistic reservation); `refund` credits it back on failure.
    pub fn reserve(&self, user_id: &str, cost: u32) -> Result<Reservation, CreditError> {
        let entry = self
            .balances
            .entry(user_id.to_string())
            .or_insert_with(|| AtomicI64::new(0));

        let cost_i64 = cost as i64;
        loop {
            let current = entry.load(Ordering::SeqCst);
            if current < cost_i64 {
                return Err(CreditError::Insufficient);
            }
            if entry
                .compare_exchange(
                    current,
                    current - cost_i64,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                break;
            }
        }

        let reservation = Reservation {
            id: ReservationId(Uuid::new_v4()),
            user_id: user_id.to_string(),
            cost,
        };
        self.reservations.insert(
            reservation.id.0,
            (reservation.clone(), ReservationState::Outstanding),
        );
        Ok(reservation)
    }

    /// Settle a reservation as spent. Idempotent: committing twice is a
    /// logged no-op, not a double debit (the debit already happened at
    /// `reserve` time).
    pub fn commit(&self, reservation: &Reservation) {
        match self.reservations.get_mut(&reservation.id.0) {
            Some(mut entry) => match entry.1 {
                ReservationState::Outstanding => entry.1 = ReservationState::Committed,
                ReservationState::Committed => {
                    tracing::warn!(reservation = %reservation.id.0, "duplicate commit ignored");
                }
                ReservationState::Refunded => {
                    tracing::warn!(reservation = %reservation.id.0, "commit after refund ignored");
                }
            },
            None => tracing::warn!(reservation = %reservation.id.0, "commit of unknown reservation ignored"),
        }
    }

    /// Refund a reservation's credits back to the user. Idempotent for the
    /// same reason as `commit`. Every failure envelope (spec.md §7) routes
    /// here uniformly.
    pub fn refund(&self, reservation: &Reservation) {
        let should_refund = match self.reservations.get_mut(&reservation.id.0) {
            Some(mut entry) => match entry.1 {
                ReservationState::Outstanding => {
                    entry.1 = ReservationState::Refunded;
                    true
                }
                ReservationState::Committed => {
                    tracing::warn!(reservation = %reservation.id.0, "refund after commit ignored");
                    false
                }
                ReservationState::Refunded => {
                    tracing::warn!(reservation = %reservation.id.0, "duplicate refund ignored");
                    false
                }
            },
            None => {
                tracing::warn!(reservation = %reservation.id.0, "refund of unknown reservation ignored");
                false
            }
        };

        if should_refund {
            self.balances
                .entry(reservation.user_id.clone())
                .or_insert_with(|| AtomicI64::new(0))
                .fetch_add(reservation.cost as i64, Ordering::SeqCst);
        }
    }
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_fails_when_balance_insufficient() {
        let ledger = CreditLedger::new();
        ledger.grant("u1", 1);
        assert!(matches!(
            ledger.reserve("u1", 2),
            Err(CreditError::Insufficient)
        ));
    }

    #[test]
    fn refund_restores_balance_and_commit_does_not() {
        let ledger = CreditLedger::new();
        ledger.grant("u1", 10);
        let r = ledger.reserve("u1", 4).unwrap();
        assert_eq!(ledger.balance("u1"), 6);
        ledger.refund(&r);
        assert_eq!(ledger.balance("u1"), 10);

        let r2 = ledger.reserve("u1", 3).unwrap();
        ledger.commit(&r2);
        assert_eq!(ledger.balance("u1"), 7);
    }

    #[test]
    fn double_refund_is_a_noop() {
        let ledger = CreditLedger::new();
        ledger.grant("u1", 10);
        let r = ledger.reserve("u1", 4).unwrap();
        ledger.refund(&r);
        ledger.refund(&r);
        assert_eq!(ledger.balance("u1"), 10);
    }

    #[test]
    fn commit_after_refund_does_not_redebit() {
        let ledger = CreditLedger::new();
        ledger.grant("u1", 10);
        let r = ledger.reserve("u1", 4).unwrap();
        ledger.refund(&r);
        ledger.commit(&r);
        assert_eq!(ledger.balance("u1"), 10);
    }
}
