//! Single-flight authentication refresh.
//!
//! [`AuthenticationCoordinator`] is a two-state machine, `Idle` and
//! `Refreshing`. The first request admitted while idle becomes the trigger
//! and starts a refresh; requests admitted while refreshing queue behind it
//! in arrival order. [`AuthenticationCoordinator::settle`] hands back the
//! trigger and the whole queue at once and returns to idle.
//!
//! Every refresh carries an epoch. Settling with a stale epoch is ignored,
//! so a late result from an abandoned refresh cannot drain the queue of a
//! newer one.

use std::mem;

/// What [`AuthenticationCoordinator::admit`] did with a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The request became the trigger of a new refresh.
    Started {
        /// Identifies this refresh when settling.
        epoch: u64,
    },
    /// A refresh is outstanding; the request waits for it.
    Queued {
        /// Zero-based position in the queue.
        position: usize,
    },
}

/// The requests released when a refresh settles.
#[derive(Debug, PartialEq, Eq)]
pub struct Settlement<P> {
    /// The request that started the refresh.
    pub trigger: P,
    /// Requests that queued behind it, in arrival order.
    pub queued: Vec<P>,
}

#[derive(Debug)]
enum State<P> {
    Idle,
    Refreshing { epoch: u64, trigger: P, queued: Vec<P> },
}

/// Serializes authentication refreshes.
///
/// # Example
///
/// ```rust
/// use api_client::auth::{Admission, AuthenticationCoordinator};
///
/// let mut coordinator = AuthenticationCoordinator::new();
///
/// let Admission::Started { epoch } = coordinator.admit("first") else {
///     unreachable!()
/// };
/// assert_eq!(coordinator.admit("second"), Admission::Queued { position: 0 });
///
/// let settlement = coordinator.settle(epoch).unwrap();
/// assert_eq!(settlement.trigger, "first");
/// assert_eq!(settlement.queued, vec!["second"]);
/// assert!(!coordinator.is_refreshing());
/// ```
#[derive(Debug)]
pub struct AuthenticationCoordinator<P> {
    state: State<P>,
    next_epoch: u64,
}

impl<P> AuthenticationCoordinator<P> {
    /// Creates an idle coordinator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            next_epoch: 1,
        }
    }

    /// Returns `true` while a refresh is outstanding.
    #[must_use]
    pub const fn is_refreshing(&self) -> bool {
        matches!(self.state, State::Refreshing { .. })
    }

    /// Returns the epoch of the outstanding refresh.
    #[must_use]
    pub const fn epoch(&self) -> Option<u64> {
        match &self.state {
            State::Idle => None,
            State::Refreshing { epoch, .. } => Some(*epoch),
        }
    }

    /// Returns the request that started the outstanding refresh.
    #[must_use]
    pub const fn trigger(&self) -> Option<&P> {
        match &self.state {
            State::Idle => None,
            State::Refreshing { trigger, .. } => Some(trigger),
        }
    }

    /// Returns the number of requests waiting on the outstanding refresh.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        match &self.state {
            State::Idle => 0,
            State::Refreshing { queued, .. } => queued.len(),
        }
    }

    /// Starts a refresh with `pending` as trigger, or queues it behind the
    /// outstanding one.
    pub fn admit(&mut self, pending: P) -> Admission {
        match &mut self.state {
            State::Refreshing { queued, .. } => {
                queued.push(pending);
                Admission::Queued {
                    position: queued.len() - 1,
                }
            }
            State::Idle => {
                let epoch = self.next_epoch;
                self.next_epoch += 1;
                self.state = State::Refreshing {
                    epoch,
                    trigger: pending,
                    queued: Vec::new(),
                };
                Admission::Started { epoch }
            }
        }
    }

    /// Ends the refresh identified by `epoch`, releasing its requests.
    ///
    /// Returns `None`, leaving the state untouched, if `epoch` is not the
    /// outstanding refresh.
    pub fn settle(&mut self, epoch: u64) -> Option<Settlement<P>> {
        if self.epoch() != Some(epoch) {
            return None;
        }
        match mem::replace(&mut self.state, State::Idle) {
            State::Refreshing {
                trigger, queued, ..
            } => Some(Settlement { trigger, queued }),
            State::Idle => None,
        }
    }
}

impl<P> Default for AuthenticationCoordinator<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_admission_starts_refresh() {
        let mut coordinator = AuthenticationCoordinator::new();
        assert!(!coordinator.is_refreshing());

        let admission = coordinator.admit(1);

        assert_eq!(admission, Admission::Started { epoch: 1 });
        assert!(coordinator.is_refreshing());
        assert_eq!(coordinator.trigger(), Some(&1));
        assert_eq!(coordinator.queued_len(), 0);
    }

    #[test]
    fn test_admissions_during_refresh_queue_in_arrival_order() {
        let mut coordinator = AuthenticationCoordinator::new();
        coordinator.admit("a");

        assert_eq!(coordinator.admit("b"), Admission::Queued { position: 0 });
        assert_eq!(coordinator.admit("c"), Admission::Queued { position: 1 });
        assert_eq!(coordinator.admit("d"), Admission::Queued { position: 2 });

        let settlement = coordinator.settle(1).unwrap();
        assert_eq!(
            settlement,
            Settlement {
                trigger: "a",
                queued: vec!["b", "c", "d"],
            }
        );
    }

    #[test]
    fn test_settle_returns_to_idle_with_empty_queue() {
        let mut coordinator = AuthenticationCoordinator::new();
        coordinator.admit(1);
        coordinator.admit(2);
        coordinator.settle(1);

        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.queued_len(), 0);
        assert!(coordinator.trigger().is_none());
        assert!(coordinator.epoch().is_none());
    }

    #[test]
    fn test_settle_drains_exactly_once() {
        let mut coordinator = AuthenticationCoordinator::new();
        coordinator.admit(1);

        assert!(coordinator.settle(1).is_some());
        assert!(coordinator.settle(1).is_none());
    }

    #[test]
    fn test_stale_epoch_is_ignored() {
        let mut coordinator = AuthenticationCoordinator::new();
        coordinator.admit("old");
        coordinator.settle(1);
        assert_eq!(coordinator.admit("new"), Admission::Started { epoch: 2 });

        assert!(coordinator.settle(1).is_none());
        assert!(coordinator.is_refreshing());
        assert_eq!(coordinator.trigger(), Some(&"new"));
    }

    #[test]
    fn test_settle_while_idle_is_none() {
        let mut coordinator: AuthenticationCoordinator<()> = AuthenticationCoordinator::default();
        assert!(coordinator.settle(1).is_none());
    }
}
