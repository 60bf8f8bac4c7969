//! Single-flight registry of in-progress fetches.
//!
//! The first session to ask for a key becomes its owner and performs the
//! download; every later session for the same key gets the shared
//! [`Flight`] and waits for the owner's outcome instead of fetching again.
//!
//! # Concurrency Model
//!
//! - Check-and-insert and release-and-remove go through the `DashMap` entry
//!   API, so each is atomic per key
//! - Subscribers attach to the [`Flight`] itself, not the map, so a flight
//!   that resolves between lookup and subscribe still fires the callback
//! - Subscriber callbacks run outside every lock, in subscription order
//! - A [`FlightGuard`] dropped without an explicit release (owner cancelled)
//!   resolves the flight as [`FlightOutcome::Abandoned`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use imgcache_core::cache::CacheKey;
//! use imgcache_core::coordinator::{Acquire, FetchCoordinator, FlightOutcome};
//!
//! let coordinator = Arc::new(FetchCoordinator::new());
//! let key = CacheKey::from_url("https://example.com/a.png").unwrap();
//!
//! let Acquire::Owner(guard) = coordinator.try_acquire(&key) else { unreachable!() };
//! let Acquire::InFlight(flight) = coordinator.try_acquire(&key) else { unreachable!() };
//! flight.subscribe(|outcome| assert!(matches!(outcome, FlightOutcome::Fetched(_))));
//!
//! guard.release(FlightOutcome::Fetched(Bytes::from_static(b"png")));
//! assert!(!coordinator.is_in_flight(&key));
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;
use tracing::{debug, instrument};

use crate::cache::CacheKey;
use crate::error::LoadError;

/// Final result of one flight, delivered to every subscriber.
#[derive(Debug, Clone)]
pub enum FlightOutcome {
    /// Bytes fetched and durably cached.
    Fetched(Bytes),
    /// The owner's fetch failed.
    Failed(LoadError),
    /// The owner went away before finishing; waiters should try again.
    Abandoned,
}

type Subscriber = Box<dyn FnOnce(FlightOutcome) + Send>;

#[derive(Default)]
struct FlightState {
    outcome: Option<FlightOutcome>,
    subscribers: Vec<Subscriber>,
}

/// One in-progress fetch that waiters can subscribe to.
pub struct Flight {
    key: CacheKey,
    state: Mutex<FlightState>,
}

impl fmt::Debug for Flight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Flight")
            .field("key", &self.key)
            .field("resolved", &state.outcome.is_some())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl Flight {
    fn new(key: CacheKey) -> Self {
        Self {
            key,
            state: Mutex::new(FlightState::default()),
        }
    }

    /// Returns the key this flight fetches.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Attaches a completion callback.
    ///
    /// Fires exactly once: immediately if the flight already resolved,
    /// otherwise when the owner releases it.
    pub fn subscribe(&self, on_complete: impl FnOnce(FlightOutcome) + Send + 'static) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(outcome) = state.outcome.clone() {
            drop(state);
            on_complete(outcome);
            return;
        }
        state.subscribers.push(Box::new(on_complete));
    }

    /// Waits for the flight's outcome.
    pub async fn wait(&self) -> FlightOutcome {
        let (tx, rx) = oneshot::channel();
        self.subscribe(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.unwrap_or(FlightOutcome::Abandoned)
    }

    /// Stores the outcome and notifies subscribers. Returns false if the
    /// flight had already resolved, in which case nothing is invoked.
    fn resolve(&self, outcome: FlightOutcome) -> bool {
        let subscribers = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.subscribers)
        };

        debug!(key = %self.key, subscribers = subscribers.len(), "notifying subscribers");
        for subscriber in subscribers {
            subscriber(outcome.clone());
        }
        true
    }
}

/// Result of [`FetchCoordinator::try_acquire`].
#[derive(Debug)]
pub enum Acquire {
    /// Caller owns the fetch and must release the guard when done.
    Owner(FlightGuard),
    /// Another session is already fetching this key.
    InFlight(Arc<Flight>),
}

/// Process-wide registry of in-flight fetches keyed by [`CacheKey`].
///
/// Share it behind an `Arc` across every session of one loader.
#[derive(Debug, Default)]
pub struct FetchCoordinator {
    flights: DashMap<CacheKey, Arc<Flight>>,
}

impl FetchCoordinator {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically registers the caller as owner of `key`, or returns the
    /// existing flight.
    #[instrument(level = "debug", skip(self), fields(key = %key))]
    pub fn try_acquire(self: &Arc<Self>, key: &CacheKey) -> Acquire {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!("key already in flight");
                Acquire::InFlight(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                let flight = Arc::new(Flight::new(key.clone()));
                entry.insert(Arc::clone(&flight));
                debug!("registered as owner");
                Acquire::Owner(FlightGuard {
                    coordinator: Arc::clone(self),
                    flight,
                    released: false,
                })
            }
        }
    }

    /// Removes the entry for `key` and notifies its subscribers.
    ///
    /// Returns false if no flight is registered, so a second release of the
    /// same key is a no-op.
    #[instrument(level = "debug", skip(self, outcome), fields(key = %key))]
    pub fn release(&self, key: &CacheKey, outcome: FlightOutcome) -> bool {
        match self.flights.remove(key) {
            Some((_, flight)) => flight.resolve(outcome),
            None => false,
        }
    }

    /// Returns true while a fetch for `key` is registered.
    #[must_use]
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.flights.contains_key(key)
    }

    /// Number of keys currently in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Returns true when nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    fn release_flight(&self, flight: &Arc<Flight>, outcome: FlightOutcome) -> bool {
        // Only remove our own entry; the key may already belong to a new owner.
        self.flights
            .remove_if(flight.key(), |_, current| Arc::ptr_eq(current, flight));
        flight.resolve(outcome)
    }
}

/// Ownership of one key's fetch. Releases the key on drop.
#[derive(Debug)]
pub struct FlightGuard {
    coordinator: Arc<FetchCoordinator>,
    flight: Arc<Flight>,
    released: bool,
}

impl FlightGuard {
    /// Returns the owned key.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        self.flight.key()
    }

    /// Releases the key and hands `outcome` to every waiter.
    pub fn release(mut self, outcome: FlightOutcome) {
        self.released = true;
        self.coordinator.release_flight(&self.flight, outcome);
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.released {
            debug!(key = %self.flight.key(), "owner dropped without release; abandoning flight");
            self.coordinator
                .release_flight(&self.flight, FlightOutcome::Abandoned);
        }
    }
}
