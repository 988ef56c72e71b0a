use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use progress_core::Clock;
use progress_core::model::{SessionRecord, UserId};

use crate::error::FetchError;
use crate::identity::CurrentUserIdentity;
use crate::source::RawSessionSource;

/// Shared result of one fetch.
pub type SessionSnapshot = Arc<Vec<SessionRecord>>;

type FetchOutcome = Result<SessionSnapshot, FetchError>;

struct Snapshot {
    user: UserId,
    fetched_at_ms: i64,
    sessions: SessionSnapshot,
}

struct InFlight {
    user: UserId,
    generation: u64,
    tx: broadcast::Sender<FetchOutcome>,
}

#[derive(Default)]
struct State {
    snapshot: Option<Snapshot>,
    in_flight: Option<InFlight>,
    next_generation: u64,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Plan {
    Ready(SessionSnapshot),
    Wait(broadcast::Receiver<FetchOutcome>),
    Lead {
        generation: u64,
        tx: broadcast::Sender<FetchOutcome>,
        rx: broadcast::Receiver<FetchOutcome>,
    },
}

/// Collapses bursts of history requests into one call to the source.
///
/// A successful result is reused for a short window; while a fetch is
/// running, every caller waits on that same fetch. The fetch runs on its own
/// task, so it completes even if the caller that started it goes away.
/// Failures reach all waiters and never replace the last good snapshot.
pub struct SessionFetchCoalescer {
    source: Arc<dyn RawSessionSource>,
    identity: Arc<dyn CurrentUserIdentity>,
    clock: Clock,
    window_ms: i64,
    state: Arc<Mutex<State>>,
}

impl SessionFetchCoalescer {
    #[must_use]
    pub fn new(
        source: Arc<dyn RawSessionSource>,
        identity: Arc<dyn CurrentUserIdentity>,
        clock: Clock,
        window: Duration,
    ) -> Self {
        Self {
            source,
            identity,
            clock,
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Full session history of the signed-in user.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Unauthenticated` with no signed-in user, or the
    /// source's error when the shared fetch fails.
    pub async fn fetch_all_sessions(&self) -> Result<SessionSnapshot, FetchError> {
        let user = self
            .identity
            .current_user()
            .ok_or(FetchError::Unauthenticated)?;

        let mut rx = match self.plan(&user) {
            Plan::Ready(sessions) => return Ok(sessions),
            Plan::Wait(rx) => {
                debug!("joining in-flight session fetch");
                rx
            }
            Plan::Lead { generation, tx, rx } => {
                self.spawn_fetch(user, generation, tx);
                rx
            }
        };
        rx.recv().await.unwrap_or(Err(FetchError::Interrupted))
    }

    fn plan(&self, user: &UserId) -> Plan {
        let mut state = lock(&self.state);
        let now = self.clock.now_millis();

        if let Some(snapshot) = &state.snapshot {
            let age = now.saturating_sub(snapshot.fetched_at_ms);
            if snapshot.user == *user && (0..self.window_ms).contains(&age) {
                debug!(age_ms = age, "reusing coalesced session snapshot");
                return Plan::Ready(Arc::clone(&snapshot.sessions));
            }
        }

        if let Some(in_flight) = state.in_flight.as_ref().filter(|f| f.user == *user) {
            return Plan::Wait(in_flight.tx.subscribe());
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let (tx, rx) = broadcast::channel(1);
        state.in_flight = Some(InFlight {
            user: user.clone(),
            generation,
            tx: tx.clone(),
        });
        Plan::Lead { generation, tx, rx }
    }

    fn spawn_fetch(&self, user: UserId, generation: u64, tx: broadcast::Sender<FetchOutcome>) {
        let source = Arc::clone(&self.source);
        let clock = self.clock.clone();
        let guard = InFlightGuard {
            state: Arc::clone(&self.state),
            generation,
        };

        tokio::spawn(async move {
            let outcome = source.fetch_sessions(&user).await.map(Arc::new);

            {
                let mut state = lock(&guard.state);
                let still_current = state
                    .in_flight
                    .as_ref()
                    .is_some_and(|f| f.generation == generation);
                if still_current {
                    state.in_flight = None;
                    if let Ok(sessions) = &outcome {
                        state.snapshot = Some(Snapshot {
                            user,
                            fetched_at_ms: clock.now_millis(),
                            sessions: Arc::clone(sessions),
                        });
                    }
                }
            }

            match &outcome {
                Ok(sessions) => debug!(count = sessions.len(), "fetched session history"),
                Err(err) => warn!(error = %err, "session history fetch failed"),
            }
            // No receivers is fine: every caller went away.
            let _ = tx.send(outcome);
        });
    }

    /// Drop the snapshot and detach any running fetch so the next call
    /// refetches. A detached fetch still answers the callers already waiting
    /// on it but its result is not kept.
    pub fn invalidate(&self) {
        let mut state = lock(&self.state);
        state.snapshot = None;
        state.in_flight = None;
    }

    /// Forget everything about the previous user (used on sign-out).
    pub fn reset(&self) {
        self.invalidate();
    }
}

/// Clears the in-flight slot if the fetch task ends without publishing
/// (panic or runtime shutdown), so later callers start a new fetch.
struct InFlightGuard {
    state: Arc<Mutex<State>>,
    generation: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == self.generation)
        {
            state.in_flight = None;
        }
    }
}
