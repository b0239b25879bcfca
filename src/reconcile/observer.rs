//! Convergence observer.
//!
//! Polls the live snapshot until a predicate holds or a deadline passes.
//! A timeout is an ordinary outcome, not an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::reconcile::live::{LiveConfig, Snapshot};

/// Outcome of waiting for the live configuration.
#[derive(Debug, Clone)]
pub enum Convergence {
    Converged(Arc<Snapshot>),
    TimedOut { last_generation: u64 },
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged(_))
    }

    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Convergence::Converged(snapshot) => Some(snapshot),
            Convergence::TimedOut { .. } => None,
        }
    }
}

/// Shortest poll interval; a zero interval would spin until the deadline.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct Observer {
    live: Arc<LiveConfig>,
    poll_interval: Duration,
}

impl Observer {
    /// `poll_interval` is raised to at least `MIN_POLL_INTERVAL`.
    pub fn new(live: Arc<LiveConfig>, poll_interval: Duration) -> Self {
        Self {
            live,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `predicate` holds for the live snapshot.
    ///
    /// Returns `TimedOut` only once `timeout` has fully elapsed.
    pub async fn wait_until<F>(&self, mut predicate: F, timeout: Duration) -> Convergence
    where
        F: FnMut(&Snapshot) -> bool,
    {
        // A timeout too large to represent never expires.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let snapshot = self.live.current();
            if predicate(&snapshot) {
                return Convergence::Converged(snapshot);
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                tracing::debug!(
                    generation = snapshot.generation,
                    timeout = ?timeout,
                    "Configuration did not converge"
                );
                return Convergence::TimedOut {
                    last_generation: snapshot.generation,
                };
            }
            let pause = match deadline {
                Some(deadline) => self.poll_interval.min(deadline - now),
                None => self.poll_interval,
            };
            time::sleep(pause).await;
        }
    }

    /// Wait until the live generation reaches `generation`.
    pub async fn wait_for_generation(&self, generation: u64, timeout: Duration) -> Convergence {
        self.wait_until(|snapshot| snapshot.generation >= generation, timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::rules::{BackendRef, PathRule, Rule, RuleId};

    fn live() -> Arc<LiveConfig> {
        Arc::new(LiveConfig::new(&BackendRef::new("default-http-backend", 80)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_deadline_not_before() {
        let observer = Observer::new(live(), Duration::from_millis(100));
        let start = Instant::now();

        let outcome = observer.wait_until(|_| false, Duration::from_secs(3)).await;

        assert!(matches!(outcome, Convergence::TimedOut { last_generation: 0 }));
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(3) + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_is_clamped() {
        let observer = Observer::new(live(), Duration::ZERO);
        assert_eq!(observer.poll_interval(), MIN_POLL_INTERVAL);

        let start = Instant::now();
        let mut polls = 0u32;
        let outcome = observer
            .wait_until(
                |_| {
                    polls += 1;
                    false
                },
                Duration::from_millis(50),
            )
            .await;
        assert!(!outcome.is_converged());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(polls <= 52);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_still_converges() {
        let live = live();
        let observer = Observer::new(live.clone(), Duration::from_millis(100));

        let publisher = live.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            let doc = compile(&[], &BackendRef::new("other-backend", 80));
            publisher.publish(Arc::new(Snapshot::new(1, doc)));
        });

        let outcome = observer.wait_for_generation(1, Duration::MAX).await;
        assert!(outcome.is_converged());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success() {
        let observer = Observer::new(live(), Duration::from_millis(100));
        let start = Instant::now();
        let outcome = observer
            .wait_until(|s| s.document.has_server("_"), Duration::from_secs(3))
            .await;
        assert!(outcome.is_converged());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sees_later_publish() {
        let live = live();
        let observer = Observer::new(live.clone(), Duration::from_millis(100));

        let publisher = live.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            let rule = Rule::host(
                RuleId::new("default", "foo"),
                "foo",
                vec![PathRule::new("/", BackendRef::new("http-svc", 80))],
            )
            .unwrap();
            let doc = compile(&[rule], &BackendRef::new("default-http-backend", 80));
            publisher.publish(Arc::new(Snapshot::new(1, doc)));
        });

        let outcome = observer.wait_for_generation(1, Duration::from_secs(5)).await;
        let snapshot = outcome.snapshot().expect("should converge");
        assert!(snapshot.rendered.contains("server_name foo;"));
    }
}
