use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Why a run was cut short.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    DurationElapsed,
    Operator,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::DurationElapsed => f.write_str("duration elapsed"),
            StopReason::Operator => f.write_str("stopped by operator"),
        }
    }
}

/// One-shot stop signal handed to every task at spawn time.
///
/// The first [`Shutdown::fire`] wins and records its reason; later fires are
/// no-ops. Readers poll [`Shutdown::is_fired`] at their checkpoints or await
/// [`Shutdown::fired`] while idle. It never interrupts a request in flight.
#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call fired the signal.
    pub fn fire(&self, reason: StopReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            tracing::info!("shutdown: {reason}");
            self.token.cancel();
        }
        first
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    pub async fn fired(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_fire_wins() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_fired());
        assert_eq!(shutdown.reason(), None);

        assert!(shutdown.fire(StopReason::Operator));
        assert!(!shutdown.fire(StopReason::DurationElapsed));
        assert!(shutdown.is_fired());
        assert_eq!(shutdown.reason(), Some(StopReason::Operator));
    }

    #[tokio::test]
    async fn clones_observe_fire() {
        let shutdown = Shutdown::new();
        let reader = shutdown.clone();
        let waiter = tokio::spawn(async move {
            reader.fired().await;
            reader.reason()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.fire(StopReason::DurationElapsed);
        assert_eq!(waiter.await.unwrap(), Some(StopReason::DurationElapsed));
    }
}
