use std::time::Duration;

use tokio::{sync::mpsc::WeakUnboundedSender, task::JoinHandle, time::sleep};

/// What a pending timer will trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Ask the next question (the hunger timer).
    NextQuestion,
    /// Give a hint or expire the current question.
    Hint,
}

/// A pending timer owned by the phase that armed it.
///
/// Dropping the timer aborts it. A timer that already fired is only honoured
/// while its owner still holds a timer with the same token.
#[derive(Debug)]
pub(crate) struct PhaseTimer {
    kind: TimerKind,
    token: u64,
    handle: JoinHandle<()>,
}

impl PhaseTimer {
    /// Deliver `message` to `inbox` after `delay` unless dropped first.
    pub(crate) fn arm<T: Send + 'static>(
        kind: TimerKind,
        token: u64,
        delay: Duration,
        inbox: WeakUnboundedSender<T>,
        message: T,
    ) -> Self {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(message);
            }
        });

        Self {
            kind,
            token,
            handle,
        }
    }

    /// What the timer triggers.
    pub(crate) fn kind(&self) -> TimerKind {
        self.kind
    }

    /// Whether a firing stamped with `token` belongs to this timer.
    pub(crate) fn owns(&self, token: u64) -> bool {
        self.token == token
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use tokio::{sync::mpsc, time::timeout};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = PhaseTimer::arm(
            TimerKind::Hint,
            1,
            Duration::from_secs(5),
            tx.downgrade(),
            "hint",
        );

        assert!(
            timeout(Duration::from_millis(4_900), rx.recv())
                .await
                .is_err()
        );
        assert_eq!(rx.recv().await, Some("hint"));
        assert!(timer.owns(1));
        assert_eq!(timer.kind(), TimerKind::Hint);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = PhaseTimer::arm(
            TimerKind::NextQuestion,
            7,
            Duration::from_secs(1),
            tx.downgrade(),
            "ask",
        );
        drop(timer);

        assert!(timeout(Duration::from_secs(10), rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_inbox_swallows_firing() {
        let (tx, rx) = mpsc::unbounded_channel::<&str>();
        let weak = tx.downgrade();
        drop(tx);
        drop(rx);

        let timer = PhaseTimer::arm(TimerKind::Hint, 3, Duration::from_secs(1), weak, "late");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(timer.handle.is_finished());
    }
}
