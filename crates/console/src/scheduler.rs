use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One-shot re-arm timer for a polled stream.
///
/// Each call to `schedule` first cancels whatever was armed before, so
/// re-arming is idempotent and a view switching targets can never leave a
/// stale timer behind. The predicate is evaluated at call time, on every
/// re-arm: a job that has reached a terminal state simply stops producing
/// ticks without anyone having to cancel it explicitly.
///
/// The timer never repeats on its own. Firing delivers exactly one tick on
/// the channel, and the tick handler re-schedules after its fetch completes.
#[derive(Debug)]
pub(crate) struct RefreshTimer {
    armed: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub(crate) fn new() -> Self {
        Self { armed: None }
    }

    pub(crate) fn schedule<T: Send + 'static>(
        &mut self,
        predicate: impl FnOnce() -> bool,
        delay: Duration,
        tick_tx: &mpsc::UnboundedSender<T>,
        tick: T,
    ) {
        self.cancel();
        if !predicate() {
            return;
        }
        let tx = tick_tx.clone();
        self.armed = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(tick);
        }));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.armed.take() {
            handle.abort();
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
