//! One-shot timers delivered through the agent mailbox
//!
//! A fired timer is just another [`AgentMessage`], so timer handling is
//! serialized with packets and never races the state machine. Every armed
//! timer carries an id; the machine ignores events whose id is no longer the
//! current one for that kind, which covers a cancelled timer whose message
//! was already queued.

use crate::agent::{AgentHandle, AgentMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// DHCP lease ran out
    LeaseExpiry,
    /// Time for another DHCP attempt from link-local
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub kind: TimerKind,
    pub id: u64,
}

/// Cancellable reference to a scheduled event
#[derive(Debug)]
pub struct TimerHandle {
    event: TimerEvent,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(event: TimerEvent, abort: Option<AbortHandle>) -> Self {
        Self { event, abort }
    }

    pub fn event(&self) -> TimerEvent {
        self.event
    }

    pub fn cancel(self) {
        if let Some(abort) = self.abort {
            abort.abort();
        }
    }
}

/// Something that delivers a [`TimerEvent`] after a delay
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle;
}

/// Sleeps on the tokio runtime, then posts to the agent mailbox
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::Sender<AgentMessage>,
}

impl TokioScheduler {
    pub fn new(handle: &AgentHandle) -> Self {
        Self {
            tx: handle.sender(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(AgentMessage::Timer(event)).await.is_err() {
                debug!(?event, "Agent gone before timer fired");
            }
        });
        TimerHandle::new(event, Some(task.abort_handle()))
    }
}

/// The lease and retry slots; at most one outstanding timer per kind
pub struct Timers {
    scheduler: Arc<dyn Scheduler>,
    next_id: u64,
    lease: Option<TimerHandle>,
    retry: Option<TimerHandle>,
}

impl Timers {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            next_id: 0,
            lease: None,
            retry: None,
        }
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::LeaseExpiry => &mut self.lease,
            TimerKind::Retry => &mut self.retry,
        }
    }

    /// Arm a timer, replacing any outstanding one of the same kind
    pub fn arm(&mut self, kind: TimerKind, delay: Duration) -> TimerEvent {
        self.cancel(kind);
        self.next_id += 1;
        let event = TimerEvent {
            kind,
            id: self.next_id,
        };
        let handle = self.scheduler.schedule(delay, event);
        *self.slot(kind) = Some(handle);
        event
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.slot(kind).take() {
            debug!(?kind, id = handle.event().id, "Cancelled timer");
            handle.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(TimerKind::LeaseExpiry);
        self.cancel(TimerKind::Retry);
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::LeaseExpiry => self.lease.is_some(),
            TimerKind::Retry => self.retry.is_some(),
        }
    }

    /// Claim a fired event
    ///
    /// Returns false for stale events. A current event frees its slot.
    pub fn fire(&mut self, event: TimerEvent) -> bool {
        let current = self.slot(event.kind).as_ref().map(TimerHandle::event);
        if current != Some(event) {
            return false;
        }
        *self.slot(event.kind) = None;
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records what was scheduled instead of sleeping
    #[derive(Default)]
    pub struct RecordingScheduler {
        scheduled: Mutex<Vec<(Duration, TimerEvent)>>,
    }

    impl RecordingScheduler {
        pub fn scheduled(&self) -> Vec<(Duration, TimerEvent)> {
            self.scheduled.lock().unwrap().clone()
        }

        pub fn last(&self, kind: TimerKind) -> Option<(Duration, TimerEvent)> {
            self.scheduled()
                .into_iter()
                .rev()
                .find(|(_, event)| event.kind == kind)
        }
    }

    impl Scheduler for RecordingScheduler {
        fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle {
            self.scheduled.lock().unwrap().push((delay, event));
            TimerHandle::new(event, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingScheduler;
    use super::*;

    #[test]
    fn test_rearm_supersedes_previous() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let mut timers = Timers::new(scheduler.clone());

        let first = timers.arm(TimerKind::Retry, Duration::from_secs(10));
        let second = timers.arm(TimerKind::Retry, Duration::from_secs(10));
        assert_ne!(first.id, second.id);

        assert!(!timers.fire(first), "superseded timer must be ignored");
        assert!(timers.fire(second));
        assert!(!timers.is_armed(TimerKind::Retry));
        assert!(!timers.fire(second), "a timer fires once");
        assert_eq!(scheduler.scheduled().len(), 2);
    }

    #[test]
    fn test_kinds_are_independent() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let mut timers = Timers::new(scheduler);

        let lease = timers.arm(TimerKind::LeaseExpiry, Duration::from_secs(3600));
        let retry = timers.arm(TimerKind::Retry, Duration::from_secs(10));
        timers.cancel(TimerKind::Retry);

        assert!(timers.is_armed(TimerKind::LeaseExpiry));
        assert!(!timers.fire(retry));
        assert!(timers.fire(lease));
    }

    #[test]
    fn test_cancel_all() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let mut timers = Timers::new(scheduler);

        let lease = timers.arm(TimerKind::LeaseExpiry, Duration::from_secs(3600));
        let retry = timers.arm(TimerKind::Retry, Duration::from_secs(10));
        timers.cancel_all();

        assert!(!timers.fire(lease));
        assert!(!timers.fire(retry));
    }

    #[tokio::test]
    async fn test_tokio_scheduler_delivers_and_cancels() {
        let (handle, mut mailbox) = crate::agent::mailbox(8);
        let scheduler = TokioScheduler::new(&handle);

        let kept = TimerEvent {
            kind: TimerKind::Retry,
            id: 1,
        };
        let dropped = TimerEvent {
            kind: TimerKind::LeaseExpiry,
            id: 2,
        };
        let _kept = scheduler.schedule(Duration::from_millis(30), kept);
        scheduler.schedule(Duration::from_millis(10), dropped).cancel();

        let msg = tokio::time::timeout(Duration::from_secs(5), mailbox.recv())
            .await
            .expect("timer never fired");
        match msg {
            Some(AgentMessage::Timer(event)) => assert_eq!(event, kept),
            _ => panic!("expected the retry timer"),
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(mailbox.try_recv().is_err());
    }
}
