//! Notification Sub-machine
//! Transient success/error toasts, queued and auto-dismissed independently
//! of the machine that broadcast them

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};


/// Default time a toast stays visible.
pub const DEFAULT_TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

/// A queued toast
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub severity: Severity,
    /// When the toast should disappear
    pub expires_at: Instant,
}

/// FIFO toast queue with deadline-based dismissal.
#[derive(Debug)]
pub struct NotificationMachine {
    queue: VecDeque<Toast>,
    ttl: Duration,
}

impl NotificationMachine {
    pub fn new(ttl: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            ttl,
        }
    }

    pub fn broadcast(&mut self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        log::debug!("toast ({severity:?}): {message}");
        self.queue.push_back(Toast {
            message,
            severity,
            expires_at: Instant::now() + self.ttl,
        });
    }

    /// Drop every toast whose deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        self.queue.retain(|toast| toast.expires_at > now);
    }

    pub fn active(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for NotificationMachine {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_TTL)
    }
}

/// Send-only handle to a spawned notification machine. The lifecycle machine
/// broadcasts through it and never inspects the queue; the UI shell keeps a
/// clone for ticking and rendering.
#[derive(Clone, Default)]
pub struct NotifyHandle(Rc<RefCell<NotificationMachine>>);

impl NotifyHandle {
    pub fn new(ttl: Duration) -> Self {
        Self(Rc::new(RefCell::new(NotificationMachine::new(ttl))))
    }

    pub fn broadcast(&self, message: impl Into<String>, severity: Severity) {
        self.0.borrow_mut().broadcast(message, severity);
    }

    pub fn tick(&self, now: Instant) {
        self.0.borrow_mut().tick(now);
    }

    /// Snapshot of the currently visible toasts.
    pub fn toasts(&self) -> Vec<Toast> {
        self.0.borrow().active().cloned().collect()
    }
}
