//! Host event subscriptions for auto-tracking.
//!
//! The controller never reaches into an editor. While a session is active it
//! holds one [`Subscription`] per [`EventTopic`], obtained from the host's
//! [`EventRegistry`]; the host forwards matching events to
//! `SessionController::on_file_focused` / `on_file_closed`. Teardown disposes
//! every subscription, and disposing twice is harmless.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTopic {
    FileFocused,
    FileClosed,
}

impl EventTopic {
    pub const AUTO_TRACK: [EventTopic; 2] = [EventTopic::FileFocused, EventTopic::FileClosed];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventTopic::FileFocused => "file-focused",
            EventTopic::FileClosed => "file-closed",
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Disposer = Box<dyn FnOnce() + Send>;

pub struct Subscription {
    topic: EventTopic,
    live: bool,
    disposer: Option<Disposer>,
}

impl Subscription {
    pub fn new(topic: EventTopic, disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            topic,
            live: true,
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Subscription with nothing to release on dispose.
    pub fn detached(topic: EventTopic) -> Self {
        Self {
            topic,
            live: true,
            disposer: None,
        }
    }

    pub fn topic(&self) -> EventTopic {
        self.topic
    }

    pub fn is_disposed(&self) -> bool {
        !self.live
    }

    pub fn dispose(&mut self) {
        self.live = false;
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

pub trait EventRegistry: Send {
    fn subscribe(&mut self, topic: EventTopic) -> Subscription;
}

/// Registry for hosts that route every event to the controller unconditionally.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRegistry;

impl EventRegistry for NullRegistry {
    fn subscribe(&mut self, topic: EventTopic) -> Subscription {
        Subscription::detached(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn dispose_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut sub = Subscription::new(EventTopic::FileClosed, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.dispose();
        sub.dispose();
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_disposes_live_subscription() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = Subscription::new(EventTopic::FileFocused, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!sub.is_disposed());
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_subscription_is_live_until_disposed() {
        let mut sub = NullRegistry.subscribe(EventTopic::FileFocused);
        assert!(!sub.is_disposed());
        sub.dispose();
        assert!(sub.is_disposed());
    }
}
