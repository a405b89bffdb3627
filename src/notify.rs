//! User-visible notifications raised at operation boundaries

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.level {
            Level::Success => "✅",
            Level::Warning => "⚠️ ",
            Level::Error => "❌",
        };
        write!(f, "{icon} {}", self.message)
    }
}

/// Sink for notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Prints notifications for a terminal user
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Success => println!("{notification}"),
            Level::Warning | Level::Error => eprintln!("{notification}"),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Keeps every notification for later inspection
    #[derive(Debug, Clone, Default)]
    pub struct RecordingNotifier {
        seen: Arc<Mutex<Vec<Notification>>>,
    }

    impl RecordingNotifier {
        pub fn last(&self) -> Option<Notification> {
            self.seen.lock().unwrap().last().cloned()
        }

        pub fn clear(&self) {
            self.seen.lock().unwrap().clear();
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.seen.lock().unwrap().push(notification);
        }
    }
}
