use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastKind {
    #[default]
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub duration: Duration,
    shown_at: Instant,
}

impl Toast {
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= self.duration
    }
}

/// Ephemeral status messages. Holds at most one toast; showing a new one
/// replaces the old.
#[derive(Debug, Default)]
pub struct Toaster {
    current: Option<Toast>,
}

impl Toaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_for(&mut self, message: impl Into<String>, kind: ToastKind, duration: Duration) {
        self.show_at(message, kind, duration, Instant::now());
    }

    fn show_at(
        &mut self,
        message: impl Into<String>,
        kind: ToastKind,
        duration: Duration,
        now: Instant,
    ) {
        self.current = Some(Toast {
            message: message.into(),
            kind,
            duration,
            shown_at: now,
        });
    }

    #[must_use]
    pub fn current(&self) -> Option<&Toast> {
        self.current_at(Instant::now())
    }

    #[must_use]
    pub fn current_at(&self, now: Instant) -> Option<&Toast> {
        self.current.as_ref().filter(|t| !t.is_expired_at(now))
    }
}
