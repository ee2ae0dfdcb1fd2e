use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(User),
    SignedOut,
    /// Session picked up at start-up; `None` when nobody was signed in.
    Restored(Option<User>),
}

impl SessionEvent {
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionEvent::SignedIn(user) | SessionEvent::Restored(Some(user)) => Some(&user.id),
            SessionEvent::SignedOut | SessionEvent::Restored(None) => None,
        }
    }
}

/// Whoever decides which user is signed in.
///
/// Record stores never talk to this directly; the service subscribes once
/// and forwards the user id from each event.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<&User>;
    fn is_loading(&self) -> bool;
    fn subscribe(&mut self) -> Receiver<SessionEvent>;

    fn current_user_id(&self) -> Option<&str> {
        self.current_user().map(|u| u.id.as_str())
    }
}

/// In-process session state. Stays loading until the first `restore`,
/// `sign_in` or `sign_out`.
#[derive(Debug)]
pub struct Session {
    user: Option<User>,
    loading: bool,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user: None,
            loading: true,
            subscribers: Vec::new(),
        }
    }

    pub fn restore(&mut self, user: Option<User>) {
        self.user.clone_from(&user);
        self.loading = false;
        self.emit(&SessionEvent::Restored(user));
    }

    pub fn sign_in(&mut self, user: User) {
        self.user = Some(user.clone());
        self.loading = false;
        self.emit(&SessionEvent::SignedIn(user));
    }

    pub fn sign_out(&mut self) {
        self.user = None;
        self.loading = false;
        self.emit(&SessionEvent::SignedOut);
    }

    fn emit(&mut self, event: &SessionEvent) {
        // Receivers that were dropped unsubscribe themselves.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl IdentityProvider for Session {
    fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> User {
        User {
            id: "u-ana".to_string(),
            email: "ana@example.com".to_string(),
            name: Some("Ana".to_string()),
        }
    }

    #[test]
    fn test_session_starts_loading() {
        let session = Session::new();
        assert!(session.is_loading());
        assert!(session.current_user().is_none());
    }

    #[test]
    fn test_subscriber_sees_every_change() {
        let mut session = Session::new();
        let rx = session.subscribe();

        session.restore(None);
        session.sign_in(ana());
        session.sign_out();

        let events: Vec<SessionEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::Restored(None),
                SessionEvent::SignedIn(ana()),
                SessionEvent::SignedOut,
            ]
        );
        assert!(!session.is_loading());
    }

    #[test]
    fn test_current_user_id_tracks_sign_in() {
        let mut session = Session::new();
        session.sign_in(ana());
        assert_eq!(session.current_user_id(), Some("u-ana"));
        session.sign_out();
        assert!(session.current_user_id().is_none());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut session = Session::new();
        let rx = session.subscribe();
        drop(rx);
        session.sign_in(ana());
        assert!(session.subscribers.is_empty());
    }

    #[test]
    fn test_event_user_id() {
        assert_eq!(SessionEvent::SignedIn(ana()).user_id(), Some("u-ana"));
        assert_eq!(SessionEvent::Restored(Some(ana())).user_id(), Some("u-ana"));
        assert!(SessionEvent::Restored(None).user_id().is_none());
        assert!(SessionEvent::SignedOut.user_id().is_none());
    }
}
