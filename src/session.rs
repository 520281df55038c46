use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde::Serialize;
use tracing::debug;

use crate::model::user::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
        })
    }
}

type Listener = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct Inner {
    session: RwLock<Option<Session>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

/// Owns the single active session of the process and the listeners interested
/// in its transitions. Listeners run synchronously, in registration order.
#[derive(Clone, Default)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reinstates a previously persisted session without notifying anyone.
    pub fn restore(&self, session: Option<Session>) {
        *self.inner.session.write().unwrap_or_else(|e| e.into_inner()) = session;
    }

    pub fn current(&self) -> Option<Session> {
        self.inner
            .session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|session| session.user.id.clone())
    }

    pub fn sign_in(&self, session: Session) {
        debug!("Session started for user `{}`", session.user.id);
        *self.inner.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        self.notify(AuthEvent::SignedIn, Some(&session));
    }

    pub fn sign_out(&self) {
        let previous = self
            .inner
            .session
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(previous) = previous {
            debug!("Session ended for user `{}`", previous.user.id);
        }
        self.notify(AuthEvent::SignedOut, None);
    }

    /// Registers `listener` and immediately calls it with the current state.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);

        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener.clone()));

        match self.current() {
            Some(session) => listener(AuthEvent::SignedIn, Some(&session)),
            None => listener(AuthEvent::SignedOut, None),
        }

        Subscription {
            id,
            manager: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Drops every listener. Outstanding [`Subscription`]s become no-ops.
    pub fn shutdown(&self) {
        let dropped = std::mem::take(
            &mut *self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        debug!("Session manager shut down, dropped {} listeners", dropped.len());
    }

    fn notify(&self, event: AuthEvent, session: Option<&Session>) {
        // Snapshot first so a listener may (un)subscribe without deadlocking.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(event, session);
        }
    }
}

/// Registration handle returned by [`SessionManager::subscribe`]. The listener
/// is removed when the handle is unsubscribed or dropped.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    manager: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.manager.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|(id, _)| *id != self.id);
        }
    }
}
