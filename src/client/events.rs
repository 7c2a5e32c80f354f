//! Warning event subscriptions
//!
//! Each client owns one registry. Handlers are invoked synchronously, in
//! subscription order, from the task that received the response.

use crate::fetch::Warning;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Events a client can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fewer than 10% of the rate-limit window remains
    RateLimitWarning,
    /// Fewer than 10% of the monthly quota remains
    QuotaWarning,
}

impl EventKind {
    /// Maps a pipeline warning onto its event
    pub fn of(warning: &Warning) -> Self {
        match warning {
            Warning::RateLimit { .. } => Self::RateLimitWarning,
            Warning::Quota { .. } => Self::QuotaWarning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimitWarning => "rateLimitWarning",
            Self::QuotaWarning => "quotaWarning",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Warning) + Send + Sync>;

/// Map of event kind to its subscribed handlers
#[derive(Default)]
pub struct EventRegistry {
    handlers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Warning) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler
    ///
    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sub, _)| *sub == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Invokes every handler subscribed to the warning's event kind
    ///
    /// Handlers run outside the registry lock, so a handler may subscribe or
    /// unsubscribe without deadlocking.
    pub fn emit(&self, warning: &Warning) {
        let targets: Vec<Handler> = {
            let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            handlers
                .get(&EventKind::of(warning))
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        for handler in targets {
            handler(warning);
        }
    }

    /// Number of handlers subscribed to a kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Drops every subscription
    pub fn clear(&self) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("rate_limit_handlers", &self.handler_count(EventKind::RateLimitWarning))
            .field("quota_handlers", &self.handler_count(EventKind::QuotaWarning))
            .finish()
    }
}
