//! Local resource handles for the browser client
//!
//! A handle is an opaque `blob:quikturn/<n>` URL standing in for a decoded
//! logo held in memory. The store owns every resource it hands out; nothing
//! is released until the owner calls `release`, supersedes the handle with a
//! fresh fetch of the same request, or tears the store down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// Prefix of every handle URL
pub const HANDLE_SCHEME: &str = "blob:quikturn/";

/// A decoded logo held behind a handle
#[derive(Debug, Clone, PartialEq)]
pub struct LocalResource {
    pub bytes: Arc<[u8]>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct Inner {
    resources: HashMap<String, LocalResource>,
    /// Request URL -> handle currently representing it
    by_source: HashMap<String, String>,
}

/// Owner of all handles created by one client
#[derive(Debug, Default)]
pub struct HandleStore {
    next: AtomicU64,
    inner: Mutex<Inner>,
}

impl HandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource and returns its handle
    ///
    /// If `source` already has a live handle, that handle is released first.
    pub fn create(&self, source: &str, bytes: Vec<u8>, content_type: &str) -> String {
        let handle = format!(
            "{}{}",
            HANDLE_SCHEME,
            self.next.fetch_add(1, Ordering::Relaxed) + 1
        );

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = inner.by_source.insert(source.to_string(), handle.clone()) {
            inner.resources.remove(&old);
            trace!("Superseded handle {} for {}", old, source);
        }
        inner.resources.insert(
            handle.clone(),
            LocalResource {
                bytes: bytes.into(),
                content_type: content_type.to_string(),
            },
        );

        handle
    }

    /// Looks up the resource behind a handle
    pub fn resolve(&self, handle: &str) -> Option<LocalResource> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resources
            .get(handle)
            .cloned()
    }

    /// Releases one handle, returning false if it was not live
    pub fn release(&self, handle: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.resources.remove(handle).is_none() {
            return false;
        }
        inner.by_source.retain(|_, h| h != handle);
        true
    }

    /// Releases every handle and returns how many were live
    pub fn release_all(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let count = inner.resources.len();
        inner.resources.clear();
        inner.by_source.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resources
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
