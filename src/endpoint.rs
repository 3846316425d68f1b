use arc_swap::ArcSwap;
use std::sync::Arc;

/// The `host:port` the next request is sent to.
///
/// A best-effort hint shared by all concurrent requests: loads and stores
/// are atomic, but two requests racing on a rewrite may see the older value
/// or overwrite each other. Requests are never serialized behind it.
#[derive(Clone, Debug)]
pub struct EndpointState(Arc<ArcSwap<String>>);

impl EndpointState {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(endpoint.into())))
    }

    pub fn load(&self) -> Arc<String> {
        self.0.load_full()
    }

    pub fn store(&self, endpoint: impl Into<String>) {
        self.0.store(Arc::new(endpoint.into()));
    }

    /// Store `next` unless it is empty or already current. Returns whether
    /// the value changed.
    pub fn rewrite(&self, next: &str) -> bool {
        if next.is_empty() || self.load().as_str() == next {
            return false;
        }
        self.store(next);
        true
    }
}
