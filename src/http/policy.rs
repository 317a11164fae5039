use super::serve::RequestContext;

/// Decides whether a response body is treated as changed since its
/// fingerprint was cached, which forces a rehash before the `ETag` is sent
pub trait ModificationPolicy: Send + Sync {
    fn body_modified(&self, ctx: &RequestContext) -> bool;
}

/// Always rehash
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysModified;

impl ModificationPolicy for AlwaysModified {
    fn body_modified(&self, _ctx: &RequestContext) -> bool {
        true
    }
}

/// Trust the cache, entries are already invalidated by modification time
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheTrusted;

impl ModificationPolicy for CacheTrusted {
    fn body_modified(&self, _ctx: &RequestContext) -> bool {
        false
    }
}
