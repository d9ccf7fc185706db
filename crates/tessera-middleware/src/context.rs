//! Per-request middleware context.
//!
//! A fresh [`MiddlewareContext`] is created for every request and handed from
//! middleware to middleware along with the request. It carries the request id,
//! the mount path of the middleware currently running, and typed extensions
//! that middlewares use to pass data down the chain.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use uuid::Uuid;

/// Request identifier (UUID v7, so ids sort by creation time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Context that flows through the middleware chain with each request.
///
/// # Example
///
/// ```
/// use tessera_middleware::MiddlewareContext;
///
/// #[derive(Clone)]
/// struct SessionUser(String);
///
/// let mut ctx = MiddlewareContext::new();
/// ctx.set_extension(SessionUser("alice".to_string()));
///
/// assert_eq!(ctx.get_extension::<SessionUser>().unwrap().0, "alice");
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    request_id: RequestId,
    mount_path: String,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a given request id.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            mount_path: "/".to_string(),
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// The request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The path prefix under which the running middleware matched this request.
    #[must_use]
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    pub(crate) fn set_mount_path(&mut self, mount_path: &str) {
        mount_path.clone_into(&mut self.mount_path);
    }

    /// Sets the mount path and returns the one it replaces.
    pub(crate) fn replace_mount_path(&mut self, mount_path: &str) -> String {
        std::mem::replace(&mut self.mount_path, mount_path.to_string())
    }

    /// Time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value, replacing any previous value of that type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_request_id_is_v7() {
        assert_eq!(RequestId::new().as_uuid().get_version_num(), 7);
    }

    #[test]
    fn test_extensions() {
        let mut ctx = MiddlewareContext::new();
        assert!(!ctx.has_extension::<u32>());

        ctx.set_extension(42_u32);
        assert_eq!(ctx.get_extension::<u32>(), Some(&42));

        assert_eq!(ctx.remove_extension::<u32>(), Some(42));
        assert!(ctx.get_extension::<u32>().is_none());
    }

    #[test]
    fn test_mount_path_defaults_to_root() {
        let mut ctx = MiddlewareContext::new();
        assert_eq!(ctx.mount_path(), "/");
        ctx.set_mount_path("/api");
        assert_eq!(ctx.mount_path(), "/api");
    }
}
