//! Typed per-request value store.
//!
//! Middleware use it to hand values down the chain without widening
//! [`HttpRequest`](crate::HttpRequest): the request id, the effective post
//! size limit, a pre-built crash entry. One value per type; values are held
//! in an `Arc` so the store clones cheaply along with the request.
//!
//! ```rust
//! use scrivener_core::Extensions;
//!
//! let mut ext = Extensions::new();
//! ext.insert(42u64);
//! assert_eq!(ext.get::<u64>(), Some(&42));
//! assert!(ext.get::<String>().is_none());
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing any earlier value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Store a shared value; later readers see the same allocation.
    pub fn insert_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.map.insert(TypeId::of::<T>(), value);
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Returns true if a value was removed.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> bool {
        self.map.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("count", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Limit(u64);

    #[test]
    fn test_typed_lookup() {
        let mut ext = Extensions::new();
        ext.insert(Limit(1024));
        ext.insert("req-1".to_string());

        assert_eq!(ext.get::<Limit>(), Some(&Limit(1024)));
        assert_eq!(ext.get::<String>().map(String::as_str), Some("req-1"));
        assert_eq!(ext.len(), 2);
    }

    #[test]
    fn test_replace_and_remove() {
        let mut ext = Extensions::new();
        ext.insert(Limit(1));
        ext.insert(Limit(2));
        assert_eq!(ext.get::<Limit>(), Some(&Limit(2)));

        assert!(ext.remove::<Limit>());
        assert!(!ext.remove::<Limit>());
        assert!(ext.is_empty());
    }

    #[test]
    fn test_shared_value_survives_clone() {
        let shared = Arc::new(Limit(7));
        let mut ext = Extensions::new();
        ext.insert_arc(shared.clone());

        let cloned = ext.clone();
        let fetched = cloned.get_arc::<Limit>().unwrap();
        assert!(Arc::ptr_eq(&shared, &fetched));
    }
}
