use dashmap::DashMap;
use std::{any::Any, fmt, sync::Arc};

type Value = Arc<dyn Any + Send + Sync>;

/// Named, heterogeneous attributes of a container scope (request, session,
/// page or application).
#[derive(Default)]
pub struct AttributeMap {
    values: DashMap<String, Value>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Arc::new(value));
    }

    /// The attribute, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = self.values.get(name)?.value().clone();
        value.downcast::<T>().ok()
    }

    /// Removes the attribute and returns it if it was of type `T`.
    pub fn take<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let (_, value) = self.values.remove(name)?;
        value.downcast::<T>().ok()
    }

    pub fn remove(&self, name: &str) -> bool {
        self.values.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Attribute names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for AttributeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeMap")
            .field("names", &self.names())
            .finish()
    }
}
