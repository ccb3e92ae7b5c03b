//! Per-request key/value scratch space.

use std::any::Any;
use std::collections::HashMap;

/// Reserved key under which the body parser caches the raw request body.
pub const BODY_KEY: &str = "body";

/// String-keyed map of arbitrary values, shared by every handler of one
/// request. Middleware uses it to hand data (parsed body, user ids, …) to
/// the handlers that follow.
#[derive(Default)]
pub struct Storage {
    data: HashMap<String, Box<dyn Any + Send>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value`, replacing whatever was stored under `key`.
    pub fn set<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// Returns the value under `key` if it exists *and* has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.data.get_mut(key)?.downcast_mut::<T>()
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Accepts both `String` and `&'static str` values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        let value = self.data.get(key)?;
        value
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| value.downcast_ref::<&'static str>().copied())
    }

    pub fn get_u8(&self, key: &str) -> Option<u8> {
        self.get::<u8>(key).copied()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get::<i64>(key).copied()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get::<f64>(key).copied()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get::<bool>(key).copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
