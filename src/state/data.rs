// src/state/data.rs

//! Named values attached to the state, a change or a task.
//!
//! Values are held in their encoded JSON form and decoded again on every
//! read, so the reader decides the shape. A value the writer cannot encode
//! or the reader cannot decode means writer and reader disagree about the
//! data, which is a fatal fault rather than an error.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, StateError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataBag {
    entries: BTreeMap<String, Value>,
}

impl DataBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn raw(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub(crate) fn insert_raw(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}

/// Encode `value` for storage under `key`.
///
/// `owner` names the bag in the panic message, e.g. `state entry` or
/// `task 3 data entry`.
pub(crate) fn encode<T: Serialize + ?Sized>(owner: &str, key: &str, value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => panic!("internal error: could not marshal value for {owner} {key:?}: {e}"),
    }
}

/// Decode a stored value into the caller's shape.
///
/// `raw` is `None` when the key is absent.
pub(crate) fn decode<T: DeserializeOwned>(owner: &str, key: &str, raw: Option<Value>) -> Result<T> {
    let raw = raw.ok_or_else(|| StateError::NoState(key.to_string()))?;
    match serde_json::from_value::<T>(raw) {
        Ok(v) => Ok(v),
        Err(e) => panic!("internal error: could not unmarshal {owner} {key:?}: {e}"),
    }
}
