// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read access to application state for `state_flag` predicates

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateReadError {
    #[error("state unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of application state
pub trait StateReader: Clone + Send + Sync + 'static {
    /// Value stored under `key`, if any
    fn read(&self, key: &str) -> Result<Option<Value>, StateReadError>;
}

/// State reader backed by a shared map
#[derive(Clone, Debug, Default)]
pub struct MapStateReader {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl MapStateReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

impl StateReader for MapStateReader {
    fn read(&self, key: &str) -> Result<Option<Value>, StateReadError> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }
}

/// Whether a state value counts as set
///
/// `null`, `false`, `0`, `""`, empty arrays and empty objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
