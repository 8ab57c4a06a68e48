use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::Properties;

/// Accumulates entity/relationship properties. Absent optionals are omitted.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    inner: Map<String, Value>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inner.insert(name.to_string(), value.into());
        self
    }

    pub fn set_opt<T: Into<Value>>(mut self, name: &str, value: Option<T>) -> Self {
        if let Some(v) = value {
            self.inner.insert(name.to_string(), v.into());
        }
        self
    }

    /// Copy a raw source value, keeping explicit `null`s.
    pub fn set_raw(mut self, name: &str, value: Option<&Value>) -> Self {
        if let Some(v) = value {
            self.inner.insert(name.to_string(), v.clone());
        }
        self
    }

    /// Copy every field of a raw source object that appears in `fields`.
    pub fn copy_fields(mut self, source: &Map<String, Value>, fields: &[&str]) -> Self {
        for field in fields {
            if let Some(v) = source.get(*field) {
                self.inner.insert(field.to_string(), v.clone());
            }
        }
        self
    }

    /// `tag.{name}` for each resource tag.
    pub fn tags(mut self, tags: Option<&BTreeMap<String, String>>) -> Self {
        if let Some(tags) = tags {
            for (name, value) in tags {
                self.inner.insert(format!("tag.{}", name), Value::from(value.as_str()));
            }
        }
        self
    }

    /// Flatten scalar properties of a serializable value under `{prefix}{Name}`.
    /// Nested objects and arrays are skipped.
    pub fn prefixed<T: Serialize>(mut self, prefix: &str, source: Option<&T>) -> Self {
        let Some(Value::Object(object)) = source.and_then(|s| serde_json::to_value(s).ok()) else {
            return self;
        };
        for (name, value) in object {
            if value.is_object() || value.is_array() || value.is_null() {
                continue;
            }
            self.inner.insert(format!("{}{}", prefix, capitalize_first(&name)), value);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    pub fn build(self) -> Properties {
        self.inner
    }
}

pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// RFC 3339 timestamp to epoch milliseconds. Unparseable values are treated as absent.
pub fn get_time(timestamp: Option<&str>) -> Option<i64> {
    let ts = timestamp?;
    match DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => Some(dt.timestamp_millis()),
        Err(e) => {
            log::debug!("Ignoring unparseable timestamp {:?}: {}", ts, e);
            None
        }
    }
}
