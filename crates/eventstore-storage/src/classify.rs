//! Write-time classification of event payloads
//!
//! A classifier derives one extra field from an event's payload, e.g. a log
//! line starting with `ERROR` gets `level = "ERROR"`.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::record::RESERVED_FIELDS;
use crate::{Result, StorageError};

/// Caller-supplied classification function
///
/// Returns the `(field, value)` pair to merge into the record, or `None` to
/// leave the record unchanged.
pub type ClassifyFn = Arc<dyn Fn(&Value) -> Option<(String, Value)> + Send + Sync>;

/// A validated wrapper around a classification function
#[derive(Clone)]
pub struct Classifier {
    func: ClassifyFn,
}

impl Classifier {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Option<(String, Value)> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Run the function and check the pair it returns
    pub fn classify(&self, event: &Value) -> Result<Option<(String, Value)>> {
        match (self.func)(event) {
            None => Ok(None),
            Some((field, _)) if field.is_empty() => Err(StorageError::Validation(
                "classification function returned an empty field name".to_string(),
            )),
            Some((field, _)) if RESERVED_FIELDS.contains(&field.as_str()) => {
                Err(StorageError::Validation(format!(
                    "classification function returned reserved field '{}'",
                    field
                )))
            }
            Some(pair) => Ok(Some(pair)),
        }
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Classifier(..)")
    }
}

impl From<RegexClassifier> for Classifier {
    fn from(rules: RegexClassifier) -> Self {
        Classifier::new(move |event| rules.classify(event))
    }
}

/// Ordered regex rules assigning a value to one field
///
/// The first rule whose pattern matches the payload wins. Non-string payloads
/// are matched against their JSON text.
#[derive(Debug, Clone)]
pub struct RegexClassifier {
    field: String,
    rules: Vec<(Regex, Value)>,
    fallback: Option<Value>,
}

impl RegexClassifier {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rules: Vec::new(),
            fallback: None,
        }
    }

    /// Append a rule; invalid patterns are configuration errors
    pub fn rule(mut self, pattern: &str, value: impl Into<Value>) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            StorageError::Configuration(format!("invalid classification pattern '{}': {}", pattern, e))
        })?;
        self.rules.push((regex, value.into()));
        Ok(self)
    }

    /// Value used when no rule matches
    pub fn fallback(mut self, value: impl Into<Value>) -> Self {
        self.fallback = Some(value.into());
        self
    }

    pub fn classify(&self, event: &Value) -> Option<(String, Value)> {
        let text = match event {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(&text))
            .map(|(_, value)| value.clone())
            .or_else(|| self.fallback.clone())
            .map(|value| (self.field.clone(), value))
    }
}
