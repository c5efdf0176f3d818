//! Container that stores one string value directly, without a sub-value list.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::container::Named;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleValueContainer {
    name: String,
    value: String,
}

impl SingleValueContainer {
    /// Creates a container with an empty value.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_value(name, String::new())
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Named for SingleValueContainer {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SingleValueContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
