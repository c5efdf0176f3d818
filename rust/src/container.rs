//! Multi-value container model. A `Container` exclusively owns its sub-values;
//! each `SubValue` only remembers the id of the container it was placed in, so
//! there is no reference cycle and no placeholder owner object.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::single::SingleValueContainer;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("invalid argument: a container needs at least one sub-value")]
    InvalidArgument,
    #[error("index {index} is out of range for a container with {len} sub-values")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot access a sub-value because the container is empty")]
    EmptyContainer,
}

/// Implemented by every container kind. The name is also the file path used
/// by the persistence layer.
pub trait Named {
    fn name(&self) -> &str;
}

/// Process-unique identity of a `Container`, used as the non-owning
/// back-reference held by its sub-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(u64);

impl ContainerId {
    fn next() -> Self {
        ContainerId(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A single mutable string slot.
#[derive(Debug, Clone, Default)]
pub struct SubValue {
    value: String,
    owner: Option<ContainerId>,
}

impl SubValue {
    /// Builds a detached sub-value. The owner is assigned once the value is
    /// handed to `Container::with_items`.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            value: initial.into(),
            owner: None,
        }
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn owner(&self) -> Option<ContainerId> {
        self.owner
    }

    fn attach(&mut self, owner: ContainerId) {
        self.owner = Some(owner);
    }
}

impl fmt::Display for SubValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Named, ordered, non-empty list of sub-values persisted as one unit.
#[derive(Debug)]
pub struct Container {
    id: ContainerId,
    name: String,
    items: Vec<SubValue>,
}

impl Container {
    /// Creates a container holding one empty sub-value.
    pub fn new(name: impl Into<String>) -> Self {
        Self::assemble(name.into(), vec![SubValue::default()])
    }

    /// Creates a container from caller-supplied sub-values. Every item is
    /// re-attached to the new container.
    pub fn with_items(name: impl Into<String>, items: Vec<SubValue>) -> Result<Self, ContainerError> {
        if items.is_empty() {
            return Err(ContainerError::InvalidArgument);
        }
        Ok(Self::assemble(name.into(), items))
    }

    /// Convenience form of `with_items` taking plain strings.
    pub fn with_values<I, S>(name: impl Into<String>, values: I) -> Result<Self, ContainerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_items(name, values.into_iter().map(SubValue::new).collect())
    }

    fn assemble(name: String, mut items: Vec<SubValue>) -> Self {
        let id = ContainerId::next();
        for item in &mut items {
            item.attach(id);
        }
        Self { id, name, items }
    }

    fn check_index(&self, index: usize) -> Result<(), ContainerError> {
        if self.items.is_empty() {
            return Err(ContainerError::EmptyContainer);
        }
        if index >= self.items.len() {
            return Err(ContainerError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }

    /// Replaces the string held at `index`.
    pub fn set_value(&mut self, index: usize, value: impl Into<String>) -> Result<(), ContainerError> {
        self.check_index(index)?;
        self.items[index].set(value);
        Ok(())
    }

    /// Borrows the sub-value at `index`. It lives exactly as long as this
    /// container.
    pub fn item(&self, index: usize) -> Result<&SubValue, ContainerError> {
        self.check_index(index)?;
        Ok(&self.items[index])
    }

    pub fn value(&self, index: usize) -> Result<&str, ContainerError> {
        self.item(index).map(SubValue::value)
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SubValue] {
        &self.items
    }

    pub fn values(&self) -> impl Iterator<Item = &str> + '_ {
        self.items.iter().map(SubValue::value)
    }

    /// Whether `item` was attached to this container.
    pub fn owns(&self, item: &SubValue) -> bool {
        item.owner == Some(self.id)
    }

    /// One `SingleValueContainer` per sub-value, in order, all sharing this
    /// container's name.
    pub fn to_projection(&self) -> Vec<SingleValueContainer> {
        self.values()
            .map(|value| SingleValueContainer::with_value(self.name.clone(), value))
            .collect()
    }
}

impl Named for Container {
    fn name(&self) -> &str {
        &self.name
    }
}

// A clone is a new container: fresh id, items re-attached to it.
impl Clone for Container {
    fn clone(&self) -> Self {
        Self::assemble(self.name.clone(), self.items.clone())
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.values().eq(other.values())
    }
}

impl Eq for Container {}

impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let values: Vec<&str> = self.values().collect();
        let mut state = serializer.serialize_struct("Container", 2)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("values", &values)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct ContainerRecord {
    name: String,
    values: Vec<String>,
}

impl<'de> Deserialize<'de> for Container {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = ContainerRecord::deserialize(deserializer)?;
        Container::with_values(record.name, record.values).map_err(serde::de::Error::custom)
    }
}
