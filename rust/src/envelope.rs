//! Tagged wrapper written to disk so a stored blob names the container kind
//! it carries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::container::{Container, Named};
use crate::single::SingleValueContainer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Empty,
    Container,
    Single,
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EnvelopeKind::Empty => "empty envelope",
            EnvelopeKind::Container => "container",
            EnvelopeKind::Single => "single-value container",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// Carries nothing. Never written by `PersistenceHandler`.
    #[default]
    Empty,
    Container(Container),
    Single(SingleValueContainer),
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Empty => EnvelopeKind::Empty,
            Envelope::Container(_) => EnvelopeKind::Container,
            Envelope::Single(_) => EnvelopeKind::Single,
        }
    }

    /// Name of the carried container, which is also its target path.
    pub fn target(&self) -> Option<&str> {
        match self {
            Envelope::Empty => None,
            Envelope::Container(container) => Some(container.name()),
            Envelope::Single(single) => Some(single.name()),
        }
    }

    pub fn into_container(self) -> Option<Container> {
        match self {
            Envelope::Container(container) => Some(container),
            _ => None,
        }
    }

    pub fn into_single(self) -> Option<SingleValueContainer> {
        match self {
            Envelope::Single(single) => Some(single),
            _ => None,
        }
    }
}

impl From<Container> for Envelope {
    fn from(container: Container) -> Self {
        Envelope::Container(container)
    }
}

impl From<&Container> for Envelope {
    fn from(container: &Container) -> Self {
        Envelope::Container(container.clone())
    }
}

impl From<SingleValueContainer> for Envelope {
    fn from(single: SingleValueContainer) -> Self {
        Envelope::Single(single)
    }
}

impl From<&SingleValueContainer> for Envelope {
    fn from(single: &SingleValueContainer) -> Self {
        Envelope::Single(single.clone())
    }
}
