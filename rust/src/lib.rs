//! Named string containers that persist to a single binary file each.
//! A `Container` holds an ordered list of values, a `SingleValueContainer`
//! holds one; `PersistenceHandler` writes either to the path given by the
//! container's name and restores it later, optionally sealed with a vault key.

pub mod config;
pub mod container;
pub mod crypto;
pub mod envelope;
pub mod persistence;
pub mod single;

pub use container::{Container, ContainerError, ContainerId, Named, SubValue};
pub use envelope::{Envelope, EnvelopeKind};
pub use persistence::{PersistError, PersistenceHandler};
pub use single::SingleValueContainer;
