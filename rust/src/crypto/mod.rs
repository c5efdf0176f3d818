//! Optional sealing of stored envelopes plus the hashing helpers it relies on.

pub mod integrity;
pub mod secrets;
