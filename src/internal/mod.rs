// Shared internals: the crate-wide error type and byte order helpers

pub mod endianness;
pub mod error;
