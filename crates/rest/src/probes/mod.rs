//! Probes that bridge the persistence layer into the health aggregator.

mod storage;

pub use storage::StorageProbe;
