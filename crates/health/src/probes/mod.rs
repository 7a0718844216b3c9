//! Built-in probes.
//!
//! Probes that talk to external services are written against small client
//! traits ([`CacheClient`], [`ObjectStoreClient`]). Concrete clients live
//! behind the `redis` and `s3` features.

mod alerting;
mod cache;
mod job_queue;
mod object_store;
mod scratch_dir;
mod self_check;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "s3")]
mod s3;

pub use alerting::AlertingProbe;
pub use cache::{CacheClient, CacheProbe, ROUNDTRIP_TTL, parse_info};
pub use job_queue::JobQueueProbe;
pub use object_store::{ObjectStoreClient, ObjectStoreProbe};
pub use scratch_dir::ScratchDirProbe;
pub use self_check::{EnvLookup, SelfCheckProbe, process_env};

#[cfg(feature = "redis")]
pub use self::redis::RedisCacheClient;
#[cfg(feature = "s3")]
pub use s3::{S3ObjectStoreClient, S3Settings};
