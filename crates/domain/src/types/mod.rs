//! Cache data types

mod entry;
mod fingerprint;
mod param;
mod request;

pub use entry::{CacheEntry, EntryMetadata, EntryOrigin, StorageSummary};
pub use fingerprint::Fingerprint;
pub use param::ParamValue;
pub use request::{ComputationRequest, ComputationRequestBuilder};
