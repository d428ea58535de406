//! Fetch pipeline: group resolution, planning, bounded concurrent transfers,
//! and archive packaging.

pub mod archive;
pub mod fetcher;
pub mod mime_detect;
pub mod plan;
pub mod resolver;
pub mod transfer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use archive::{append, append_async, extract_all, extract_all_async, ArchiveFormat};
pub use fetcher::{
    fetch_all, FetchEvent, FetchOptions, FetchStream, FetchedFile, OmittedMember, DEFAULT_CONCURRENCY,
};
pub use mime_detect::{detect_mime_type, is_archive};
pub use plan::{plan_fetch, FetchBatch, FetchPlan};
pub use resolver::{GroupResolver, ResolvedGroup, DEFAULT_GROUP_RADIUS};
pub use transfer::TransferUnit;
