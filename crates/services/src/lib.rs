pub mod access;
pub mod common;
pub mod metrics_cache;
pub mod reporting;
pub mod sessions;

pub use access::AccessGateImpl;
pub use common::CoreError;
pub use metrics_cache::MokaMetricsCache;
pub use reporting::ReportingServiceImpl;
pub use sessions::{SessionStoreImpl, UserId};

#[cfg(test)]
mod test_utils;
