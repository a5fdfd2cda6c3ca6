//! Pulls the Louisville Metro property foreclosure layer out of its ArcGIS
//! feature service, page by page, and writes it to one CSV file with a fixed
//! column layout.
//!
//! Pages are fetched by a fixed pool of threads, so row order follows arrival
//! order and varies between runs. Pages that fail are logged and skipped; the
//! resulting file may hold fewer rows than the remote collection.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod normalize;
pub mod record;
pub mod writer;

pub use client::{FetchError, PageSource, QueryClient};
pub use config::{FetchConfig, CANONICAL_COLUMNS};
pub use coordinator::{FetchCoordinator, FetchOutcome, FetchSummary};
pub use normalize::normalize_value;
pub use record::{AttributeRecord, AttributeValue};
pub use writer::{DatasetWriter, WriteOutcome};
