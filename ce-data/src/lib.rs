//! Remote data plane: the read-only customer directory and the agent/order
//! registry, each behind a trait so the conversation core can run against
//! fixtures.

mod cache;
mod dataset;
mod directory;
mod error;
mod nocodb;
mod registry;

pub use cache::{
    CachedDataset, DEFAULT_PRIMARY_TTL, DEFAULT_UNAVAILABLE_TTL, DatasetSnapshot, DirectoryCache,
    Freshness, RefreshFailurePolicy, SlotPolicy, SlotStatus,
};
pub use dataset::{CellValue, Column, Dataset, DatasetKind, Row};
pub use directory::{DirectoryGateway, RedashDirectory, RedashQuery, parse_query_results};
pub use error::{DirectoryError, RegistryError};
pub use nocodb::{NocoDbRegistry, RegistryFields, RegistryTables};
pub use registry::{Agent, Assignment, Lookup, NewAgent, Order, RegistryGateway};
