//! # Labstore
//!
//! Data access for a lab-component lending portal, over two stores: an
//! authoritative remote document store and a device-local store that keeps
//! the portal usable while the network is gone.
//!
//! ## Features
//!
//! - Typed records with `#[derive(Record)]`
//! - Pluggable remote and local backends
//! - Automatic failover to the local store on connectivity loss
//! - Replication of offline writes once connectivity returns
//! - Login session bookkeeping and dashboard statistics

extern crate self as labstore;

mod btreemap;
mod codec;
mod connectivity;
mod errors;
mod inventory;
mod local_adapter;
mod memory_remote;
mod migrator;
mod query;
mod records;
mod remote_adapter;
mod router;
mod session;
mod settings;
mod stats;
mod traits;

pub use btreemap::MemoryStore;
pub use connectivity::{ManualClock, ManualConnectivity, SystemClock};
pub use inventory::{StockError, stock_delta};
pub use labstore_derive::Record;
pub use local_adapter::{LocalAdapter, PendingRecord};
pub use memory_remote::MemoryRemote;
pub use migrator::{
    DEFAULT_REPLICATED_KINDS, MigrationReport, ReplicationFailure, ReplicationMigrator,
};
pub use query::{Direction, Document, Filter, Order, Query, compare_values};
pub use records::*;
pub use remote_adapter::RemoteAdapter;
pub use router::{FailoverRouter, Mode, RouterOptions};
pub use session::{SessionLifecycleManager, SessionPolicy};
pub use settings::{
    CONFIG_FILE, ENV_PREFIX, LocalSettings, LogSettings, ReplicationSettings, RouterSettings,
    Settings,
};
pub use stats::SystemStats;
pub use traits::*;

pub use crate::errors::{BatchError, Error, LocalError, Rejection, RemoteError, Result};
