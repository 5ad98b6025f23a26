//! State and event core of the Collectible Realm client.
//!
//! Three primitives implement unidirectional data flow between services
//! (writers) and view modules (readers):
//!
//! - [`store`] -- a reactive container of immutable snapshots
//! - [`bus`] -- synchronous named publish/subscribe
//! - [`registry`] -- ordered module construction and async initialization
//!
//! Supporting modules:
//!
//! - [`config`] -- YAML configuration with local and environment overrides
//! - [`logging`] -- tracing setup and the in-memory [`LogHistory`]
//! - [`time`] -- clock arithmetic for time-windowed rules
//!
//! Nothing here is global: every store, bus, registry and history is an
//! ordinary value owned by whoever builds the application.

pub mod bus;
pub mod config;
pub mod logging;
pub mod registry;
pub mod state;
pub mod store;
pub mod subscription;
pub mod time;

pub use bus::EventBus;
pub use config::{AppConfig, ConfigError};
pub use logging::{init_tracing, LogHistory, LogRecord};
pub use registry::{InitReport, InitStage, Module, ModuleFailure, ModuleRegistry, ModuleStatus};
pub use state::{RealmBus, RealmStore};
pub use store::{Change, Shared, StateShape, Store, UpdateContext};
pub use subscription::Subscription;
