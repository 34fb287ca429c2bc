//! # pgmodel
//!
//! A REST-style data-mapping and query-construction layer for PostgreSQL.
//!
//! ## Features
//!
//! - **Declared entities**: an entity maps external field names to physical
//!   columns; callers never see column names or join syntax
//! - **Composable joins**: related entities are joined on request and their
//!   fields appear as `{related}_{field}`
//! - **Request-driven shape**: projection, ordering, grouping and pagination
//!   come from reserved parameters (`xreturn`, `xorder_by`, ...)
//! - **Validation gate**: required fields and field rules are checked before
//!   any SQL is built
//! - **Safe by default**: values are escaped literals; only a fixed list of
//!   SQL constants is ever emitted unquoted
//! - **Query monitoring**: timing, logging and hooks around any driver
//!
//! ## Entities
//!
//! ```toml
//! # models/item.toml
//! table = "item"
//!
//! [mapping]
//! id = "id"
//! name = "item_name"
//! category = "category_id"
//!
//! [required]
//! put = ["name"]
//! delete = ["id"]
//!
//! [joins]
//! category = "LEFT JOIN category ON item.category_id = category.id"
//! ```
//!
//! ## Dispatch
//!
//! ```ignore
//! use pgmodel::{EntityRegistry, Params};
//!
//! let registry = EntityRegistry::load_dir("models")?;
//!
//! // SELECT * FROM item WHERE item_name LIKE '%lamp%'
//! let rows = registry
//!     .model("item", Params::new().with("name", "%lamp%"))?
//!     .get(&client)
//!     .await?;
//!
//! // INSERT INTO item (item_name) VALUES ('desk') RETURNING id
//! let info = registry
//!     .model("item", Params::new().with("name", "desk"))?
//!     .put(&client)
//!     .await?;
//! println!("new id: {:?}", info.last_insert_id);
//! ```

pub mod changeset;
pub mod clause;
pub mod config;
pub mod dialect;
pub mod driver;
pub mod entity;
pub mod error;
pub mod ident;
pub mod join;
pub mod mapper;
pub mod model;
pub mod monitor;
pub mod params;
pub mod registry;
pub mod validate;

#[cfg(feature = "pool")]
pub mod pool;

#[doc(hidden)]
pub use inventory;

pub use changeset::{ValidationCode, ValidationError, ValidationErrors};
pub use clause::{ClauseBuilder, QueryShape, SortOrder};
pub use config::{ModelConfig, ReservedKeys};
pub use dialect::{Dialect, Postgres};
pub use driver::{Driver, DriverOutput, RawRow, WriteInfo};
pub use entity::{EntityDef, QueryDefaults, RequiredFields, Verb};
pub use error::{ModelError, ModelResult};
pub use ident::Ident;
pub use join::{JoinResolver, Related};
pub use mapper::{FieldMapper, WriteValue};
pub use model::{DispatchState, Model, Outcome, Record};
pub use monitor::{
    CompositeHook, CompositeMonitor, HookAction, InstrumentedDriver, LoggingMonitor,
    MonitorConfig, MonitorSettings, NoopMonitor, QueryContext, QueryHook, QueryMonitor,
    QueryResult, QueryStats, QueryType, StatsMonitor, TracingSqlHook,
};
pub use params::{ParamValue, Params, strip_tags};
pub use registry::{EntityRegistration, EntityRegistry};
pub use validate::{Rule, RuleValidator, Validator};
