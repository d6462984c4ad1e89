//! Mock REST API workbench: define projects of mock endpoints, import
//! OpenAPI specifications, and resolve in-process requests against them
//! through configurable response strategies.
//!
//! The crate is organized around a small set of components:
//!
//! - [`catalog`]: entity model, the persisted [`catalog::store::CatalogStore`]
//!   and project backup export/import.
//! - [`matcher`]: the pure Match Engine and its strategy rules.
//! - [`importer`]: OpenAPI path walking, `$ref` resolution and example
//!   generation.
//! - [`offload`]: background worker execution of engine work.
//! - [`service`]: the [`service::Workbench`] facade wiring it all together.

pub mod catalog;
pub mod error;
pub mod importer;
pub mod matcher;
pub mod offload;
pub mod service;

pub use catalog::store::CatalogStore;
pub use catalog::{Endpoint, LogEntry, MockResponse, Project, ProjectStatus, StoreData};
pub use error::{Error, Result};
pub use matcher::{MatchResult, RequestDescriptor};
pub use service::Workbench;
