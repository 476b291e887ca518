// flutterdb-core/src/lib.rs
// Pure Rust API - NO Python/PyO3 dependencies

// Allow clippy lints that are too strict for this codebase
#![allow(clippy::too_many_arguments)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::field_reassign_with_default)]
// Tests may have helper functions not used in all test cases
#![cfg_attr(test, allow(dead_code))]

pub mod aggregation;
pub mod collection;
pub mod document;
pub mod error;
pub mod id;
pub mod logging;
pub mod query;
pub mod storage;
pub mod store;
pub mod value_utils;

// Public exports
pub use aggregation::{CollectionLookup, Pipeline};
pub use collection::Collection;
pub use document::{Document, DocumentId};
pub use error::{Error, Result};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use storage::{Options, SqliteStorage};
pub use store::Store;
