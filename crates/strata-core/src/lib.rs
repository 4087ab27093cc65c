//! # strata-core
//!
//! Core abstractions shared by the strata ingestion bridge.
//!
//! - **Storage**: the append-only object store contract the pipeline publishes to
//! - **Clock**: injectable wall-clock used for partition routing
//! - **Error Types**: shared error definitions and result types
//! - **Observability**: logging initialisation and span helpers
//!
//! ## Example
//!
//! ```rust
//! use strata_core::prelude::*;
//!
//! let backend = MemoryBackend::new();
//! let clock = SystemClock;
//! let _now = clock.now();
//! # drop(backend);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod error;
pub mod observability;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::error::{Error, Result};
    pub use crate::storage::{MemoryBackend, ObjectMeta, ObjectStoreBackend, StorageBackend};
}

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
pub use storage::{MemoryBackend, ObjectMeta, ObjectStoreBackend, StorageBackend};
