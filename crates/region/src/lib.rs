//! # nebula-region
//!
//! Region pool allocator for request-scoped memory in Nebula workers.
//!
//! A [`Pool`] serves many small allocations by bump-carving them from a
//! chain of equally sized blocks, and serves larger requests straight from
//! the heap while tracking them. Nothing small is freed individually: the
//! whole pool is reclaimed at once by [`Pool::reset`] (blocks are kept for
//! the next cycle) or when the pool is dropped.
//!
//! Resources that are not pool memory (file handles, buffers owned
//! elsewhere) are tied to the pool with cleanup handlers, run on reset or
//! teardown in most-recently-registered-first order.
//!
//! ## Quick Start
//!
//! ```rust
//! use nebula_region::prelude::*;
//!
//! let mut pool = Pool::new(4096)?;
//!
//! let header = pool.alloc_value([0u8; 48])?;
//! header[0] = 1;
//! let name = pool.alloc_str("request-42")?;
//! assert_eq!(name, "request-42");
//!
//! pool.register_drop(String::from("released with the pool"))?;
//!
//! pool.reset();
//! # Ok::<(), nebula_region::PoolError>(())
//! ```
//!
//! ## Features
//!
//! - `logging` (default): structured events through `tracing`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Pool memory is handed out as raw bytes and cast to the caller's type
#![allow(clippy::cast_ptr_alignment)]

// Error types
pub mod error;

pub mod config;
pub mod types;
pub mod utils;

mod block;
mod cleanup;
mod large;
mod pool;

pub use crate::cleanup::{Cleanup, CleanupHandler};
pub use crate::config::PoolConfig;
pub use crate::error::{PoolError, PoolResult};
pub use crate::pool::Pool;

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::cleanup::{Cleanup, CleanupHandler};
    pub use crate::config::PoolConfig;
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::pool::Pool;
    pub use crate::types::size::DEFAULT_POOL_SIZE;
}
