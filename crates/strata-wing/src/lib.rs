//! Strata Wing - per-instance convergence
//!
//! Runs on every instance of a cluster:
//! - Fingerprints the desired manifest
//! - Compares it with the hash the instance last converged on
//! - Applies configuration management only when they differ
//! - Records `converging`/`converged`/`error` for the real run and,
//!   separately, for an optional dry run
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_api::PoolType;
//! use strata_wing::{CommandApplier, ConvergeEngine, Manifest, MemoryStore};
//!
//! # async fn example() -> Result<(), strata_wing::WingError> {
//! let engine = ConvergeEngine::new(
//!     "i-0abc",
//!     PoolType::Worker,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(CommandApplier::new("puppet").with_args(["apply"])),
//!     "/var/lib/strata/dry-run",
//! );
//! let outcome = engine.converge(&Manifest::new("include kubernetes::worker")).await?;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

pub mod agent;
pub mod applier;
pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod store;
pub mod transition;

pub use agent::{Agent, CycleReport};
pub use applier::{Applier, ApplyMode, ApplyReport, CommandApplier, MANIFEST_PLACEHOLDER};
pub use config::{ApplyConfig, WingConfig};
pub use engine::{ConvergeEngine, Outcome};
pub use error::{ApplyError, Track, WingError};
pub use manifest::{FileManifestSource, Manifest, ManifestSource};
pub use store::{FileStore, InstanceStore, MemoryStore};
pub use transition::{allowed_transitions, validate_transition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
