//! Strata API - desired-state documents and convergence records
//!
//! Shared data model for the orchestration side and the node agent:
//! - Object metadata and desired-state documents (`Config`, `Provider`,
//!   `Environment`, `Cluster`)
//! - Server pool types
//! - [`ManifestHash`], the fingerprint that drives convergence
//! - [`InstanceState`], the per-node convergence record
//!
//! # Example
//!
//! ```rust
//! use strata_api::{InstanceState, ManifestHash, ManifestState, PoolType};
//!
//! let hash = ManifestHash::compute(b"class { 'kubernetes::master': }");
//! let mut record = InstanceState::new("i-0abc", PoolType::Master);
//! record.spec.converge_hash = hash.to_string();
//! assert!(record.needs_converge());
//! ```

#![allow(missing_docs)]

pub mod cluster;
pub mod config;
pub mod environment;
pub mod error;
pub mod hash;
pub mod instance;
pub mod meta;
pub mod pool;
pub mod provider;

pub use cluster::{Cluster, ServerPool};
pub use config::Config;
pub use environment::{Environment, Image, Ssh};
pub use error::ApiError;
pub use hash::ManifestHash;
pub use instance::{
    InstanceState, InstanceStateSpec, InstanceStateStatus, InstanceStateStatusManifest,
    ManifestState,
};
pub use meta::{ObjectMeta, TypeMeta};
pub use pool::PoolType;
pub use provider::{Provider, ProviderAmazon, ProviderAzure, ProviderGcp, ProviderKind};

/// API group version carried in `apiVersion`
pub const API_VERSION: &str = "strata.io/v1alpha1";

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
