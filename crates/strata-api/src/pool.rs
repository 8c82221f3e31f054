//! Server pool types

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical class of instances within a cluster
///
/// Stacks map each pool type they provision to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    Etcd,
    Master,
    /// Kubernetes worker nodes; older documents call these `node`
    #[serde(alias = "node")]
    Worker,
    Vault,
    Bastion,
    Jenkins,
}

impl PoolType {
    pub const ALL: [PoolType; 6] = [
        PoolType::Etcd,
        PoolType::Master,
        PoolType::Worker,
        PoolType::Vault,
        PoolType::Bastion,
        PoolType::Jenkins,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PoolType::Etcd => "etcd",
            PoolType::Master => "master",
            PoolType::Worker => "worker",
            PoolType::Vault => "vault",
            PoolType::Bastion => "bastion",
            PoolType::Jenkins => "jenkins",
        }
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(PoolType::Worker),
            other => PoolType::ALL
                .into_iter()
                .find(|p| p.as_str() == other)
                .ok_or_else(|| ApiError::UnknownPoolType(other.to_string())),
        }
    }
}
