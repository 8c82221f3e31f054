//! Roles and their cloud capabilities
//!
//! A [`Role`] is pure data: which provider permissions and load balancer
//! attachments a class of instance needs, and whether it owns storage that
//! has to survive a stack teardown. Resource generation reads it; nothing
//! here performs I/O.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Provider capability granted to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Attached to the Kubernetes API load balancer
    #[serde(rename = "ELBAPI")]
    ElbApi,
    /// Attached to the public ingress load balancer
    #[serde(rename = "ELBIngress")]
    ElbIngress,
    #[serde(rename = "IAMEC2Full")]
    IamEc2Full,
    #[serde(rename = "IAMEC2Read")]
    IamEc2Read,
    #[serde(rename = "IAMEC2ModifyInstanceAttributes")]
    IamEc2ModifyInstanceAttributes,
    #[serde(rename = "IAMELBFull")]
    IamElbFull,
}

impl Capability {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Capability::ElbApi => "ELBAPI",
            Capability::ElbIngress => "ELBIngress",
            Capability::IamEc2Full => "IAMEC2Full",
            Capability::IamEc2Read => "IAMEC2Read",
            Capability::IamEc2ModifyInstanceAttributes => "IAMEC2ModifyInstanceAttributes",
            Capability::IamElbFull => "IAMELBFull",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A class of instance within a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    name: String,
    prefix: String,
    stateful: bool,
    capabilities: BTreeSet<Capability>,
}

impl Role {
    #[must_use]
    pub fn new(stateful: bool, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            name: String::new(),
            prefix: String::new(),
            stateful,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Storage must be preserved across destroy
    #[inline]
    #[must_use]
    pub fn stateful(&self) -> bool {
        self.stateful
    }

    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }

    /// `<prefix>-<name>`, the base for every resource name derived from this role
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}-{}", self.prefix, self.name)
    }

    /// Empty field name, if any
    pub(crate) fn missing_field(&self) -> Option<&'static str> {
        if self.name.is_empty() {
            Some("name")
        } else if self.prefix.is_empty() {
            Some("prefix")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_identity() {
        let role = Role::new(
            false,
            [
                Capability::ElbApi,
                Capability::IamEc2Full,
                Capability::IamElbFull,
            ],
        )
        .with_name("master")
        .with_prefix("kubernetes");

        assert_eq!(role.identity(), "kubernetes-master");
        assert!(!role.stateful());
        assert!(role.has(Capability::ElbApi));
        assert!(!role.has(Capability::ElbIngress));
        assert_eq!(role.missing_field(), None);
    }

    #[test]
    fn missing_name_or_prefix() {
        let role = Role::new(true, []);
        assert_eq!(role.missing_field(), Some("name"));
        assert_eq!(role.with_name("etcd").missing_field(), Some("prefix"));
    }

    #[test]
    fn capability_wire_names() {
        let json = serde_json::to_string(&Capability::IamEc2ModifyInstanceAttributes).unwrap();
        assert_eq!(json, "\"IAMEC2ModifyInstanceAttributes\"");
    }
}
