//! Access policy.
//!
//! # Design Decisions
//! - Membership sets are hash sets built once from config
//! - A service in neither set is rejected, never defaulted
//! - Public is checked before private; config validation keeps them disjoint

use std::collections::HashSet;

use crate::config::PolicyConfig;

/// A set of names with O(1) membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet(HashSet<String>);

impl NameSet {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    Public,
    Private,
}

#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    public: NameSet,
    private: NameSet,
    admins: NameSet,
    private_access: bool,
}

impl AccessPolicy {
    pub fn new(public: NameSet, private: NameSet, admins: NameSet) -> Self {
        Self {
            public,
            private,
            admins,
            private_access: true,
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            public: config.public.iter().cloned().collect(),
            private: config.private.iter().cloned().collect(),
            admins: config.admin.iter().cloned().collect(),
            private_access: config.private_access,
        }
    }

    pub fn with_private_access(mut self, enabled: bool) -> Self {
        self.private_access = enabled;
        self
    }

    pub fn classify(&self, service: &str) -> Option<ServiceClass> {
        if self.public.contains(service) {
            Some(ServiceClass::Public)
        } else if self.private.contains(service) {
            Some(ServiceClass::Private)
        } else {
            None
        }
    }

    pub fn is_admin(&self, identity_id: &str) -> bool {
        self.admins.contains(identity_id)
    }

    pub fn private_access(&self) -> bool {
        self.private_access
    }
}
