//! Raw access grants as delivered by the identity backend.
//!
//! These records are attached to a session at login and are never evaluated
//! directly; `bizdesk-auth` normalizes them into a capability index.

use serde::{Deserialize, Serialize};

/// Application name of the administrator sentinel grant.
pub const ALL_APPS: &str = "all_apps";

/// Access-group marker of the administrator sentinel grant.
pub const ALL_ACCESS_GROUPS: &str = "all_access_groups";

/// A raw, per-application permission record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub application: String,
    pub access_groups: AccessGroups,
}

/// Either a bare marker string or the explicit list of module rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessGroups {
    Named(String),
    Entries(Vec<AccessGroupEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGroupEntry {
    pub application_module: String,
    pub access_right: AccessRight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRight {
    pub name: String,
}

impl AccessGrant {
    /// The `(all_apps, all_access_groups)` grant held by administrators.
    pub fn admin() -> Self {
        Self {
            application: ALL_APPS.to_string(),
            access_groups: AccessGroups::Named(ALL_ACCESS_GROUPS.to_string()),
        }
    }

    /// Grant for a single application with explicit `(module, action)` rights.
    pub fn for_application<'a, I>(application: impl Into<String>, rights: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            application: application.into(),
            access_groups: AccessGroups::Entries(
                rights
                    .into_iter()
                    .map(|(module, action)| AccessGroupEntry::new(module, action))
                    .collect(),
            ),
        }
    }

    pub fn is_admin_sentinel(&self) -> bool {
        self.application == ALL_APPS
            && matches!(&self.access_groups, AccessGroups::Named(name) if name == ALL_ACCESS_GROUPS)
    }
}

impl AccessGroupEntry {
    pub fn new(module: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            application_module: module.into(),
            access_right: AccessRight { name: action.into() },
        }
    }
}
