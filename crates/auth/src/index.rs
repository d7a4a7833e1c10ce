//! Capability index and the grant normalizer that builds it.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use bizdesk_core::{AccessGrant, AccessGroups};

use crate::capability::{Capability, capability_key};

/// Precomputed access rights of one session.
///
/// Built once from raw grants by [`normalize`] and never mutated afterwards;
/// a change of grants produces a new index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityIndex {
    pub(crate) is_admin: bool,
    pub(crate) permissions: HashMap<String, HashSet<String>>,
}

impl CapabilityIndex {
    /// Index that denies every check.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Administrator override: every check succeeds.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// `"application:module"` → permitted actions.
    pub fn permissions(&self) -> &HashMap<String, HashSet<String>> {
        &self.permissions
    }

    /// Actions held on a module, if any entry for it exists.
    pub fn actions(&self, application: &str, module: &str) -> Option<&HashSet<String>> {
        self.permissions.get(&capability_key(application, module))
    }

    /// Every explicitly granted capability, sorted.
    ///
    /// Administrators hold everything implicitly, so this only lists what the
    /// non-sentinel grants processed before the sentinel contributed.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut out: Vec<Capability> = self
            .permissions
            .iter()
            .flat_map(|(key, actions)| {
                let (application, module) = key.split_once(':').unwrap_or((key.as_str(), ""));
                actions
                    .iter()
                    .map(move |action| Capability::new(application, module, action.as_str()))
            })
            .collect();
        out.sort();
        out
    }
}

/// Convert raw grants into a [`CapabilityIndex`].
///
/// Grants are processed in input order:
/// - the `(all_apps, all_access_groups)` sentinel sets the admin flag and ends processing
/// - any other bare-string access group is a legacy record and is skipped
/// - each list entry adds `accessRight.name` under `"{application}:{applicationModule}"`
pub fn normalize(grants: &[AccessGrant]) -> CapabilityIndex {
    let mut index = CapabilityIndex::default();

    for grant in grants {
        if grant.is_admin_sentinel() {
            index.is_admin = true;
            break;
        }

        match &grant.access_groups {
            AccessGroups::Named(marker) => {
                tracing::debug!(
                    application = %grant.application,
                    marker = %marker,
                    "skipping access grant with bare access-group marker"
                );
            }
            AccessGroups::Entries(entries) => {
                for entry in entries {
                    index
                        .permissions
                        .entry(capability_key(&grant.application, &entry.application_module))
                        .or_default()
                        .insert(entry.access_right.name.clone());
                }
            }
        }
    }

    index
}
