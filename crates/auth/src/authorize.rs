use serde::Serialize;

use crate::capability::{AccessCheck, Capability};
use crate::index::CapabilityIndex;

/// Decide whether `index` permits `check`.
///
/// - No IO
/// - No panics
/// - O(1): one hash lookup against the precomputed index
///
/// Unknown applications, modules, and actions simply deny.
pub fn can(index: &CapabilityIndex, check: AccessCheck<'_>) -> bool {
    if index.is_admin {
        return true;
    }

    index
        .actions(check.application, check.module)
        .is_some_and(|actions| actions.contains(check.action))
}

/// Whether any action at all is held on `(application, module)`.
///
/// Used for navigation visibility, where the exact action is not yet known.
pub fn can_access_module(index: &CapabilityIndex, application: &str, module: &str) -> bool {
    if index.is_admin {
        return true;
    }

    index
        .actions(application, module)
        .is_some_and(|actions| !actions.is_empty())
}

impl CapabilityIndex {
    pub fn can(&self, check: AccessCheck<'_>) -> bool {
        can(self, check)
    }

    pub fn can_access_module(&self, application: &str, module: &str) -> bool {
        can_access_module(self, application, module)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Answers "why was this allowed/denied?" for audit logs and support tooling.
/// The decision itself always matches [`can`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionExplanation {
    /// The capability that was being checked.
    pub capability: Capability,

    /// Whether access was granted.
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Whether the administrator override applied.
    pub is_admin: bool,

    /// Actions held on the checked `(application, module)`, sorted.
    pub held_actions: Vec<String>,

    /// If denied, what was missing.
    pub denial: Option<DenialKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// No grant mentions the `(application, module)` pair.
    MissingModule,
    /// The module is granted, but not with the requested action.
    MissingAction,
}

/// Explain the decision [`can`] makes for `check`.
pub fn explain(index: &CapabilityIndex, check: AccessCheck<'_>) -> DecisionExplanation {
    let capability = check.to_capability();

    if index.is_admin {
        return DecisionExplanation {
            reason: format!("administrator grant covers '{capability}'"),
            capability,
            granted: true,
            is_admin: true,
            held_actions: Vec::new(),
            denial: None,
        };
    }

    let Some(actions) = index.actions(check.application, check.module) else {
        return DecisionExplanation {
            reason: format!(
                "no grant for module '{}' of application '{}'",
                check.module, check.application
            ),
            capability,
            granted: false,
            is_admin: false,
            held_actions: Vec::new(),
            denial: Some(DenialKind::MissingModule),
        };
    };

    let mut held_actions: Vec<String> = actions.iter().cloned().collect();
    held_actions.sort();

    if actions.contains(check.action) {
        DecisionExplanation {
            reason: format!("explicit grant for '{capability}'"),
            capability,
            granted: true,
            is_admin: false,
            held_actions,
            denial: None,
        }
    } else {
        DecisionExplanation {
            reason: format!(
                "action '{}' not granted on '{}'; held actions: {:?}",
                check.action,
                check.key(),
                held_actions
            ),
            capability,
            granted: false,
            is_admin: false,
            held_actions,
            denial: Some(DenialKind::MissingAction),
        }
    }
}
