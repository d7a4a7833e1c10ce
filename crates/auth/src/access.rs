use std::sync::Arc;

use bizdesk_core::{AccessGrant, Session};

use crate::capability::AccessCheck;
use crate::index::{CapabilityIndex, normalize};

/// Capability index bound to the grants of a session.
///
/// The index is rebuilt, never patched, when the session's grants change.
/// Readers that cloned the previous `Arc` keep a consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    grants: Vec<AccessGrant>,
    index: Arc<CapabilityIndex>,
}

impl AccessControl {
    pub fn from_grants(grants: &[AccessGrant]) -> Self {
        Self {
            grants: grants.to_vec(),
            index: Arc::new(normalize(grants)),
        }
    }

    pub fn from_session(session: &Session) -> Self {
        Self::from_grants(&session.access_grants)
    }

    /// Rebuild the index if the session's grants differ from the current ones.
    ///
    /// Returns `true` when a new index was built.
    pub fn sync(&mut self, session: &Session) -> bool {
        if self.grants == session.access_grants {
            return false;
        }

        *self = Self::from_session(session);
        tracing::debug!(
            grants = self.grants.len(),
            admin = self.index.is_admin(),
            modules = self.index.permissions().len(),
            "capability index rebuilt"
        );
        true
    }

    pub fn index(&self) -> Arc<CapabilityIndex> {
        Arc::clone(&self.index)
    }

    pub fn can(&self, check: AccessCheck<'_>) -> bool {
        self.index.can(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuilds_only_when_grants_change() {
        let mut session = Session::new("acme", "tok")
            .with_grants(vec![AccessGrant::for_application("purchase", [("products", "view")])]);
        let mut access = AccessControl::from_session(&session);
        let before = access.index();

        assert!(!access.sync(&session));
        assert!(Arc::ptr_eq(&before, &access.index()));

        session.access_grants.push(AccessGrant::admin());
        assert!(access.sync(&session));

        assert!(access.can(AccessCheck::new("inventory", "stock", "delete")));
        // Previous snapshot is untouched.
        assert!(!before.can(AccessCheck::new("inventory", "stock", "delete")));
    }

    #[test]
    fn default_denies_everything() {
        let access = AccessControl::default();
        assert!(!access.can(AccessCheck::new("purchase", "products", "view")));
    }
}
