//! Authenticated session snapshot.
//!
//! The session is created at login and persisted by an external session
//! store. Everything in this workspace treats it as read-only input that is
//! passed explicitly to each call.

use serde::{Deserialize, Serialize};

use crate::{AccessGrant, TenantId, UserId};

/// Session state as persisted by the session store (camelCase JSON).
///
/// Every field except the grants may still be missing while the session is
/// hydrating after a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub user_id: Option<UserId>,
    pub tenant_id: Option<TenantId>,
    pub tenant_schema_name: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub access_grants: Vec<AccessGrant>,
}

impl Session {
    /// Fully hydrated session for `tenant_schema_name` holding `access_token`.
    pub fn new(tenant_schema_name: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            tenant_schema_name: Some(tenant_schema_name.into()),
            access_token: Some(access_token.into()),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: UserId, tenant_id: TenantId) -> Self {
        self.user_id = Some(user_id);
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_grants(mut self, grants: Vec<AccessGrant>) -> Self {
        self.access_grants = grants;
        self
    }

    /// Schema name, or `None` when absent or blank.
    pub fn schema_name(&self) -> Option<&str> {
        non_blank(self.tenant_schema_name.as_deref())
    }

    /// Access token, or `None` when absent or blank.
    pub fn bearer_token(&self) -> Option<&str> {
        non_blank(self.access_token.as_deref())
    }

    /// Whether requests may be issued for this session.
    ///
    /// Callers must gate request issuance on this: the tenant origin is only
    /// meaningful once the schema name is known, and the backend rejects
    /// anonymous calls.
    pub fn is_ready(&self) -> bool {
        self.schema_name().is_some() && self.bearer_token().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_persisted_camel_case_form() {
        let session: Session = serde_json::from_value(json!({
            "userId": 17,
            "tenantId": "t-1",
            "tenantSchemaName": "acme",
            "accessToken": "tok",
            "refreshToken": "ref",
            "accessGrants": [
                { "application": "all_apps", "accessGroups": "all_access_groups" }
            ]
        }))
        .unwrap();

        assert_eq!(session.user_id, Some(UserId::new("17")));
        assert_eq!(session.schema_name(), Some("acme"));
        assert_eq!(session.access_grants, vec![AccessGrant::admin()]);
        assert!(session.is_ready());
    }

    #[test]
    fn partially_hydrated_session_is_not_ready() {
        let session: Session = serde_json::from_value(json!({ "accessToken": "tok" })).unwrap();
        assert!(!session.is_ready());
        assert!(session.access_grants.is_empty());

        let blank = Session::new("  ", "tok");
        assert_eq!(blank.schema_name(), None);
        assert!(!blank.is_ready());
    }
}
