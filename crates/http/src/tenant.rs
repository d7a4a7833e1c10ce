use bizdesk_core::Session;

use crate::config::{ClientConfig, DEFAULT_API_DOMAIN, Scheme};

/// Maps a session onto its tenant's backend origin:
/// `{scheme}://{tenantSchemaName}.{apiDomain}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantResolver {
    scheme: Scheme,
    api_domain: String,
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new(Scheme::Https, None)
    }
}

impl TenantResolver {
    /// An absent or blank `api_domain` falls back to [`DEFAULT_API_DOMAIN`].
    pub fn new(scheme: Scheme, api_domain: Option<&str>) -> Self {
        let api_domain = api_domain
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_API_DOMAIN);

        Self {
            scheme,
            api_domain: api_domain.to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.scheme, Some(&config.api_domain))
    }

    pub fn api_domain(&self) -> &str {
        &self.api_domain
    }

    /// Origin (no trailing slash) for the session's tenant.
    ///
    /// Never fails: an unhydrated session yields an origin with an empty
    /// subdomain, which the transport later rejects. Gate on
    /// [`Session::is_ready`] before issuing requests.
    pub fn resolve(&self, session: &Session) -> String {
        let schema = session.schema_name().unwrap_or_else(|| {
            tracing::warn!("resolving tenant origin without a tenant schema name");
            ""
        });

        format!("{}://{}.{}", self.scheme, schema, self.api_domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tenant_subdomain_origin() {
        let resolver = TenantResolver::new(Scheme::Https, Some("erp.example.com"));
        let session = Session::new("acme", "tok");
        assert_eq!(resolver.resolve(&session), "https://acme.erp.example.com");
    }

    #[test]
    fn falls_back_to_default_domain() {
        let resolver = TenantResolver::new(Scheme::Https, Some(""));
        assert_eq!(resolver.api_domain(), DEFAULT_API_DOMAIN);
        assert_eq!(
            TenantResolver::default().resolve(&Session::new("acme", "tok")),
            format!("https://acme.{DEFAULT_API_DOMAIN}")
        );
    }

    #[test]
    fn unhydrated_session_still_resolves() {
        let resolver = TenantResolver::new(Scheme::Http, Some("erp.test"));
        assert_eq!(resolver.resolve(&Session::default()), "http://.erp.test");
    }
}
