use core::str::FromStr;

use serde::{Deserialize, Serialize};

use bizdesk_core::DomainError;

/// Index key for an `(application, module)` pair: `"application:module"`.
pub fn capability_key(application: &str, module: &str) -> String {
    format!("{application}:{module}")
}

/// A borrowed `(application, module, action)` question asked of an index.
///
/// This is the hot-path input of `can`; it never allocates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AccessCheck<'a> {
    pub application: &'a str,
    pub module: &'a str,
    pub action: &'a str,
}

impl<'a> AccessCheck<'a> {
    pub fn new(application: &'a str, module: &'a str, action: &'a str) -> Self {
        Self {
            application,
            module,
            action,
        }
    }

    pub fn key(&self) -> String {
        capability_key(self.application, self.module)
    }

    pub fn to_capability(&self) -> Capability {
        Capability::new(self.application, self.module, self.action)
    }
}

impl core::fmt::Display for AccessCheck<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}:{}", self.application, self.module, self.action)
    }
}

/// A permitted `(application, module, action)` triple.
///
/// Textual form is `"application:module:action"` (e.g. `"purchase:products:view"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    pub application: String,
    pub module: String,
    pub action: String,
}

impl Capability {
    pub fn new(
        application: impl Into<String>,
        module: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            module: module.into(),
            action: action.into(),
        }
    }

    pub fn as_check(&self) -> AccessCheck<'_> {
        AccessCheck::new(&self.application, &self.module, &self.action)
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.as_check(), f)
    }
}

impl FromStr for Capability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [application, module, action]
                if !application.is_empty() && !module.is_empty() && !action.is_empty() =>
            {
                Ok(Self::new(*application, *module, *action))
            }
            _ => Err(DomainError::validation(format!(
                "capability must be 'application:module:action', got '{s}'"
            ))),
        }
    }
}
