//! Origin Validator - fixed suffix allow-list for protected capabilities.
//!
//! Trust is assigned once, when a channel or guest context is created, and
//! carried as a [`TrustLevel`] token from then on. If the source cannot be
//! read (cross-context restriction, navigation race), classification fails
//! closed to `Guest` - never open.

use shell_types::TrustLevel;

#[derive(Debug, Clone)]
pub struct OriginValidator {
    suffixes: Vec<String>,
}

impl OriginValidator {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// Exact suffix match against the allow-list. A source that merely
    /// contains a trusted path somewhere in the middle does not match.
    pub fn is_trusted(&self, source: &str) -> bool {
        self.suffixes.iter().any(|suffix| source.ends_with(suffix))
    }

    /// Assign the trust token for a newly created channel or context.
    pub fn classify(&self, source: Option<&str>) -> TrustLevel {
        match source {
            Some(source) if self.is_trusted(source) => TrustLevel::TrustedSystem,
            Some(source) => {
                tracing::debug!(source = %source, "Source outside trust allow-list");
                TrustLevel::Guest
            }
            None => {
                // Unreadable source: deny, never allow.
                tracing::debug!("Source unreadable; failing closed to guest trust");
                TrustLevel::Guest
            }
        }
    }
}
