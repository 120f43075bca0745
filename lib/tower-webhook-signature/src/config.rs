use serde::Deserialize;
use smol_str::SmolStr;

/// Name of the per-request slot the pending verification is stored under
pub const DEFAULT_STORAGE_KEY: &str = "webhook-signature";

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Configuration {
    /// Let `GET` requests without any signature through
    ///
    /// Useful for health checks and polling endpoints. Requests carrying a wrong signature are still rejected.
    pub allow_unsigned_get: bool,

    /// Slot name for the pending verification
    ///
    /// Change this when multiple verifiers with different keys are stacked on the same route
    pub storage_key: SmolStr,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            allow_unsigned_get: false,
            storage_key: SmolStr::new(DEFAULT_STORAGE_KEY),
        }
    }
}
