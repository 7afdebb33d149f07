use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Settings for one staging bucket in the object store.
///
/// Credentials are optional; when absent the object-store client falls back
/// to the ambient credential chain of the deployment environment.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// The bucket that holds staged batches for one dataset.
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint, e.g. for S3-compatible stores in tests.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
}

impl StorageConfig {
    pub fn validate(&self, prefix: &str) -> Result<(), ValidationError> {
        if self.bucket.is_empty() {
            return Err(ValidationError::invalid(
                &format!("{prefix}.bucket"),
                "must not be empty",
            ));
        }

        Ok(())
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}
