use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Connection settings for a Postgres-compatible database.
///
/// Used both for the relational source and for the warehouse. TLS and
/// connection pooling are delegated to the surrounding infrastructure.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    /// The target database name.
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
}

impl PgConnectionConfig {
    /// Validates the connection settings.
    pub fn validate(&self, prefix: &str) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::invalid(
                &format!("{prefix}.host"),
                "must not be empty",
            ));
        }
        if self.port == 0 {
            return Err(ValidationError::invalid(
                &format!("{prefix}.port"),
                "must be a valid port number",
            ));
        }

        Ok(())
    }
}

/// Connection settings for the document store holding trade records.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoConnectionConfig {
    pub host: String,
    #[serde(default = "default_mongo_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// The database holding the source collections.
    pub database: String,
}

impl MongoConnectionConfig {
    pub fn validate(&self, prefix: &str) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::invalid(
                &format!("{prefix}.host"),
                "must not be empty",
            ));
        }
        if self.database.is_empty() {
            return Err(ValidationError::invalid(
                &format!("{prefix}.database"),
                "must not be empty",
            ));
        }

        Ok(())
    }
}

fn default_mongo_port() -> u16 {
    27017
}
