use std::fmt;
use std::io;
use std::str::FromStr;

/// Environment variable that selects the runtime environment.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

/// The runtime environment the loader runs in.
///
/// Selects which environment-specific configuration file is layered on top
/// of the base configuration. Defaults to [`Environment::Dev`] when the
/// `APP_ENVIRONMENT` variable is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    /// Reads the runtime environment from `APP_ENVIRONMENT`.
    pub fn load() -> Result<Environment, io::Error> {
        match std::env::var(APP_ENVIRONMENT_ENV_NAME) {
            Ok(value) => value.parse().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("`{APP_ENVIRONMENT_ENV_NAME}` contains an unknown environment `{value}`"),
                )
            }),
            Err(_) => Ok(Environment::Dev),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Dev => f.write_str("dev"),
            Environment::Staging => f.write_str("staging"),
            Environment::Prod => f.write_str("prod"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(other.to_string()),
        }
    }
}
