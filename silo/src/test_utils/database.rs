use secrecy::ExposeSecret;
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

use silo_config::shared::PgConnectionConfig;

use crate::types::TableName;

/// The schema used for organizing test tables.
pub const TEST_DATABASE_SCHEMA: &str = "test";

/// Creates a [`TableName`] in the test schema.
pub fn test_table_name(name: &str) -> TableName {
    TableName::new(TEST_DATABASE_SCHEMA, name)
}

/// A disposable warehouse database for one test.
pub struct TestDatabase {
    pub config: PgConnectionConfig,
    pub client: Client,
}

/// Generates connection configuration for the local test Postgres instance.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: database user (required)
/// - `TESTS_DATABASE_PASSWORD`: database password (optional)
fn local_pg_connection_config(database_name: String) -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: database_name,
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
    }
}

async fn connect(config: &PgConnectionConfig) -> Client {
    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&config.host)
        .port(config.port)
        .user(&config.username)
        .dbname(&config.name);
    if let Some(password) = &config.password {
        pg_config.password(password.expose_secret());
    }

    let (client, connection) = pg_config
        .connect(NoTls)
        .await
        .expect("failed to connect to the test database");

    tokio::spawn(async move {
        let _ = connection.await;
    });

    client
}

/// Creates a new warehouse database with a unique name and the test schema.
///
/// Each invocation creates its own database to prevent test interference.
pub async fn spawn_warehouse_database() -> TestDatabase {
    let database_name = format!("silo_test_{}", Uuid::new_v4().simple());

    let admin_config = local_pg_connection_config("postgres".to_string());
    let admin_client = connect(&admin_config).await;
    admin_client
        .execute(&format!("create database \"{database_name}\""), &[])
        .await
        .expect("failed to create the test database");

    let config = local_pg_connection_config(database_name);
    let client = connect(&config).await;
    client
        .execute(&format!("create schema {TEST_DATABASE_SCHEMA}"), &[])
        .await
        .expect("failed to create the test schema");

    TestDatabase { config, client }
}
