//! Document-store client for the trades source.

use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, Credential};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, SiloResult};
use crate::silo_error;
use silo_config::shared::MongoConnectionConfig;

/// Client fetching raw documents from the document store.
pub struct DocumentSource {
    client: mongodb::Client,
    database: String,
}

impl DocumentSource {
    /// Builds a client for the configured document store.
    ///
    /// The driver connects lazily; the first find establishes the
    /// connection.
    pub async fn connect(config: &MongoConnectionConfig) -> SiloResult<DocumentSource> {
        let uri = format!("mongodb://{}:{}", config.host, config.port);
        let mut options = ClientOptions::parse(&uri).await.map_err(|err| {
            silo_error!(
                ErrorKind::SourceConnectionFailed,
                "failed to parse the document store address",
                uri.clone(),
                source: err
            )
        })?;

        if config.username.is_some() || config.password.is_some() {
            let mut credential = Credential::default();
            credential.username = config.username.clone();
            credential.password = config
                .password
                .as_ref()
                .map(|password| password.expose_secret().to_string());
            options.credential = Some(credential);
        }

        let client = mongodb::Client::with_options(options).map_err(|err| {
            silo_error!(
                ErrorKind::SourceConnectionFailed,
                "failed to build the document store client",
                format!("{}:{}", config.host, config.port),
                source: err
            )
        })?;

        info!(host = %config.host, database = %config.database, "document store client ready");

        Ok(DocumentSource {
            client,
            database: config.database.clone(),
        })
    }

    /// Fetches every document of a collection as JSON values.
    pub async fn find_all(&self, collection: &str) -> SiloResult<Vec<serde_json::Value>> {
        let collection_handle = self
            .client
            .database(&self.database)
            .collection::<Document>(collection);

        let mut cursor = collection_handle.find(doc! {}).await.map_err(|err| {
            silo_error!(
                ErrorKind::SourceQueryFailed,
                "failed to query the document store",
                format!("collection '{collection}'"),
                source: err
            )
        })?;

        let mut documents = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(|err| {
            silo_error!(
                ErrorKind::SourceQueryFailed,
                "failed to advance the document cursor",
                format!("collection '{collection}'"),
                source: err
            )
        })? {
            documents.push(Bson::Document(document).into_relaxed_extjson());
        }

        debug!(collection, count = documents.len(), "fetched documents");

        Ok(documents)
    }

    /// Fetches a collection and unwraps the embedded record array.
    ///
    /// When `unwrap_field` is set, the field of the first document must
    /// hold the array of records; an empty collection yields no records.
    /// Without it, every document is one record.
    pub async fn find_records(
        &self,
        collection: &str,
        unwrap_field: Option<&str>,
    ) -> SiloResult<Vec<serde_json::Value>> {
        let documents = self.find_all(collection).await?;

        let Some(field) = unwrap_field else {
            return Ok(documents);
        };

        let Some(first) = documents.into_iter().next() else {
            return Ok(Vec::new());
        };

        match first.get(field) {
            Some(serde_json::Value::Array(records)) => Ok(records.clone()),
            Some(_) => bail!(
                ErrorKind::InvalidData,
                "the unwrap field does not hold an array of records",
                format!("collection '{collection}', field '{field}'")
            ),
            None => bail!(
                ErrorKind::InvalidData,
                "the unwrap field is missing from the first document",
                format!("collection '{collection}', field '{field}'")
            ),
        }
    }
}
