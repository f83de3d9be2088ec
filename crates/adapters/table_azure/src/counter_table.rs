//! Table REST implementation of [`CounterTable`].

use std::future::Future;

use reqwest::header::{ACCEPT, ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};

use tally_app::ports::CounterTable;
use tally_domain::counter::{CounterKey, CounterRecord, ETag, StoredCounter};
use tally_domain::error::StoreError;

use crate::config::SasToken;
use crate::error::AzureTableError;

const API_VERSION: &str = "2019-02-02";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";
const COUNT_PROPERTY: &str = "count";

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Deserialize)]
struct ODataError {
    code: String,
}

/// Counter table stored in an Azure Storage table.
///
/// The HTTP client is created once and shared by every request, so
/// connections are pooled across increments.
pub struct AzureCounterTable {
    client: Client,
    endpoint: Url,
    table: String,
    sas_token: SasToken,
}

impl AzureCounterTable {
    pub(crate) fn new(client: Client, endpoint: Url, table: String, sas_token: SasToken) -> Self {
        Self {
            client,
            endpoint,
            table,
            sas_token,
        }
    }

    fn collection_url(&self) -> Result<Url, AzureTableError> {
        self.url(&self.table)
    }

    fn entity_url(&self, key: &CounterKey) -> Result<Url, AzureTableError> {
        self.url(&format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.table,
            quote(&key.partition_key),
            quote(&key.row_key)
        ))
    }

    fn url(&self, resource: &str) -> Result<Url, AzureTableError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| AzureTableError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .push(resource);
        if !self.sas_token.is_empty() {
            url.set_query(Some(self.sas_token.expose()));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("x-ms-version", API_VERSION)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header(ACCEPT, ACCEPT_NO_METADATA)
    }
}

/// OData string literals escape a single quote by doubling it.
fn quote(value: &str) -> String {
    value.replace('\'', "''")
}

async fn status_error(response: Response) -> AzureTableError {
    let status = response.status();
    let code = response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.error.code);
    tracing::debug!(%status, code = ?code, "table service rejected request");
    AzureTableError::Status { status, code }
}

fn etag_of(response: &Response) -> Result<ETag, AzureTableError> {
    response
        .headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(ETag::new)
        .ok_or(AzureTableError::MissingETag)
}

/// Read `count` whether it was stored as `Edm.Int32` (JSON number) or
/// `Edm.Int64` (JSON string).
fn count_of(entity: &Value) -> Result<u64, AzureTableError> {
    match entity.get(COUNT_PROPERTY) {
        Some(Value::Number(number)) => number.as_u64().ok_or(AzureTableError::InvalidCount),
        Some(Value::String(text)) => text.parse().map_err(|_| AzureTableError::InvalidCount),
        _ => Err(AzureTableError::InvalidCount),
    }
}

/// Properties carrying `count`: a plain number while it fits `Edm.Int32`,
/// an annotated `Edm.Int64` string beyond that.
fn count_properties(count: u64) -> Map<String, Value> {
    let mut properties = Map::new();
    if let Ok(small) = i32::try_from(count) {
        properties.insert(COUNT_PROPERTY.to_string(), Value::from(small));
    } else {
        properties.insert(COUNT_PROPERTY.to_string(), Value::from(count.to_string()));
        properties.insert(
            format!("{COUNT_PROPERTY}@odata.type"),
            Value::from("Edm.Int64"),
        );
    }
    properties
}

impl CounterTable for AzureCounterTable {
    fn get(
        &self,
        key: CounterKey,
    ) -> impl Future<Output = Result<Option<StoredCounter>, StoreError>> + Send {
        async move {
            let url = self.entity_url(&key)?;
            let response = self
                .request(Method::GET, url)
                .send()
                .await
                .map_err(AzureTableError::from)?;

            match response.status() {
                StatusCode::OK => {}
                StatusCode::NOT_FOUND => {
                    let err = status_error(response).await;
                    if err.is_entity_missing() {
                        return Ok(None);
                    }
                    return Err(err.into());
                }
                _ => return Err(status_error(response).await.into()),
            }

            let etag = etag_of(&response)?;
            let body = response.bytes().await.map_err(AzureTableError::from)?;
            let entity: Value = serde_json::from_slice(&body).map_err(AzureTableError::from)?;
            let count = count_of(&entity)?;

            Ok(Some(StoredCounter {
                record: CounterRecord { key, count },
                etag,
            }))
        }
    }

    fn create(
        &self,
        record: CounterRecord,
    ) -> impl Future<Output = Result<ETag, StoreError>> + Send {
        async move {
            let url = self.collection_url()?;
            let mut entity = count_properties(record.count);
            entity.insert("PartitionKey".to_string(), record.key.partition_key.into());
            entity.insert("RowKey".to_string(), record.key.row_key.into());

            let response = self
                .request(Method::POST, url)
                .header("Prefer", "return-no-content")
                .json(&entity)
                .send()
                .await
                .map_err(AzureTableError::from)?;

            match response.status() {
                StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(etag_of(&response)?),
                _ => Err(status_error(response).await.into()),
            }
        }
    }

    fn merge(
        &self,
        record: CounterRecord,
        etag: ETag,
    ) -> impl Future<Output = Result<ETag, StoreError>> + Send {
        async move {
            let url = self.entity_url(&record.key)?;
            let response = self
                .request(Method::PATCH, url)
                .header(IF_MATCH, etag.as_str())
                .json(&count_properties(record.count))
                .send()
                .await
                .map_err(AzureTableError::from)?;

            match response.status() {
                StatusCode::NO_CONTENT => Ok(etag_of(&response)?),
                _ => Err(status_error(response).await.into()),
            }
        }
    }
}
