//! HTTP client for the remote write, read and directory APIs.
//!
//! | Method | Path                       | Use                         |
//! |--------|----------------------------|-----------------------------|
//! | GET    | `/locations`               | location directory snapshot |
//! | GET    | `/{resource}?ids=a,b`      | records to export           |
//! | POST   | `/{resource}/bulk-create`  | one chunk, create mode      |
//! | PUT    | `/{resource}/bulk-update`  | one chunk, update mode      |
//!
//! Bodies are JSON. Write requests carry `{"records": [...]}`; list
//! responses may be a bare array or wrapped as `{"records": [...]}`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{ClientError, ConfigError};
use crate::models::{DomainRecord, Location, RecordKind, WriteMode};
use crate::translate::join_list;
use crate::upload::RecordWriter;

#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "locations")]
        records: Vec<T>,
    },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) => items,
            ListBody::Wrapped { records } => records,
        }
    }
}

/// Client for one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Client for the configured API; fails when no URL is set.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.require_api_url()?, config.api_token.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ClientError> {
        let response = self
            .authorize(request)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get_list<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<Vec<T>, ClientError> {
        let body = self.send(request).await?;
        decode_list(&body)
    }

    /// Snapshot of the location directory.
    pub async fn fetch_locations(&self) -> Result<Vec<Location>, ClientError> {
        self.get_list(self.http.get(self.url("locations"))).await
    }

    /// Records of `kind` with the given ids; all records when `ids` is empty.
    pub async fn fetch_records(
        &self,
        kind: RecordKind,
        ids: &[String],
    ) -> Result<Vec<DomainRecord>, ClientError> {
        let mut request = self.http.get(self.url(kind.resource()));
        if !ids.is_empty() {
            request = request.query(&[("ids", join_list(ids))]);
        }

        let values: Vec<Value> = self.get_list(request).await?;
        values
            .into_iter()
            .map(|v| DomainRecord::from_json(kind, v).map_err(|e| ClientError::Decode(e.to_string())))
            .collect()
    }

    /// Write one chunk with a single bulk request.
    pub async fn bulk_write(
        &self,
        kind: RecordKind,
        mode: WriteMode,
        records: &[DomainRecord],
    ) -> Result<(), ClientError> {
        let body = json!({ "records": records });
        let request = match mode {
            WriteMode::Create => self.http.post(self.url(&bulk_path(kind, mode))),
            WriteMode::Update => self.http.put(self.url(&bulk_path(kind, mode))),
        };
        self.send(request.json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordWriter for ApiClient {
    async fn write_chunk(
        &self,
        kind: RecordKind,
        mode: WriteMode,
        records: &[DomainRecord],
    ) -> Result<(), ClientError> {
        self.bulk_write(kind, mode, records).await
    }
}

/// Path of the bulk endpoint for `kind` in `mode`.
pub fn bulk_path(kind: RecordKind, mode: WriteMode) -> String {
    match mode {
        WriteMode::Create => format!("{}/bulk-create", kind.resource()),
        WriteMode::Update => format!("{}/bulk-update", kind.resource()),
    }
}

fn decode_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ClientError> {
    serde_json::from_str::<ListBody<T>>(body)
        .map(ListBody::into_vec)
        .map_err(|e| ClientError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_paths() {
        assert_eq!(bulk_path(RecordKind::Employee, WriteMode::Create), "employees/bulk-create");
        assert_eq!(bulk_path(RecordKind::NicTax, WriteMode::Update), "nic-tax/bulk-update");
        assert_eq!(bulk_path(RecordKind::Timesheet, WriteMode::Create), "timesheets/bulk-create");
    }

    #[test]
    fn test_url_joins_single_slash() {
        let client = ApiClient::new("https://api.example.com/v1/", None);
        assert_eq!(client.base_url(), "https://api.example.com/v1");
        assert_eq!(client.url("/locations"), "https://api.example.com/v1/locations");
    }

    #[test]
    fn test_decode_bare_and_wrapped_lists() {
        let bare: Vec<Location> =
            decode_list(r#"[{"id":"loc-1","code":"LDN","name":"London"}]"#).unwrap();
        assert_eq!(bare[0].code, "LDN");

        let wrapped: Vec<Location> =
            decode_list(r#"{"locations":[{"id":"loc-2","code":"MAN"}]}"#).unwrap();
        assert_eq!(wrapped[0].id, "loc-2");

        let err = decode_list::<Location>(r#"{"error":"nope"}"#).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn test_from_config_requires_url() {
        let err = ApiClient::from_config(&Config::default()).unwrap_err();
        assert_eq!(err, ConfigError::Missing("PAYBATCH_API_URL"));
    }
}
