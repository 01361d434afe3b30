//! Content Management API adapter over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use secrecy::SecretString;
use serde_json::json;
use tracing::debug;

use super::{Page, Query, RecordKind, RecordService};
use crate::config::ContentfulConfig;
use crate::config::secrets::bearer;
use crate::error::{Error, Result};
use crate::model::{Fields, Record};

const API_ROOT: &str = "https://api.contentful.com";
const MEDIA_TYPE: &str = "application/vnd.contentful.management.v1+json";

/// Client scoped to one space environment.
pub struct ContentfulClient {
    http: reqwest::Client,
    base: String,
    token: SecretString,
    /// Asset processing is asynchronous on the server; poll this often...
    process_poll: Duration,
    /// ...this many times before giving up.
    process_attempts: u32,
}

impl ContentfulClient {
    pub fn new(config: &ContentfulConfig) -> Result<Self> {
        Self::with_api_root(config, API_ROOT)
    }

    pub fn with_api_root(config: &ContentfulConfig, api_root: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base: format!(
                "{}/spaces/{}/environments/{}",
                api_root.trim_end_matches('/'),
                config.space_id,
                config.environment
            ),
            token: config.token.clone(),
            process_poll: Duration::from_millis(500),
            process_attempts: 20,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{path}", self.base))
            .header(reqwest::header::AUTHORIZATION, bearer(&self.token))
            .header(CONTENT_TYPE, MEDIA_TYPE)
    }

    fn versioned(&self, method: reqwest::Method, path: &str, record: &Record) -> RequestBuilder {
        self.request(method, path)
            .header("X-Contentful-Version", record.sys.version)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(Error::Destination {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_record(&self, req: RequestBuilder) -> Result<Record> {
        Ok(self.send(req).await?.json().await?)
    }

    async fn fetch_asset(&self, id: &str) -> Result<Record> {
        self.send_record(self.request(reqwest::Method::GET, &format!("assets/{id}")))
            .await
    }
}

fn collection(record: &Record) -> &'static str {
    if record.sys.kind == RecordKind::Asset.as_str() {
        "assets"
    } else {
        "entries"
    }
}

#[async_trait]
impl RecordService for ContentfulClient {
    async fn query(&self, query: &Query) -> Result<Page> {
        let path = match query.kind {
            RecordKind::Entry => "entries",
            RecordKind::Asset => "assets",
        };
        let mut params: Vec<(String, String)> = vec![
            ("skip".to_string(), query.skip.to_string()),
            ("limit".to_string(), query.limit.to_string()),
        ];
        if let Some(ref ct) = query.content_type {
            params.push(("content_type".to_string(), ct.clone()));
        }
        params.extend(query.filters.iter().cloned());

        debug!(content_type = query.label(), skip = query.skip, "query");
        let resp = self
            .send(self.request(reqwest::Method::GET, path).query(&params))
            .await?;
        Ok(resp.json().await?)
    }

    async fn create_entry(&self, content_type: &str, fields: Fields) -> Result<Record> {
        let body = serde_json::to_vec(&json!({ "fields": fields }))?;
        self.send_record(
            self.request(reqwest::Method::POST, "entries")
                .header("X-Contentful-Content-Type", content_type)
                .body(body),
        )
        .await
    }

    async fn update(&self, record: &Record, fields: Fields) -> Result<Record> {
        let body = serde_json::to_vec(&json!({ "fields": fields }))?;
        let path = format!("{}/{}", collection(record), record.id());
        self.send_record(self.versioned(reqwest::Method::PUT, &path, record).body(body))
            .await
    }

    async fn publish(&self, record: &Record) -> Result<Record> {
        let path = format!("{}/{}/published", collection(record), record.id());
        self.send_record(self.versioned(reqwest::Method::PUT, &path, record))
            .await
    }

    async fn unpublish(&self, record: &Record) -> Result<Record> {
        let path = format!("{}/{}/published", collection(record), record.id());
        self.send_record(self.versioned(reqwest::Method::DELETE, &path, record))
            .await
    }

    async fn delete(&self, record: &Record) -> Result<()> {
        let path = format!("{}/{}", collection(record), record.id());
        self.send(self.versioned(reqwest::Method::DELETE, &path, record))
            .await?;
        Ok(())
    }

    async fn create_asset(&self, fields: Fields) -> Result<Record> {
        let body = serde_json::to_vec(&json!({ "fields": fields }))?;
        self.send_record(self.request(reqwest::Method::POST, "assets").body(body))
            .await
    }

    async fn process_asset(&self, asset: &Record, locale: &str) -> Result<Record> {
        let path = format!("assets/{}/files/{locale}/process", asset.id());
        self.send(self.versioned(reqwest::Method::PUT, &path, asset))
            .await?;

        for attempt in 1..=self.process_attempts {
            tokio::time::sleep(self.process_poll).await;
            let current = self.fetch_asset(asset.id()).await?;
            let processed = current
                .fields
                .get("file", locale)
                .and_then(|f| f.get("url"))
                .is_some();
            if processed {
                return Ok(current);
            }
            debug!(asset = asset.id(), attempt, "asset still processing");
        }
        Err(Error::Timeout(self.process_poll * self.process_attempts))
    }
}
