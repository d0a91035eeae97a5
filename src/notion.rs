//! Notion REST API client.
//!
//! Implements [`DataSource`] (database rows and their properties) and
//! [`BlockStore`] (page children) over the public Notion API.
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `query` | `POST /v1/databases/{id}/query` |
//! | `get_field` | `GET /v1/pages/{page}/properties/{property}` |
//! | `describe_schema` | `GET /v1/databases/{id}` |
//! | `list_children` | `GET /v1/blocks/{page}/children?page_size=N` |
//! | `delete_block` | `DELETE /v1/blocks/{id}` |
//! | `append_children` | `PATCH /v1/blocks/{page}/children` |
//!
//! # Authentication
//!
//! Every request carries `Authorization: Bearer <NOTION_API_KEY>` and the
//! configured `Notion-Version` header.
//!
//! # Pagination
//!
//! Only the first page of any listing is read. When the API reports more
//! results a warning is logged and the remainder is ignored.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::config::{HttpConfig, NotionConfig};
use crate::models::{Block, BlockPayload, PropertyRef, Record};
use crate::traits::{BlockStore, DataSource};

pub struct NotionClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    version: String,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// A paginated listing envelope (`{ "results": [...], "has_more": .. }`).
#[derive(Deserialize)]
struct Listing {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
}

impl NotionClient {
    pub fn new(config: &NotionConfig, http: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(http.timeout()).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.version.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/v1/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.version)
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("Notion {} request failed", what))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Notion {} failed (HTTP {}): {}",
                what,
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        resp.json::<Value>()
            .await
            .with_context(|| format!("Notion {} returned invalid JSON", what))
    }
}

#[async_trait]
impl DataSource for NotionClient {
    async fn query(&self, database_id: &str) -> Result<Vec<Record>> {
        let req = self
            .request(reqwest::Method::POST, &format!("databases/{}/query", database_id))
            .json(&json!({ "page_size": 100 }));
        let body = self.send(req, "database query").await?;
        let listing: Listing =
            serde_json::from_value(body).context("Notion database query: unexpected shape")?;

        if listing.has_more {
            tracing::warn!(
                database_id,
                rows = listing.results.len(),
                "database has more rows than one page; the rest are ignored"
            );
        }

        listing.results.iter().map(parse_record).collect()
    }

    async fn get_field(&self, record_id: &str, property_id: &str) -> Result<Value> {
        let req = self.request(
            reqwest::Method::GET,
            &format!("pages/{}/properties/{}", record_id, property_id),
        );
        self.send(req, "property retrieve").await
    }

    async fn describe_schema(&self, database_id: &str) -> Result<BTreeMap<String, String>> {
        let req = self.request(reqwest::Method::GET, &format!("databases/{}", database_id));
        let body = self.send(req, "database retrieve").await?;
        let props = body
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow::anyhow!("Notion database retrieve: no 'properties'"))?;

        Ok(props
            .iter()
            .map(|(name, prop)| {
                let id = prop.get("id").and_then(Value::as_str).unwrap_or_default();
                (name.clone(), id.to_string())
            })
            .collect())
    }
}

#[async_trait]
impl BlockStore for NotionClient {
    async fn list_children(&self, page_id: &str, page_size: usize) -> Result<Vec<Block>> {
        let req = self
            .request(reqwest::Method::GET, &format!("blocks/{}/children", page_id))
            .query(&[("page_size", page_size)]);
        let body = self.send(req, "list children").await?;
        let listing: Listing =
            serde_json::from_value(body).context("Notion list children: unexpected shape")?;

        if listing.has_more {
            tracing::warn!(
                page_id,
                page_size,
                "page has more children than one page; blocks past the page are left untouched"
            );
        }

        listing.results.iter().map(parse_block).collect()
    }

    async fn delete_block(&self, block_id: &str) -> Result<()> {
        let req = self.request(reqwest::Method::DELETE, &format!("blocks/{}", block_id));
        self.send(req, "delete block").await?;
        Ok(())
    }

    async fn append_children(&self, page_id: &str, children: &[BlockPayload]) -> Result<()> {
        let req = self
            .request(reqwest::Method::PATCH, &format!("blocks/{}/children", page_id))
            .json(&json!({ "children": children }));
        self.send(req, "append children").await?;
        Ok(())
    }
}

/// Parse a page object from a database query into a [`Record`].
fn parse_record(page: &Value) -> Result<Record> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("database row without 'id'"))?;

    let properties = page
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .filter_map(|(name, prop)| {
                    let id = prop.get("id")?.as_str()?;
                    let kind = prop.get("type").and_then(Value::as_str).unwrap_or_default();
                    Some((
                        name.clone(),
                        PropertyRef {
                            id: id.to_string(),
                            kind: kind.to_string(),
                        },
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Record {
        id: id.to_string(),
        properties,
    })
}

/// Parse a block object into a [`Block`], keeping its payload verbatim.
fn parse_block(block: &Value) -> Result<Block> {
    let id = block
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("block without 'id'"))?;
    let kind = block
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("block {} without 'type'", id))?;

    Ok(Block {
        id: id.to_string(),
        kind: kind.to_string(),
        payload: block.get(kind).cloned().unwrap_or(Value::Null),
    })
}
