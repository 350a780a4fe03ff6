//! Supabase (PostgREST) implementation of [`TaskTable`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::{TaskTable, TASK_COLUMNS};
use crate::config::{Config, Secrets};
use crate::core::{SqaTask, TaskRowId};
use crate::error::{Error, Result};
use crate::util::truncate;

/// Column receiving the rubric score.
pub const SCORE_COLUMN: &str = "gemini_score";
/// Boolean column marking a row as scored.
pub const TESTED_COLUMN: &str = "gemini_tested";

#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Option<String>,
}

/// Task table served by a Supabase project's REST endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseTable {
    http: reqwest::Client,
    url: Option<String>,
    key: Option<String>,
    table: String,
    page_size: usize,
}

impl SupabaseTable {
    /// Create a table handle. Missing credentials surface on first use.
    pub fn new(url: Option<String>, key: Option<String>, table: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.map(|u| u.trim_end_matches('/').to_string()),
            key,
            table: table.to_string(),
            page_size: 1000,
        }
    }

    pub fn from_config(config: &Config, secrets: &Secrets) -> Self {
        Self::new(
            secrets.supabase_url.clone(),
            secrets.supabase_key.clone(),
            &config.table,
        )
        .with_page_size(config.page_size)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn endpoint(&self) -> Result<String> {
        let url = self
            .url
            .as_deref()
            .ok_or(Error::MissingCredential(Secrets::SUPABASE_URL))?;
        Ok(format!("{}/rest/v1/{}", url, self.table))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let key = self
            .key
            .as_deref()
            .ok_or(Error::MissingCredential(Secrets::SUPABASE_KEY))?;
        Ok(builder
            .header("apikey", key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", key)))
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<SqaTask>> {
        let request = self.http.get(self.endpoint()?).query(&[
            ("select", TASK_COLUMNS.join(",")),
            ("order", "id.asc".to_string()),
            ("limit", self.page_size.to_string()),
            ("offset", offset.to_string()),
        ]);
        let response = self.authorized(request)?.send().await?;
        let body = checked_body(response).await?;
        trace!("{} page at {}: {}", self.table, offset, truncate(&body, 500));
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl TaskTable for SupabaseTable {
    /// Page through the whole table.
    ///
    /// The server may cap a page below `page_size`, so only an empty page
    /// ends the scan.
    async fn fetch_tasks(&self) -> Result<Vec<SqaTask>> {
        let mut tasks = Vec::new();
        loop {
            let page = self.fetch_page(tasks.len()).await?;
            if page.is_empty() {
                return Ok(tasks);
            }
            tasks.extend(page);
            debug!("Fetched {} rows from {}", tasks.len(), self.table);
        }
    }

    async fn apply_score(&self, id: &TaskRowId, score: f64) -> Result<()> {
        let request = self
            .http
            .patch(self.endpoint()?)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&json!({ SCORE_COLUMN: score, TESTED_COLUMN: true }));
        let response = self.authorized(request)?.send().await?;
        let body = checked_body(response).await?;

        let updated: Vec<Value> = serde_json::from_str(&body)?;
        if updated.is_empty() {
            return Err(Error::Datastore(format!(
                "no row in {} with id {}",
                self.table, id
            )));
        }
        Ok(())
    }
}

async fn checked_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    let message = match serde_json::from_str::<PostgrestError>(&body) {
        Ok(err) => format!(
            "{} {}: {}{}",
            status.as_u16(),
            err.code.unwrap_or_default(),
            err.message,
            err.details.map(|d| format!(" ({})", d)).unwrap_or_default()
        ),
        Err(_) => format!("{}: {}", status, truncate(body.trim(), 200)),
    };
    Err(Error::Datastore(message))
}
