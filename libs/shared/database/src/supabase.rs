use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Failures reported by PostgREST, kept typed so callers can tell a unique
/// violation apart from a transport problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Error body PostgREST returns alongside a non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostgrestError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Postgres SQLSTATE for `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

impl PostgrestError {
    pub fn mentions(&self, needle: &str) -> bool {
        [&self.message, &self.details, &self.hint]
            .into_iter()
            .flatten()
            .any(|text| text.contains(needle))
    }
}

impl SupabaseError {
    /// True when the error (possibly wrapped in `anyhow`) came back as a 409.
    pub fn is_conflict(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::Conflict(_)))
    }

    /// Parsed PostgREST body, when the response carried one.
    pub fn postgrest_error(&self) -> Option<PostgrestError> {
        match self {
            SupabaseError::Auth(body)
            | SupabaseError::NotFound(body)
            | SupabaseError::Conflict(body)
            | SupabaseError::Api { body, .. } => serde_json::from_str(body).ok(),
        }
    }

    /// True only for a unique violation whose message or details name `constraint`
    /// (a constraint or column name). Foreign-key and check failures also arrive as
    /// 409 and are not matched.
    pub fn is_unique_violation(err: &anyhow::Error, constraint: &str) -> bool {
        match err.downcast_ref::<SupabaseError>() {
            Some(conflict @ SupabaseError::Conflict(_)) => conflict
                .postgrest_error()
                .is_some_and(|body| body.code.as_deref() == Some(UNIQUE_VIOLATION) && body.mentions(constraint)),
            _ => false,
        }
    }
}

fn prefer(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("prefer"), HeaderValue::from_static(value));
    headers
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Without a user token PostgREST still wants a bearer; the anon key works.
        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => SupabaseError::Auth(error_text),
                404 => SupabaseError::NotFound(error_text),
                409 => SupabaseError::Conflict(error_text),
                code => SupabaseError::Api { status: code, body: error_text },
            }.into());
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Insert or update and get the written rows back.
    pub async fn request_returning(&self, method: Method, path: &str,
                                   auth_token: Option<&str>, body: Value)
                                   -> Result<Vec<Value>> {
        self.request_with_headers(method, path, auth_token, Some(body), Some(prefer("return=representation")))
            .await
    }

    /// Delete the rows `path` filters to and get them back; empty when nothing matched.
    pub async fn delete_returning(&self, path: &str, auth_token: Option<&str>) -> Result<Vec<Value>> {
        self.request_with_headers(Method::DELETE, path, auth_token, None, Some(prefer("return=representation")))
            .await
    }

    /// Insert into `table`, or merge into the existing row when `on_conflict`
    /// already holds the same value.
    pub async fn upsert(&self, table: &str, on_conflict: &str,
                        auth_token: Option<&str>, body: Value)
                        -> Result<Vec<Value>> {
        let path = format!("/rest/v1/{}?on_conflict={}", table, on_conflict);
        self.request_with_headers(
            Method::POST,
            &path,
            auth_token,
            Some(body),
            Some(prefer("resolution=merge-duplicates,return=representation")),
        ).await
    }

    /// Call a Postgres function exposed under `/rest/v1/rpc/{name}`.
    pub async fn rpc<T>(&self, function: &str, auth_token: Option<&str>, args: Value) -> Result<T>
    where T: DeserializeOwned {
        if function.is_empty() || function.contains('/') {
            return Err(anyhow!("Invalid RPC function name: {:?}", function));
        }

        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, auth_token, Some(args)).await
    }
}
