use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// PostgREST error code for a unique constraint violation. Booking
/// correctness depends on this being surfaced as its own variant.
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
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
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(Self::classify_error(status.as_u16(), error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Insert one row and return the stored representation.
    ///
    /// A rejected unique constraint comes back as
    /// `SupabaseError::UniqueViolation`; callers that care about races must
    /// match on it rather than on the message text.
    pub async fn insert<T>(
        &self,
        path: &str,
        row: Value,
        auth_token: Option<&str>,
    ) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.request_with_headers(Method::POST, path, auth_token, Some(row), Some(headers))
            .await
    }

    /// Call a PostgREST stored procedure. Functions that return nothing
    /// answer with an empty body, mapped to `Value::Null`.
    pub async fn rpc(
        &self,
        function: &str,
        args: Value,
        auth_token: Option<&str>,
    ) -> Result<Value, SupabaseError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        debug!("Calling rpc {}", function);

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers(auth_token))
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("RPC error ({}): {}", status, text);
            return Err(Self::classify_error(status.as_u16(), text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| SupabaseError::Api {
            status: status.as_u16(),
            message: format!("Unparseable rpc response: {}", e),
        })
    }

    fn classify_error(status: u16, body: String) -> SupabaseError {
        if body.contains(UNIQUE_VIOLATION_CODE) {
            return SupabaseError::UniqueViolation(body);
        }
        match status {
            401 | 403 => SupabaseError::Auth(body),
            404 => SupabaseError::NotFound(body),
            _ => SupabaseError::Api {
                status,
                message: body,
            },
        }
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_body_with_postgres_code_is_a_unique_violation() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"appointments_active_slot_key\""}"#;
        let err = SupabaseClient::classify_error(409, body.to_string());
        assert!(matches!(err, SupabaseError::UniqueViolation(_)));
    }

    #[test]
    fn other_conflicts_stay_generic() {
        let err = SupabaseClient::classify_error(409, r#"{"code":"23503"}"#.to_string());
        assert!(matches!(err, SupabaseError::Api { status: 409, .. }));
    }
}
