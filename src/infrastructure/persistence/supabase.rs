//! Shared Supabase HTTP client
//!
//! One reqwest client plus the project keys, shared by the PostgREST
//! repositories, the GoTrue session adapter and the Edge Function endpoint.
//! Table writes authenticate with the service-role key; auth and function
//! calls attach the anon key and manage their own bearer tokens.

use reqwest::{Client, RequestBuilder};

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str, service_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_key: service_key.to_string(),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    pub fn function_url(&self, slug: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, slug)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn rest_get(&self, table: &str) -> RequestBuilder {
        self.http
            .get(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.service_key)
    }

    pub fn rest_post(&self, table: &str) -> RequestBuilder {
        self.http
            .post(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=representation")
    }

    pub fn rest_patch(&self, table: &str) -> RequestBuilder {
        self.http
            .patch(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=representation")
    }

    /// Send a built request and fold non-2xx statuses into `SupabaseError`
    pub async fn send_checked(
        &self,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, SupabaseError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SupabaseError::from_response(response).await);
        }
        Ok(response)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Supabase API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl SupabaseError {
    /// Consume a non-success response into an API error
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        SupabaseError::Api { status, body }
    }
}
