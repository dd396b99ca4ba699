//! Supabase REST API client using service_role key

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::SupabaseConfig;

/// Supabase client for server-side database operations
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SupabaseError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api { status: status.as_u16(), body });
        }
        Ok(response)
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }

    /// Make an authenticated GET request expecting a single row
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .request(reqwest::Method::GET, &url)
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        if response.status() == StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        Self::check(response)
            .await?
            .json()
            .await
            .map(Some)
            .map_err(SupabaseError::Parse)
    }

    /// Make an authenticated POST request (insert)
    pub async fn insert<T: Serialize>(&self, table: &str, data: &T) -> Result<(), SupabaseError> {
        let url = self.rest_url(table);

        let response = self
            .request(reqwest::Method::POST, &url)
            .header("Prefer", "return=minimal")
            .json(data)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        Self::check(response).await?;
        Ok(())
    }

    /// Make an authenticated PATCH request (update)
    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<(), SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .request(reqwest::Method::PATCH, &url)
            .json(data)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        Self::check(response).await?;
        Ok(())
    }
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[source] reqwest::Error),
}

impl SupabaseError {
    /// PostgREST answers 409 when a unique key is violated
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SupabaseError::Api { status, .. } if *status == StatusCode::CONFLICT.as_u16()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> SupabaseError {
        SupabaseError::Api {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn only_409_is_a_conflict() {
        assert!(api(409).is_conflict());
        for status in [400, 401, 406, 500, 503] {
            assert!(!api(status).is_conflict(), "status {status}");
        }
    }

    #[test]
    fn rest_urls_ignore_trailing_slash() {
        let client = SupabaseClient::new(&SupabaseConfig {
            url: "https://project.supabase.co/".to_string(),
            service_role_key: "key".to_string(),
        });
        assert_eq!(
            client.rest_url("turns"),
            "https://project.supabase.co/rest/v1/turns"
        );
    }
}
