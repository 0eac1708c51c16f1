//! HTTP client for the gate server

use crate::config::Config;
use anyhow::Result;
use leadgate_common::{ClickAck, ErrorBody, GateStats, ProtocolError, ReleaseResponse, SuspectInfo};
use serde::de::DeserializeOwned;

/// Reply to a test click
#[derive(Debug)]
pub enum ClickReply {
    Acknowledged(String),
    Refused { status: u16, message: String },
}

pub struct GateClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GateClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url().to_string(),
            token: config.admin_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not logged in. Run `leadgate login <TOKEN>` first."))?;
        Ok(request.header("Authorization", format!("Bearer {}", token)))
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        tracing::debug!(url = %response.url(), status = status.as_u16(), "Admin API response");
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ErrorBody::into_error(&text, status.as_u16()).into());
        }

        Ok(serde_json::from_str(&text).map_err(ProtocolError::from)?)
    }

    pub async fn stats(&self) -> Result<GateStats> {
        let request = self.authorized(self.http.get(self.url("/api/admin/stats")))?;
        Self::read(request.send().await?).await
    }

    pub async fn suspects(&self) -> Result<Vec<SuspectInfo>> {
        let request = self.authorized(self.http.get(self.url("/api/admin/suspects")))?;
        Self::read(request.send().await?).await
    }

    pub async fn unflag(&self, key: &str) -> Result<ReleaseResponse> {
        let path = format!("/api/admin/suspects/{}", key);
        let request = self.authorized(self.http.delete(self.url(&path)))?;
        Self::read(request.send().await?).await
    }

    pub async fn unlock(&self, key: &str) -> Result<ReleaseResponse> {
        let path = format!("/api/admin/lockouts/{}", key);
        let request = self.authorized(self.http.delete(self.url(&path)))?;
        Self::read(request.send().await?).await
    }

    /// Send one click to an affiliate link
    pub async fn click(
        &self,
        partner: &str,
        advanced: bool,
        user_agent: Option<&str>,
    ) -> Result<ClickReply> {
        let path = if advanced {
            format!("/affiliate2/{}", partner)
        } else {
            format!("/affiliate/{}", partner)
        };

        let url = self.url(&path);
        tracing::debug!(url = %url, advanced, user_agent = ?user_agent, "Sending click");

        let mut request = self.http.get(&url);
        if let Some(ua) = user_agent {
            request = request.header("User-Agent", ua);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(url = %url, status = status.as_u16(), "Click response");
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            let ack: ClickAck = serde_json::from_str(&text).map_err(ProtocolError::from)?;
            return Ok(ClickReply::Acknowledged(ack.message));
        }

        match ErrorBody::into_error(&text, status.as_u16()) {
            ProtocolError::Server { status, message } => Ok(ClickReply::Refused { status, message }),
            other => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base() {
        let config = Config {
            admin_token: Some("t".into()),
            server_url: "http://gate.local:8080/".into(),
        };
        let client = GateClient::new(&config);
        assert_eq!(client.url("/api/admin/stats"), "http://gate.local:8080/api/admin/stats");
    }

    #[test]
    fn test_admin_calls_require_token() {
        let client = GateClient::new(&Config::default());
        let request = client.http.get(client.url("/api/admin/stats"));
        assert!(client.authorized(request).is_err());
    }
}
