use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use watchpost_api::{
    ApiError, EntityAction, EntityApi, EntityId, ExitRecord, Introduction, LivenessStatus,
    MessageRecord, MetricSample,
};

use crate::credentials::CredentialStore;

/// Typed HTTP client for the watchpost monitoring API.
///
/// One instance per server. Cloning is cheap: the connection pool and the
/// credential store are shared. Every dashboard endpoint lives under
/// `{base}/ui`, gated by HTTP Basic auth; a 401 from any request clears the
/// shared [`CredentialStore`].
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialStore>,
}

impl ApiClient {
    /// Create a new client with the given base URL, request timeout, and
    /// credential store.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self::with_client(client, base_url, credentials))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}/ui{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.header_value() {
            Some(value) => req.header(reqwest::header::AUTHORIZATION, value),
            None => req,
        }
    }

    /// Triage a response status. 401 clears the shared credential so every
    /// later request fails fast until a new login is stored.
    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("server rejected credentials, clearing stored login");
            self.credentials.clear();
            return Err(ApiError::Unauthorized);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut req = self.authed(self.client.get(&url));
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let resp = self.check(resp).await?;
        resp.json().await.map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn expect_ok(&self, req: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        self.check(resp).await?;
        Ok(())
    }

    // ── Listings ──────────────────────────────────────────────────────────

    /// Entities currently reporting from the given host.
    pub async fn entities_on_host(
        &self,
        host: &str,
        include_inactive: bool,
    ) -> Result<Vec<EntityId>, ApiError> {
        self.get_json(
            self.url(&format!("/eyeballs/{host}")),
            &[("inactive", include_inactive.to_string())],
        )
        .await
    }

    /// Entities currently reporting from the given address.
    pub async fn entities_at_ip(
        &self,
        ip: &str,
        include_inactive: bool,
    ) -> Result<Vec<EntityId>, ApiError> {
        self.get_json(
            self.url(&format!("/eyeballs/ip/{ip}")),
            &[("inactive", include_inactive.to_string())],
        )
        .await
    }

    /// Host machines with at least one known entity. The server calls these
    /// "bodies" on the wire.
    pub async fn hosts(&self, include_inactive: bool) -> Result<Vec<String>, ApiError> {
        self.get_json(
            self.url("/bodies"),
            &[("inactive", include_inactive.to_string())],
        )
        .await
    }

    /// Addresses with at least one known entity.
    pub async fn ips(&self, include_inactive: bool) -> Result<Vec<String>, ApiError> {
        self.get_json(
            self.url("/ips"),
            &[("inactive", include_inactive.to_string())],
        )
        .await
    }

    // ── Control ───────────────────────────────────────────────────────────

    /// Ask the agent to restart or stop its process.
    pub async fn perform_action(
        &self,
        id: &EntityId,
        action: EntityAction,
    ) -> Result<(), ApiError> {
        self.expect_ok(self.client.put(self.url(&format!("/action/{id}/{action}"))))
            .await
    }

    /// Remove the entity and its recorded history from the server.
    pub async fn delete_entity(&self, id: &EntityId) -> Result<(), ApiError> {
        self.expect_ok(self.client.delete(self.url(&format!("/delete/{id}"))))
            .await
    }
}

impl EntityApi for ApiClient {
    async fn introduction(&self, id: &EntityId) -> Result<Introduction, ApiError> {
        self.get_json(self.url(&format!("/introduction/{id}")), &[])
            .await
    }

    async fn status(&self, id: &EntityId) -> Result<LivenessStatus, ApiError> {
        self.get_json(self.url(&format!("/status/{id}")), &[]).await
    }

    async fn metrics(&self, id: &EntityId, start: u64) -> Result<Vec<MetricSample>, ApiError> {
        let mut query = Vec::new();
        if start > 0 {
            query.push(("start", start.to_string()));
        }
        self.get_json(self.url(&format!("/metrics/{id}")), &query)
            .await
    }

    async fn messages(
        &self,
        id: &EntityId,
        start: u64,
        end: Option<u64>,
    ) -> Result<Vec<MessageRecord>, ApiError> {
        let mut query = Vec::new();
        if start > 0 {
            query.push(("start", start.to_string()));
        }
        if let Some(end) = end {
            query.push(("end", end.to_string()));
        }
        self.get_json(self.url(&format!("/messages/{id}")), &query)
            .await
    }

    async fn exit_record(&self, id: &EntityId) -> Result<ExitRecord, ApiError> {
        self.get_json(self.url(&format!("/exit/{id}")), &[]).await
    }

    async fn entities(&self, include_inactive: bool) -> Result<Vec<EntityId>, ApiError> {
        self.get_json(
            self.url("/eyeballs"),
            &[("inactive", include_inactive.to_string())],
        )
        .await
    }
}
