//! HTTP client for Mimir's ruler and Alertmanager APIs.
//!
//! Mimir may not be listening yet when the controller runs, so nothing here
//! is allowed to take the caller down: writes return a [`RuleApiError`] value,
//! reads return an empty document, and every failure is logged at debug
//! level.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use tracing::debug;

use mimir_config::MIMIR_PORT;

use crate::error::RuleApiError;
use crate::types::{AlertRuleGroup, AlertingConfiguration, RuleGroups};

/// Tenant used when multitenancy is disabled.
pub const DEFAULT_TENANT: &str = "anonymous";

/// Per-request timeout used unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const YAML_CONTENT_TYPE: &str = "application/yaml";

/// Client for the tenant-scoped rule and alert endpoints.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct RuleClient {
    http: Client,
    base_url: String,
    tenant: String,
    timeout: Duration,
}

impl RuleClient {
    /// Creates a client for the API rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            tenant: DEFAULT_TENANT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a client for the Mimir instance at `host` on the standard port.
    #[must_use]
    pub fn for_host(host: &str) -> Self {
        Self::new(format!("http://{host}:{MIMIR_PORT}"))
    }

    /// Sets the tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Sets the default per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a copy of this client whose calls use `timeout`.
    ///
    /// ```rust,ignore
    /// let alerts = client.with_request_timeout(Duration::from_secs(2)).get_active_alerts().await;
    /// ```
    #[must_use]
    pub fn with_request_timeout(&self, timeout: Duration) -> Self {
        self.clone().with_timeout(timeout)
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The tenant rule groups are written under.
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// The current per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Replace the cluster-wide Alertmanager configuration.
    ///
    /// Returns the HTTP status on success.
    pub async fn set_alerting_config(
        &self,
        config: &AlertingConfiguration,
    ) -> Result<u16, RuleApiError> {
        let body = config
            .to_request_body()
            .map_err(|e| RuleApiError::Encode(e.to_string()))?;
        let url = self.endpoint(&["api", "v1", "alerts"])?;
        self.send_yaml(Method::POST, url, Some(body)).await
    }

    /// Fetch every tenant's rule groups.
    ///
    /// A failed request and an empty or unparseable response both yield an
    /// empty map.
    pub async fn get_rule_groups(&self) -> RuleGroups {
        let Ok(url) = self.endpoint(&["prometheus", "config", "v1", "rules"]) else {
            return RuleGroups::new();
        };
        let Some(body) = self.fetch(url.clone()).await else {
            return RuleGroups::new();
        };
        if body.trim().is_empty() {
            return RuleGroups::new();
        }

        serde_yaml::from_str(&body).unwrap_or_else(|e| {
            debug!(url = %url, error = %e, "unparseable rule groups response");
            RuleGroups::new()
        })
    }

    /// Create or replace a rule group for this client's tenant.
    ///
    /// Returns the HTTP status on success.
    pub async fn set_rule_group(&self, group: &AlertRuleGroup) -> Result<u16, RuleApiError> {
        let body = group
            .to_yaml()
            .map_err(|e| RuleApiError::Encode(e.to_string()))?;
        let url =
            self.endpoint(&["prometheus", "config", "v1", "rules", self.tenant.as_str()])?;
        self.send_yaml(Method::POST, url, Some(body)).await
    }

    /// Delete a rule group from this client's tenant.
    ///
    /// Returns the HTTP status on success.
    pub async fn delete_rule_group(&self, name: &str) -> Result<u16, RuleApiError> {
        let url = self.endpoint(&[
            "prometheus",
            "config",
            "v1",
            "rules",
            self.tenant.as_str(),
            name,
        ])?;
        self.send_yaml(Method::DELETE, url, None).await
    }

    /// Fetch currently firing alerts as raw JSON.
    ///
    /// Returns an empty JSON object on any failure.
    pub async fn get_active_alerts(&self) -> serde_json::Value {
        let empty = || serde_json::Value::Object(serde_json::Map::new());

        let Ok(url) = self.endpoint(&["prometheus", "api", "v1", "alerts"]) else {
            return empty();
        };
        let Some(body) = self.fetch(url.clone()).await else {
            return empty();
        };
        if body.trim().is_empty() {
            return empty();
        }

        serde_json::from_str(&body).unwrap_or_else(|e| {
            debug!(url = %url, error = %e, "unparseable alerts response");
            empty()
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RuleApiError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| RuleApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| RuleApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Option<String> {
        let response = match self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %classify(&e, &url), "failed to fetch");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "failed to fetch");
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                debug!(error = %classify(&e, &url), "failed to read response body");
                None
            }
        }
    }

    async fn send_yaml(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<u16, RuleApiError> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, YAML_CONTENT_TYPE).body(body);
        }

        let response = request.send().await.map_err(|e| {
            let err = classify(&e, &url);
            debug!(method = %method, error = %err, "request failed");
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                reason = status.canonical_reason().unwrap_or(""),
                "request rejected"
            );
            return Err(RuleApiError::Status {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        Ok(status.as_u16())
    }
}

fn classify(err: &reqwest::Error, url: &Url) -> RuleApiError {
    if err.is_timeout() {
        RuleApiError::Timeout {
            url: url.to_string(),
        }
    } else {
        RuleApiError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_host_uses_mimir_port() {
        let client = RuleClient::for_host("mimir-0.example");
        assert_eq!(client.base_url(), "http://mimir-0.example:9009");
        assert_eq!(client.tenant(), "anonymous");
        assert_eq!(client.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn endpoint_builds_tenant_paths() {
        let client = RuleClient::new("http://localhost:9009").with_tenant("team-a");
        let url = client
            .endpoint(&["prometheus", "config", "v1", "rules", client.tenant(), "cpu"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:9009/prometheus/config/v1/rules/team-a/cpu"
        );
    }

    #[test]
    fn endpoint_escapes_group_names() {
        let client = RuleClient::new("http://localhost:9009/");
        let url = client
            .endpoint(&["prometheus", "config", "v1", "rules", "anonymous", "my group/1"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:9009/prometheus/config/v1/rules/anonymous/my%20group%2F1"
        );
    }

    #[test]
    fn endpoint_rejects_invalid_base() {
        let client = RuleClient::new("not a url");
        assert!(matches!(
            client.endpoint(&["api"]),
            Err(RuleApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn request_timeout_override_leaves_original_untouched() {
        let client = RuleClient::new("http://localhost:9009");
        let quick = client.with_request_timeout(Duration::from_millis(250));
        assert_eq!(quick.timeout(), Duration::from_millis(250));
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn invalid_base_url_yields_empty_reads() {
        let client = RuleClient::new("not a url");
        assert!(client.get_rule_groups().await.is_empty());
        assert_eq!(client.get_active_alerts().await, serde_json::json!({}));
    }
}
