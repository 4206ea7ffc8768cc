//! Session registry backed by the analytics table search REST endpoints.
//!
//! Counting POSTs the active-session table name and a Lucene style query to the
//! *count* endpoint, which answers with a bare decimal. Listing POSTs the same
//! query with a page window to the *search* endpoint, which answers with a JSON
//! array of records. Both endpoints require HTTP basic auth.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::{fmt, time::Duration};
use tracing::{debug, error, instrument};
use url::Url;

use super::{ActiveSession, RegistryError, SessionRegistry, SESSION_LIST_LIMIT};
use crate::{
    context::{PrincipalId, QualifiedUser},
    APP_USER_AGENT,
};

pub const ACTIVE_SESSION_TABLE_NAME: &str = "ORG_WSO2_IS_ANALYTICS_STREAM_ACTIVESESSIONS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AnalyticsConfig {
    pub count_url: Url,
    pub search_url: Url,
    pub username: String,
    pub password: SecretString,
    pub timeout: Duration,
}

impl AnalyticsConfig {
    #[must_use]
    pub fn new(count_url: Url, search_url: Url, username: String, password: SecretString) -> Self {
        Self {
            count_url,
            search_url,
            username,
            password,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for AnalyticsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsConfig")
            .field("count_url", &self.count_url.as_str())
            .field("search_url", &self.search_url.as_str())
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsRegistry {
    client: Client,
    config: AnalyticsConfig,
}

impl AnalyticsRegistry {
    /// Build a registry client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: AnalyticsConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .context("Failed to build analytics HTTP client")?;

        Ok(Self { client, config })
    }

    fn authorization(&self) -> String {
        let credentials = format!(
            "{}:{}",
            self.config.username,
            self.config.password.expose_secret()
        );
        format!("Basic {}", Base64::encode_string(credentials.as_bytes()))
    }

    async fn post(&self, url: &Url, payload: &Value) -> Result<String, RegistryError> {
        debug!("JSON payload for retrieving data: {}", payload);

        let response = self
            .client
            .post(url.as_str())
            .header(AUTHORIZATION, self.authorization())
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                error!("Failed to execute the HTTP POST request: {}", err);
                RegistryError::Unavailable(format!("request to {url} failed"))
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            error!("Failed to retrieve data from endpoint, status: {}", status);
            return Err(RegistryError::Unavailable(format!(
                "{url} responded with {status}"
            )));
        }

        let body = response.text().await.map_err(|err| {
            error!("Problem occurred while reading the HTTP response: {}", err);
            RegistryError::Unavailable(format!("unreadable response from {url}"))
        })?;

        debug!("Response from the data source: {}", body);

        Ok(body)
    }
}

/// Backslash-escape query syntax so a term always matches literally.
fn escape_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if c.is_whitespace() || "+-&|!(){}[]^\"~*?:\\/".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Query selecting the active sessions of one user.
#[must_use]
pub fn session_query(user: &QualifiedUser) -> String {
    format!(
        "tenantDomain:{} AND username:{} AND userstoreDomain:{}",
        escape_term(&user.tenant_domain),
        escape_term(&user.username),
        escape_term(&user.user_store_domain)
    )
}

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn parse_session_records(body: &str) -> Result<Vec<ActiveSession>, RegistryError> {
    let records: Vec<Value> = serde_json::from_str(body).map_err(|err| {
        error!("Failed to parse session records: {}", err);
        RegistryError::Unavailable("invalid session records".to_string())
    })?;

    records
        .iter()
        .map(|record| {
            let values = record.get("values");
            let field = |name: &str| value_to_string(values.and_then(|v| v.get(name)));

            let session_id = field("sessionId").ok_or_else(|| {
                RegistryError::Unavailable("session record without sessionId".to_string())
            })?;

            Ok(ActiveSession {
                session_id,
                timestamp: value_to_string(record.get("timestamp")).unwrap_or_default(),
                user_agent: field("userAgent").unwrap_or_default(),
                ip_address: field("remoteIp").unwrap_or_default(),
                service_provider: field("serviceProvider").unwrap_or_default(),
            })
        })
        .collect()
}

#[async_trait]
impl SessionRegistry for AnalyticsRegistry {
    #[instrument(skip(self))]
    async fn count_active_sessions(&self, principal: &PrincipalId) -> Result<u64, RegistryError> {
        let payload = json!({
            "tableName": ACTIVE_SESSION_TABLE_NAME,
            "query": session_query(&principal.qualified()),
        });

        let body = self.post(&self.config.count_url, &payload).await?;

        body.trim().parse::<u64>().map_err(|err| {
            error!("Problem occurred while parsing response result: {}", err);
            RegistryError::Unavailable("invalid session count".to_string())
        })
    }

    #[instrument(skip(self))]
    async fn active_sessions(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<ActiveSession>, RegistryError> {
        let payload = json!({
            "tableName": ACTIVE_SESSION_TABLE_NAME,
            "query": session_query(&principal.qualified()),
            "start": 0,
            "count": SESSION_LIST_LIMIT,
        });

        let body = self.post(&self.config.search_url, &payload).await?;

        parse_session_records(&body)
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        // Any HTTP answer means the endpoint is reachable.
        self.client
            .get(self.config.count_url.as_str())
            .send()
            .await
            .map(|_| ())
            .map_err(|err| RegistryError::Unavailable(err.to_string()))
    }
}
