//! Nacos configuration source.

use super::{ChangeFeed, ConfigSource, RemoteChange, RemoteParams, SourceEvent, SourceKind};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Configuration source backed by a Nacos server.
///
/// Fetches the document identified by data id and group through the Nacos open
/// API. When username and password are configured, an access token is obtained
/// from the login endpoint and reused until shortly before it expires.
///
/// Subscriptions hold a listener request open on the server, which answers as
/// soon as the MD5 of the document differs from the last one fetched; the new
/// document is then read and published. Servers without the listener endpoint
/// are polled instead.
///
/// # Examples
///
/// ```rust,no_run
/// use service_config::sources::{RemoteParams, RemoteSource};
/// use std::time::Duration;
///
/// # fn example() -> service_config::error::Result<()> {
/// let mut params = RemoteParams::new("nacos.internal", "orders.yaml");
/// params.group = "SERVICES".to_string();
///
/// let source = RemoteSource::builder(params)
///     .with_timeout(Duration::from_secs(5))
///     .with_long_poll_timeout(Duration::from_secs(30))
///     .with_poll_interval(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RemoteSource {
    client: Arc<NacosClient>,
    long_poll_timeout: Duration,
    poll_interval: Duration,
}

impl RemoteSource {
    /// Create a new builder for a Nacos source.
    pub fn builder(params: RemoteParams) -> RemoteSourceBuilder {
        RemoteSourceBuilder::new(params)
    }

    /// Connection parameters of this source.
    pub fn params(&self) -> &RemoteParams {
        &self.client.params
    }
}

#[async_trait]
impl ConfigSource for RemoteSource {
    async fn fetch(&self) -> Result<String> {
        self.client.get_config().await
    }

    async fn subscribe(&self) -> Result<ChangeFeed> {
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(watch_changes(
            Arc::clone(&self.client),
            self.long_poll_timeout,
            self.poll_interval,
            tx,
        ));
        Ok(ChangeFeed::new(rx).with_guard(AbortOnDrop(task)))
    }

    fn name(&self) -> String {
        let params = &self.client.params;
        format!(
            "nacos:{}/{}@{}",
            params.base_url(),
            params.data_id,
            params.group
        )
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }
}

/// Builder for constructing a [`RemoteSource`].
pub struct RemoteSourceBuilder {
    params: RemoteParams,
    timeout: Duration,
    long_poll_timeout: Duration,
    poll_interval: Duration,
}

impl RemoteSourceBuilder {
    /// Create a new builder with default settings.
    pub fn new(params: RemoteParams) -> Self {
        Self {
            params,
            timeout: Duration::from_secs(10),
            long_poll_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Set the per-request timeout. Default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long the server may hold a listener request before answering
    /// that nothing changed. Default is 30 seconds.
    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout = timeout;
        self
    }

    /// Set how often subscriptions re-read the document when the server has no
    /// listener endpoint, and how long to back off after a failed listener
    /// request. Default is 5 seconds.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build the source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SourceUnreachable`] if the HTTP client cannot be
    /// constructed.
    pub fn build(self) -> Result<RemoteSource> {
        let http = Client::builder().timeout(self.timeout).build().map_err(|e| {
            ConfigError::SourceUnreachable(format!("Failed to create Nacos client: {}", e))
        })?;

        Ok(RemoteSource {
            client: Arc::new(NacosClient {
                base_url: self.params.base_url(),
                params: self.params,
                http,
                request_timeout: self.timeout,
                token: Mutex::new(None),
                content_md5: watch::Sender::new(None),
            }),
            long_poll_timeout: self.long_poll_timeout,
            poll_interval: self.poll_interval.max(Duration::from_millis(1)),
        })
    }
}

struct AccessToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    token_ttl: u64,
}

/// Server reply to a listener request.
#[derive(Debug, PartialEq, Eq)]
enum ListenOutcome {
    Changed,
    Unchanged,
    /// The server has no listener endpoint.
    Unsupported,
}

struct NacosClient {
    params: RemoteParams,
    base_url: String,
    http: Client,
    request_timeout: Duration,
    token: Mutex<Option<AccessToken>>,
    /// MD5 of the last document fetched, shared by every caller of `get_config`.
    content_md5: watch::Sender<Option<String>>,
}

impl NacosClient {
    async fn get_config(&self) -> Result<String> {
        let token = self.access_token().await?;

        let mut query = vec![
            ("dataId", self.params.data_id.as_str()),
            ("group", self.params.group.as_str()),
        ];
        if !self.params.namespace.is_empty() {
            query.push(("tenant", self.params.namespace.as_str()));
        }
        if let Some(token) = token.as_deref() {
            query.push(("accessToken", token));
        }

        let response = self
            .http
            .get(format!("{}/v1/cs/configs", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| ConfigError::SourceUnreachable(format!("Nacos request failed: {}", e)))?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                let content = response.text().await.map_err(|e| {
                    ConfigError::SourceUnreachable(format!("Failed to read Nacos response: {}", e))
                })?;
                self.content_md5.send_replace(Some(content_md5(&content)));
                Ok(content)
            }
            StatusCode::NOT_FOUND => Err(ConfigError::SourceUnreachable(format!(
                "Configuration {}@{} not found on {}",
                self.params.data_id, self.params.group, self.base_url
            ))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Force a fresh login on the next attempt.
                *self.token.lock().await = None;
                Err(ConfigError::SourceUnreachable(format!(
                    "Nacos rejected the request with status {}",
                    status
                )))
            }
            _ => Err(ConfigError::SourceUnreachable(format!(
                "Nacos request failed with status {}",
                status
            ))),
        }
    }

    /// Fetch the document, returning it only if its MD5 differs from the one
    /// recorded before the request.
    async fn fetch_if_changed(&self) -> Result<Option<String>> {
        let before = self.content_md5.borrow().clone();
        let content = self.get_config().await?;
        let changed = before.as_deref() != Some(content_md5(&content).as_str());
        Ok(changed.then_some(content))
    }

    /// Ask the server to answer once the document no longer matches `md5`,
    /// holding the request for at most `hold`.
    async fn listen(&self, md5: &str, hold: Duration) -> Result<ListenOutcome> {
        let token = self.access_token().await?;

        let mut request = self
            .http
            .post(format!("{}/v1/cs/configs/listener", self.base_url))
            .header("Long-Pulling-Timeout", hold.as_millis().to_string())
            .timeout(hold + self.request_timeout)
            .form(&[("Listening-Configs", listening_entry(&self.params, md5))]);
        if let Some(token) = token.as_deref() {
            request = request.query(&[("accessToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConfigError::SourceUnreachable(format!("Nacos listener request failed: {}", e)))?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                let body = response.text().await.map_err(|e| {
                    ConfigError::SourceUnreachable(format!("Failed to read Nacos response: {}", e))
                })?;
                // The server lists the changed entries, or nothing on timeout.
                if body.trim().is_empty() {
                    Ok(ListenOutcome::Unchanged)
                } else {
                    Ok(ListenOutcome::Changed)
                }
            }
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => {
                Ok(ListenOutcome::Unsupported)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                *self.token.lock().await = None;
                Err(ConfigError::SourceUnreachable(format!(
                    "Nacos rejected the listener request with status {}",
                    status
                )))
            }
            _ => Err(ConfigError::SourceUnreachable(format!(
                "Nacos listener request failed with status {}",
                status
            ))),
        }
    }

    fn change(&self, content: String) -> RemoteChange {
        RemoteChange {
            namespace: self.params.namespace.clone(),
            group: self.params.group.clone(),
            data_id: self.params.data_id.clone(),
            content,
        }
    }

    async fn access_token(&self) -> Result<Option<String>> {
        let Some(username) = self.params.username.as_deref() else {
            return Ok(None);
        };
        let password = self.params.password.as_deref().unwrap_or_default();

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(Some(token.value.clone()));
            }
        }

        let response = self
            .http
            .post(format!("{}/v1/auth/login", self.base_url))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| ConfigError::SourceUnreachable(format!("Nacos login failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::SourceUnreachable(format!(
                "Nacos login failed with status {}",
                status
            )));
        }

        let login: LoginResponse = response.json().await.map_err(|e| {
            ConfigError::SourceUnreachable(format!("Invalid Nacos login response: {}", e))
        })?;

        // Renew once 90% of the token lifetime has passed.
        let ttl = Duration::from_secs(login.token_ttl.max(1));
        *cached = Some(AccessToken {
            value: login.access_token.clone(),
            refresh_at: Instant::now() + ttl.mul_f64(0.9),
        });
        tracing::debug!(host = %self.params.host, ttl_secs = login.token_ttl, "Obtained Nacos access token");

        Ok(Some(login.access_token))
    }
}

/// Hex MD5 of a document, as Nacos computes it.
fn content_md5(content: &str) -> String {
    format!("{:x}", Md5::digest(content.as_bytes()))
}

/// One `Listening-Configs` entry: fields separated by `0x02`, terminated by `0x01`.
fn listening_entry(params: &RemoteParams, md5: &str) -> String {
    let mut entry = format!("{}\u{2}{}\u{2}{}", params.data_id, params.group, md5);
    if !params.namespace.is_empty() {
        entry.push('\u{2}');
        entry.push_str(&params.namespace);
    }
    entry.push('\u{1}');
    entry
}

/// Aborts the change task when the feed is dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Publish the document if it changed. Returns `false` once the feed is gone.
async fn publish_if_changed(client: &NacosClient, tx: &mpsc::Sender<SourceEvent>) -> bool {
    match client.fetch_if_changed().await {
        Ok(Some(content)) => tx
            .send(SourceEvent::Published(client.change(content)))
            .await
            .is_ok(),
        Ok(None) => true,
        Err(e) => {
            tracing::warn!(
                data_id = %client.params.data_id,
                group = %client.params.group,
                error = %e,
                "Fetching changed Nacos configuration failed"
            );
            true
        }
    }
}

async fn watch_changes(
    client: Arc<NacosClient>,
    hold: Duration,
    poll_interval: Duration,
    tx: mpsc::Sender<SourceEvent>,
) {
    // The provider fetches right after subscribing; listen against that digest.
    let mut recorded = client.content_md5.subscribe();
    let ready = matches!(
        tokio::time::timeout(poll_interval, recorded.wait_for(Option::is_some)).await,
        Ok(Ok(_))
    );
    if !ready && !publish_if_changed(&client, &tx).await {
        return;
    }

    loop {
        if tx.is_closed() {
            break;
        }

        let md5 = client.content_md5.borrow().clone();
        let Some(md5) = md5 else {
            tokio::time::sleep(poll_interval).await;
            if !publish_if_changed(&client, &tx).await {
                break;
            }
            continue;
        };

        match client.listen(&md5, hold).await {
            Ok(ListenOutcome::Changed) => {
                tracing::debug!(data_id = %client.params.data_id, "Nacos reported a configuration change");
                if !publish_if_changed(&client, &tx).await {
                    break;
                }
            }
            Ok(ListenOutcome::Unchanged) => {}
            Ok(ListenOutcome::Unsupported) => {
                tracing::info!(
                    base_url = %client.base_url,
                    interval_ms = poll_interval.as_millis() as u64,
                    "Nacos listener endpoint unavailable, polling for changes"
                );
                poll_changes(client, poll_interval, tx).await;
                break;
            }
            Err(e) => {
                tracing::warn!(
                    data_id = %client.params.data_id,
                    group = %client.params.group,
                    error = %e,
                    "Listening for Nacos changes failed"
                );
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

async fn poll_changes(client: Arc<NacosClient>, interval: Duration, tx: mpsc::Sender<SourceEvent>) {
    // The document was just read; the first check is one interval away.
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() || !publish_if_changed(&client, &tx).await {
            break;
        }
    }
}
