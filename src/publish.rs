// src/publish.rs
//
// Hands normalized facts to the message bus. Publishing is fire-and-forget:
// the wire encoding happens synchronously (and can fail), the actual send is
// spawned and only observable through the returned handle. The sweep counts
// attempted publishes and never waits on delivery.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use metrics::counter;
use tokio::task::JoinHandle;

use crate::fact::Fact;

/// Opaque handle to one in-flight delivery. Dropping it detaches the send;
/// callers that need confirmation await `confirm()`.
pub struct DeliveryHandle {
    task: JoinHandle<Result<()>>,
}

impl DeliveryHandle {
    fn spawned(task: JoinHandle<Result<()>>) -> Self {
        Self { task }
    }

    /// Immediately-resolved handle, for transports with nothing in flight.
    pub fn resolved() -> Self {
        Self {
            task: tokio::spawn(async { Ok(()) }),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the broker send to finish and surface its outcome.
    pub async fn confirm(self) -> Result<()> {
        self.task.await.context("delivery task panicked")?
    }
}

/// Message-bus seam. `publish` must return quickly: encode, enqueue the send,
/// hand back the delivery handle. A synchronous `Err` means the fact never
/// left the process (encoding or enqueue failure).
pub trait Publisher: Send + Sync {
    fn publish(&self, fact: &Fact) -> Result<DeliveryHandle>;
    fn name(&self) -> &'static str;
}

/// Publishes facts to a Pub/Sub topic over its REST surface.
pub struct PubsubPublisher {
    client: reqwest::Client,
    publish_url: String,
    token: Option<String>,
}

impl PubsubPublisher {
    /// `endpoint` is the API root (production or an emulator host);
    /// `token` is a pre-fetched OAuth bearer token, absent when talking to
    /// an emulator. Token provisioning lives outside this crate.
    pub fn new(endpoint: &str, project: &str, topic: &str, token: Option<String>) -> Self {
        let publish_url = format!(
            "{}/v1/projects/{}/topics/{}:publish",
            endpoint.trim_end_matches('/'),
            project,
            topic
        );
        Self {
            client: reqwest::Client::new(),
            publish_url,
            token,
        }
    }

    pub fn topic_url(&self) -> &str {
        &self.publish_url
    }
}

impl Publisher for PubsubPublisher {
    fn publish(&self, fact: &Fact) -> Result<DeliveryHandle> {
        let data = BASE64.encode(fact.to_wire()?);
        let body = serde_json::json!({ "messages": [{ "data": data }] });

        let client = self.client.clone();
        let url = self.publish_url.clone();
        let token = self.token.clone();

        let task = tokio::spawn(async move {
            let mut req = client.post(&url).json(&body);
            if let Some(token) = &token {
                req = req.bearer_auth(token);
            }
            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!(error = ?e, "pubsub publish failed");
                    counter!("ingest_publish_errors_total").increment(1);
                    return Err(e).context("pubsub publish send");
                }
            };
            if !resp.status().is_success() {
                let status = resp.status();
                tracing::warn!(%status, "pubsub publish rejected");
                counter!("ingest_publish_errors_total").increment(1);
                return Err(anyhow!("pubsub publish returned {status}"));
            }
            Ok(())
        });

        Ok(DeliveryHandle::spawned(task))
    }

    fn name(&self) -> &'static str {
        "pubsub"
    }
}
