use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use procem_core::{BusSettings, MessageBus, PublishError};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::BusError;

#[derive(Debug, Clone)]
pub struct ManagementConfig {
    /// Management API base URL, e.g. `http://rabbitmq:15672`.
    pub url: String,
    pub vhost: String,
    /// Exchange every message is published to.
    pub exchange: String,
    pub login: String,
    pub password: String,
    /// Properties used when declaring `exchange`.
    pub durable: bool,
    pub auto_delete: bool,
}

impl From<&BusSettings> for ManagementConfig {
    fn from(bus: &BusSettings) -> Self {
        Self {
            url: bus.management_url.clone(),
            vhost: bus.vhost.clone(),
            exchange: bus.management_exchange.clone(),
            login: bus.login.clone(),
            password: bus.password.clone(),
            durable: bus.management_exchange_durable,
            auto_delete: bus.management_exchange_auto_delete,
        }
    }
}

/// [`MessageBus`] publishing through the broker's HTTP management API.
///
/// The exchange is declared as a topic exchange before the first publish. If the
/// broker refuses the declaration because the exchange already exists with other
/// properties, publishing goes ahead on the existing exchange.
pub struct ManagementBus {
    client: Client,
    config: ManagementConfig,
    exchange_url: Url,
    publish_url: Url,
    declared: AtomicBool,
    closed: AtomicBool,
}

#[derive(Serialize)]
struct ExchangeBody {
    #[serde(rename = "type")]
    kind: &'static str,
    durable: bool,
    auto_delete: bool,
}

#[derive(Serialize)]
struct PublishBody<'a> {
    properties: Properties,
    routing_key: &'a str,
    payload: &'a str,
    payload_encoding: &'static str,
}

#[derive(Serialize)]
struct Properties {
    content_type: &'static str,
}

#[derive(Deserialize)]
struct PublishReply {
    routed: bool,
}

#[derive(Deserialize)]
struct ErrorReply {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: String,
}

impl ManagementBus {
    pub fn new(config: ManagementConfig) -> Result<Self, BusError> {
        let exchange_url = endpoint(&config.url, &["api", "exchanges", &config.vhost, &config.exchange])?;
        let publish_url = endpoint(
            &config.url,
            &["api", "exchanges", &config.vhost, &config.exchange, "publish"],
        )?;
        Ok(Self {
            client: Client::builder().build()?,
            config,
            exchange_url,
            publish_url,
            declared: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    async fn declare(&self) -> Result<(), BusError> {
        let body = ExchangeBody {
            kind: "topic",
            durable: self.config.durable,
            auto_delete: self.config.auto_delete,
        };
        let response = self
            .client
            .put(self.exchange_url.clone())
            .basic_auth(&self.config.login, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;
        match check(response).await {
            Ok(_) => {
                debug!(exchange = %self.config.exchange, "management exchange declared");
                Ok(())
            }
            // PRECONDITION_FAILED: declared elsewhere with different arguments
            Err(BusError::Status { status: 400, message }) => {
                warn!(
                    exchange = %self.config.exchange,
                    reason = %message,
                    "management exchange exists with other properties; using it as is"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn send(&self, topic: &str, payload: &[u8]) -> Result<bool, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        if !self.declared.load(Ordering::SeqCst) {
            self.declare().await?;
            self.declared.store(true, Ordering::SeqCst);
        }

        let payload = std::str::from_utf8(payload).map_err(|_| BusError::Payload)?;
        let body = PublishBody {
            properties: Properties {
                content_type: "application/json",
            },
            routing_key: topic,
            payload,
            payload_encoding: "string",
        };
        let response = self
            .client
            .post(self.publish_url.clone())
            .basic_auth(&self.config.login, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;
        let reply: PublishReply = check(response).await?.json().await?;
        Ok(reply.routed)
    }
}

/// Base URL plus percent-encoded path segments (a `/` vhost becomes `%2F`).
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, BusError> {
    let mut url = Url::parse(base).map_err(|e| BusError::InvalidUrl(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| BusError::InvalidUrl(format!("{base}: cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn check(response: Response) -> Result<Response, BusError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorReply>(&body) {
        Ok(reply) if !reply.reason.is_empty() => reply.reason,
        Ok(reply) if !reply.error.is_empty() => reply.error,
        _ => body,
    };
    Err(BusError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl MessageBus for ManagementBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let routed = self.send(topic, &payload).await?;
        if !routed {
            warn!(
                exchange = %self.config.exchange,
                topic,
                "message published but no queue is bound for it"
            );
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
