//! Signing request/response protocol
//!
//! One request per invocation: subscribe to the reply topic, publish the
//! request, then wait for the reply carrying the same `request_id`. The wait
//! is bounded by a deadline and can be cancelled by the caller.

use crate::bus::{correlation_id, BusMessage, MessageBus, CORRELATION_KEY};
use relctl_core::{Error, Result, SigningEnvironment};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const SUCCESS_STATUS: &str = "success";
const GENERIC_FAILURE: &str = "signing failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// Sign a filesystem commit
    OstreeSign,
    /// Sign a set of artifact files
    ArtifactsSign,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::OstreeSign => "ostree-sign",
            RequestType::ArtifactsSign => "artifacts-sign",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file submitted for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactChecksum {
    pub file: String,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPayload {
    Commit {
        commit_object: String,
        checksum: String,
    },
    Artifacts(Vec<ArtifactChecksum>),
}

impl RequestPayload {
    pub fn request_type(&self) -> RequestType {
        match self {
            RequestPayload::Commit { .. } => RequestType::OstreeSign,
            RequestPayload::Artifacts(_) => RequestType::ArtifactsSign,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub build_id: String,
    pub basearch: String,
    pub payload: RequestPayload,
    /// Caller extras, merged into the body after the standard fields
    pub extra: BTreeMap<String, String>,
    pub priority: u8,
    pub environment: SigningEnvironment,
}

impl SigningRequest {
    pub fn request_type(&self) -> RequestType {
        self.payload.request_type()
    }

    /// Message body as sent on the bus
    pub fn body(&self, request_id: &str) -> Value {
        let mut body = Map::new();
        body.insert("build_id".into(), Value::from(self.build_id.as_str()));
        body.insert("basearch".into(), Value::from(self.basearch.as_str()));

        match &self.payload {
            RequestPayload::Commit {
                commit_object,
                checksum,
            } => {
                body.insert("commit_object".into(), Value::from(commit_object.as_str()));
                body.insert("checksum".into(), Value::from(checksum.as_str()));
            }
            RequestPayload::Artifacts(artifacts) => {
                let list = artifacts
                    .iter()
                    .map(|a| {
                        serde_json::json!({ "file": a.file, "checksum": a.checksum })
                    })
                    .collect();
                body.insert("artifacts".into(), Value::Array(list));
            }
        }

        for (key, value) in &self.extra {
            body.insert(key.clone(), Value::from(value.as_str()));
        }
        body.insert(CORRELATION_KEY.into(), Value::from(request_id));
        Value::Object(body)
    }
}

/// Parse `key=value` extras. Later duplicates win.
pub fn parse_extra_keys<S: AsRef<str>>(items: &[S]) -> Result<BTreeMap<String, String>> {
    let mut extra = BTreeMap::new();
    for item in items {
        let item = item.as_ref();
        let (key, value) = item.split_once('=').ok_or_else(|| {
            Error::configuration(format!("extra key '{}' is not of the form key=value", item))
        })?;
        if key.is_empty() {
            return Err(Error::configuration(format!(
                "extra key '{}' has an empty key",
                item
            )));
        }
        extra.insert(key.to_string(), value.to_string());
    }
    Ok(extra)
}

/// Reply from the signing authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningResponse {
    pub status: String,
    #[serde(rename = "failure-message", default)]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl SigningResponse {
    /// Accept only a `success` status (any case)
    pub fn validate(&self) -> Result<()> {
        if self.status.eq_ignore_ascii_case(SUCCESS_STATUS) {
            return Ok(());
        }
        debug!("Signing authority replied with status '{}'", self.status);
        Err(Error::signing_failure(
            self.failure_message
                .clone()
                .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        ))
    }
}

pub fn request_topic(prefix: &str, environment: SigningEnvironment, kind: RequestType) -> String {
    format!("{}.{}.build.request.{}", prefix, environment, kind)
}

pub fn response_topic(prefix: &str, environment: SigningEnvironment, kind: RequestType) -> String {
    format!("{}.finished", request_topic(prefix, environment, kind))
}

pub struct SigningProtocol<'b> {
    bus: &'b dyn MessageBus,
    topic_prefix: String,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<'b> SigningProtocol<'b> {
    pub fn new(bus: &'b dyn MessageBus, topic_prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bus,
            topic_prefix: topic_prefix.into(),
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the wait when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `request` and wait for its validated reply.
    ///
    /// Timeouts are not retried.
    pub async fn round_trip(&self, request: &SigningRequest) -> Result<SigningResponse> {
        let kind = request.request_type();
        let request_id = uuid::Uuid::new_v4().to_string();
        let reply_topic = response_topic(&self.topic_prefix, request.environment, kind);

        // Subscribe first so a fast reply cannot be missed
        let mut replies = self
            .bus
            .subscribe_correlated(&reply_topic, &request_id)
            .await?;

        let topic = request_topic(&self.topic_prefix, request.environment, kind);
        info!("Sending {} request {} to {}", kind, request_id, topic);
        self.bus
            .publish(BusMessage {
                topic,
                priority: Some(request.priority),
                body: request.body(&request_id),
            })
            .await?;

        let wait = async {
            while let Some(message) = replies.next().await {
                let echoed = correlation_id(&message.body);
                if echoed != Some(request_id.as_str()) {
                    trace!("Ignoring reply for {:?}", echoed);
                    continue;
                }
                return serde_json::from_value::<SigningResponse>(message.body).map_err(|e| {
                    Error::remote_protocol(format!("malformed reply to {}: {}", request_id, e))
                });
            }
            Err(Error::bus(format!(
                "reply stream on {} closed before a response arrived",
                reply_topic
            )))
        };

        let response = tokio::select! {
            result = tokio::time::timeout(self.timeout, wait) => match result {
                Ok(response) => response?,
                Err(_) => {
                    return Err(Error::timeout(
                        format!("{} reply to request {}", kind, request_id),
                        self.timeout,
                    ))
                }
            },
            _ = self.cancel.cancelled() => {
                return Err(Error::cancelled(format!("{} request {}", kind, request_id)));
            }
        };

        response.validate()?;
        info!("Request {} completed", request_id);
        Ok(response)
    }
}
