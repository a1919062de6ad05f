use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Origin;

/// One recorded prompt/response transaction.
///
/// Every field defaults when absent so that older or partial log lines still
/// load; only a line that is not JSON at all (or has a mistyped field) is
/// rejected by the loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub id: String,
    pub origin: Origin,
    pub source_prompt: Option<String>,
    pub request: CompletionRequest,
    pub response: CompletionResponse,
    pub stream: bool,
    pub metadata: Metadata,
}

/// Request half of a session.
///
/// Holds the completion fields lifted from the body plus the legacy
/// `method`/`path`/`payload` shape that proxy captures always fill in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Response half of a session, with the legacy `status`/`body` shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub timestamp: DateTime<Utc>,
    pub latency_ms: u64,
    pub tags: Vec<String>,
    /// Set later by an external publishing step; absent until then.
    pub published: Option<String>,
    pub session_hash: String,
}

impl CompletionRequest {
    /// Builds the request half of a proxy capture from the parsed body.
    ///
    /// Each known completion field is lifted on its own when it has the
    /// expected type, so one odd field only drops itself. The raw body is
    /// always kept under `payload`.
    pub fn from_payload(method: &str, path: &str, payload: Value) -> Self {
        Self {
            model: lift(&payload, "model"),
            messages: lift(&payload, "messages"),
            prompt: lift(&payload, "prompt"),
            temperature: lift(&payload, "temperature"),
            top_p: lift(&payload, "top_p"),
            max_tokens: lift(&payload, "max_tokens"),
            stream: lift(&payload, "stream"),
            method: Some(method.to_string()),
            path: Some(path.to_string()),
            payload: Some(payload),
        }
    }
}

impl CompletionResponse {
    /// Builds the response half of a proxy capture. `body` is the parsed JSON
    /// body, or the raw text as a JSON string when it did not parse. A JSON
    /// `null` body is stored as absent.
    pub fn from_upstream(status: u16, body: Value) -> Self {
        Self {
            id: lift(&body, "id"),
            object: lift(&body, "object"),
            created: lift(&body, "created"),
            model: lift(&body, "model"),
            choices: lift(&body, "choices"),
            usage: body.get("usage").filter(|u| u.is_object()).map(Usage::lift),
            status: Some(status),
            body: Some(body).filter(|b| !b.is_null()),
        }
    }
}

impl Usage {
    fn lift(usage: &Value) -> Self {
        Self {
            prompt_tokens: lift(usage, "prompt_tokens").unwrap_or(0),
            completion_tokens: lift(usage, "completion_tokens").unwrap_or(0),
            total_tokens: lift(usage, "total_tokens").unwrap_or(0),
        }
    }
}

/// `key` of a JSON object as `T`. Missing, null and mistyped values are `None`.
fn lift<T: DeserializeOwned>(object: &Value, key: &str) -> Option<T> {
    object
        .get(key)
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

impl Session {
    /// Creates a proxy-captured session with a fresh id. The hash is left
    /// empty; call [`Session::seal`] once the record is complete.
    pub fn captured(
        started_at: DateTime<Utc>,
        request: CompletionRequest,
        response: CompletionResponse,
        stream: bool,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: new_session_id(started_at),
            origin: Origin::Proxy,
            source_prompt: None,
            request,
            response,
            stream,
            metadata: Metadata {
                timestamp: started_at,
                latency_ms,
                ..Metadata::default()
            },
        }
    }

    /// Projects the session onto a generic attribute tree, as consumed by the
    /// filter engine and summaries.
    pub fn project(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Model name, falling back to the raw request payload for legacy records.
    pub fn model(&self) -> Option<&str> {
        self.request.model.as_deref().or_else(|| {
            self.request
                .payload
                .as_ref()
                .and_then(|p| p.get("model"))
                .and_then(Value::as_str)
        })
    }

    pub fn total_tokens(&self) -> u64 {
        self.response.usage.map(|u| u.total_tokens).unwrap_or(0)
    }
}

/// Session ids are `YYYYMMDDHHMMSS` + microseconds + a random suffix, so they
/// sort by capture time and do not collide within one clock tick.
pub fn new_session_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", at.format("%Y%m%d%H%M%S%6f"), &suffix[..8])
}
