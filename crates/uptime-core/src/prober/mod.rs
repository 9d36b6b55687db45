mod http;

pub use http::HttpProber;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::EndpointSpec;

/// Boolean endpoint health, as carried in probe results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointStatus {
    Up,
    Down,
}

impl EndpointStatus {
    pub fn is_up(self) -> bool {
        matches!(self, EndpointStatus::Up)
    }
}

impl std::fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// Outcome of a single endpoint probe.
///
/// Exactly one of `response_time` (UP) or `error` (DOWN) is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub display_name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    pub status: EndpointStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Wall-clock duration of the request, serialized as seconds.
    #[serde(default, with = "duration_secs", skip_serializing_if = "Option::is_none")]
    pub response_time: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn up(spec: &EndpointSpec, status_code: u16, response_time: Duration) -> Self {
        Self {
            name: spec.name.clone(),
            display_name: spec.display_name(),
            url: spec.url.clone(),
            surface: spec.surface.clone(),
            status: EndpointStatus::Up,
            status_code: Some(status_code),
            response_time: Some(response_time),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn down(spec: &EndpointSpec, status_code: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            name: spec.name.clone(),
            display_name: spec.display_name(),
            url: spec.url.clone(),
            surface: spec.surface.clone(),
            status: EndpointStatus::Down,
            status_code,
            response_time: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

/// Trait for probing a single endpoint.
///
/// Implementations are total: every failure mode is folded into a DOWN
/// result rather than surfaced as an error. Object-safe and Send + Sync for
/// use across async tasks.
#[async_trait]
pub trait EndpointProber: Send + Sync {
    async fn probe(&self, spec: &EndpointSpec) -> ProbeResult;
}
