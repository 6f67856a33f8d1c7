//! Downstream services: narrative copy generation and email dispatch.
//! Both are black boxes that either succeed or fail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::conditions::NormalizedConditions;
use crate::db::SurfPreferences;

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

/// User context sent along with the conditions
#[derive(Debug, Clone, Serialize)]
pub struct SurferContext {
    pub first_name: Option<String>,
    pub skill_level: Option<String>,
    pub board_type: Option<String>,
    pub preferred_wave_height_ft: Option<f64>,
}

impl SurferContext {
    pub fn new(first_name: Option<String>, preferences: &SurfPreferences) -> Self {
        Self {
            first_name,
            skill_level: preferences.skill_level.clone(),
            board_type: preferences.board_type.clone(),
            preferred_wave_height_ft: preferences.preferred_wave_height_ft,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NarrativeRequest<'a> {
    pub surfer: &'a SurferContext,
    pub conditions: &'a NormalizedConditions,
}

/// Structured copy for one spot. `skill_match` is a 0-100 percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotNarrative {
    pub skill_match: f64,
    pub headline: String,
    pub summary: String,
    #[serde(default)]
    pub skill_justification: Option<String>,
    #[serde(default)]
    pub best_time: Option<String>,
    #[serde(default)]
    pub board_recommendation: Option<String>,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &NarrativeRequest<'_>,
    ) -> Result<SpotNarrative, CollaboratorError>;
}

#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(
        &self,
        to: &str,
        template_id: &str,
        payload: &BTreeMap<String, String>,
    ) -> Result<(), CollaboratorError>;
}

/// JSON-over-HTTP narrative service
#[derive(Clone)]
pub struct HttpNarrativeGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpNarrativeGenerator {
    pub fn new(client: reqwest::Client, url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }
}

#[async_trait]
impl NarrativeGenerator for HttpNarrativeGenerator {
    #[instrument(skip(self, request), fields(spot = %request.conditions.spot_name))]
    async fn generate(
        &self,
        request: &NarrativeRequest<'_>,
    ) -> Result<SpotNarrative, CollaboratorError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                service: "narrative",
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Narrative response size: {} bytes", body.len());
        let mut narrative: SpotNarrative =
            serde_json::from_str(&body).map_err(|e| CollaboratorError::InvalidResponse {
                service: "narrative",
                message: e.to_string(),
            })?;

        if !narrative.skill_match.is_finite() {
            return Err(CollaboratorError::InvalidResponse {
                service: "narrative",
                message: "skill_match is not a number".to_string(),
            });
        }
        narrative.skill_match = narrative.skill_match.clamp(0.0, 100.0);
        Ok(narrative)
    }
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    to: &'a str,
    template_id: &'a str,
    data: &'a BTreeMap<String, String>,
}

/// JSON-over-HTTP transactional email service
#[derive(Clone)]
pub struct HttpEmailDispatcher {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpEmailDispatcher {
    pub fn new(client: reqwest::Client, url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }
}

#[async_trait]
impl EmailDispatcher for HttpEmailDispatcher {
    #[instrument(skip(self, payload), fields(fields = payload.len()))]
    async fn send(
        &self,
        to: &str,
        template_id: &str,
        payload: &BTreeMap<String, String>,
    ) -> Result<(), CollaboratorError> {
        let mut builder = self.client.post(&self.url).json(&EmailRequest {
            to,
            template_id,
            data: payload,
        });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                service: "email",
                status: status.as_u16(),
            });
        }
        debug!("Email accepted with status {}", status);
        Ok(())
    }
}
