//! HTTP client for the survey server API.

use anyhow::{bail, Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use survey_core::models::{Drone, Mission, MissionDraft, ProgressUpdate, RegisterDroneRequest};
use survey_core::spatial::PlanSummary;

/// Identity forwarded on every request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub organization_id: String,
    pub user_id: String,
    pub role: String,
}

/// Client for the survey server REST API.
pub struct SurveyClient {
    client: Client,
    base_url: String,
    identity: Identity,
}

impl SurveyClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the survey server (e.g., "http://localhost:3000")
    /// * `identity` - Organization, user and role sent as identity headers
    pub fn new(base_url: impl Into<String>, identity: Identity) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity,
        }
    }

    pub async fn register_drone(&self, request: &RegisterDroneRequest) -> Result<Drone> {
        self.send(Method::POST, "/v1/drones", Some(request)).await
    }

    pub async fn plan_mission(&self, draft: &MissionDraft) -> Result<Mission> {
        self.send(Method::POST, "/v1/missions", Some(draft)).await
    }

    pub async fn get_mission(&self, mission_id: &str) -> Result<Mission> {
        self.send::<(), _>(Method::GET, &format!("/v1/missions/{}", mission_id), None)
            .await
    }

    pub async fn plan_summary(&self, mission_id: &str) -> Result<PlanSummary> {
        self.send::<(), _>(Method::GET, &format!("/v1/missions/{}/summary", mission_id), None)
            .await
    }

    /// Issue a body-less lifecycle command: start, pause, resume or complete.
    pub async fn control(&self, mission_id: &str, action: &str) -> Result<Mission> {
        self.send::<(), _>(
            Method::POST,
            &format!("/v1/missions/{}/{}", mission_id, action),
            None,
        )
        .await
    }

    pub async fn abort(&self, mission_id: &str, reason: Option<&str>) -> Result<Mission> {
        self.send(
            Method::POST,
            &format!("/v1/missions/{}/abort", mission_id),
            Some(&json!({ "reason": reason })),
        )
        .await
    }

    pub async fn fail(&self, mission_id: &str, reason: &str) -> Result<Mission> {
        self.send(
            Method::POST,
            &format!("/v1/missions/{}/fail", mission_id),
            Some(&json!({ "reason": reason })),
        )
        .await
    }

    pub async fn report_progress(&self, mission_id: &str, update: &ProgressUpdate) -> Result<Mission> {
        self.send(
            Method::PATCH,
            &format!("/v1/missions/{}/progress", mission_id),
            Some(update),
        )
        .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Organization-Id", &self.identity.organization_id)
            .header("X-User-Id", &self.identity.user_id)
            .header("X-User-Role", &self.identity.role)
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let mut request = self.request(method.clone(), path);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, path))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["error"].as_str().unwrap_or("no error message");
        let kind = body["kind"].as_str().unwrap_or("unknown");
        bail!("server returned {} ({}): {}", status, kind, message);
    }
    response.json().await.context("Failed to decode response body")
}
