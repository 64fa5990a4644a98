use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::error::{TimetableError, TimetableResult};
use crate::model::{Actor, Scope, SlotKey, SlotRecord, Subject, TeacherCandidate};
use crate::service::model::ApiErrorBody;

pub mod model;

/// The external timetable service, reduced to the six operations the engine
/// consumes. Implemented over HTTP by [`TimetableClient`]; tests substitute
/// an in-memory fake.
#[async_trait]
pub trait TimetableService: Send + Sync {
    async fn list_subjects(
        &self,
        school_code: &str,
        class_id: &str,
    ) -> TimetableResult<Vec<Subject>>;

    async fn list_slots(
        &self,
        school_code: &str,
        scope: &Scope,
    ) -> TimetableResult<Vec<SlotRecord>>;

    async fn create_subject(
        &self,
        school_code: &str,
        name: &str,
        color: &str,
        actor: &Actor,
    ) -> TimetableResult<Subject>;

    async fn upsert_slot(
        &self,
        school_code: &str,
        scope: &Scope,
        key: SlotKey,
        subject_id: &str,
        teacher_ids: &[String],
        actor: &Actor,
    ) -> TimetableResult<SlotRecord>;

    async fn delete_slot(
        &self,
        school_code: &str,
        key: SlotKey,
        class_id: &str,
        actor: &Actor,
    ) -> TimetableResult<()>;

    async fn teachers_for_subject(
        &self,
        school_code: &str,
        subject_id: &str,
    ) -> TimetableResult<Vec<TeacherCandidate>>;
}

#[derive(Clone)]
pub struct TimetableClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for TimetableClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimetableClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TimetableClient {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&cfg.service.base_url)
            .map_err(|_| ConfigError::Invalid("service.base_url must be a valid absolute URL"))?;
        Ok(Self::with_base_url(
            cfg.service.token.clone(),
            base_url,
            Duration::from_millis(cfg.service.request_timeout_ms),
        ))
    }

    pub fn with_base_url(token: String, base_url: Url, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("timegrid/0.1")
            .timeout(timeout)
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token,
        }
    }

    fn endpoint(&self, path: &str) -> TimetableResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| TimetableError::Validation(format!("invalid service URL {path}: {err}")))
    }

    /// Build the slot upsert request without sending it. Public so the wire
    /// shape can be asserted without a server.
    pub fn build_slot_upsert_request(&self, body: &Value) -> TimetableResult<reqwest::Request> {
        let endpoint = self.endpoint("v1/slots")?;
        self.http
            .put(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(body)
            .build()
            .map_err(network)
    }

    fn authorized(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rb.header("Authorization", format!("Bearer {}", self.token))
    }

    async fn read_json<T: DeserializeOwned>(res: reqwest::Response) -> TimetableResult<T> {
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        res.json::<T>().await.map_err(network)
    }
}

fn network(err: reqwest::Error) -> TimetableError {
    TimetableError::Network(err.to_string())
}

/// Map the query parameter the scope selects slots by: `class_id` for a class
/// timetable, `class_teacher_id` for a teacher's personal timetable.
fn scope_query(scope: &Scope) -> (&'static str, &str) {
    match scope {
        Scope::Class(id) => ("class_id", id),
        Scope::Teacher(id) => ("class_teacher_id", id),
    }
}

async fn error_from_response(res: reqwest::Response) -> TimetableError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(body);
    warn!(%status, "timetable service error: {}", message);
    match status {
        StatusCode::NOT_FOUND => TimetableError::NotFound(message),
        StatusCode::CONFLICT => TimetableError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            TimetableError::Validation(message)
        }
        _ => TimetableError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl TimetableService for TimetableClient {
    async fn list_subjects(
        &self,
        school_code: &str,
        class_id: &str,
    ) -> TimetableResult<Vec<Subject>> {
        let url = self.endpoint("v1/subjects")?;
        let res = self
            .authorized(self.http.get(url))
            .query(&[("school_code", school_code), ("class_id", class_id)])
            .send()
            .await
            .map_err(network)?;
        Self::read_json(res).await
    }

    async fn list_slots(
        &self,
        school_code: &str,
        scope: &Scope,
    ) -> TimetableResult<Vec<SlotRecord>> {
        let url = self.endpoint("v1/slots")?;
        let (scope_key, scope_id) = scope_query(scope);
        let res = self
            .authorized(self.http.get(url))
            .query(&[("school_code", school_code), (scope_key, scope_id)])
            .send()
            .await
            .map_err(network)?;
        Self::read_json(res).await
    }

    async fn create_subject(
        &self,
        school_code: &str,
        name: &str,
        color: &str,
        actor: &Actor,
    ) -> TimetableResult<Subject> {
        let url = self.endpoint("v1/subjects")?;
        let body = build_create_subject_body(school_code, name, color, actor);
        info!(school_code, name, "creating subject");
        let res = self
            .authorized(self.http.post(url))
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        Self::read_json(res).await
    }

    async fn upsert_slot(
        &self,
        school_code: &str,
        scope: &Scope,
        key: SlotKey,
        subject_id: &str,
        teacher_ids: &[String],
        actor: &Actor,
    ) -> TimetableResult<SlotRecord> {
        let body = build_upsert_slot_body(school_code, scope, key, subject_id, teacher_ids, actor);
        let request = self.build_slot_upsert_request(&body)?;
        info!(%key, subject_id, teachers = teacher_ids.len(), "upserting slot");
        let res = self.http.execute(request).await.map_err(network)?;
        Self::read_json(res).await
    }

    async fn delete_slot(
        &self,
        school_code: &str,
        key: SlotKey,
        class_id: &str,
        actor: &Actor,
    ) -> TimetableResult<()> {
        let url = self.endpoint("v1/slots")?;
        let period = key.period.get().to_string();
        info!(%key, class_id, "deleting slot");
        let res = self
            .authorized(self.http.delete(url))
            .query(&[
                ("school_code", school_code),
                ("day", key.day.as_str()),
                ("period", period.as_str()),
                ("class_id", class_id),
                ("deleted_by", actor.staff_id.as_str()),
            ])
            .send()
            .await
            .map_err(network)?;
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        Ok(())
    }

    async fn teachers_for_subject(
        &self,
        school_code: &str,
        subject_id: &str,
    ) -> TimetableResult<Vec<TeacherCandidate>> {
        let url = self.endpoint(&format!("v1/subjects/{}/teachers", subject_id))?;
        let res = self
            .authorized(self.http.get(url))
            .query(&[("school_code", school_code)])
            .send()
            .await
            .map_err(network)?;
        Self::read_json(res).await
    }
}

pub fn build_create_subject_body(
    school_code: &str,
    name: &str,
    color: &str,
    actor: &Actor,
) -> Value {
    json!({
        "school_code": school_code,
        "name": name,
        "color": color,
        "created_by": actor.staff_id,
    })
}

pub fn build_upsert_slot_body(
    school_code: &str,
    scope: &Scope,
    key: SlotKey,
    subject_id: &str,
    teacher_ids: &[String],
    actor: &Actor,
) -> Value {
    let mut body = Map::new();
    body.insert("school_code".into(), json!(school_code));
    body.insert("day".into(), json!(key.day.as_str()));
    body.insert("period".into(), json!(key.period.get()));
    body.insert("subject_id".into(), json!(subject_id));
    body.insert("teacher_ids".into(), json!(teacher_ids));
    body.insert("updated_by".into(), json!(actor.staff_id));
    // Exactly one scope selector; the two namespaces are disjoint.
    match scope {
        Scope::Class(id) => body.insert("class_id".into(), json!(id)),
        Scope::Teacher(id) => body.insert("class_teacher_id".into(), json!(id)),
    };
    Value::Object(body)
}
