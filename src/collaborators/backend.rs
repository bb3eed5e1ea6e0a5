use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use reqwest::{multipart, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    error::{RecognizeError, RemoteError},
    recognition::{AttendanceStatus, Recognition, Subject},
    schedule::{parse_clock_time, parse_weekday, ScheduleEntry},
};

use super::{RecognitionService, RosterProvider, SessionStore, TimetableProvider};

/// Client for the attendance REST backend. One instance serves as
/// timetable, session store, recognizer and roster.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_client(client, base_url, token, timeout))
    }

    /// `timeout` is only reported in [`RemoteError::Timeout`]; the client
    /// enforces its own.
    pub fn with_client(client: Client, base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, operation: &'static str, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await.map_err(|err| self.transport(err))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Rejected {
            operation,
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, RemoteError> {
        self.send(operation, builder)
            .await?
            .json::<T>()
            .await
            .map_err(|err| RemoteError::Transport(format!("invalid {operation} response: {err}")))
    }

    fn transport(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::transport(err)
        }
    }
}

#[async_trait]
impl TimetableProvider for BackendClient {
    async fn list_schedule_entries(&self) -> Result<Vec<ScheduleEntry>, RemoteError> {
        let courses: Vec<CourseDto> = self
            .send_json("list_courses", self.request(Method::GET, "/cours/"))
            .await?;

        let total = courses.len();
        let entries: Vec<ScheduleEntry> = courses.into_iter().filter_map(CourseDto::into_entry).collect();
        if entries.len() < total {
            warn!("skipped {} course(s) with unreadable day or hours", total - entries.len());
        }
        Ok(entries)
    }
}

#[async_trait]
impl SessionStore for BackendClient {
    async fn start_session(&self, course_id: i64) -> Result<String, RemoteError> {
        let seance: SeanceDto = self
            .send_json(
                "start_session",
                self.request(Method::POST, &format!("/seances/start/{course_id}")),
            )
            .await?;
        Ok(seance.id.to_string())
    }

    async fn end_session(&self, session_id: &str) -> Result<(), RemoteError> {
        self.send(
            "end_session",
            self.request(Method::POST, &format!("/seances/end/{session_id}")),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecognitionService for BackendClient {
    async fn recognize(&self, session_id: &str, frame: &[u8]) -> Result<Recognition, RecognizeError> {
        let part = multipart::Part::bytes(frame.to_vec())
            .file_name("capture.jpg")
            .mime_str("image/jpeg")
            .map_err(RemoteError::transport)?;
        let form = multipart::Form::new().part("file", part);

        let builder = self
            .request(Method::POST, &format!("/attendance/mark/{session_id}"))
            .multipart(form);

        match self.send_json::<MarkDto>("mark_attendance", builder).await {
            Ok(mark) => Ok(mark.into_recognition()),
            Err(err) => Err(classify_mark_failure(err)),
        }
    }
}

#[async_trait]
impl RosterProvider for BackendClient {
    async fn list_subjects(&self) -> Result<Vec<Subject>, RemoteError> {
        let students: Vec<StudentDto> = self
            .send_json("list_students", self.request(Method::GET, "/students/active"))
            .await?;
        debug!("roster refreshed with {} students", students.len());
        Ok(students.into_iter().map(StudentDto::into_subject).collect())
    }
}

/// 400 and 404 from the mark endpoint mean "no face", "not recognised",
/// "outside the course window" or "already marked"; none is a fault.
fn classify_mark_failure(err: RemoteError) -> RecognizeError {
    match err {
        RemoteError::Rejected {
            status: 400 | 404,
            detail,
            ..
        } => RecognizeError::Miss(detail),
        other => RecognizeError::Remote(other),
    }
}

fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: serde_json::Value,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(text),
        }) => text,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "no details".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Naive timestamps are the backend's local time.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Some(stamp.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedRef {
    code: Option<String>,
    nom: Option<String>,
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CourseDto {
    id: i64,
    #[serde(default)]
    module: NamedRef,
    #[serde(default)]
    groupe: NamedRef,
    #[serde(default)]
    enseignant: NamedRef,
    jour: String,
    heure_debut: String,
    heure_fin: String,
    salle: Option<String>,
}

impl CourseDto {
    fn into_entry(self) -> Option<ScheduleEntry> {
        Some(ScheduleEntry {
            course_id: self.id,
            weekday: parse_weekday(&self.jour)?,
            start_time: parse_clock_time(&self.heure_debut)?,
            end_time: parse_clock_time(&self.heure_fin)?,
            room: self.salle.filter(|room| !room.trim().is_empty()),
            group_ref: self.groupe.code.unwrap_or_default(),
            module_ref: self.module.nom.or(self.module.code).unwrap_or_default(),
            teacher_ref: self.enseignant.full_name.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SeanceDto {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct MarkDto {
    student_id: i64,
    status: AttendanceStatus,
    confidence: f32,
    timestamp: Option<String>,
}

impl MarkDto {
    fn into_recognition(self) -> Recognition {
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        Recognition {
            subject_id: self.student_id,
            status: self.status,
            confidence: self.confidence,
            timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StudentDto {
    id: i64,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    user: Option<NamedRef>,
}

impl StudentDto {
    fn into_subject(self) -> Subject {
        let label = self
            .full_name
            .or_else(|| self.user.and_then(|user| user.full_name))
            .unwrap_or_else(|| format!("Subject #{}", self.id));
        Subject { id: self.id, label }
    }
}
