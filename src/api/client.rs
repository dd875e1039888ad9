//! Request dispatcher for the admin resources.
//!
//! Every call carries `Authorization: Bearer <access token>` taken from the
//! shared session context at send time. A 401 triggers one shared
//! verify/refresh cycle through the `SessionKeeper` (the same in-flight
//! guard the periodic loop uses) and, if that produced a different token,
//! exactly one retry. When a cycle is already running the request waits
//! for it instead of starting another.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    Course, JobFunction, Lesson, NewCourse, NewJobFunction, NewLesson, NewSector, NewSubSector, Profile, Sector,
    SubSector, UserFunction, UserFunctionInput,
};
use crate::config::{ClientConfig, ConfigError};
use crate::session::{SessionKeeper, SessionRuntime, TickOutcome};

pub const SECTORS_PATH: &str = "/perms/sector/";
pub const SUBSECTORS_PATH: &str = "/perms/subsector/";
pub const FUNCTIONS_PATH: &str = "/perms/function/";
pub const USER_FUNCTIONS_PATH: &str = "/perms/user_function/";
pub const PROFILES_PATH: &str = "/auth/profile/";
pub const COURSES_PATH: &str = "/courses/courses/admin/";
pub const COURSE_CREATE_PATH: &str = "/courses/all/create/";
pub const LESSONS_PATH: &str = "/courses/classes/";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("{0}")]
    Invalid(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    keeper: SessionKeeper,
}

impl ApiClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str, keeper: SessionKeeper) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned(), keeper }
    }

    pub fn from_config(config: &ClientConfig, runtime: &SessionRuntime) -> Result<Self, ConfigError> {
        Ok(Self::new(config.http_client()?, &config.base_url, runtime.keeper.clone()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn dispatch<F>(&self, method: &Method, path: &str, token: &str, attach: &F) -> Result<Response, ApiError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let builder = self.http.request(method.clone(), self.url(path)).bearer_auth(token);
        Ok(attach(builder).send().await?)
    }

    async fn send<F>(&self, method: Method, path: &str, attach: F) -> Result<Response, ApiError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let context = self.keeper.context();
        let token = context.access_token().ok_or(ApiError::Unauthenticated)?;
        let resp = self.dispatch(&method, path, &token, &attach).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check(resp).await;
        }

        debug!(%method, path, "request unauthorized; running session check");
        match self.keeper.tick().await {
            TickOutcome::LoggedOut | TickOutcome::NoSession | TickOutcome::Disposed => {
                return Err(ApiError::Unauthenticated);
            }
            TickOutcome::Overlapped => self.keeper.settled().await,
            TickOutcome::Valid | TickOutcome::Refreshed | TickOutcome::Superseded => {}
        }
        let Some(fresh) = context.access_token() else {
            return Err(ApiError::Unauthenticated);
        };
        if fresh == token {
            return check(resp).await;
        }

        let retry = self.dispatch(&method, path, &fresh, &attach).await?;
        check(retry).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.send(Method::GET, path, |rb| rb).await?;
        decode(resp).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let resp = self.send(method, path, |rb| rb.json(body)).await?;
        decode(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, |rb| rb).await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // sectors
    // -------------------------------------------------------------------------

    pub async fn list_sectors(&self) -> Result<Vec<Sector>, ApiError> {
        self.get_json(SECTORS_PATH).await
    }

    pub async fn create_sector(&self, sector: &NewSector) -> Result<Sector, ApiError> {
        sector.validate()?;
        self.send_json(Method::POST, SECTORS_PATH, sector).await
    }

    pub async fn delete_sector(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&item_path(SECTORS_PATH, id)?).await
    }

    pub async fn list_subsectors(&self) -> Result<Vec<SubSector>, ApiError> {
        self.get_json(SUBSECTORS_PATH).await
    }

    pub async fn create_subsector(&self, subsector: &NewSubSector) -> Result<SubSector, ApiError> {
        subsector.validate()?;
        self.send_json(Method::POST, SUBSECTORS_PATH, subsector).await
    }

    pub async fn delete_subsector(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&item_path(SUBSECTORS_PATH, id)?).await
    }

    // -------------------------------------------------------------------------
    // job functions and assignments
    // -------------------------------------------------------------------------

    pub async fn list_functions(&self) -> Result<Vec<JobFunction>, ApiError> {
        self.get_json(FUNCTIONS_PATH).await
    }

    pub async fn create_function(&self, function: &NewJobFunction) -> Result<JobFunction, ApiError> {
        function.validate()?;
        self.send_json(Method::POST, FUNCTIONS_PATH, function).await
    }

    pub async fn update_function(&self, id: &str, function: &NewJobFunction) -> Result<JobFunction, ApiError> {
        function.validate()?;
        self.send_json(Method::PUT, &item_path(FUNCTIONS_PATH, id)?, function).await
    }

    pub async fn delete_function(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&item_path(FUNCTIONS_PATH, id)?).await
    }

    pub async fn list_user_functions(&self) -> Result<Vec<UserFunction>, ApiError> {
        self.get_json(USER_FUNCTIONS_PATH).await
    }

    pub async fn create_user_function(&self, input: &UserFunctionInput) -> Result<serde_json::Value, ApiError> {
        input.validate()?;
        self.send_json(Method::POST, USER_FUNCTIONS_PATH, input).await
    }

    pub async fn update_user_function(&self, id: &str, input: &UserFunctionInput) -> Result<serde_json::Value, ApiError> {
        input.validate()?;
        self.send_json(Method::PUT, &item_path(USER_FUNCTIONS_PATH, id)?, input).await
    }

    pub async fn delete_user_function(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&item_path(USER_FUNCTIONS_PATH, id)?).await
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, ApiError> {
        self.get_json(PROFILES_PATH).await
    }

    // -------------------------------------------------------------------------
    // courses and lessons
    // -------------------------------------------------------------------------

    pub async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        self.get_json(COURSES_PATH).await
    }

    pub async fn create_course(&self, course: &NewCourse) -> Result<serde_json::Value, ApiError> {
        course.validate()?;
        self.send_json(Method::POST, COURSE_CREATE_PATH, course).await
    }

    pub async fn list_lessons(&self) -> Result<Vec<Lesson>, ApiError> {
        self.get_json(LESSONS_PATH).await
    }

    pub async fn create_lesson(&self, lesson: &NewLesson) -> Result<serde_json::Value, ApiError> {
        lesson.validate()?;
        let resp = self.send(Method::POST, LESSONS_PATH, |rb| rb.multipart(lesson.to_form())).await?;
        decode(resp).await
    }
}

pub(crate) fn item_path(collection: &str, id: &str) -> Result<String, ApiError> {
    let id = id.trim();
    if id.is_empty() || id.contains('/') || id.contains('?') {
        return Err(ApiError::Invalid(format!("invalid resource id: {id:?}")));
    }
    Ok(format!("{collection}{id}/"))
}

async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), body })
}

/// Decode a JSON body; an empty body decodes as JSON `null`.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let text = resp.text().await?;
    let text = if text.trim().is_empty() { "null" } else { text.as_str() };
    Ok(serde_json::from_str(text)?)
}
