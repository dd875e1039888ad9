//! Resource payloads exchanged with the backend.
//!
//! Read types are lenient: ids may arrive as strings or numbers and
//! timestamps are kept as the backend's strings. Write types carry the
//! client-side checks the admin forms apply before submitting.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::client::ApiError;

fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() { Err(ApiError::Invalid(format!("{field} is required"))) } else { Ok(()) }
}

// =============================================================================
// SECTORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSector {
    pub name: String,
    pub description: String,
}

impl NewSector {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require("description", &self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSector {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "id_from_any")]
    pub sector: String,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSubSector {
    pub name: String,
    pub description: String,
    pub sector: String,
    pub is_active: bool,
}

impl NewSubSector {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require("description", &self.description)?;
        require("sector", &self.sector)
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// JOB FUNCTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFunction {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewJobFunction {
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

impl NewJobFunction {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require("description", &self.description)
    }
}

// =============================================================================
// USER FUNCTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedFunction {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub percent_completed: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Assignment of a job function to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFunction {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub user: UserRef,
    pub function: AssignedFunction,
    #[serde(default)]
    pub permission_type: String,
    #[serde(default)]
    pub is_obsolete: bool,
    #[serde(default)]
    pub created_by: Option<UserRef>,
    #[serde(default)]
    pub modified_by: Option<UserRef>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub last_modified_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFunctionInput {
    pub user: String,
    pub function: String,
    pub permission_type: String,
    pub is_obsolete: bool,
}

impl UserFunctionInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("user", &self.user)?;
        require("function", &self.function)?;
        require("permission_type", &self.permission_type)
    }
}

/// Account profile as listed by `/auth/profile/`. Unknown fields are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// COURSES AND LESSONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCourse {
    pub name: String,
    pub course: String,
    /// Days until the course expires.
    pub sequence_in_course: u32,
    pub class_file_type: String,
    pub class_file: String,
}

impl NewCourse {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require("course", &self.course)?;
        if self.sequence_in_course == 0 {
            return Err(ApiError::Invalid("sequence_in_course must be greater than zero".to_owned()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub course: Option<Value>,
    #[serde(default)]
    pub sequence_in_course: u32,
    #[serde(default)]
    pub class_file_type: String,
    #[serde(default)]
    pub class_file: String,
}

/// Lesson upload, sent as `multipart/form-data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLesson {
    pub name: String,
    pub description: String,
    pub sequence_in_course: u32,
    pub class_file_type: String,
    pub course: String,
    pub file_name: String,
    pub file: Vec<u8>,
}

impl NewLesson {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        if self.file.is_empty() {
            return Err(ApiError::Invalid("file is required".to_owned()));
        }
        Ok(())
    }

    pub(crate) fn to_form(&self) -> reqwest::multipart::Form {
        let part = reqwest::multipart::Part::bytes(self.file.clone()).file_name(self.file_name.clone());
        reqwest::multipart::Form::new()
            .text("name", self.name.clone())
            .text("description", self.description.clone())
            .text("sequence_in_course", self.sequence_in_course.to_string())
            .text("class_file_type", self.class_file_type.clone())
            .text("course", self.course.clone())
            .part("class_file", part)
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
