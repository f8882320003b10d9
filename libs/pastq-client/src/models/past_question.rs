use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

use super::course::Course;
use super::user::UserProfile;

/// Moderation state of an upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// The course of a past question: embedded in full, or referenced by code
/// or id depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CourseRef {
    Full(Box<Course>),
    Code(String),
    Id(i64),
}

impl CourseRef {
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            CourseRef::Full(course) => Some(&course.code),
            CourseRef::Code(code) => Some(code),
            CourseRef::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PastQuestion {
    pub id: i64,
    pub course: Option<CourseRef>,
    pub year: i32,
    pub semester: String,
    pub semester_display: Option<String>,
    pub exam_type: String,
    pub exam_type_display: Option<String>,
    pub title: String,
    pub file: Option<String>,
    pub file_url: Option<String>,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: Option<String>,
    pub uploaded_by: Option<UserProfile>,
    pub uploaded_at: Option<String>,
    pub status: ReviewStatus,
    pub status_display: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<String>,
    pub rejection_reason: String,
    pub download_count: u64,
    pub view_count: u64,
    pub lecturer: String,
    pub has_solutions: bool,
    pub is_scanned: bool,
    pub quality_rating: Option<f64>,
}

/// Filters for the past question listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PastQuestionQuery {
    /// Course id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// e.g. `-year`, `download_count`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Criteria for `/past-questions/search/`. At least one must be set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PastQuestionSearch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// Course code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<String>,
}

impl PastQuestionSearch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        blank(&self.q)
            && blank(&self.course)
            && self.year.is_none()
            && blank(&self.semester)
            && blank(&self.exam_type)
    }
}

/// Metadata changes to an existing upload. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PastQuestionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lecturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_solutions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_scanned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RejectRequest<'a> {
    pub rejection_reason: &'a str,
}

/// A file held in memory for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: mime::Mime,
    pub data: Bytes,
}

impl UploadFile {
    /// Content type guessed from the file extension.
    #[must_use]
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_mime(&file_name);
        Self {
            file_name,
            content_type,
            data: data.into(),
        }
    }

    /// Read a file from disk.
    ///
    /// # Errors
    /// [`ApiError::File`] when the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_owned(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(file_name, data))
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

fn guess_mime(file_name: &str) -> mime::Mime {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => mime::APPLICATION_PDF,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "png" => mime::IMAGE_PNG,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// A new past question submission.
#[derive(Debug, Clone)]
pub struct PastQuestionUpload {
    pub course_id: i64,
    pub year: i32,
    pub semester: String,
    pub exam_type: String,
    pub title: String,
    pub file: UploadFile,
    pub lecturer: Option<String>,
    pub has_solutions: bool,
    pub is_scanned: bool,
}

/// A downloaded past question file.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}
