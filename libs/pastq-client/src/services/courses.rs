use serde::Serialize;

use crate::client::PortalClient;
use crate::error::ApiError;
use crate::models::{ApiMessage, Choice, Course, CourseDraft, CourseQuery, Listing};
use crate::validators::ValidationError;

const COURSES_PATH: &str = "/courses/";

#[derive(Serialize)]
struct CourseSearch<'a> {
    q: &'a str,
    #[serde(flatten)]
    filters: &'a CourseQuery,
}

#[derive(Serialize)]
struct FacultyFilter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    faculty: Option<&'a str>,
}

/// Course catalogue. Reads are public; writes need an admin session.
#[derive(Debug, Clone, Copy)]
pub struct CourseService<'a> {
    client: &'a PortalClient,
}

impl<'a> CourseService<'a> {
    pub(crate) fn new(client: &'a PortalClient) -> Self {
        Self { client }
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn list(&self, query: &CourseQuery) -> Result<Listing<Course>, ApiError> {
        self.client.get_json_with(COURSES_PATH, query).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn get(&self, code: &str) -> Result<Course, ApiError> {
        self.client.get_json(&course_path(code)?).await
    }

    /// Free-text search, optionally narrowed by the filters of `query`.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn search(&self, q: &str, filters: &CourseQuery) -> Result<Listing<Course>, ApiError> {
        let search = CourseSearch { q: q.trim(), filters };
        self.client.get_json_with("/courses/search/", &search).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn popular(&self) -> Result<Listing<Course>, ApiError> {
        self.client.get_json("/courses/popular/").await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn faculties(&self) -> Result<Vec<Choice>, ApiError> {
        self.client.get_json("/courses/faculties/").await
    }

    /// Departments, limited to one faculty when given.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn departments(&self, faculty: Option<&str>) -> Result<Vec<Choice>, ApiError> {
        self.client
            .get_json_with("/courses/departments/", &FacultyFilter { faculty })
            .await
    }

    /// # Errors
    /// [`ApiError::Validation`] when code or title is missing.
    pub async fn create(&self, draft: &CourseDraft) -> Result<Course, ApiError> {
        let code = draft.code.as_deref().unwrap_or_default();
        check_code(code)?;
        if draft.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
            return Err(ValidationError::new("title", "Course title is required").into());
        }
        let course: Course = self.client.post_json(COURSES_PATH, draft).await?;
        tracing::info!(code = %course.code, "course created");
        Ok(course)
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn update(&self, code: &str, draft: &CourseDraft) -> Result<Course, ApiError> {
        self.client.patch_json(&course_path(code)?, draft).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn delete(&self, code: &str) -> Result<ApiMessage, ApiError> {
        let message = self.client.delete(&course_path(code)?).await?;
        tracing::info!(%code, "course deleted");
        Ok(message)
    }
}

fn check_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() {
        return Err(ValidationError::new("code", "Course code is required"));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::new(
            "code",
            "Course code may only contain letters, digits, '-', '_' and '.'",
        ));
    }
    Ok(())
}

fn course_path(code: &str) -> Result<String, ValidationError> {
    let code = code.trim();
    check_code(code)?;
    Ok(format!("{COURSES_PATH}{code}/"))
}
