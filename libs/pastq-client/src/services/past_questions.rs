use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};

use crate::client::PortalClient;
use crate::error::ApiError;
use crate::models::{
    ApiMessage, Download, Listing, PastQuestion, PastQuestionQuery, PastQuestionSearch,
    PastQuestionUpdate, PastQuestionUpload, RejectRequest,
};
use crate::multipart::Multipart;
use crate::validators::{
    ValidationError, validate_rejection_reason, validate_upload_file, validate_year,
};

const PAST_QUESTIONS_PATH: &str = "/past-questions/";

/// Browsing, uploading, downloading and moderating past questions.
#[derive(Debug, Clone, Copy)]
pub struct PastQuestionService<'a> {
    client: &'a PortalClient,
}

impl<'a> PastQuestionService<'a> {
    pub(crate) fn new(client: &'a PortalClient) -> Self {
        Self { client }
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn list(&self, query: &PastQuestionQuery) -> Result<Listing<PastQuestion>, ApiError> {
        self.client.get_json_with(PAST_QUESTIONS_PATH, query).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn get(&self, id: i64) -> Result<PastQuestion, ApiError> {
        self.client.get_json(&item_path(id, "")).await
    }

    /// # Errors
    /// [`ApiError::Validation`] when no criterion is set.
    pub async fn search(&self, search: &PastQuestionSearch) -> Result<Listing<PastQuestion>, ApiError> {
        if search.is_empty() {
            return Err(ValidationError::new("q", "Provide at least one search criterion").into());
        }
        self.client
            .get_json_with("/past-questions/search/", search)
            .await
    }

    /// Most downloaded approved uploads.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn popular(&self) -> Result<Listing<PastQuestion>, ApiError> {
        self.client.get_json("/past-questions/popular/").await
    }

    /// Uploads of the signed-in user, whatever their review state.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn my_uploads(&self) -> Result<Listing<PastQuestion>, ApiError> {
        self.client.get_json("/past-questions/my-uploads/").await
    }

    /// Moderation queue.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn pending(&self) -> Result<Listing<PastQuestion>, ApiError> {
        self.client.get_json("/past-questions/pending/").await
    }

    /// Submit a new past question for review.
    ///
    /// # Errors
    /// [`ApiError::Validation`] for an out-of-range year, a missing title or
    /// an unsupported or oversized file; backend rejections otherwise.
    pub async fn upload(&self, upload: &PastQuestionUpload) -> Result<PastQuestion, ApiError> {
        validate_year(upload.year)?;
        validate_upload_file(&upload.file.file_name, upload.file.size())?;
        if upload.title.trim().is_empty() {
            return Err(ValidationError::new("title", "Title is required").into());
        }

        let mut form = Multipart::new()
            .text("course_id", upload.course_id.to_string())
            .text("year", upload.year.to_string())
            .text("semester", upload.semester.as_str())
            .text("exam_type", upload.exam_type.as_str())
            .text("title", upload.title.trim());
        if let Some(lecturer) = upload.lecturer.as_deref().filter(|l| !l.trim().is_empty()) {
            form = form.text("lecturer", lecturer.trim());
        }
        let form = form
            .text("has_solutions", flag(upload.has_solutions))
            .text("is_scanned", flag(upload.is_scanned))
            .file(
                "file",
                &upload.file.file_name,
                upload.file.content_type.clone(),
                upload.file.data.clone(),
            );

        let created: PastQuestion = self
            .client
            .post_multipart(PAST_QUESTIONS_PATH, form)
            .await?;
        tracing::info!(
            id = created.id,
            file = %upload.file.file_name,
            bytes = upload.file.size(),
            "past question uploaded"
        );
        Ok(created)
    }

    /// Fetch the file of an approved past question.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn download(&self, id: i64) -> Result<Download, ApiError> {
        let response = self.client.get_bytes(&item_path(id, "download/")).await?;
        let headers = response.headers();
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_file_name)
            .unwrap_or_else(|| format!("past-question-{id}"));
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let data = response.into_body();
        tracing::debug!(id, file = %file_name, bytes = data.len(), "past question downloaded");
        Ok(Download {
            file_name,
            content_type,
            data,
        })
    }

    /// Absolute URL of the download endpoint.
    #[must_use]
    pub fn download_url(&self, id: i64) -> String {
        self.client.url(&item_path(id, "download/"))
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn update(&self, id: i64, update: &PastQuestionUpdate) -> Result<PastQuestion, ApiError> {
        if let Some(year) = update.year {
            validate_year(year)?;
        }
        self.client.patch_json(&item_path(id, ""), update).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn delete(&self, id: i64) -> Result<ApiMessage, ApiError> {
        let message = self.client.delete(&item_path(id, "")).await?;
        tracing::info!(id, "past question deleted");
        Ok(message)
    }

    /// Approve a pending upload.
    ///
    /// # Errors
    /// [`ApiError::Status`] with 400 when it was already approved.
    pub async fn approve(&self, id: i64) -> Result<ApiMessage, ApiError> {
        let message = self.client.post_empty(&item_path(id, "approve/")).await?;
        tracing::info!(id, "past question approved");
        Ok(message)
    }

    /// Reject a pending upload with a reason shown to the uploader.
    ///
    /// # Errors
    /// [`ApiError::Validation`] for a blank reason.
    pub async fn reject(&self, id: i64, reason: &str) -> Result<ApiMessage, ApiError> {
        validate_rejection_reason(reason)?;
        let body = RejectRequest {
            rejection_reason: reason.trim(),
        };
        let message = self
            .client
            .post_json(&item_path(id, "reject/"), &body)
            .await?;
        tracing::info!(id, "past question rejected");
        Ok(message)
    }
}

fn item_path(id: i64, action: &str) -> String {
    format!("{PAST_QUESTIONS_PATH}{id}/{action}")
}

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// `filename` parameter of an `attachment` disposition.
fn attachment_file_name(disposition: &str) -> Option<String> {
    disposition.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        let name = value.rsplit(['/', '\\']).next().unwrap_or(value);
        (!name.is_empty()).then(|| name.to_owned())
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::client::test_client;
    use crate::models::{ReviewStatus, UploadFile};
    use http::StatusCode;
    use httpmock::prelude::*;

    fn upload(file: UploadFile) -> PastQuestionUpload {
        PastQuestionUpload {
            course_id: 4,
            year: 2023,
            semester: "first".to_owned(),
            exam_type: "final".to_owned(),
            title: "DCIT101 Final 2023".to_owned(),
            file,
            lecturer: Some("Dr. Mensah".to_owned()),
            has_solutions: true,
            is_scanned: false,
        }
    }

    #[test]
    fn disposition_file_names() {
        assert_eq!(
            attachment_file_name(r#"attachment; filename="DCIT101_2023.pdf""#).as_deref(),
            Some("DCIT101_2023.pdf")
        );
        assert_eq!(
            attachment_file_name("attachment; filename=exam.png").as_deref(),
            Some("exam.png")
        );
        assert_eq!(
            attachment_file_name(r#"attachment; filename="../../etc/passwd""#).as_deref(),
            Some("passwd")
        );
        assert_eq!(attachment_file_name("inline"), None);
        assert_eq!(attachment_file_name(r#"attachment; filename="""#), None);
    }

    #[tokio::test]
    async fn empty_search_is_rejected_locally() {
        let (client, _) = test_client("http://127.0.0.1:9");
        let err = client
            .past_questions()
            .search(&PastQuestionSearch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/past-questions/")
                .query_param("status", "pending")
                .query_param("year", "2022");
            then.status(200)
                .body(r#"{"count":1,"results":[{"id":8,"year":2022,"status":"pending"}]}"#);
        });
        let (client, _) = test_client(&server.base_url());

        let listing = client
            .past_questions()
            .list(&PastQuestionQuery {
                status: Some(ReviewStatus::Pending),
                year: Some(2022),
                ..PastQuestionQuery::default()
            })
            .await
            .unwrap();
        mock.assert();
        assert_eq!(listing.items()[0].id, 8);
    }

    #[tokio::test]
    async fn upload_sends_multipart_form() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/past-questions/")
                .header_exists("content-type")
                .body_includes("name=\"course_id\"\r\n\r\n4\r\n")
                .body_includes("name=\"lecturer\"\r\n\r\nDr. Mensah\r\n")
                .body_includes("name=\"has_solutions\"\r\n\r\ntrue\r\n")
                .body_includes("filename=\"dcit101.pdf\"\r\nContent-Type: application/pdf")
                .body_includes("%PDF-1.7");
            then.status(201)
                .body(r#"{"id":31,"year":2023,"status":"pending","file_name":"dcit101.pdf"}"#);
        });
        let (client, _) = test_client(&server.base_url());

        let created = client
            .past_questions()
            .upload(&upload(UploadFile::new("dcit101.pdf", &b"%PDF-1.7"[..])))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(created.id, 31);
        assert_eq!(created.status, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_file_types() {
        let (client, _) = test_client("http://127.0.0.1:9");
        let err = client
            .past_questions()
            .upload(&upload(UploadFile::new("notes.docx", &b"PK"[..])))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ValidationError { field: "file", .. })));
    }

    #[tokio::test]
    async fn download_uses_attachment_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/past-questions/12/download/");
            then.status(200)
                .header("content-type", "application/pdf")
                .header("content-disposition", r#"attachment; filename="DCIT101_2023_final.pdf""#)
                .body("%PDF-1.4 body");
        });
        let (client, _) = test_client(&server.base_url());

        let file = client.past_questions().download(12).await.unwrap();
        assert_eq!(file.file_name, "DCIT101_2023_final.pdf");
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(&file.data[..], b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn download_without_disposition_falls_back_to_id() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/past-questions/5/download/");
            then.status(200).body("data");
        });
        let (client, _) = test_client(&server.base_url());

        let file = client.past_questions().download(5).await.unwrap();
        assert_eq!(file.file_name, "past-question-5");
        assert_eq!(
            client.past_questions().download_url(5),
            format!("{}/past-questions/5/download/", server.base_url())
        );
    }

    #[tokio::test]
    async fn approve_twice_surfaces_backend_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/past-questions/7/approve/");
            then.status(400)
                .body(r#"{"error":"Past question is already approved"}"#);
        });
        let (client, _) = test_client(&server.base_url());

        let err = client.past_questions().approve(7).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(err.to_string().contains("already approved"));
    }

    #[tokio::test]
    async fn reject_sends_reason() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/past-questions/7/reject/")
                .json_body(serde_json::json!({"rejection_reason": "Blurry scan"}));
            then.status(200)
                .body(r#"{"message":"Past question rejected"}"#);
        });
        let (client, _) = test_client(&server.base_url());

        let msg = client.past_questions().reject(7, "  Blurry scan ").await.unwrap();
        mock.assert();
        assert_eq!(msg.message.as_deref(), Some("Past question rejected"));

        let err = client.past_questions().reject(7, "   ").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
