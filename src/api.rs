use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use douyin_virality::WorkflowError;

/// Request body of every workflow route: the workflow's own fields plus an
/// optional id that ties the call to a progress stream.
#[derive(Debug, Deserialize)]
pub struct ApiRequest<T> {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

/// `Json` whose rejections render as [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Error response rendered as `{"detail": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Invalid or missing API Key")
    }

    pub fn not_configured(what: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{} is not configured on the server", what),
        )
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let status = match &err {
            WorkflowError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            WorkflowError::Storage { .. } | WorkflowError::NotConfigured(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = %self.detail, "request failed");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header::CONTENT_TYPE, Request};
    use douyin_virality::workflows::DiscoverRequest;
    use douyin_virality::CollaboratorError;

    #[test]
    fn workflow_errors_map_to_status_codes() {
        let cases = [
            (WorkflowError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (
                WorkflowError::upstream("search", CollaboratorError::transport("apify", "timeout")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                WorkflowError::storage("append", CollaboratorError::upstream("sheets", 500, "boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                WorkflowError::NotConfigured("no key".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn missing_sheet_becomes_not_found() {
        let err = WorkflowError::storage("read", CollaboratorError::SheetNotFound("Creators".into()));
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.detail, "sheet 'Creators' not found");
    }

    #[test]
    fn request_envelope_keeps_workflow_fields() {
        let request: ApiRequest<DiscoverRequest> = serde_json::from_value(json!({
            "request_id": "job-1",
            "search_terms": ["dance"],
            "spreadsheet_id": "sheet-1",
            "sheet_name": "Creators"
        }))
        .unwrap();

        assert_eq!(request.request_id.as_deref(), Some("job-1"));
        assert_eq!(request.body.search_terms, vec!["dance"]);
        assert_eq!(request.body.max_videos_per_term, None);
    }

    async fn extract(body: &str) -> Result<ApiJson<ApiRequest<DiscoverRequest>>, ApiError> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/creators/discover")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        ApiJson::from_request(request, &()).await
    }

    #[tokio::test]
    async fn bad_bodies_become_detail_errors() {
        let missing = extract(r#"{"spreadsheet_id":"s"}"#).await.unwrap_err();
        assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(missing.detail.contains("search_terms"));

        let malformed = extract("{not json").await.unwrap_err();
        assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

        let response = missing.into_response();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("search_terms"));
    }

    #[tokio::test]
    async fn valid_bodies_pass_through() {
        let ApiJson(request) = extract(
            r#"{"search_terms":["dance"],"spreadsheet_id":"s","sheet_name":"Creators"}"#,
        )
        .await
        .unwrap();
        assert_eq!(request.body.sheet_name, "Creators");
        assert_eq!(request.request_id, None);
    }
}
