// 🌐 Upload Server - REST API with Axum
// Upload a spreadsheet, preview categories, download the workbook

use crate::cache::{content_key, Dataset, DatasetCache};
use crate::classifier::{classify, ClassifiedExposure, Classification};
use crate::config::{Settings, DEFAULT_SERVER_CACHE_CAPACITY};
use crate::error::Error;
use crate::export::{output_file_name, write_workbook, XLSX_MIME};
use crate::loader::InputFormat;
use crate::rules::RuleEngine;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    cache: Arc<Mutex<DatasetCache>>,
    engine: Arc<RuleEngine>,
    settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> crate::Result<Self> {
        let engine = settings.rule_engine()?;
        let capacity = settings.cache_capacity.unwrap_or(DEFAULT_SERVER_CACHE_CAPACITY);
        Ok(Self {
            cache: Arc::new(Mutex::new(DatasetCache::new(capacity))),
            engine: Arc::new(engine),
            settings: Arc::new(settings),
        })
    }

    fn dataset(&self, id: &str) -> Result<Arc<Dataset>, ApiError> {
        self.cached(id)
            .ok_or_else(|| ApiError::not_found(format!("unknown dataset {id}")))
    }

    fn cached(&self, key: &str) -> Option<Arc<Dataset>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(key)
    }

    /// Parse outside the lock; only the lookup and the insert hold it.
    async fn load(&self, bytes: axum::body::Bytes, file_name: String) -> Result<Arc<Dataset>, ApiError> {
        let key = content_key(&bytes, InputFormat::from_file_name(&file_name));
        if let Some(hit) = self.cached(&key) {
            tracing::debug!(key = %key, file = %file_name, "dataset cache hit");
            return Ok(hit);
        }

        let dataset = tokio::task::spawn_blocking(move || Dataset::load(&bytes, &file_name))
            .await
            .map_err(|e| ApiError::internal(e.to_string()))??;

        Ok(self.cache.lock().unwrap_or_else(PoisonError::into_inner).insert(dataset))
    }

    fn classify(&self, dataset: &Dataset, query: &ThresholdQuery) -> Classification {
        let min_balance = query.min_balance.unwrap_or(self.settings.min_balance);
        classify(&dataset.exposures, &self.engine, min_balance)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::MissingColumns(_)
            | Error::InvalidCell { .. }
            | Error::EmptyWorkbook
            | Error::Spreadsheet(_)
            | Error::Csv(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        } else {
            tracing::warn!(status = %self.status, error = %self.message, "request rejected");
        }
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub file_name: String,
    pub records: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
pub struct CategoryPreview {
    pub name: String,
    pub min_balance: u64,
    pub rows: Vec<ClassifiedExposure>,
}

/// `min_balance` must parse as u64; negatives never reach the classifier.
#[derive(Debug, Default, Deserialize)]
pub struct ThresholdQuery {
    pub min_balance: Option<u64>,
}

/// `file_name` names the attachment after the caller's own upload.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub min_balance: Option<u64>,
    pub file_name: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/datasets - Upload a spreadsheet (multipart field `file`)
async fn upload_dataset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("exposures.xlsx").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("uploaded file is empty"));
        }

        let dataset = state.load(bytes, file_name.clone()).await?;

        return Ok(Json(ApiResponse::ok(UploadResponse {
            id: dataset.key.clone(),
            file_name,
            records: dataset.len(),
        })));
    }

    Err(ApiError::bad_request("please upload an exposures file in the `file` field"))
}

/// GET /api/datasets/:id/categories - Category names with row counts
async fn list_categories(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ThresholdQuery>,
) -> Result<Json<ApiResponse<Vec<CategorySummary>>>, ApiError> {
    let dataset = state.dataset(&id)?;
    let classification = state.classify(&dataset, &query);

    let summary = classification
        .summary()
        .into_iter()
        .map(|(name, rows)| CategorySummary { name: name.to_string(), rows })
        .collect();

    Ok(Json(ApiResponse::ok(summary)))
}

/// GET /api/datasets/:id/categories/:name - Preview one category
async fn preview_category(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    Query(query): Query<ThresholdQuery>,
) -> Result<Json<ApiResponse<CategoryPreview>>, ApiError> {
    let dataset = state.dataset(&id)?;
    let classification = state.classify(&dataset, &query);
    let min_balance = classification.min_balance;

    let table = classification
        .tables
        .into_iter()
        .find(|t| t.name == name)
        .ok_or_else(|| ApiError::not_found(format!("unknown category {name}")))?;

    Ok(Json(ApiResponse::ok(CategoryPreview {
        name: table.name,
        min_balance,
        rows: table.rows,
    })))
}

/// GET /api/datasets/:id/workbook - Download every category as one workbook
async fn download_workbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let dataset = state.dataset(&id)?;
    let threshold = ThresholdQuery { min_balance: query.min_balance };
    let classification = state.classify(&dataset, &threshold);
    let bytes = write_workbook(&classification)?;

    let input_name = query.file_name.as_deref().unwrap_or(&dataset.file_name);
    let file_name = output_file_name(input_name, &state.settings.processed_suffix);
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        file_name.replace(['"', '\\'], "_").replace(|c: char| !c.is_ascii(), "_"),
        urlencoding::encode(&file_name)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET / - Serve the upload page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/datasets", post(upload_dataset))
        .route("/datasets/:id/categories", get(list_categories))
        .route("/datasets/:id/categories/:name", get(preview_category))
        .route("/datasets/:id/workbook", get(download_workbook))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const CSV: &str = "BRA_CODE,CUS_NUM,CUS_SHO_NAME,CUR_CODE,LED_CODE,SUB_ACCT_CODE,CRNT_BAL,TYPE_OF_DEP\n\
                       101,1,ABC Pensions Ltd,1,1,0,100,5\n\
                       101,2,Generic Co,2,3,0,10,28\n\
                       101,3,XYZ Corp,9,9,0,3,28\n";
    const CSV_OTHER: &str = "BRA_CODE,CUS_NUM,CUS_SHO_NAME,CUR_CODE,LED_CODE,SUB_ACCT_CODE,CRNT_BAL,TYPE_OF_DEP\n\
                             202,9,Rural Bank,1,1,0,80,0\n";
    const BOUNDARY: &str = "exposure-boundary";

    fn app() -> Router {
        router(AppState::new(Settings::default()).unwrap())
    }

    fn upload_request(file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/datasets")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn upload(app: &Router) -> String {
        let response = app.clone().oneshot(upload_request("march.csv", CSV)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["records"], 3);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn upload_as(app: &Router, file_name: &str, content: &str) -> serde_json::Value {
        let response = app.clone().oneshot(upload_request(file_name, content)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json(response).await["data"].clone()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app().oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_then_list_categories() {
        let app = app();
        let id = upload(&app).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/datasets/{id}/categories")))
            .await
            .unwrap();
        let body = json(response).await;
        let categories = body["data"].as_array().unwrap();

        assert_eq!(categories.len(), 10);
        assert_eq!(categories[0]["name"], "Insurance");
        assert_eq!(categories[0]["rows"], 1);
        assert_eq!(categories[1]["name"], "Pensions");
        assert_eq!(categories[1]["rows"], 1);
    }

    #[tokio::test]
    async fn test_preview_respects_threshold() {
        let app = app();
        let id = upload(&app).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/datasets/{id}/categories/Insurance?min_balance=2")))
            .await
            .unwrap();
        let body = json(response).await;
        let rows = body["data"]["rows"].as_array().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["CUS_SHO_NAME"], "Generic Co");
        assert_eq!(rows[0]["TYPE_OF_EXPOSURE"], "FCA USD");
        assert_eq!(rows[1]["TYPE_OF_EXPOSURE"], "FCA GBP");
    }

    #[tokio::test]
    async fn test_negative_threshold_is_rejected() {
        let app = app();
        let id = upload(&app).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/datasets/{id}/categories?min_balance=-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_category_name_with_spaces() {
        let app = app();
        let id = upload(&app).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/datasets/{id}/categories/Securities%20%26%20Exchange")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["name"], "Securities & Exchange");
    }

    #[tokio::test]
    async fn test_download_workbook() {
        let app = app();
        let id = upload(&app).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/datasets/{id}/workbook")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_MIME);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("march_processed.xlsx"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // xlsx is a zip archive
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn test_other_uploads_do_not_evict_a_dataset() {
        let app = app();
        let first = upload(&app).await;
        let second = upload_as(&app, "april.csv", CSV_OTHER).await;
        assert_ne!(second["id"].as_str().unwrap(), first);

        let response = app
            .clone()
            .oneshot(get(&format!("/api/datasets/{first}/workbook")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_same_bytes_keep_each_callers_file_name() {
        let app = app();
        let a = upload_as(&app, "a.csv", CSV).await;
        let b = upload_as(&app, "b.csv", CSV).await;

        assert_eq!(a["id"], b["id"]);
        assert_eq!(a["file_name"], "a.csv");
        assert_eq!(b["file_name"], "b.csv");

        let id = b["id"].as_str().unwrap();
        let response = app
            .clone()
            .oneshot(get(&format!("/api/datasets/{id}/workbook?min_balance=2&file_name=b.csv")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("b_processed.xlsx"));
    }

    #[tokio::test]
    async fn test_same_bytes_under_another_format_are_parsed_again() {
        let app = app();
        upload_as(&app, "march.csv", CSV).await;

        // CSV text read as a workbook must fail, not reuse the CSV dataset
        let response = app
            .clone()
            .oneshot(upload_request("march.xlsx", CSV))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_columns_is_unprocessable() {
        let response = app()
            .oneshot(upload_request("bad.csv", "BRA_CODE,CUS_NUM\n1,2\n"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert!(body["error"].as_str().unwrap().contains("CUS_SHO_NAME"));
    }

    #[tokio::test]
    async fn test_unknown_dataset_and_category() {
        let app = app();
        let response = app.clone().oneshot(get("/api/datasets/nope/categories")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let id = upload(&app).await;
        let response = app
            .clone()
            .oneshot(get(&format!("/api/datasets/{id}/categories/Banks")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
