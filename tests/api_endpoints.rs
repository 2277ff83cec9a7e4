use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use invoice_validator::config::StorageBackend;
use invoice_validator::models::{
    ExtractedContract, ExtractedInvoice, LineItem, UploadedDocument, VerificationResult,
};
use invoice_validator::service::ExtractionError;
use invoice_validator::{router, AppConfig, DocumentExtractor, MemoryStore, ValidatorService};
use serde_json::{json, Value};
use tower::ServiceExt;

const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<< >>\nendobj\n%%EOF";
const BOUNDARY: &str = "test-boundary-7d1a";

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).expect("decimal")
}

/// 固定返回值的识别服务
struct StubExtractor {
    verification: VerificationResult,
}

impl StubExtractor {
    fn accepting() -> Self {
        Self {
            verification: VerificationResult {
                is_invoice: true,
                confidence: 0.95,
                reason: "Looks like an invoice".to_string(),
            },
        }
    }

    fn rejecting() -> Self {
        Self {
            verification: VerificationResult {
                is_invoice: false,
                confidence: 0.9,
                reason: "This is a purchase order".to_string(),
            },
        }
    }
}

#[async_trait]
impl DocumentExtractor for StubExtractor {
    async fn extract_invoice(&self, _document: &UploadedDocument) -> Result<ExtractedInvoice, ExtractionError> {
        Ok(ExtractedInvoice {
            invoice_number: "INV-2024-001".to_string(),
            supplier_name: "Acme Corp".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
            due_date: None,
            items: vec![
                LineItem::new("Consulting", dec("1"), dec("100.00")),
                LineItem::new("Support", dec("1"), dec("55.00")),
            ],
            subtotal: None,
            tax: None,
            total: dec("155.00"),
            raw_text: None,
        })
    }

    async fn extract_contract(&self, _document: &UploadedDocument) -> Result<ExtractedContract, ExtractionError> {
        Ok(ExtractedContract {
            supplier_name: "Acme Corp".to_string(),
            items: vec![LineItem::new("Consulting", dec("1"), dec("100.00"))],
            effective_date: None,
            expiration_date: None,
            payment_terms: Some("Net 30".to_string()),
            max_amount: None,
        })
    }

    async fn verify_invoice(&self, _document: &UploadedDocument) -> Result<VerificationResult, ExtractionError> {
        Ok(self.verification.clone())
    }
}

fn test_config(verify_documents: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::Memory;
    config.extraction.verify_documents = verify_documents;
    config
}

fn app_with(extractor: StubExtractor, verify_documents: bool) -> Router {
    app_with_config(extractor, test_config(verify_documents))
}

fn app_with_config(extractor: StubExtractor, config: AppConfig) -> Router {
    let service = Arc::new(ValidatorService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(extractor),
        config.clone(),
    ));
    router(service, &config)
}

fn app() -> Router {
    app_with(StubExtractor::accepting(), false)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, headers, body.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let (status, _, bytes) = send(app, request).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn multipart_request(uri: &str, filename: &str, bytes: &[u8], contract_id: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(id) = contract_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"contract_id\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

async fn create_acme_contract(app: &Router) -> String {
    let (status, body) = send_json(
        app,
        Method::POST,
        "/api/v1/contracts",
        Some(json!({
            "supplier_name": "Acme Corp",
            "services": [
                {"service_name": "Consulting", "unit_price": "100.00"},
                {"description": "Support", "quantity": "1", "unit_price": "50.00"}
            ],
            "payment_terms": "Net 30"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().expect("contract id").to_string()
}

fn price(value: &Value) -> BigDecimal {
    match value {
        Value::String(s) => dec(s),
        other => dec(&other.to_string()),
    }
}

#[tokio::test]
async fn root_and_health_respond() {
    let app = app();

    let (status, body) = send_json(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let (status, body) = send_json(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn contract_crud_round_trip() {
    let app = app();
    let id = create_acme_contract(&app).await;

    let (status, body) = send_json(&app, Method::GET, &format!("/api/v1/contracts/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["supplier_name"], "Acme Corp");
    assert_eq!(body["source"], "manual");
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(price(&body["items"][0]["total"]), dec("100"));

    let (status, body) = send_json(
        &app,
        Method::PUT,
        &format!("/api/v1/contracts/{id}"),
        Some(json!({
            "supplier_name": "Acme Corporation",
            "items": [{"description": "Consulting", "unit_price": "120.00"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["supplier_name"], "Acme Corporation");
    assert!(!body["updated_at"].is_null());

    let (status, body) = send_json(&app, Method::GET, "/api/v1/contracts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, body) = send_json(&app, Method::DELETE, &format!("/api/v1/contracts/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send_json(&app, Method::GET, &format!("/api/v1/contracts/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn contract_upload_uses_extracted_data() {
    let app = app();
    let (status, _, bytes) = send(
        &app,
        multipart_request("/api/v1/contracts/upload", "contract.pdf", PDF_BYTES, None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["source"], "document");
    assert_eq!(body["payment_terms"], "Net 30");
}

#[tokio::test]
async fn invoice_upload_rejects_mismatched_content() {
    let app = app();
    let (status, _, bytes) = send(
        &app,
        multipart_request("/api/v1/invoices/process", "invoice.png", PDF_BYTES, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn invoice_upload_with_unknown_contract_is_not_found() {
    let app = app();
    let missing = uuid::Uuid::new_v4().to_string();
    let (status, _, _) = send(
        &app,
        multipart_request("/api/v1/invoices/process", "invoice.pdf", PDF_BYTES, Some(&missing)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn processed_invoice_compares_against_contract() {
    let app = app();
    let contract_id = create_acme_contract(&app).await;

    let (status, _, bytes) = send(
        &app,
        multipart_request(
            "/api/v1/invoices/process",
            "invoice.pdf",
            PDF_BYTES,
            Some(&contract_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let invoice: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(invoice["contract_id"], contract_id.as_str());
    assert_eq!(price(&invoice["subtotal"]), dec("155"));
    let invoice_id = invoice["id"].as_str().expect("invoice id").to_string();

    let (status, result) = send_json(
        &app,
        Method::POST,
        "/api/v1/compare",
        Some(json!({"contract_id": contract_id, "invoice_id": invoice_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["overall_match"], false);
    assert_eq!(result["flags"]["supplier_name"], true);
    assert_eq!(result["flags"]["prices_match"], false);
    assert_eq!(result["flags"]["services_covered"], true);
    assert_eq!(result["flags"]["all_services_in_contract"], true);

    let discrepancies = result["discrepancies"].as_array().expect("discrepancies");
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0]["type"], "price_mismatch");
    assert_eq!(discrepancies[0]["service_name"], "Support");
    assert_eq!(price(&discrepancies[0]["invoice_value"]), dec("55"));
}

#[tokio::test]
async fn base64_invoice_upload_is_stored() {
    let app = app();
    let content = format!("data:application/pdf;base64,{}", STANDARD.encode(PDF_BYTES));

    let (status, invoice) = send_json(
        &app,
        Method::POST,
        "/api/v1/invoices/process-base64",
        Some(json!({"filename": "invoice.pdf", "content": content})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(invoice["contract_id"].is_null());

    let id = invoice["id"].as_str().expect("invoice id");
    let (status, fetched) = send_json(&app, Method::GET, &format!("/api/v1/invoices/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["invoice_number"], "INV-2024-001");

    let (status, _) = send_json(&app, Method::DELETE, &format!("/api/v1/invoices/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, list) = send_json(&app, Method::GET, "/api/v1/invoices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn base64_upload_rejects_garbage() {
    let app = app();
    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/invoices/process-base64",
        Some(json!({"filename": "invoice.pdf", "content": "***not base64***"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn inline_comparison_matches_within_tolerance() {
    let app = app();
    let contract_id = create_acme_contract(&app).await;

    let (status, result) = send_json(
        &app,
        Method::POST,
        "/api/v1/compare",
        Some(json!({
            "contract_id": contract_id,
            "invoice": {
                "invoice_number": "INV-7",
                "supplier_name": "  ACME CORP ",
                "issue_date": "2024-03-01",
                "items": [
                    {"description": "consulting", "unit_price": "100.01"},
                    {"description": "SUPPORT", "unit_price": "50.00"}
                ],
                "total": "150.01"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["overall_match"], true);
    assert!(result["invoice_id"].is_null());
    assert_eq!(result["discrepancies"], json!([]));
    assert_eq!(result["items"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn comparison_requires_an_invoice() {
    let app = app();
    let contract_id = create_acme_contract(&app).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/compare",
        Some(json!({"contract_id": contract_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/api/v1/compare",
        Some(json!({"contract_id": contract_id, "invoice_id": uuid::Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comparison_exports_as_csv() {
    let app = app();
    let contract_id = create_acme_contract(&app).await;
    let (_, _, bytes) = send(
        &app,
        multipart_request("/api/v1/invoices/process", "invoice.pdf", PDF_BYTES, None),
    )
    .await;
    let invoice: Value = serde_json::from_slice(&bytes).expect("json");
    let invoice_id = invoice["id"].as_str().expect("invoice id");

    let request = Request::builder()
        .uri(format!("/api/v1/compare/{contract_id}/{invoice_id}/export"))
        .body(Body::empty())
        .expect("request");
    let (status, headers, bytes) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .expect("content type")
        .starts_with("text/csv"));

    let csv = String::from_utf8(bytes).expect("utf8");
    let lines: Vec<&str> = csv.lines().collect();
    assert!(lines[0].starts_with("record,kind,service_name"));
    assert!(lines.iter().any(|l| l.starts_with("discrepancy,price_mismatch,Support")));
    assert!(lines.last().expect("summary").starts_with("summary,"));
}

#[tokio::test]
async fn unverified_documents_are_rejected() {
    let app = app_with(StubExtractor::rejecting(), true);
    let (status, _, bytes) = send(
        &app,
        multipart_request("/api/v1/invoices/process", "invoice.pdf", PDF_BYTES, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["error"], "document_rejected");
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("purchase order"));

    let (_, list) = send_json(&app, Method::GET, "/api/v1/invoices", None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn verify_endpoint_reports_classification() {
    let app = app_with(StubExtractor::rejecting(), false);
    let (status, _, bytes) = send(
        &app,
        multipart_request("/api/v1/documents/verify", "scan.pdf", PDF_BYTES, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["is_invoice"], false);
}

#[tokio::test]
async fn responses_carry_request_id_and_cors_headers() {
    let app = app();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .expect("request");
    let (_, headers, _) = send(&app, request).await;
    assert_eq!(headers["x-request-id"], "req-123");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let (_, headers, _) = send(&app, request).await;
    let generated = headers["x-request-id"].to_str().expect("request id");
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/contracts")
        .body(Body::empty())
        .expect("request");
    let (status, headers, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

fn assert_error_envelope(body: &Value, error: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], error);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn malformed_requests_use_error_envelope() {
    let app = app();

    let (status, body) = send_json(&app, Method::POST, "/api/v1/contracts", Some(json!({"items": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "bad_request");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/contracts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let (status, _, bytes) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_error_envelope(&body, "bad_request");

    let (status, body) = send_json(&app, Method::GET, "/api/v1/contracts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "bad_request");

    let (status, body) = send_json(&app, Method::DELETE, "/api/v1/invoices/42", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "bad_request");
}

#[tokio::test]
async fn inline_comparison_needs_only_supplier_and_items() {
    let app = app();
    let contract_id = create_acme_contract(&app).await;

    let (status, result) = send_json(
        &app,
        Method::POST,
        "/api/v1/compare",
        Some(json!({
            "contract_id": contract_id,
            "invoice": {"supplier_name": "Acme Corp", "items": []}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["flags"]["supplier_name"], true);
    assert_eq!(result["flags"]["services_covered"], false);
    assert_eq!(result["discrepancies"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let mut config = test_config(false);
    config.upload.max_file_size = 16;
    let app = app_with_config(StubExtractor::accepting(), config);

    let mut pdf = PDF_BYTES.to_vec();
    pdf.resize(2 * 1024 * 1024, b'0');
    let (status, _, bytes) = send(
        &app,
        multipart_request("/api/v1/invoices/process", "invoice.pdf", &pdf, None),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_error_envelope(&body, "payload_too_large");

    // 未超出请求体上限, 但超出文件大小限制
    let (status, _, bytes) = send(
        &app,
        multipart_request("/api/v1/invoices/process", "invoice.pdf", PDF_BYTES, None),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_error_envelope(&body, "payload_too_large");
}

#[tokio::test]
async fn contract_validation_rejects_blank_fields() {
    let app = app();

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/contracts",
        Some(json!({"supplier_name": "   ", "items": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "bad_request");

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/contracts",
        Some(json!({
            "supplier_name": "Acme Corp",
            "items": [{"description": "Consulting", "unit_price": "1"}, {"description": " ", "unit_price": "2"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().expect("message").contains("item 2"));

    let (status, body) = send_json(
        &app,
        Method::PUT,
        &format!("/api/v1/contracts/{}", uuid::Uuid::new_v4()),
        Some(json!({"supplier_name": "Acme Corp", "items": []})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_envelope(&body, "not_found");

    let (_, list) = send_json(&app, Method::GET, "/api/v1/contracts", None).await;
    assert_eq!(list, json!([]));
}
