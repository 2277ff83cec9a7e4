use crate::models::{
    ComparisonResult, Contract, Invoice, InvoiceLines, NewContract, VerificationResult,
};
use crate::service::upload::decode_base64;
use crate::service::ValidatorService;
use axum::{
    extract::{Json, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath};

pub type ApiResult<T> = Result<T, ApiError>;

/// 通用响应体
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// 服务信息
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
}

/// base64 上传请求体
#[derive(Debug, Deserialize)]
pub struct Base64UploadRequest {
    pub filename: String,
    pub content: String,
    #[serde(default)]
    pub contract_id: Option<Uuid>,
}

/// 比对请求体: invoice_id (已入库) 或 invoice (未入库数据) 二选一
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub contract_id: Uuid,
    #[serde(default)]
    pub invoice_id: Option<Uuid>,
    #[serde(default)]
    pub invoice: Option<InvoiceLines>,
}

/// multipart 表单中的文件与附加字段
struct UploadForm {
    filename: String,
    bytes: Vec<u8>,
    contract_id: Option<Uuid>,
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut contract_id = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("file field has no filename".to_string()))?;
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("contract_id") => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    let id = Uuid::parse_str(text)
                        .map_err(|e| ApiError::BadRequest(format!("Invalid contract_id: {}", e)))?;
                    contract_id = Some(id);
                }
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("Missing multipart field: file".to_string()))?;
    Ok(UploadForm {
        filename,
        bytes,
        contract_id,
    })
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Welcome to Invoice Validator API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---- 合同 ----

pub async fn list_contracts(State(service): State<Arc<ValidatorService>>) -> ApiResult<Json<Vec<Contract>>> {
    Ok(Json(service.list_contracts().await?))
}

pub async fn get_contract(
    State(service): State<Arc<ValidatorService>>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Contract>> {
    Ok(Json(service.get_contract(id).await?))
}

pub async fn create_contract(
    State(service): State<Arc<ValidatorService>>,
    ApiJson(req): ApiJson<NewContract>,
) -> ApiResult<(StatusCode, Json<Contract>)> {
    let contract = service.create_contract(req).await?;
    Ok((StatusCode::CREATED, Json(contract)))
}

pub async fn update_contract(
    State(service): State<Arc<ValidatorService>>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NewContract>,
) -> ApiResult<Json<Contract>> {
    Ok(Json(service.update_contract(id, req).await?))
}

pub async fn delete_contract(
    State(service): State<Arc<ValidatorService>>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    service.delete_contract(id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Contract deleted successfully".to_string(),
    }))
}

/// 上传合同文档 (multipart: file)
pub async fn upload_contract(
    State(service): State<Arc<ValidatorService>>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Contract>)> {
    let form = read_upload_form(multipart).await?;
    let contract = service.upload_contract(&form.filename, form.bytes).await?;
    Ok((StatusCode::CREATED, Json(contract)))
}

// ---- 发票 ----

pub async fn list_invoices(State(service): State<Arc<ValidatorService>>) -> ApiResult<Json<Vec<Invoice>>> {
    Ok(Json(service.list_invoices().await?))
}

pub async fn get_invoice(
    State(service): State<Arc<ValidatorService>>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Invoice>> {
    Ok(Json(service.get_invoice(id).await?))
}

pub async fn delete_invoice(
    State(service): State<Arc<ValidatorService>>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    service.delete_invoice(id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Invoice deleted successfully".to_string(),
    }))
}

/// 识别发票 (multipart: file, 可选 contract_id)
pub async fn process_invoice(
    State(service): State<Arc<ValidatorService>>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    let form = read_upload_form(multipart).await?;
    let invoice = service
        .process_invoice(&form.filename, form.bytes, form.contract_id)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// 识别发票 (JSON + base64 文件内容)
pub async fn process_invoice_base64(
    State(service): State<Arc<ValidatorService>>,
    ApiJson(req): ApiJson<Base64UploadRequest>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    let bytes = decode_base64(&req.content).map_err(crate::service::ServiceError::from)?;
    let invoice = service
        .process_invoice(&req.filename, bytes, req.contract_id)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// 校验文档是否为发票
pub async fn verify_document(
    State(service): State<Arc<ValidatorService>>,
    multipart: Multipart,
) -> ApiResult<Json<VerificationResult>> {
    let form = read_upload_form(multipart).await?;
    Ok(Json(service.verify_document(&form.filename, form.bytes).await?))
}

// ---- 比对 ----

pub async fn compare(
    State(service): State<Arc<ValidatorService>>,
    ApiJson(req): ApiJson<CompareRequest>,
) -> ApiResult<Json<ComparisonResult>> {
    let result = match (req.invoice_id, &req.invoice) {
        (Some(invoice_id), _) => service.compare(req.contract_id, invoice_id).await?,
        (None, Some(invoice)) => service.compare_inline(req.contract_id, invoice).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either invoice_id or invoice must be provided".to_string(),
            ))
        }
    };
    Ok(Json(result))
}

/// 导出比对结果 CSV
pub async fn export_comparison(
    State(service): State<Arc<ValidatorService>>,
    ApiPath((contract_id, invoice_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Response> {
    let csv = service.export_comparison(contract_id, invoice_id).await?;
    let disposition = format!(
        "attachment; filename=\"comparison-{}-{}.csv\"",
        contract_id, invoice_id
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
