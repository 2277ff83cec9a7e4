//! 文档识别: 外部 AI 服务的调用接口与结果解析
//!
//! 模型输出并不可靠 (数字可能是字符串, 字段可能缺失), 这里的解析尽量取默认值而不是报错,
//! 只有完全无法解析的 JSON 才返回 [`ExtractionError::InvalidResponse`]。

use async_trait::async_trait;
use bigdecimal::{BigDecimal, One, Zero};
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use std::str::FromStr;

use super::normalize::normalize_hyphens;
use crate::models::{
    sum_totals, ExtractedContract, ExtractedInvoice, LineItem, UploadedDocument, VerificationResult,
};

pub const DEFAULT_SUPPLIER_NAME: &str = "Unknown Supplier";
pub const DEFAULT_ITEM_DESCRIPTION: &str = "Unknown Item";

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Extraction service is not configured: missing API key")]
    MissingApiKey,

    #[error("Extraction request failed: {0}")]
    Request(String),

    #[error("Extraction service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid extraction response: {0}")]
    InvalidResponse(String),
}

/// 外部文档识别服务
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract_invoice(&self, document: &UploadedDocument) -> Result<ExtractedInvoice, ExtractionError>;

    async fn extract_contract(&self, document: &UploadedDocument) -> Result<ExtractedContract, ExtractionError>;

    async fn verify_invoice(&self, document: &UploadedDocument) -> Result<VerificationResult, ExtractionError>;
}

pub const INVOICE_PROMPT: &str = r#"Extract the invoice in this document as a single JSON object with the fields:
invoice_number (string), supplier_name (string), issue_date (YYYY-MM-DD), due_date (YYYY-MM-DD or null),
items (array of {description, quantity, unit_price, total_price}), subtotal, tax, total, raw_text (short summary).
Use the full item description exactly as written. Quantity defaults to 1.0.
Prices are plain numbers: "1 234,56 kr" becomes 1234.56, negative amounts keep their sign.
Never report a price of 0 unless the document states it. Return only the JSON object."#;

pub const CONTRACT_PROMPT: &str = r#"Extract the contract in this document as a single JSON object with the fields:
supplier_name (string or null), items (array of {description, quantity, unit_price}),
effective_date (YYYY-MM-DD or null), expiration_date (YYYY-MM-DD or null),
payment_terms (string or null), max_amount (number or null).
List every priced service or product, including item numbers in the description.
Quantity defaults to 1.0. Prices are plain numbers. Return only the JSON object."#;

pub const VERIFY_PROMPT: &str = r#"Decide whether this document is an invoice. Look for an invoice number,
line items with quantities and prices, supplier information and a total amount.
Return only a JSON object: {"is_invoice": boolean, "confidence": number between 0 and 1, "reason": string}."#;

/// 去掉模型输出外层的 Markdown 代码块
pub fn strip_code_fences(text: &str) -> &str {
    let mut content = text.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}

fn parse_object(text: &str) -> Result<Map<String, Value>, ExtractionError> {
    let value: Value = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExtractionError::InvalidResponse(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 解析金额/数量, 接受 JSON 数字或 "$1,234.56" / "1 234,56" / "(1000)" 等写法
pub fn parse_decimal(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse_decimal_str(s),
        _ => None,
    }
}

pub fn parse_decimal_str(raw: &str) -> Option<BigDecimal> {
    let raw = raw.trim();
    let negative = raw.starts_with('-')
        || raw.contains("-$")
        || (raw.starts_with('(') && raw.ends_with(')'));

    let mut cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    cleaned = match (last_dot, last_comma) {
        // 后出现的分隔符是小数点
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = cleaned.len() - comma - 1;
            if cleaned.matches(',').count() == 1 && decimals != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (Some(_), None) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    let value = BigDecimal::from_str(&cleaned).ok()?;
    Some(if negative { -value } else { value })
}

/// 解析日期: YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY, DD.MM.YYYY
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn get_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn get_decimal(map: &Map<String, Value>, keys: &[&str]) -> Option<BigDecimal> {
    keys.iter().find_map(|key| map.get(*key).and_then(parse_decimal))
}

fn get_date(map: &Map<String, Value>, key: &str) -> Option<NaiveDate> {
    map.get(key).and_then(parse_date)
}

/// 解析明细数组, 非对象元素直接跳过
fn parse_items(map: &Map<String, Value>, keys: &[&str]) -> Vec<LineItem> {
    let Some(Value::Array(raw_items)) = keys.iter().find_map(|key| map.get(*key)) else {
        return Vec::new();
    };

    raw_items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let description = get_string(obj, &["description", "service_name", "name"])
                .map(|d| normalize_hyphens(&d))
                .unwrap_or_else(|| DEFAULT_ITEM_DESCRIPTION.to_string());
            let quantity = get_decimal(obj, &["quantity"]).unwrap_or_else(BigDecimal::one);
            let unit_price = get_decimal(obj, &["unit_price", "rate", "price"]).unwrap_or_else(BigDecimal::zero);
            let total = get_decimal(obj, &["total_price", "total"]).unwrap_or_else(|| &quantity * &unit_price);
            LineItem {
                description,
                quantity,
                unit_price,
                total,
            }
        })
        .collect()
}

/// 解析发票识别结果
pub fn parse_invoice_response(text: &str) -> Result<ExtractedInvoice, ExtractionError> {
    let map = parse_object(text)?;

    let invoice_number = get_string(&map, &["invoice_number"])
        .unwrap_or_else(|| format!("INV-{}", Utc::now().format("%Y%m%d%H%M%S")));
    let supplier_name =
        get_string(&map, &["supplier_name"]).unwrap_or_else(|| DEFAULT_SUPPLIER_NAME.to_string());
    let issue_date = get_date(&map, "issue_date").unwrap_or_else(|| Utc::now().date_naive());
    let due_date = get_date(&map, "due_date");

    let mut items = parse_items(&map, &["items"]);
    let subtotal = get_decimal(&map, &["subtotal"]);
    let tax = get_decimal(&map, &["tax"]);

    let mut total = get_decimal(&map, &["total"]).unwrap_or_else(BigDecimal::zero);
    if total.is_zero() {
        let items_total = sum_totals(&items);
        if items_total > BigDecimal::zero() {
            total = items_total;
        }
    }
    if items.is_empty() && total > BigDecimal::zero() {
        items.push(LineItem::new(DEFAULT_ITEM_DESCRIPTION, BigDecimal::one(), total.clone()));
    }

    Ok(ExtractedInvoice {
        invoice_number,
        supplier_name,
        issue_date,
        due_date,
        subtotal: subtotal.or_else(|| (!items.is_empty()).then(|| sum_totals(&items))),
        items,
        tax,
        total,
        raw_text: get_string(&map, &["raw_text"]),
    })
}

/// 解析合同识别结果
pub fn parse_contract_response(text: &str) -> Result<ExtractedContract, ExtractionError> {
    let map = parse_object(text)?;

    Ok(ExtractedContract {
        supplier_name: get_string(&map, &["supplier_name"])
            .unwrap_or_else(|| DEFAULT_SUPPLIER_NAME.to_string()),
        items: parse_items(&map, &["items", "services"]),
        effective_date: get_date(&map, "effective_date"),
        expiration_date: get_date(&map, "expiration_date"),
        payment_terms: get_string(&map, &["payment_terms"]),
        max_amount: get_decimal(&map, &["max_amount"]),
    })
}

/// 解析文档校验结果, 字段缺失或越界即报错 (由调用方降级)
pub fn parse_verification_response(text: &str) -> Result<VerificationResult, ExtractionError> {
    let map = parse_object(text)?;

    let is_invoice = ["is_invoice", "is_purchase_order"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_bool))
        .ok_or_else(|| ExtractionError::InvalidResponse("is_invoice must be a boolean".to_string()))?;
    let confidence = map
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| (0.0..=1.0).contains(c))
        .ok_or_else(|| {
            ExtractionError::InvalidResponse("confidence must be a number between 0 and 1".to_string())
        })?;
    let reason = map
        .get("reason")
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractionError::InvalidResponse("reason must be a string".to_string()))?
        .to_string();

    Ok(VerificationResult {
        is_invoice,
        confidence,
        reason,
    })
}
