use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ContractSource, LineItem, NewContract};

/// 已通过校验的上传文件
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub extension: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// 文档校验结果 (是否为发票)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub is_invoice: bool,
    pub confidence: f64,
    pub reason: String,
}

impl VerificationResult {
    /// 校验调用失败时的降级结果
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            is_invoice: false,
            confidence: 0.0,
            reason: format!("Verification failed: {}", reason),
        }
    }

    pub fn passes(&self, threshold: f64) -> bool {
        self.is_invoice && self.confidence >= threshold
    }
}

/// 文档识别得到的合同数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContract {
    pub supplier_name: String,
    pub items: Vec<LineItem>,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub max_amount: Option<BigDecimal>,
}

impl ExtractedContract {
    pub fn into_new_contract(self) -> (NewContract, ContractSource) {
        (
            NewContract {
                supplier_name: self.supplier_name,
                items: self.items,
                effective_date: self.effective_date,
                expiration_date: self.expiration_date,
                payment_terms: self.payment_terms,
                max_amount: self.max_amount,
            },
            ContractSource::Document,
        )
    }
}
