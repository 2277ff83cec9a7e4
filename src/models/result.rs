use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单个合同明细的比对结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMatch {
    pub description: String,
    pub contract_price: BigDecimal,
    pub invoice_price: Option<BigDecimal>, // None: 发票中不存在该服务
    pub price_difference: Option<BigDecimal>,
    pub is_match: bool,
    pub note: Option<String>,
}

/// 差异类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discrepancy {
    PriceMismatch {
        service_name: String,
        contract_value: BigDecimal,
        invoice_value: BigDecimal,
    },
    MissingFromInvoice {
        service_name: String,
        contract_value: BigDecimal,
    },
    MissingFromContract {
        service_name: String,
        invoice_value: BigDecimal,
    },
    SupplierMismatch {
        contract_value: String,
        invoice_value: String,
    },
}

impl Discrepancy {
    pub fn kind(&self) -> &'static str {
        match self {
            Discrepancy::PriceMismatch { .. } => "price_mismatch",
            Discrepancy::MissingFromInvoice { .. } => "missing_from_invoice",
            Discrepancy::MissingFromContract { .. } => "missing_from_contract",
            Discrepancy::SupplierMismatch { .. } => "supplier_mismatch",
        }
    }

    /// 服务名 (供应商差异没有服务名)
    pub fn service_name(&self) -> Option<&str> {
        match self {
            Discrepancy::PriceMismatch { service_name, .. }
            | Discrepancy::MissingFromInvoice { service_name, .. }
            | Discrepancy::MissingFromContract { service_name, .. } => Some(service_name),
            Discrepancy::SupplierMismatch { .. } => None,
        }
    }
}

/// 汇总标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonFlags {
    pub supplier_name: bool,
    pub prices_match: bool,
    pub services_covered: bool,
    pub all_services_in_contract: bool,
}

impl ComparisonFlags {
    pub fn all(&self) -> bool {
        self.supplier_name && self.prices_match && self.services_covered && self.all_services_in_contract
    }
}

/// 合同 vs 发票 比对结果 (不入库)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub contract_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub items: Vec<ItemMatch>,
    pub flags: ComparisonFlags,
    pub discrepancies: Vec<Discrepancy>,
    pub overall_match: bool,
}
