use super::{sum_totals, LineItem};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 已入库发票 (识别后只读)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub contract_id: Option<Uuid>,
    pub invoice_number: String,
    pub supplier_name: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
    pub raw_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 文档识别得到的发票数据 (未入库)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    pub invoice_number: String,
    pub supplier_name: String,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub subtotal: Option<BigDecimal>,
    #[serde(default)]
    pub tax: Option<BigDecimal>,
    pub total: BigDecimal,
    #[serde(default)]
    pub raw_text: Option<String>,
}

/// 直接提交比对的发票数据 (未入库); 比对只用到供应商与明细, 其余字段忽略
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InvoiceLines {
    #[serde(default)]
    pub supplier_name: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl Invoice {
    /// 入库: subtotal 缺省取明细合计, tax 缺省为 0
    pub fn from_extracted(extracted: ExtractedInvoice, contract_id: Option<Uuid>) -> Self {
        let subtotal = extracted
            .subtotal
            .unwrap_or_else(|| sum_totals(&extracted.items));
        Self {
            id: Uuid::new_v4(),
            contract_id,
            invoice_number: extracted.invoice_number,
            supplier_name: extracted.supplier_name,
            issue_date: extracted.issue_date,
            due_date: extracted.due_date,
            items: extracted.items,
            subtotal,
            tax: extracted.tax.unwrap_or_else(BigDecimal::zero),
            total: extracted.total,
            raw_text: extracted.raw_text,
            created_at: Utc::now(),
        }
    }
}
