use super::LineItem;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 合同来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractSource {
    Manual,
    Document,
}

impl ContractSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractSource::Manual => "manual",
            ContractSource::Document => "document",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "document" => ContractSource::Document,
            _ => ContractSource::Manual,
        }
    }
}

/// 合同 (供应商价目表)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub supplier_name: String,
    pub items: Vec<LineItem>,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub max_amount: Option<BigDecimal>,
    pub source: ContractSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 新建 / 修改合同的请求体
#[derive(Debug, Clone, Deserialize)]
pub struct NewContract {
    pub supplier_name: String,
    #[serde(default, alias = "services")]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub max_amount: Option<BigDecimal>,
}

impl Contract {
    pub fn from_new(new: NewContract, source: ContractSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            supplier_name: new.supplier_name.trim().to_string(),
            items: new.items,
            effective_date: new.effective_date,
            expiration_date: new.expiration_date,
            payment_terms: new.payment_terms,
            max_amount: new.max_amount,
            source,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// 用请求体覆盖可编辑字段
    pub fn apply_update(&mut self, update: NewContract) {
        self.supplier_name = update.supplier_name.trim().to_string();
        self.items = update.items;
        self.effective_date = update.effective_date;
        self.expiration_date = update.expiration_date;
        self.payment_terms = update.payment_terms;
        self.max_amount = update.max_amount;
        self.updated_at = Some(Utc::now());
    }
}
