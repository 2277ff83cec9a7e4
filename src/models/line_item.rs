use bigdecimal::{BigDecimal, One, Zero};
use serde::{Deserialize, Serialize};

/// 明细行 (合同与发票共用)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NewLineItem")]
pub struct LineItem {
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub total: BigDecimal, // quantity * unit_price
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: BigDecimal, unit_price: BigDecimal) -> Self {
        let total = &quantity * &unit_price;
        Self {
            description: description.into(),
            quantity,
            unit_price,
            total,
        }
    }
}

/// 明细行输入 (total 缺省时按 数量 x 单价 计算)
#[derive(Debug, Clone, Deserialize)]
pub struct NewLineItem {
    #[serde(alias = "service_name")]
    pub description: String,
    #[serde(default = "BigDecimal::one")]
    pub quantity: BigDecimal,
    #[serde(default = "BigDecimal::zero")]
    pub unit_price: BigDecimal,
    #[serde(default, alias = "total_price")]
    pub total: Option<BigDecimal>,
}

impl From<NewLineItem> for LineItem {
    fn from(item: NewLineItem) -> Self {
        let total = item.total.unwrap_or_else(|| &item.quantity * &item.unit_price);
        Self {
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total,
        }
    }
}

/// 明细合计
pub fn sum_totals(items: &[LineItem]) -> BigDecimal {
    items
        .iter()
        .fold(BigDecimal::zero(), |acc, item| acc + &item.total)
}
