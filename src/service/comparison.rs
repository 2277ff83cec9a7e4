use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use std::collections::HashSet;
use uuid::Uuid;

use super::normalize::normalize_description;
use crate::models::{ComparisonFlags, ComparisonResult, Contract, Discrepancy, ItemMatch, LineItem};

/// 单价绝对容差 0.01
pub fn price_tolerance() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// 明细比对结果 (不含供应商)
#[derive(Debug, Clone, PartialEq)]
pub struct ItemComparison {
    pub items: Vec<ItemMatch>,
    pub discrepancies: Vec<Discrepancy>,
    pub prices_match: bool,
    pub services_covered: bool,
    pub all_services_in_contract: bool,
}

/// 比对合同明细与发票明细
///
/// 两条明细归一化描述完全相同即视为同一服务。发票中同名明细归为一组,
/// 合同明细需与组内每一行的单价都在容差内才算匹配; 报告的发票单价取组内偏离
/// 合同单价最大的一行 (偏离相同取较低单价), 因此结果与明细顺序无关。
pub fn compare_items(contract_items: &[LineItem], invoice_items: &[LineItem]) -> ItemComparison {
    let tolerance = price_tolerance();

    // 归一化描述 -> 发票明细组
    let mut invoice_groups: IndexMap<String, Vec<&LineItem>> = IndexMap::new();
    for item in invoice_items {
        invoice_groups
            .entry(normalize_description(&item.description))
            .or_default()
            .push(item);
    }

    let contract_keys: HashSet<String> = contract_items
        .iter()
        .map(|item| normalize_description(&item.description))
        .collect();

    let mut items = Vec::with_capacity(contract_items.len());
    let mut discrepancies = Vec::new();
    let mut prices_match = true;
    let mut services_covered = true;

    for ci in contract_items {
        let key = normalize_description(&ci.description);

        let Some(group) = invoice_groups.get(&key) else {
            services_covered = false;
            prices_match = false;
            discrepancies.push(Discrepancy::MissingFromInvoice {
                service_name: ci.description.clone(),
                contract_value: ci.unit_price.clone(),
            });
            items.push(ItemMatch {
                description: ci.description.clone(),
                contract_price: ci.unit_price.clone(),
                invoice_price: None,
                price_difference: None,
                is_match: false,
                note: Some("Service not found in invoice".to_string()),
            });
            continue;
        };

        let invoice_price = furthest_price(&ci.unit_price, group);
        let difference = &invoice_price - &ci.unit_price;
        let is_match = difference.abs() <= tolerance;

        let note = if !is_match {
            prices_match = false;
            discrepancies.push(Discrepancy::PriceMismatch {
                service_name: ci.description.clone(),
                contract_value: ci.unit_price.clone(),
                invoice_value: invoice_price.clone(),
            });
            Some(format!("Invoice price differs from contract by {}", difference))
        } else if group.len() > 1 {
            Some(format!("{} invoice lines share this description", group.len()))
        } else {
            None
        };

        items.push(ItemMatch {
            description: ci.description.clone(),
            contract_price: ci.unit_price.clone(),
            invoice_price: Some(invoice_price),
            price_difference: Some(difference),
            is_match,
            note,
        });
    }

    let mut all_services_in_contract = true;
    for (key, group) in &invoice_groups {
        if contract_keys.contains(key) {
            continue;
        }
        all_services_in_contract = false;
        for ii in group {
            discrepancies.push(Discrepancy::MissingFromContract {
                service_name: ii.description.clone(),
                invoice_value: ii.unit_price.clone(),
            });
        }
    }

    ItemComparison {
        items,
        discrepancies,
        prices_match,
        services_covered,
        all_services_in_contract,
    }
}

/// 组内偏离合同单价最大的发票单价, 偏离相同取较低者
fn furthest_price(contract_price: &BigDecimal, group: &[&LineItem]) -> BigDecimal {
    let mut best: Option<(BigDecimal, &BigDecimal)> = None;
    for item in group {
        let deviation = (&item.unit_price - contract_price).abs();
        let is_better = match &best {
            None => true,
            Some((best_dev, best_price)) => {
                deviation > *best_dev || (deviation == *best_dev && item.unit_price < **best_price)
            }
        };
        if is_better {
            best = Some((deviation, &item.unit_price));
        }
    }
    // group 由 entry().or_default().push() 构建, 不会为空
    best.map(|(_, price)| price.clone())
        .unwrap_or_else(|| contract_price.clone())
}

/// 合同与发票完整比对 (明细 + 供应商)
pub fn compare(
    contract: &Contract,
    invoice_id: Option<Uuid>,
    invoice_supplier: &str,
    invoice_items: &[LineItem],
) -> ComparisonResult {
    let item_result = compare_items(&contract.items, invoice_items);
    let mut discrepancies = item_result.discrepancies;

    let supplier_name =
        normalize_description(&contract.supplier_name) == normalize_description(invoice_supplier);
    if !supplier_name {
        discrepancies.push(Discrepancy::SupplierMismatch {
            contract_value: contract.supplier_name.clone(),
            invoice_value: invoice_supplier.to_string(),
        });
    }

    let flags = ComparisonFlags {
        supplier_name,
        prices_match: item_result.prices_match,
        services_covered: item_result.services_covered,
        all_services_in_contract: item_result.all_services_in_contract,
    };
    let overall_match = flags.all() && discrepancies.is_empty();

    ComparisonResult {
        contract_id: contract.id,
        invoice_id,
        items: item_result.items,
        flags,
        discrepancies,
        overall_match,
    }
}
