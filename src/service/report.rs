use bigdecimal::BigDecimal;
use csv::Writer;

use crate::models::{ComparisonResult, Discrepancy};

const HEADER: [&str; 8] = [
    "record",
    "kind",
    "service_name",
    "contract_value",
    "invoice_value",
    "difference",
    "match",
    "note",
];

/// 将 Option<BigDecimal> 转换为 CSV 字符串
fn option_to_csv(val: &Option<BigDecimal>) -> String {
    val.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn discrepancy_record(d: &Discrepancy) -> [String; 8] {
    let (service, contract_value, invoice_value) = match d {
        Discrepancy::PriceMismatch {
            service_name,
            contract_value,
            invoice_value,
        } => (service_name.clone(), contract_value.to_string(), invoice_value.to_string()),
        Discrepancy::MissingFromInvoice {
            service_name,
            contract_value,
        } => (service_name.clone(), contract_value.to_string(), String::new()),
        Discrepancy::MissingFromContract {
            service_name,
            invoice_value,
        } => (service_name.clone(), String::new(), invoice_value.to_string()),
        Discrepancy::SupplierMismatch {
            contract_value,
            invoice_value,
        } => (String::new(), contract_value.clone(), invoice_value.clone()),
    };
    [
        "discrepancy".to_string(),
        d.kind().to_string(),
        service,
        contract_value,
        invoice_value,
        String::new(),
        "false".to_string(),
        String::new(),
    ]
}

/// 导出比对结果为 CSV: 先逐条明细, 再逐条差异, 最后一行汇总
pub fn export_to_csv(result: &ComparisonResult) -> Result<Vec<u8>, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for item in &result.items {
        writer.write_record([
            "item".to_string(),
            String::new(),
            item.description.clone(),
            item.contract_price.to_string(),
            option_to_csv(&item.invoice_price),
            option_to_csv(&item.price_difference),
            item.is_match.to_string(),
            item.note.clone().unwrap_or_default(),
        ])?;
    }

    for d in &result.discrepancies {
        writer.write_record(discrepancy_record(d))?;
    }

    writer.write_record([
        "summary".to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        result.overall_match.to_string(),
        format!("{} discrepancies", result.discrepancies.len()),
    ])?;

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
