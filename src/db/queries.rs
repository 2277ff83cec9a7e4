use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{Contract, ContractSource, Invoice, LineItem};

/// 合同表行
#[derive(Debug, FromRow)]
pub struct ContractRow {
    pub id: Uuid,
    pub supplier_name: String,
    pub items: Json<Vec<LineItem>>,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub max_amount: Option<BigDecimal>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ContractRow> for Contract {
    fn from(row: ContractRow) -> Self {
        Self {
            id: row.id,
            supplier_name: row.supplier_name,
            items: row.items.0,
            effective_date: row.effective_date,
            expiration_date: row.expiration_date,
            payment_terms: row.payment_terms,
            max_amount: row.max_amount,
            source: ContractSource::from_string(&row.source),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 发票表行
#[derive(Debug, FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub contract_id: Option<Uuid>,
    pub invoice_number: String,
    pub supplier_name: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub items: Json<Vec<LineItem>>,
    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
    pub raw_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.id,
            contract_id: row.contract_id,
            invoice_number: row.invoice_number,
            supplier_name: row.supplier_name,
            issue_date: row.issue_date,
            due_date: row.due_date,
            items: row.items.0,
            subtotal: row.subtotal,
            tax: row.tax,
            total: row.total,
            raw_text: row.raw_text,
            created_at: row.created_at,
        }
    }
}

const CONTRACT_COLUMNS: &str = "id, supplier_name, items, effective_date, expiration_date, \
     payment_terms, max_amount, source, created_at, updated_at";

const INVOICE_COLUMNS: &str = "id, contract_id, invoice_number, supplier_name, issue_date, \
     due_date, items, subtotal, tax, total, raw_text, created_at";

/// 查询全部合同 (新建在前)
pub async fn list_contracts(pool: &PgPool) -> Result<Vec<ContractRow>, sqlx::Error> {
    sqlx::query_as::<_, ContractRow>(&format!(
        "SELECT {} FROM contracts ORDER BY created_at DESC",
        CONTRACT_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

/// 查询单个合同
pub async fn get_contract(pool: &PgPool, id: Uuid) -> Result<Option<ContractRow>, sqlx::Error> {
    sqlx::query_as::<_, ContractRow>(&format!(
        "SELECT {} FROM contracts WHERE id = $1",
        CONTRACT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_contract(pool: &PgPool, contract: &Contract) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO contracts (
            id, supplier_name, items, effective_date, expiration_date,
            payment_terms, max_amount, source, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(contract.id)
    .bind(&contract.supplier_name)
    .bind(Json(&contract.items))
    .bind(contract.effective_date)
    .bind(contract.expiration_date)
    .bind(&contract.payment_terms)
    .bind(contract.max_amount.clone())
    .bind(contract.source.as_str())
    .bind(contract.created_at)
    .bind(contract.updated_at)
    .execute(pool)
    .await?;

    tracing::debug!(id = %contract.id, "Inserted contract");
    Ok(())
}

/// 更新合同, 返回是否命中
pub async fn update_contract(pool: &PgPool, contract: &Contract) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE contracts SET
            supplier_name = $2,
            items = $3,
            effective_date = $4,
            expiration_date = $5,
            payment_terms = $6,
            max_amount = $7,
            updated_at = $8
        WHERE id = $1
        "#,
    )
    .bind(contract.id)
    .bind(&contract.supplier_name)
    .bind(Json(&contract.items))
    .bind(contract.effective_date)
    .bind(contract.expiration_date)
    .bind(&contract.payment_terms)
    .bind(contract.max_amount.clone())
    .bind(contract.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 删除合同 (关联发票的 contract_id 由外键置空)
pub async fn delete_contract(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contracts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// 查询全部发票 (新建在前)
pub async fn list_invoices(pool: &PgPool) -> Result<Vec<InvoiceRow>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {} FROM invoices ORDER BY created_at DESC",
        INVOICE_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_invoice(pool: &PgPool, id: Uuid) -> Result<Option<InvoiceRow>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {} FROM invoices WHERE id = $1",
        INVOICE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_invoice(pool: &PgPool, invoice: &Invoice) -> Result<(), sqlx::Error> {
    // 添加超时控制: 30秒
    let execute_result = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, contract_id, invoice_number, supplier_name, issue_date, due_date,
                items, subtotal, tax, total, raw_text, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.contract_id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.supplier_name)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(Json(&invoice.items))
        .bind(invoice.subtotal.clone())
        .bind(invoice.tax.clone())
        .bind(invoice.total.clone())
        .bind(&invoice.raw_text)
        .bind(invoice.created_at)
        .execute(pool),
    )
    .await;

    match execute_result {
        Ok(Ok(_)) => {
            tracing::debug!(id = %invoice.id, items = invoice.items.len(), "Inserted invoice");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("✗ INSERT invoice failed: {:?}", e);
            Err(e)
        }
        Err(_) => {
            tracing::error!("✗ INSERT invoice timed out (>30s)");
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

pub async fn delete_invoice(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
