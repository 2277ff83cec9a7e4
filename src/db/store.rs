use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::queries;
use crate::models::{Contract, Invoice};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// 合同 / 发票存储
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_contracts(&self) -> Result<Vec<Contract>, StoreError>;
    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, StoreError>;
    async fn insert_contract(&self, contract: &Contract) -> Result<(), StoreError>;
    /// 返回 false 表示合同不存在
    async fn update_contract(&self, contract: &Contract) -> Result<bool, StoreError>;
    /// 删除合同并解除其发票的关联
    async fn delete_contract(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError>;
    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError>;
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError>;
    async fn delete_invoice(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// PostgreSQL 存储
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn list_contracts(&self) -> Result<Vec<Contract>, StoreError> {
        let rows = queries::list_contracts(&self.pool).await?;
        Ok(rows.into_iter().map(Contract::from).collect())
    }

    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, StoreError> {
        Ok(queries::get_contract(&self.pool, id).await?.map(Contract::from))
    }

    async fn insert_contract(&self, contract: &Contract) -> Result<(), StoreError> {
        Ok(queries::insert_contract(&self.pool, contract).await?)
    }

    async fn update_contract(&self, contract: &Contract) -> Result<bool, StoreError> {
        Ok(queries::update_contract(&self.pool, contract).await?)
    }

    async fn delete_contract(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(queries::delete_contract(&self.pool, id).await?)
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let rows = queries::list_invoices(&self.pool).await?;
        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError> {
        Ok(queries::get_invoice(&self.pool, id).await?.map(Invoice::from))
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        Ok(queries::insert_invoice(&self.pool, invoice).await?)
    }

    async fn delete_invoice(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(queries::delete_invoice(&self.pool, id).await?)
    }
}
