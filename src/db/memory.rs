use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{DocumentStore, StoreError};
use crate::models::{Contract, Invoice};

/// 内存存储, 用于本地开发与测试 (进程退出即丢失)
#[derive(Default)]
pub struct MemoryStore {
    contracts: RwLock<IndexMap<Uuid, Contract>>,
    invoices: RwLock<IndexMap<Uuid, Invoice>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_contracts(&self) -> Result<Vec<Contract>, StoreError> {
        Ok(self.contracts.read().await.values().rev().cloned().collect())
    }

    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, StoreError> {
        Ok(self.contracts.read().await.get(&id).cloned())
    }

    async fn insert_contract(&self, contract: &Contract) -> Result<(), StoreError> {
        self.contracts.write().await.insert(contract.id, contract.clone());
        Ok(())
    }

    async fn update_contract(&self, contract: &Contract) -> Result<bool, StoreError> {
        let mut contracts = self.contracts.write().await;
        match contracts.get_mut(&contract.id) {
            Some(existing) => {
                *existing = contract.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_contract(&self, id: Uuid) -> Result<bool, StoreError> {
        let removed = self.contracts.write().await.shift_remove(&id).is_some();
        if removed {
            for invoice in self.invoices.write().await.values_mut() {
                if invoice.contract_id == Some(id) {
                    invoice.contract_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        Ok(self.invoices.read().await.values().rev().cloned().collect())
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError> {
        Ok(self.invoices.read().await.get(&id).cloned())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.invoices.write().await.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn delete_invoice(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.invoices.write().await.shift_remove(&id).is_some())
    }
}
