use std::sync::Arc;
use uuid::Uuid;

use super::comparison;
use super::extraction::{DocumentExtractor, ExtractionError};
use super::report;
use super::upload::{validate_upload, UploadError};
use crate::config::AppConfig;
use crate::db::{DocumentStore, StoreError};
use crate::models::{
    ComparisonResult, Contract, ContractSource, Invoice, InvoiceLines, NewContract,
    UploadedDocument, VerificationResult,
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Document rejected: {}", .0.reason)]
    Rejected(VerificationResult),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Report export failed: {0}")]
    Report(#[from] csv::Error),
}

/// 合同 / 发票校验服务
pub struct ValidatorService {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn DocumentExtractor>,
    config: AppConfig,
}

impl ValidatorService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn DocumentExtractor>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            config,
        }
    }

    fn validate(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedDocument, ServiceError> {
        Ok(validate_upload(filename, bytes, &self.config.upload)?)
    }

    fn check_new_contract(new: &NewContract) -> Result<(), ServiceError> {
        if new.supplier_name.trim().is_empty() {
            return Err(ServiceError::BadRequest("supplier_name must not be empty".to_string()));
        }
        if let Some(pos) = new.items.iter().position(|i| i.description.trim().is_empty()) {
            return Err(ServiceError::BadRequest(format!(
                "item {} has an empty description",
                pos + 1
            )));
        }
        Ok(())
    }

    async fn require_contract(&self, id: Uuid) -> Result<Contract, ServiceError> {
        self.store
            .get_contract(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Contract {}", id)))
    }

    async fn require_invoice(&self, id: Uuid) -> Result<Invoice, ServiceError> {
        self.store
            .get_invoice(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {}", id)))
    }

    // ---- 合同 ----

    pub async fn list_contracts(&self) -> Result<Vec<Contract>, ServiceError> {
        Ok(self.store.list_contracts().await?)
    }

    pub async fn get_contract(&self, id: Uuid) -> Result<Contract, ServiceError> {
        self.require_contract(id).await
    }

    /// 手工录入合同
    pub async fn create_contract(&self, new: NewContract) -> Result<Contract, ServiceError> {
        Self::check_new_contract(&new)?;
        let contract = Contract::from_new(new, ContractSource::Manual);
        self.store.insert_contract(&contract).await?;
        tracing::info!(id = %contract.id, items = contract.items.len(), "Contract created");
        Ok(contract)
    }

    pub async fn update_contract(&self, id: Uuid, update: NewContract) -> Result<Contract, ServiceError> {
        Self::check_new_contract(&update)?;
        let mut contract = self.require_contract(id).await?;
        contract.apply_update(update);
        if !self.store.update_contract(&contract).await? {
            return Err(ServiceError::NotFound(format!("Contract {}", id)));
        }
        tracing::info!(id = %id, "Contract updated");
        Ok(contract)
    }

    pub async fn delete_contract(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_contract(id).await? {
            return Err(ServiceError::NotFound(format!("Contract {}", id)));
        }
        tracing::info!(id = %id, "Contract deleted");
        Ok(())
    }

    /// 上传合同文档, 识别后入库
    pub async fn upload_contract(&self, filename: &str, bytes: Vec<u8>) -> Result<Contract, ServiceError> {
        let document = self.validate(filename, bytes)?;
        let extracted = self.extractor.extract_contract(&document).await?;
        let (new, source) = extracted.into_new_contract();
        let contract = Contract::from_new(new, source);
        self.store.insert_contract(&contract).await?;
        tracing::info!(
            id = %contract.id,
            file = %filename,
            items = contract.items.len(),
            "Contract extracted from document"
        );
        Ok(contract)
    }

    // ---- 发票 ----

    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, ServiceError> {
        Ok(self.store.list_invoices().await?)
    }

    pub async fn get_invoice(&self, id: Uuid) -> Result<Invoice, ServiceError> {
        self.require_invoice(id).await
    }

    pub async fn delete_invoice(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_invoice(id).await? {
            return Err(ServiceError::NotFound(format!("Invoice {}", id)));
        }
        tracing::info!(id = %id, "Invoice deleted");
        Ok(())
    }

    /// 校验调用失败时降级为低置信度结果
    async fn verify(&self, document: &UploadedDocument) -> VerificationResult {
        match self.extractor.verify_invoice(document).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(file = %document.filename, error = %e, "Document verification failed");
                VerificationResult::failed(e)
            }
        }
    }

    /// 识别发票并入库, 可关联合同
    pub async fn process_invoice(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        contract_id: Option<Uuid>,
    ) -> Result<Invoice, ServiceError> {
        let document = self.validate(filename, bytes)?;
        if let Some(id) = contract_id {
            self.require_contract(id).await?;
        }

        if self.config.extraction.verify_documents {
            let verification = self.verify(&document).await;
            if !verification.passes(self.config.extraction.confidence_threshold) {
                tracing::warn!(
                    file = %filename,
                    confidence = verification.confidence,
                    "Document is not recognised as an invoice"
                );
                return Err(ServiceError::Rejected(verification));
            }
        }

        let extracted = self.extractor.extract_invoice(&document).await?;
        let invoice = Invoice::from_extracted(extracted, contract_id);
        self.store.insert_invoice(&invoice).await?;
        tracing::info!(
            id = %invoice.id,
            number = %invoice.invoice_number,
            items = invoice.items.len(),
            "Invoice processed"
        );
        Ok(invoice)
    }

    pub async fn verify_document(&self, filename: &str, bytes: Vec<u8>) -> Result<VerificationResult, ServiceError> {
        let document = self.validate(filename, bytes)?;
        Ok(self.verify(&document).await)
    }

    // ---- 比对 ----

    /// 比对已入库的合同与发票
    pub async fn compare(&self, contract_id: Uuid, invoice_id: Uuid) -> Result<ComparisonResult, ServiceError> {
        let (contract, invoice) = futures::try_join!(
            self.require_contract(contract_id),
            self.require_invoice(invoice_id)
        )?;

        let result = comparison::compare(
            &contract,
            Some(invoice.id),
            &invoice.supplier_name,
            &invoice.items,
        );
        tracing::info!(
            contract = %contract_id,
            invoice = %invoice_id,
            overall_match = result.overall_match,
            discrepancies = result.discrepancies.len(),
            "Comparison complete"
        );
        Ok(result)
    }

    /// 比对未入库的发票数据
    pub async fn compare_inline(
        &self,
        contract_id: Uuid,
        invoice: &InvoiceLines,
    ) -> Result<ComparisonResult, ServiceError> {
        let contract = self.require_contract(contract_id).await?;
        let result = comparison::compare(&contract, None, &invoice.supplier_name, &invoice.items);
        tracing::info!(
            contract = %contract_id,
            overall_match = result.overall_match,
            discrepancies = result.discrepancies.len(),
            "Inline comparison complete"
        );
        Ok(result)
    }

    pub async fn export_comparison(&self, contract_id: Uuid, invoice_id: Uuid) -> Result<Vec<u8>, ServiceError> {
        let result = self.compare(contract_id, invoice_id).await?;
        Ok(report::export_to_csv(&result)?)
    }
}
