pub mod contract;
pub mod document;
pub mod invoice;
pub mod line_item;
pub mod result;

pub use contract::{Contract, ContractSource, NewContract};
pub use document::{ExtractedContract, UploadedDocument, VerificationResult};
pub use invoice::{ExtractedInvoice, Invoice, InvoiceLines};
pub use line_item::{sum_totals, LineItem, NewLineItem};
pub use result::{ComparisonFlags, ComparisonResult, Discrepancy, ItemMatch};
