pub mod comparison;
pub mod extraction;
pub mod gemini;
pub mod normalize;
pub mod report;
pub mod upload;
pub mod validator;

pub use comparison::{compare, compare_items};
pub use extraction::{DocumentExtractor, ExtractionError};
pub use gemini::GeminiExtractor;
pub use upload::UploadError;
pub use validator::{ServiceError, ValidatorService};
