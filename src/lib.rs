pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod service;

pub use api::router;
pub use config::AppConfig;
pub use db::{create_pool, init_schema, DocumentStore, MemoryStore, PgStore};
pub use service::{DocumentExtractor, GeminiExtractor, ValidatorService};
