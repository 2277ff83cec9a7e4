use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub extraction: ExtractionConfig,
    pub upload: UploadConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub cors_allow_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

/// 文档识别服务 (Gemini) 配置
#[derive(Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub verify_documents: bool,
    pub confidence_threshold: f64,
}

// api_key 不输出到日志
impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_documents", &self.verify_documents)
            .field("confidence_threshold", &self.confidence_threshold)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/invoice_validator";
const DEFAULT_ALLOWED_EXTENSIONS: [&str; 6] = ["pdf", "jpg", "jpeg", "png", "doc", "docx"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                api_prefix: "/api/v1".to_string(),
                cors_allow_origin: "*".to_string(),
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: 20,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
            },
            extraction: ExtractionConfig {
                api_key: None,
                model: "gemini-2.0-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                timeout_secs: 60,
                verify_documents: false,
                confidence_threshold: 0.7,
            },
            upload: UploadConfig {
                max_file_size: 10 * 1024 * 1024,
                allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
            },
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 默认值层, 其余来源在此之上叠加
    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let d = AppConfig::default();
        Config::builder()
            .set_default("server.host", d.server.host)?
            .set_default("server.port", i64::from(d.server.port))?
            .set_default("server.api_prefix", d.server.api_prefix)?
            .set_default("server.cors_allow_origin", d.server.cors_allow_origin)?
            .set_default("database.url", d.database.url)?
            .set_default("database.max_connections", i64::from(d.database.max_connections))?
            .set_default("storage.backend", "postgres")?
            .set_default("extraction.model", d.extraction.model)?
            .set_default("extraction.base_url", d.extraction.base_url)?
            .set_default("extraction.timeout_secs", d.extraction.timeout_secs as i64)?
            .set_default("extraction.verify_documents", d.extraction.verify_documents)?
            .set_default("extraction.confidence_threshold", d.extraction.confidence_threshold)?
            .set_default("upload.max_file_size", d.upload.max_file_size as i64)?
            .set_default("upload.allowed_extensions", d.upload.allowed_extensions)?
            .set_default("log.level", d.log.level)
    }

    /// 从配置文件与环境变量加载配置
    ///
    /// 优先级 (低 -> 高): 默认值, `config/default.toml`, `APP_CONFIG` 指定的文件,
    /// `APP__SECTION__KEY` 环境变量, 兼容旧部署的 `SERVER_HOST` / `DATABASE_URL` 等变量。
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false));

        if let Ok(path) = std::env::var("APP_CONFIG") {
            builder = builder.add_source(File::with_name(&path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("extraction.api_key", std::env::var("GEMINI_API_KEY").ok())?
            .set_override_option("extraction.model", std::env::var("GEMINI_MODEL").ok())?
            .set_override_option("log.level", std::env::var("LOG_LEVEL").ok())?
            .build()?
            .try_deserialize()
    }

    /// 从 TOML 文本加载 (未给出的键取默认值)
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
