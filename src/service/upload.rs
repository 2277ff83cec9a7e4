use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::UploadConfig;
use crate::models::UploadedDocument;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Uploaded file is empty")]
    Empty,

    #[error("File too large: {size} bytes (limit {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("Unsupported file content: {0}")]
    UnsupportedContent(String),

    #[error("Invalid base64 content: {0}")]
    InvalidBase64(String),
}

const PDF: &str = "application/pdf";
const PNG: &str = "image/png";
const JPEG: &str = "image/jpeg";
const DOC: &str = "application/msword";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// 按文件头识别类型
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        Some(PDF)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(PNG)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(JPEG)
    } else if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        Some(DOC)
    } else if bytes.starts_with(b"PK\x03\x04") {
        Some(DOCX)
    } else {
        None
    }
}

fn expected_mime(extension: &str) -> Option<&'static str> {
    match extension {
        "pdf" => Some(PDF),
        "png" => Some(PNG),
        "jpg" | "jpeg" => Some(JPEG),
        "doc" => Some(DOC),
        "docx" => Some(DOCX),
        _ => None,
    }
}

pub fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// 校验上传文件: 大小, 扩展名, 文件头与扩展名一致
pub fn validate_upload(
    filename: &str,
    bytes: Vec<u8>,
    config: &UploadConfig,
) -> Result<UploadedDocument, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > config.max_file_size {
        return Err(UploadError::TooLarge {
            size: bytes.len(),
            max: config.max_file_size,
        });
    }

    let extension = file_extension(filename);
    if !config.allowed_extensions.iter().any(|e| e.eq_ignore_ascii_case(&extension)) {
        return Err(UploadError::UnsupportedExtension(if extension.is_empty() {
            filename.to_string()
        } else {
            extension
        }));
    }

    let expected = expected_mime(&extension)
        .ok_or_else(|| UploadError::UnsupportedExtension(extension.clone()))?;
    match sniff_mime(&bytes) {
        Some(mime) if mime == expected => {}
        Some(mime) => {
            return Err(UploadError::UnsupportedContent(format!(
                "{} content in a .{} file",
                mime, extension
            )))
        }
        None => return Err(UploadError::UnsupportedContent("unrecognised file header".to_string())),
    }

    tracing::debug!(filename, size = bytes.len(), mime = expected, "Upload accepted");

    Ok(UploadedDocument {
        filename: filename.to_string(),
        extension,
        mime_type: expected,
        bytes,
    })
}

/// 解码 base64 文件内容, 允许 `data:<mime>;base64,` 前缀与换行
pub fn decode_base64(content: &str) -> Result<Vec<u8>, UploadError> {
    let payload = match content.find(";base64,") {
        Some(idx) if content.starts_with("data:") => &content[idx + ";base64,".len()..],
        _ => content,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| UploadError::InvalidBase64(e.to_string()))
}
