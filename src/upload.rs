use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::error::Error;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::dataset::Dataset;

#[derive(Debug)]
pub enum UploadError {
    UnsupportedFormat(String),
    TooLarge(usize),
    DecodeError(String),
    ParseFailure(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::UnsupportedFormat(name) => {
                write!(f, "Unsupported file format: {}", name)
            }
            UploadError::TooLarge(size) => write!(f, "Upload too large: {} bytes", size),
            UploadError::DecodeError(msg) => write!(f, "Upload decode error: {}", msg),
            UploadError::ParseFailure(msg) => write!(f, "CSV parse failure: {}", msg),
        }
    }
}

impl Error for UploadError {}

impl UploadError {
    /// Generic message shown inline in the UI. The underlying cause only goes
    /// to the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            UploadError::UnsupportedFormat(_) => {
                "Invalid file format, please upload a CSV file."
            }
            UploadError::TooLarge(_) => "The file exceeds the upload size limit.",
            UploadError::DecodeError(_) | UploadError::ParseFailure(_) => {
                "An error occurred while processing the file."
            }
        }
    }
}

/// Decodes and parses a browser upload.
///
/// `content` is the transport form the upload widget produces: a data URL
/// (`data:<mime>;base64,<payload>`) or a bare base64 payload. The filename
/// must carry a `.csv` extension. Failures leave the caller's stored dataset
/// untouched; persistence is the caller's responsibility.
pub fn parse_upload(
    content: &str,
    filename: &str,
    max_bytes: usize,
) -> Result<Dataset, UploadError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    if !extension.eq_ignore_ascii_case("csv") {
        warn!("Rejected upload with unsupported extension: {}", filename);
        return Err(UploadError::UnsupportedFormat(filename.to_string()));
    }

    // Strip the data-URL header if present; the payload follows the comma.
    let payload = match content.split_once(',') {
        Some((header, payload)) if header.starts_with("data:") => payload,
        _ => content,
    };

    // Base64 inflates by 4/3, so the encoded length bounds the decoded size
    // and lets us refuse oversized payloads before decoding.
    if payload.len() / 4 * 3 > max_bytes {
        return Err(UploadError::TooLarge(payload.len() / 4 * 3));
    }

    let decoded = BASE64
        .decode(payload.trim())
        .map_err(|e| UploadError::DecodeError(e.to_string()))?;

    if decoded.len() > max_bytes {
        return Err(UploadError::TooLarge(decoded.len()));
    }

    debug!("Decoded upload '{}' ({} bytes)", filename, decoded.len());

    Dataset::from_csv(&decoded).map_err(|e| UploadError::ParseFailure(e.to_string()))
}
