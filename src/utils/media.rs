//! Source images and `data:` URIs.
use std::path::Path;

use base64::{engine::general_purpose, Engine};

use crate::error::{AppError, AppResult};

/// The uploaded portrait every request is conditioned on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> AppResult<Self> {
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("Source image is empty".to_string()));
        }
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(AppError::InvalidInput(format!(
                "Unsupported media type '{}', expected image/*",
                mime_type
            )));
        }
        Ok(SourceImage { bytes, mime_type })
    }

    /// Read a portrait from disk, taking the media type from the extension.
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let mime = mime_from_extension(path).ok_or_else(|| {
            AppError::InvalidInput(format!("Cannot infer image type of {}", path.display()))
        })?;
        Self::new(bytes, mime)
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

pub fn to_data_uri(mime_type: &str, base64_data: &str) -> String {
    format!("data:{};base64,{}", mime_type, base64_data)
}

/// Decode a `data:<mime>;base64,<payload>` URI into its bytes.
pub fn decode_data_uri(uri: &str) -> AppResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AppError::InvalidInput("Not a data URI".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::InvalidInput("Malformed data URI".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(AppError::InvalidInput("Only base64 data URIs are supported".to_string()));
    }
    Ok(general_purpose::STANDARD.decode(payload.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_decodes() {
        let uri = to_data_uri("image/png", &general_purpose::STANDARD.encode(b"\x89PNG"));
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap(), b"\x89PNG");
    }

    #[test]
    fn rejects_non_base64_and_other_schemes() {
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("https://example.com/a.png").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn source_validation() {
        assert!(SourceImage::new(vec![], "image/png").is_err());
        assert!(SourceImage::new(vec![1], "text/plain").is_err());
        let src = SourceImage::new(vec![1, 2, 3], "image/jpeg").unwrap();
        assert_eq!(src.to_base64(), "AQID");
        assert_eq!(mime_from_extension(Path::new("me.JPG")), Some("image/jpeg"));
        assert_eq!(mime_from_extension(Path::new("me.txt")), None);
    }

    #[tokio::test]
    async fn reads_portrait_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".jpeg").tempfile().expect("temp image");
        std::io::Write::write_all(&mut file, &[0xff, 0xd8, 0xff]).expect("write image");

        let src = SourceImage::from_path(file.path()).await.unwrap();
        assert_eq!(src.mime_type, "image/jpeg");
        assert_eq!(src.bytes, vec![0xff, 0xd8, 0xff]);

        let txt = tempfile::Builder::new().suffix(".txt").tempfile().expect("temp text");
        assert!(SourceImage::from_path(txt.path()).await.is_err());
    }
}
