use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to read {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data URI: {0}")]
    Malformed(String),

    #[error("data URI payload is not valid base64")]
    Base64(#[from] base64::DecodeError),
}

/// An image as a `data:<mime>;base64,<payload>` string plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data_uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Reads `path` and encodes it as a data URI. Any file is accepted; the MIME
/// type comes from the bytes, then the extension.
pub fn encode_file(path: &Path) -> Result<EncodedImage, CodecError> {
    let bytes = std::fs::read(path).map_err(|source| CodecError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mime_type = sniff_mime(&bytes)
        .or_else(|| mime_for_path(path))
        .unwrap_or(FALLBACK_MIME)
        .to_string();
    Ok(EncodedImage {
        data_uri: encode_bytes(&bytes, &mime_type),
        mime_type,
    })
}

pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

/// Drops a `data:...,` prefix, leaving the raw base64 payload. Input without
/// a usable prefix is returned unchanged.
pub fn strip_data_uri_prefix(encoded: &str) -> &str {
    match encoded.split_once(',') {
        Some((_, payload)) if !payload.is_empty() => payload,
        _ => encoded,
    }
}

pub fn decode_data_uri(encoded: &str) -> Result<DecodedImage, CodecError> {
    let Some(rest) = encoded.trim().strip_prefix("data:") else {
        return Err(CodecError::Malformed("missing data: scheme".to_string()));
    };
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(CodecError::Malformed("missing ',' separator".to_string()));
    };
    let Some(mime_type) = header.strip_suffix(";base64") else {
        return Err(CodecError::Malformed(format!(
            "unsupported encoding in header '{header}'"
        )));
    };
    let bytes = BASE64.decode(payload.as_bytes())?;
    Ok(DecodedImage {
        mime_type: if mime_type.is_empty() {
            FALLBACK_MIME.to_string()
        } else {
            mime_type.to_string()
        },
        bytes,
    })
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" | "heif" => Some("image/heic"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_data_uri, encode_bytes, encode_file, strip_data_uri_prefix, CodecError};

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn encode_file_sniffs_png_bytes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("upload.bin");
        std::fs::write(&path, PNG_SIGNATURE)?;

        let encoded = encode_file(&path)?;
        assert_eq!(encoded.mime_type, "image/png");
        assert!(encoded.data_uri.starts_with("data:image/png;base64,"));
        Ok(())
    }

    #[test]
    fn encode_file_falls_back_to_extension_then_octet_stream() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let heic = temp.path().join("photo.HEIC");
        std::fs::write(&heic, b"not really heic")?;
        assert_eq!(encode_file(&heic)?.mime_type, "image/heic");

        let unknown = temp.path().join("notes.txt");
        std::fs::write(&unknown, b"hello")?;
        assert_eq!(encode_file(&unknown)?.mime_type, "application/octet-stream");
        Ok(())
    }

    #[test]
    fn unreadable_file_is_a_distinct_error() {
        let err = encode_file(std::path::Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, CodecError::Unreadable { .. }));
        assert!(err.to_string().contains("/definitely/not/here.png"));
    }

    #[test]
    fn strip_prefix_handles_data_uris_and_raw_payloads() {
        assert_eq!(strip_data_uri_prefix("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri_prefix("QUJD"), "QUJD");
        assert_eq!(strip_data_uri_prefix("data:image/png;base64,"), "data:image/png;base64,");
    }

    #[test]
    fn decode_recovers_mime_and_bytes() -> anyhow::Result<()> {
        let uri = encode_bytes(b"abc", "image/webp");
        let decoded = decode_data_uri(&uri)?;
        assert_eq!(decoded.mime_type, "image/webp");
        assert_eq!(decoded.bytes, b"abc");
        Ok(())
    }

    #[test]
    fn decode_rejects_malformed_uris() {
        assert!(matches!(
            decode_data_uri("QUJD"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png,QUJD"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(CodecError::Base64(_))
        ));
    }
}
