//! `data:` URI helpers for inline images.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Mime type assumed when the service omits one.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// A base64 payload with its mime type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InlineImage {
    /// Mime type, e.g. `image/jpeg`.
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// Format a `data:<mime>;base64,<payload>` URI.
#[must_use]
pub fn format_data_uri(mime_type: Option<&str>, data: &str) -> String {
    let mime = mime_type
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_IMAGE_MIME);
    format!("data:{mime};base64,{data}")
}

/// Split a base64 `data:` URI into mime type and payload.
///
/// Returns `None` unless the URI is base64-encoded and the payload decodes.
#[must_use]
pub fn parse_data_uri(uri: &str) -> Option<InlineImage> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    if mime_type.is_empty() || STANDARD.decode(data).is_err() {
        return None;
    }
    Some(InlineImage {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}
