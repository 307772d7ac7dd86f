use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Prefix of every encoded preview
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Encode PNG bytes as a `data:` URI (standard alphabet, `=` padded).
pub fn to_data_uri(bytes: &[u8]) -> String {
    let mut uri = String::with_capacity(PNG_DATA_URI_PREFIX.len() + bytes.len().div_ceil(3) * 4);
    uri.push_str(PNG_DATA_URI_PREFIX);
    STANDARD.encode_string(bytes, &mut uri);
    uri
}

/// Recover the PNG bytes from a URI built by [`to_data_uri`].
///
/// Returns `None` for anything else.
pub fn from_data_uri(uri: &str) -> Option<Vec<u8>> {
    let payload = uri.strip_prefix(PNG_DATA_URI_PREFIX)?;
    STANDARD.decode(payload).ok()
}
