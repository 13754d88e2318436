//! Base64 wrapping of patch text.
//!
//! Transports and host configuration carry patches as opaque strings; this
//! is the encoding they agree on.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::patch_text::PatchTextError;

/// Encodes patch text for embedding in a string field.
pub fn encode_state(patch_text: &str) -> String {
    STANDARD.encode(patch_text.as_bytes())
}

/// Decodes state produced by [`encode_state`].
pub fn decode_state(state: &str) -> Result<String, PatchTextError> {
    let bytes = STANDARD.decode(state.trim())?;
    Ok(String::from_utf8(bytes)?)
}
