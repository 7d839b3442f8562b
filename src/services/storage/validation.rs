//! Payload encoding checks and identifier safety checks.
//!
//! Two levels of payload checking exist:
//!
//! - [`is_canonical_base64`] is what the orchestrator applies before accepting
//!   a blob: the payload must re-encode to exactly itself.
//! - [`is_decodable`] is what adapters apply when called directly: the payload
//!   only has to decode.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use std::path::{Component, Path};

/// Lenient decoder used by adapters: padding optional, trailing bits ignored.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

fn is_alphabet_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
}

/// Checks that `data` is in canonical standard Base64 form.
///
/// Surrounding whitespace is ignored. The remaining text must use only the
/// standard alphabet, have a length that is a multiple of 4, decode, and
/// re-encode to the same text (or to the same text plus trailing `=`).
///
/// # Examples
/// ```
/// use blobgate::services::storage::validation::is_canonical_base64;
///
/// assert!(is_canonical_base64("aGk="));
/// assert!(is_canonical_base64("aGk=\n"));
/// assert!(!is_canonical_base64("aGk"));       // not padded
/// assert!(!is_canonical_base64("aG!="));      // outside the alphabet
/// assert!(!is_canonical_base64("aGl="));      // non-zero trailing bits
/// ```
pub fn is_canonical_base64(data: &str) -> bool {
    let cleaned = data.trim();
    if cleaned.is_empty() {
        return false;
    }

    if !cleaned.bytes().all(is_alphabet_byte) {
        return false;
    }

    if cleaned.len() % 4 != 0 {
        return false;
    }

    let Ok(decoded) = STANDARD.decode(cleaned) else {
        return false;
    };

    let reencoded = STANDARD.encode(decoded);
    cleaned == reencoded || cleaned == reencoded.trim_end_matches('=')
}

/// Checks that `data` is non-empty and decodes as Base64.
///
/// Embedded whitespace (line-wrapped encoders) is tolerated.
pub fn is_decodable(data: &str) -> bool {
    !data.trim().is_empty() && decode(data).is_ok()
}

/// Decodes Base64 text leniently, ignoring embedded whitespace.
///
/// # Errors
///
/// Returns an error if the text contains characters outside the alphabet or
/// has an impossible length.
pub fn decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT.decode(compact)
}

/// Encodes bytes in canonical standard Base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Byte length of the decoded payload.
///
/// Returns `None` if the payload does not decode.
pub fn decoded_len(data: &str) -> Option<u64> {
    decode(data).ok().map(|bytes| bytes.len() as u64)
}

/// Checks that a blob identifier can be used as a single file name.
///
/// # Security
/// Rejects identifiers that:
/// - Are empty
/// - Contain path separators
/// - Are `.` or `..`
/// - Contain NUL bytes
pub fn is_safe_path_component(id: &str) -> bool {
    if id.is_empty() || id.contains(['/', '\\', '\0']) {
        return false;
    }

    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
