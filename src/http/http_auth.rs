use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub const WWW_AUTHENTICATE_VALUE: &str = "Basic realm=\"Secure Area\"";

/// Decodes an `Authorization: Basic <base64(user:pass)>` header value into `user:pass`.
///
/// Returns `None` for other schemes, invalid base64 and non UTF-8 payloads.
pub fn basic_credentials(authorization: &str) -> Option<String> {
    let (scheme, encoded) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    String::from_utf8(decoded).ok()
}
