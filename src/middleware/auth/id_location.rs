/*
 * Responsibility
 * - Where the candidate owner id comes from (path `{id}` or body `user_id`)
 * - Path id parsing (auto base, overflow rejects)
 * - Body buffering: read once, always reinstall the same bytes before returning
 */
use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{FromRequestParts, RawPathParams, Request},
};
use serde::Deserialize;

/// Path parameter holding the resource owner id.
pub const PATH_ID_PARAM: &str = "id";

/// Source of the candidate owner id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdLocation {
    /// `{id}` path segment.
    PathParam,
    /// JSON body `{ "user_id": <u64> }`.
    BodyField,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("path parameter `id` not present")]
    MissingPathParam,

    #[error("path parameter `id` is not an unsigned integer: {0:?}")]
    InvalidPathParam(String),

    #[error("request body could not be read: {0}")]
    BodyRead(String),

    #[error("request body is not {{\"user_id\": <u64>}}: {0}")]
    BodyDecode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct BodyId {
    user_id: u64,
}

/// The request body as read by the ownership guard.
///
/// Inserted into request extensions after a `BodyField` extraction so
/// downstream code can take its own view of the payload without touching the
/// (already reinstalled) body stream. Cloning is cheap (`Bytes`).
#[derive(Debug, Clone)]
pub struct BufferedBody(pub Bytes);

/// Extract the candidate id from `req`.
///
/// The request is always handed back. For `BodyField` its body has been
/// replaced by a fresh stream over the exact bytes that were read, whether or
/// not decoding succeeded.
pub async fn extract_candidate(
    location: IdLocation,
    req: Request,
    body_limit: usize,
) -> (Request, Result<u64, ExtractError>) {
    match location {
        IdLocation::PathParam => {
            let (mut parts, body) = req.into_parts();
            let id = match RawPathParams::from_request_parts(&mut parts, &()).await {
                Ok(params) => params
                    .iter()
                    .find(|(name, _)| *name == PATH_ID_PARAM)
                    .ok_or(ExtractError::MissingPathParam)
                    .and_then(|(_, raw)| {
                        parse_path_id(raw)
                            .ok_or_else(|| ExtractError::InvalidPathParam(raw.to_string()))
                    }),
                Err(_) => Err(ExtractError::MissingPathParam),
            };
            (Request::from_parts(parts, body), id)
        }
        IdLocation::BodyField => {
            let (mut parts, body) = req.into_parts();
            let bytes = match to_bytes(body, body_limit).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    // Nothing left to restore; the stream is gone either way.
                    let req = Request::from_parts(parts, Body::empty());
                    return (req, Err(ExtractError::BodyRead(err.to_string())));
                }
            };

            let id = decode_body_id(&bytes).map_err(ExtractError::from);

            parts.extensions.insert(BufferedBody(bytes.clone()));
            (Request::from_parts(parts, Body::from(bytes)), id)
        }
    }
}

// Top level must be an object; serde would otherwise accept `[7]` for a struct.
fn decode_body_id(bytes: &[u8]) -> Result<u64, serde_json::Error> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(bytes)?;
    let body: BodyId = serde_json::from_value(serde_json::Value::Object(object))?;
    Ok(body.user_id)
}

/// Parse an unsigned id with automatic base detection.
///
/// `0x`/`0o`/`0b` prefixes and a leading `0` (octal) are honoured; anything
/// else is decimal. Signs, empty digits and overflow yield `None`.
pub fn parse_path_id(raw: &str) -> Option<u64> {
    let (digits, radix) = match raw.as_bytes() {
        [b'0', b'x' | b'X', ..] => (&raw[2..], 16),
        [b'0', b'o' | b'O', ..] => (&raw[2..], 8),
        [b'0', b'b' | b'B', ..] => (&raw[2..], 2),
        [b'0', _, ..] => (&raw[1..], 8),
        _ => (raw, 10),
    };

    // from_str_radix accepts a leading '+'
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    u64::from_str_radix(digits, radix).ok()
}
