//! Size-limited response body reading

use crate::LogoError;
use reqwest::Response;

/// Default ceiling on a decoded logo body (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Reads a response body, rejecting it once it exceeds `max_bytes`
///
/// A declared `Content-Length` above the limit is rejected before any of
/// the body is read. Otherwise the body is buffered chunk by chunk and the
/// read stops as soon as the running total crosses the limit.
pub async fn read_body_limited(
    mut response: Response,
    max_bytes: u64,
) -> Result<Vec<u8>, LogoError> {
    let status = response.status().as_u16();

    if let Some(declared) = response.content_length() {
        if declared > max_bytes {
            return Err(too_large(status, declared, max_bytes));
        }
    }

    let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    while let Some(chunk) = response.chunk().await? {
        let total = body.len() as u64 + chunk.len() as u64;
        if total > max_bytes {
            return Err(too_large(status, total, max_bytes));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

fn too_large(status: u16, size: u64, max_bytes: u64) -> LogoError {
    LogoError::Unexpected {
        status,
        message: format!(
            "Response body of {} bytes exceeds the {} byte limit",
            size, max_bytes
        ),
    }
}
