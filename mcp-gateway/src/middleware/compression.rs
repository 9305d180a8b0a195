//! # Response Compression
//!
//! Hand-rolled gzip via `async-compression`'s Tokio `GzipEncoder`, not
//! `tower_http::compression::CompressionLayer` — the gateway needs to record
//! before/after byte counts and elapsed encode time as metrics, which the
//! tower-http layer doesn't expose a hook for.

use crate::metrics::metrics as metrics_collector;
use async_compression::tokio::write::GzipEncoder;
use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY};
use axum::http::HeaderValue;
use axum::response::Response;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

const MIN_COMPRESSIBLE_BYTES: usize = 1024;

fn is_compressible_content_type(content_type: &str) -> bool {
    let skip_prefixes = ["image/", "video/", "audio/"];
    let skip_exact = [
        "application/gzip",
        "application/zip",
        "application/x-gzip",
        "application/octet-stream",
    ];
    if skip_prefixes.iter().any(|p| content_type.starts_with(p)) {
        return false;
    }
    if skip_exact.contains(&content_type) {
        return false;
    }
    true
}

/// Compresses `response`'s body in place if it's worth compressing:
/// large enough, not already compressed/binary, and the caller already
/// confirmed `Accept-Encoding: gzip` before calling this.
pub async fn maybe_compress(response: Response) -> Response {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_compressible_content_type(&content_type) {
        metrics_collector().record_compression_skipped();
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let original = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => {
            metrics_collector().record_compression_skipped();
            return Response::from_parts(parts, Body::empty());
        }
    };

    if original.len() < MIN_COMPRESSIBLE_BYTES {
        metrics_collector().record_compression_skipped();
        return Response::from_parts(parts, Body::from(original));
    }

    let start = Instant::now();
    let mut encoder = GzipEncoder::new(Vec::new());
    if encoder.write_all(&original).await.is_err() || encoder.shutdown().await.is_err() {
        metrics_collector().record_compression_skipped();
        return Response::from_parts(parts, Body::from(original));
    }
    let compressed = encoder.into_inner();
    let _elapsed = start.elapsed();

    metrics_collector().record_compression(original.len(), compressed.len());

    parts.headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    parts.headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(compressed.len()));

    Response::from_parts(parts, Body::from(compressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_content_type_is_not_compressible() {
        assert!(!is_compressible_content_type("image/png"));
    }

    #[test]
    fn json_content_type_is_compressible() {
        assert!(is_compressible_content_type("application/json"));
    }

    #[tokio::test]
    async fn small_body_is_left_uncompressed() {
        let response = Response::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let result = maybe_compress(response).await;
        assert!(result.headers().get(CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn large_json_body_gets_gzip_encoded() {
        let payload = "x".repeat(4096);
        let response = Response::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        let result = maybe_compress(response).await;
        assert_eq!(
            result.headers().get(CONTENT_ENCODING).unwrap(),
            "gzip"
        );
    }
}
