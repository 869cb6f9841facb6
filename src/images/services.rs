use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

const URL_TTL_SECS: u64 = 30 * 60;

#[derive(Debug)]
pub struct DecodedImage {
    pub body: Bytes,
    pub content_type: String,
    pub ext: &'static str,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Parse `data:image/<type>;base64,<payload>`.
pub fn decode_data_uri(data: &str) -> Result<DecodedImage, &'static str> {
    const NOT_A_DATA_URI: &str = "Expected a base64-encoded image data URI";
    let rest = data.trim().strip_prefix("data:").ok_or(NOT_A_DATA_URI)?;
    let (meta, payload) = rest.split_once(',').ok_or(NOT_A_DATA_URI)?;
    let content_type = meta.strip_suffix(";base64").ok_or(NOT_A_DATA_URI)?;
    let ext = ext_from_mime(content_type).ok_or("Unsupported image type")?;
    let body = Base64::decode_vec(payload).map_err(|_| "Invalid base64 payload")?;
    if body.is_empty() {
        return Err("Empty image");
    }
    Ok(DecodedImage {
        body: Bytes::from(body),
        content_type: content_type.to_string(),
        ext,
    })
}

/// Decode `data` and upload it under `folder/`. Decoding problems are
/// reported against `field`. Returns the object key.
pub async fn store_image(st: &AppState, folder: &str, field: &str, data: &str) -> AppResult<String> {
    let image = decode_data_uri(data).map_err(|msg| AppError::field(field, msg))?;
    let key = format!("{}/{}.{}", folder, Uuid::new_v4(), image.ext);
    st.storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    debug!(%key, "image stored");
    Ok(key)
}

pub async fn image_url(st: &AppState, key: &str) -> AppResult<String> {
    let url = st
        .storage
        .presign_get(key, URL_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {}", key))?;
    Ok(url)
}

/// Best-effort removal of an object that is no longer referenced.
pub async fn discard_image(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "failed to delete stale image");
    }
}
