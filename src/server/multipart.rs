//! Multipart form parsing for `POST /api/remove-background`

use crate::config::OutputFormat;
use crate::error::{BgRemovalError, Result};
use crate::services::{ImageBlob, OutputFormatHandler};
use bytes::{Buf, BufMut};
use futures_util::TryStreamExt;
use warp::multipart::{FormData, Part};

/// Fields of a removal request after parsing and defaulting
#[derive(Debug)]
pub struct RemoveBackgroundForm {
    pub file: ImageBlob,
    /// Format string exactly as sent by the caller
    pub format_name: String,
    pub format: OutputFormat,
    pub quality: u8,
    pub api_key: Option<String>,
}

/// Read all parts of the upload form
///
/// `file` is required; `format` defaults to `png`, `quality` to
/// `default_quality`. Unknown fields are ignored and a repeated field keeps
/// its last value. Field bytes are counted as they stream in, so chunked
/// bodies are held to `max_bytes` as well.
///
/// # Errors
/// - `Validation` for a missing file, non-text fields, a bad quality or a
///   malformed body
/// - `PayloadTooLarge` once the fields exceed `max_bytes`
pub async fn parse_remove_background(
    form: FormData,
    default_quality: u8,
    max_bytes: u64,
) -> Result<RemoveBackgroundForm> {
    let mut budget = UploadBudget::new(max_bytes);
    let mut file = None;
    let mut format_name = None;
    let mut quality = None;
    let mut api_key = None;

    let mut form = Box::pin(form);
    while let Some(mut part) = form.try_next().await.map_err(malformed)? {
        let name = part.name().to_string();
        match name.as_str() {
            "file" => {
                let content_type = part.content_type().map(str::to_string);
                let data = read_part(&mut part, &mut budget).await?;
                file = Some(ImageBlob::new(data, content_type));
            },
            "format" => format_name = Some(read_text(&mut part, &name, &mut budget).await?),
            "quality" => {
                let raw = read_text(&mut part, &name, &mut budget).await?;
                quality = Some(parse_quality(&raw)?);
            },
            "api_key" => api_key = Some(read_text(&mut part, &name, &mut budget).await?),
            other => {
                tracing::debug!(field = other, "Ignoring unknown form field");
                read_part(&mut part, &mut budget).await?;
            },
        }
    }

    let file = file.ok_or_else(|| BgRemovalError::validation("Missing required field: file"))?;
    let format_name = format_name.unwrap_or_else(|| "png".to_string());

    Ok(RemoveBackgroundForm {
        file,
        format: OutputFormat::from_name(&format_name),
        format_name,
        quality: quality.unwrap_or(default_quality),
        api_key,
    })
}

/// Parse a quality field; integers 1 to 100 only
///
/// # Errors
/// `Validation` for anything else
pub fn parse_quality(raw: &str) -> Result<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|q| (1..=100).contains(q))
        .ok_or_else(|| {
            BgRemovalError::validation(format!(
                "quality must be an integer between 1 and 100, got '{}'",
                raw.trim()
            ))
        })
}

/// `Content-Disposition` value for a result
///
/// Echoes the caller's format string when it is a plain token, otherwise
/// uses the extension of the format actually produced.
#[must_use]
pub fn content_disposition(format_name: &str, format: OutputFormat) -> String {
    let is_token = !format_name.is_empty()
        && format_name.len() <= 16
        && format_name.bytes().all(|b| b.is_ascii_alphanumeric());

    let extension = if is_token {
        format_name
    } else {
        OutputFormatHandler::get_extension(format)
    };
    format!("attachment; filename=withoutbg.{extension}")
}

/// Running total of field bytes read from one form
#[derive(Debug)]
struct UploadBudget {
    limit: u64,
    used: u64,
}

impl UploadBudget {
    fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    fn consume(&mut self, bytes: usize) -> Result<()> {
        self.used = self.used.saturating_add(bytes as u64);
        if self.used > self.limit {
            return Err(BgRemovalError::payload_too_large(self.limit));
        }
        Ok(())
    }
}

async fn read_part(part: &mut Part, budget: &mut UploadBudget) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = part.data().await {
        let chunk = chunk.map_err(malformed)?;
        budget.consume(chunk.remaining())?;
        data.put(chunk);
    }
    Ok(data)
}

async fn read_text(part: &mut Part, name: &str, budget: &mut UploadBudget) -> Result<String> {
    let data = read_part(part, budget).await?;
    String::from_utf8(data)
        .map_err(|_| BgRemovalError::validation(format!("Field '{name}' must be UTF-8 text")))
}

fn malformed(e: warp::Error) -> BgRemovalError {
    BgRemovalError::validation(format!("Malformed multipart body: {e}"))
}
