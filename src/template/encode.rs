//! Template code codec: compact JSON, gzip, standard base64.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;

use super::TemplateError;

pub fn encode(value: &Value) -> Result<String, TemplateError> {
    let text = serde_json::to_string(value)?;
    let mut gz = GzEncoder::new(Vec::new(), Compression::best());
    gz.write_all(text.as_bytes())?;
    let compressed = gz.finish()?;
    Ok(STANDARD.encode(compressed))
}

pub fn decode(code: &str) -> Result<Value, TemplateError> {
    let compressed = STANDARD.decode(code.trim())?;
    let mut text = String::new();
    GzDecoder::new(compressed.as_slice()).read_to_string(&mut text)?;
    Ok(serde_json::from_str(&text)?)
}
