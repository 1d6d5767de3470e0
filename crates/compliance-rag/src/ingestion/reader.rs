//! Text extraction for supported document formats

use std::path::Path;

use crate::error::{Error, Result};

/// Document formats the pipeline can read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Markdown,
    Pdf,
}

impl SourceFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" if cfg!(feature = "pdf") => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Extract plain text from raw file bytes
pub async fn extract_text(format: SourceFormat, data: Vec<u8>) -> Result<String> {
    match format {
        SourceFormat::Text | SourceFormat::Markdown => {
            Ok(String::from_utf8_lossy(&data).into_owned())
        }
        SourceFormat::Pdf => extract_pdf(data).await,
    }
}

#[cfg(feature = "pdf")]
async fn extract_pdf(data: Vec<u8>) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await
        .map_err(|e| Error::internal(format!("PDF extraction task failed: {}", e)))?
        .map_err(|e| Error::invalid_request(format!("PDF extraction failed: {}", e)))?;
    Ok(cleanup_pdf_text(&text))
}

#[cfg(not(feature = "pdf"))]
async fn extract_pdf(_data: Vec<u8>) -> Result<String> {
    Err(Error::invalid_request("PDF support is not compiled in"))
}

/// Replace typographic characters that PDF extraction leaves behind
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn cleanup_pdf_text(text: &str) -> String {
    text.replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
}
