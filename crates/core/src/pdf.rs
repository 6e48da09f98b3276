//! PDF text extraction and merging using pdfium (Google's PDF engine).
//!
//! The pdfium handle is not `Send`, so it is bound on the thread that uses it,
//! once per operation. Hosts without the library can still run every other
//! conversion.

use crate::config::PdfConfig;
use crate::error::{ConversionError, Result};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Entry point for pdfium-backed operations. Cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct PdfEngine {
    config: PdfConfig,
}

impl PdfEngine {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    /// Directories searched for the pdfium shared library, in order.
    fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(ref dir) = self.config.library_path {
            paths.push(dir.clone());
        }
        if let Ok(dir) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
            paths.push(PathBuf::from(dir));
        }
        paths.extend(["./", "/usr/lib", "/usr/local/lib"].map(PathBuf::from));
        paths
    }

    /// Bind the pdfium library for use on the current thread.
    fn bind(&self) -> Result<Pdfium> {
        let mut last_error = String::from("no search paths");
        for dir in self.search_paths() {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)) {
                Ok(bindings) => {
                    debug!("Bound pdfium from {:?}", dir);
                    return Ok(Pdfium::new(bindings));
                }
                Err(e) => last_error = e.to_string(),
            }
        }
        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| {
                ConversionError::PdfiumError(format!(
                    "Failed to load pdfium library: {} ({})",
                    e, last_error
                ))
            })
    }

    /// Whether the pdfium library can be bound.
    pub fn is_available(&self) -> bool {
        self.bind().is_ok()
    }

    /// Extract the text of every page, one page per line block.
    pub fn extract_text(&self, pdf_path: &Path) -> Result<String> {
        let start = Instant::now();
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| ConversionError::PdfiumError(format!("Failed to load PDF: {}", e)))?;

        let mut text = String::new();
        for (index, page) in document.pages().iter().enumerate() {
            let page_text = page.text().map_err(|e| {
                ConversionError::PdfiumError(format!(
                    "Failed to read text of page {}: {}",
                    index + 1,
                    e
                ))
            })?;
            text.push_str(&page_text.all());
            text.push('\n');
        }

        debug!(
            "Extracted {} chars from {:?} in {:?}",
            text.len(),
            pdf_path,
            start.elapsed()
        );
        Ok(text)
    }

    /// Extract the text of `pdf_path` into a plain-text file.
    pub fn write_text(&self, pdf_path: &Path, output_path: &Path) -> Result<()> {
        let text = self.extract_text(pdf_path)?;
        std::fs::write(output_path, text).map_err(|e| ConversionError::OutputDirError {
            path: output_path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Concatenate `inputs` into a new PDF at `output_path`. Returns the page count.
    pub fn merge(&self, inputs: &[PathBuf], output_path: &Path) -> Result<usize> {
        if inputs.is_empty() {
            return Err(ConversionError::InvalidConfig(
                "at least one PDF is required to merge".to_string(),
            ));
        }
        let pdfium = self.bind()?;
        let mut merged = pdfium
            .create_new_pdf()
            .map_err(|e| ConversionError::PdfiumError(e.to_string()))?;

        for input in inputs {
            let source = pdfium
                .load_pdf_from_file(input, None)
                .map_err(|e| ConversionError::ConversionFailed {
                    path: input.clone(),
                    message: e.to_string(),
                })?;
            merged
                .pages_mut()
                .append(&source)
                .map_err(|e| ConversionError::ConversionFailed {
                    path: input.clone(),
                    message: e.to_string(),
                })?;
        }

        let page_count = merged.pages().len() as usize;
        merged
            .save_to_file(output_path)
            .map_err(|e| ConversionError::OutputDirError {
                path: output_path.to_path_buf(),
                message: e.to_string(),
            })?;

        info!(
            "Merged {} PDFs into {:?} ({} pages)",
            inputs.len(),
            output_path,
            page_count
        );
        Ok(page_count)
    }
}
