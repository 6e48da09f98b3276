//! # docmorph-core
//!
//! Office document format conversion.
//!
//! Conversions between PDF, DOCX, XLSX, Markdown and HTML are delegated to
//! external converters:
//!
//! - **LibreOffice** (headless process pool) for pdf→docx, docx→pdf and html→pdf
//! - **pandoc** for markup conversions and as the generic fallback
//! - **calamine** for xlsx→csv
//! - **pdfium** (Google's PDF engine) for pdf→txt and PDF merging
//!
//! This crate owns the support matrix, picks the backend for each pair, walks
//! directories and runs batches with bounded concurrency.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docmorph_core::{ConversionJob, Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), docmorph_core::ConversionError> {
//!     let converter = Converter::new(ConverterConfig::default())?;
//!
//!     // Formats are inferred from the extensions.
//!     let result = converter.convert(ConversionJob::new("notes.md", "notes.docx")).await?;
//!     println!("Wrote {:?} via {}", result.output_path, result.route.backend_name());
//!     Ok(())
//! }
//! ```
//!
//! ## Batch Processing with Progress
//!
//! ```rust,no_run
//! use docmorph_core::{Converter, ConverterBuilder, DocFormat};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), docmorph_core::ConversionError> {
//!     let converter = ConverterBuilder::new().max_workers(4).keep_structure(true).build()?;
//!     let (tx, rx) = async_channel::unbounded::<docmorph_core::ConversionProgress>();
//!
//!     let watcher = tokio::spawn(async move {
//!         while let Ok(p) = rx.recv().await {
//!             println!("{}/{} {} {:?}", p.file_index + 1, p.total_files, p.current_file, p.stage);
//!         }
//!     });
//!
//!     let result = converter
//!         .convert_batch_with_progress(
//!             Path::new("./input"),
//!             Path::new("./output"),
//!             DocFormat::Docx,
//!             DocFormat::Pdf,
//!             tx,
//!         )
//!         .await?;
//!     let _ = watcher.await;
//!
//!     println!("{} converted, failed: {:?}", result.success_count(), result.failed_names());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod converter;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod pandoc;
pub mod pdf;
pub mod pool;
pub mod spreadsheet;

// Re-export main types for convenience
pub use config::{
    BatchConfig, BatchResult, ConversionJob, ConversionProgress, ConversionStage,
    ConverterConfig, FailedFile, FileResult, OfficeConfig, PandocConfig, PdfConfig,
};
pub use converter::{Converter, ConverterBuilder, ConverterStats};
pub use dispatch::{route, OfficeFilter, Route};
pub use error::{ConversionError, Result};
pub use format::{DocFormat, FormatMatrix};
pub use pdf::PdfEngine;
pub use pool::LibreOfficePool;

/// Check if a file extension is a known document format.
pub fn is_supported_extension(ext: &str) -> bool {
    DocFormat::from_extension(ext).is_some()
}

/// Initialize logging to stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g. `"warn"` or
/// `"docmorph_core=debug"`) is used. Call this once at application startup.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
