//! Main converter that ties the support matrix to the conversion backends.
//!
//! This module provides the high-level API: single conversions, directory-wide
//! batches, explicit file lists with progress events, and the PDF utilities.

use crate::batch;
use crate::config::{
    BatchConfig, BatchResult, ConversionJob, ConversionProgress, ConverterConfig, FileResult,
};
use crate::dispatch::{route, Route};
use crate::error::{ConversionError, Result};
use crate::format::{DocFormat, FormatMatrix};
use crate::pandoc::PandocRunner;
use crate::pdf::PdfEngine;
use crate::pool::LibreOfficePool;
use crate::spreadsheet;
use async_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Main converter for office documents.
///
/// Holds the immutable support matrix and one instance of each backend.
/// Backends that need an external tool find it lazily, so a converter can be
/// built on hosts that only have some of them.
pub struct Converter {
    matrix: Arc<FormatMatrix>,
    /// LibreOffice process pool.
    pool: Arc<LibreOfficePool>,
    pandoc: Arc<PandocRunner>,
    pdf: PdfEngine,
    config: ConverterConfig,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("matrix", &self.matrix)
            .field("pool", &self.pool)
            .field("pandoc", &self.pandoc)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Create a new converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing converter with {} conversions, office pool_size={}, max_workers={}",
            config.matrix.pair_count(),
            config.office.pool_size,
            config.batch.max_workers
        );

        let pool = LibreOfficePool::new(config.office.clone())?;
        let pandoc = PandocRunner::new(config.pandoc.clone())?;
        let pdf = PdfEngine::new(config.pdf.clone());

        Ok(Self {
            matrix: Arc::new(config.matrix.clone()),
            pool: Arc::new(pool),
            pandoc: Arc::new(pandoc),
            pdf,
            config,
        })
    }

    /// Create a converter with default settings.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ConverterConfig::default())
    }

    /// The support matrix.
    pub fn matrix(&self) -> &FormatMatrix {
        &self.matrix
    }

    /// Targets available for a source extension. Unknown sources yield an empty list.
    pub fn supported_conversions(&self, from_extension: &str) -> Vec<DocFormat> {
        self.matrix.targets_for_extension(from_extension)
    }

    /// Convert a single document.
    ///
    /// Unsupported pairs fail before anything touches the filesystem. The
    /// backend writes to a staging file next to the output, which is renamed
    /// into place only on success; on failure the staging file is removed and
    /// any existing file at the output path is left as it was.
    pub async fn convert(&self, job: ConversionJob) -> Result<FileResult> {
        let start = Instant::now();
        let (from, to) = job.resolve()?;
        self.matrix.ensure_supported(from, to)?;

        if !job.input_path.is_file() {
            return Err(ConversionError::InputNotFound(job.input_path.clone()));
        }
        ensure_parent_dir(&job.output_path).await?;
        if points_to_same_file(&job.input_path, &job.output_path) {
            return Err(ConversionError::InvalidConfig(format!(
                "output path must differ from input path: {}",
                job.input_path.display()
            )));
        }

        let route = route(from, to);
        info!(
            "Converting {:?} ({} -> {}) via {}",
            job.input_path,
            from,
            to,
            route.backend_name()
        );

        let staging = staging_path(&job.output_path);
        let outcome = match self
            .run_route(route, &job.input_path, &staging, from, to)
            .await
        {
            Ok(()) => tokio::fs::rename(&staging, &job.output_path)
                .await
                .map_err(|e| ConversionError::OutputDirError {
                    path: job.output_path.clone(),
                    message: e.to_string(),
                }),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            error!("Conversion of {:?} failed: {}", job.input_path, e);
            remove_partial_output(&staging).await;
            return Err(e);
        }

        let duration = start.elapsed();
        debug!("Converted {:?} in {:?}", job.input_path, duration);
        Ok(FileResult {
            input_path: job.input_path,
            output_path: job.output_path,
            from,
            to,
            route,
            duration,
        })
    }

    /// Convert `input` to `output`, with optional explicit formats.
    pub async fn convert_path(
        &self,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        from: Option<DocFormat>,
        to: Option<DocFormat>,
    ) -> Result<FileResult> {
        let job = ConversionJob {
            input_path: input.into(),
            output_path: output.into(),
            from,
            to,
        };
        self.convert(job).await
    }

    async fn run_route(
        &self,
        route: Route,
        input: &Path,
        output: &Path,
        from: DocFormat,
        to: DocFormat,
    ) -> Result<()> {
        match route {
            Route::LibreOffice(filter) => self.pool.convert(input, output, filter).await,
            Route::Pandoc => self.pandoc.convert(input, output, from, to).await,
            Route::Spreadsheet => {
                let (input, output) = (input.to_path_buf(), output.to_path_buf());
                let rows = run_blocking(move || spreadsheet::xlsx_to_csv(&input, &output)).await?;
                debug!("Spreadsheet route wrote {} data rows", rows);
                Ok(())
            }
            Route::PdfText => {
                let pdf = self.pdf.clone();
                let (input, output) = (input.to_path_buf(), output.to_path_buf());
                run_blocking(move || pdf.write_text(&input, &output)).await
            }
        }
    }

    /// Convert every `.from` file under `input_dir` to `to`, using the configured batch settings.
    pub async fn convert_batch(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        from: DocFormat,
        to: DocFormat,
    ) -> Result<BatchResult> {
        self.convert_batch_with(input_dir, output_dir, from, to, &self.config.batch, None)
            .await
    }

    /// Like [`convert_batch`](Self::convert_batch), sending progress events to `progress`.
    pub async fn convert_batch_with_progress(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        from: DocFormat,
        to: DocFormat,
        progress: Sender<ConversionProgress>,
    ) -> Result<BatchResult> {
        self.convert_batch_with(
            input_dir,
            output_dir,
            from,
            to,
            &self.config.batch,
            Some(progress),
        )
        .await
    }

    /// Directory-wide conversion with explicit batch options.
    pub async fn convert_batch_with(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        from: DocFormat,
        to: DocFormat,
        options: &BatchConfig,
        progress: Option<Sender<ConversionProgress>>,
    ) -> Result<BatchResult> {
        options.validate()?;
        self.matrix.ensure_supported(from, to)?;

        let jobs = batch::plan_jobs(input_dir, output_dir, from, to, options.keep_structure)?;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ConversionError::OutputDirError {
                path: output_dir.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(batch::run_jobs(self, jobs, options.max_workers, progress).await)
    }

    /// Convert an explicit list of files into `output_dir`.
    pub async fn convert_files(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        to: DocFormat,
        progress: Option<Sender<ConversionProgress>>,
    ) -> BatchResult {
        let jobs = batch::plan_file_jobs(inputs, output_dir, to);
        batch::run_jobs(self, jobs, self.config.batch.max_workers, progress).await
    }

    /// Run [`convert_files`](Self::convert_files) on a background task.
    ///
    /// Returns the receiving end of the progress channel and a handle to the
    /// final result.
    pub fn spawn_convert_files(
        self: &Arc<Self>,
        inputs: Vec<PathBuf>,
        output_dir: PathBuf,
        to: DocFormat,
    ) -> (Receiver<ConversionProgress>, JoinHandle<BatchResult>) {
        let (tx, rx) = async_channel::unbounded();
        let converter = Arc::clone(self);
        let handle = tokio::spawn(async move {
            converter
                .convert_files(&inputs, &output_dir, to, Some(tx))
                .await
        });
        (rx, handle)
    }

    /// Extract the plain text of a PDF.
    pub async fn extract_text(&self, pdf_path: &Path) -> Result<String> {
        if !pdf_path.is_file() {
            return Err(ConversionError::InputNotFound(pdf_path.to_path_buf()));
        }
        let pdf = self.pdf.clone();
        let path = pdf_path.to_path_buf();
        run_blocking(move || pdf.extract_text(&path)).await
    }

    /// Merge several PDFs into one. Returns the number of pages written.
    pub async fn merge_pdfs(&self, inputs: &[PathBuf], output: &Path) -> Result<usize> {
        if let Some(missing) = inputs.iter().find(|p| !p.is_file()) {
            return Err(ConversionError::InputNotFound(missing.clone()));
        }
        ensure_parent_dir(output).await?;
        let pdf = self.pdf.clone();
        let (inputs, output) = (inputs.to_vec(), output.to_path_buf());
        run_blocking(move || pdf.merge(&inputs, &output)).await
    }

    /// Get pool health information.
    pub async fn health(&self) -> crate::pool::PoolHealth {
        self.pool.health().await
    }

    /// Shutdown the converter and release resources.
    pub fn shutdown(&self) {
        info!("Shutting down converter");
        self.pool.shutdown();
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Get statistics about the available backends.
    pub fn stats(&self) -> ConverterStats {
        ConverterStats {
            office_documents_processed: self.pool.total_processed(),
            office_pool_size: self.pool.pool_size(),
            libreoffice_available: self.pool.is_available(),
            pandoc_available: self.pandoc.is_available(),
            max_workers: self.config.batch.max_workers,
        }
    }
}

async fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConversionError::OutputDirError {
                path: parent.to_path_buf(),
                message: e.to_string(),
            }),
        _ => Ok(()),
    }
}

/// Hidden sibling of `output` the backend writes to before the final rename.
fn staging_path(output: &Path) -> PathBuf {
    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("tmp");
    output.with_file_name(format!(
        ".docmorph-{}.{}",
        Uuid::new_v4().simple(),
        extension
    ))
}

/// Whether `output` names the same file as the existing `input`, after
/// resolving `..`, `.` and symlinks. The parent of `output` must exist.
fn points_to_same_file(input: &Path, output: &Path) -> bool {
    if input == output {
        return true;
    }
    let Ok(input) = std::fs::canonicalize(input) else {
        return false;
    };
    let resolved = match std::fs::canonicalize(output) {
        Ok(path) => path,
        Err(_) => {
            let parent = match output.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            match (std::fs::canonicalize(parent), output.file_name()) {
                (Ok(parent), Some(name)) => parent.join(name),
                _ => return false,
            }
        }
    };
    input == resolved
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}

/// Run an in-process backend off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConversionError::ChannelError(format!("backend task failed: {}", e)))?
}

/// Statistics about the converter.
#[derive(Debug, Clone)]
pub struct ConverterStats {
    /// Documents converted through LibreOffice since creation.
    pub office_documents_processed: usize,
    pub office_pool_size: usize,
    pub libreoffice_available: bool,
    pub pandoc_available: bool,
    pub max_workers: usize,
}

/// Builder for creating a Converter with custom settings.
pub struct ConverterBuilder {
    config: ConverterConfig,
}

impl ConverterBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ConverterConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Set the number of concurrent batch jobs.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.batch.max_workers = workers;
        self
    }

    /// Mirror input directories in batch output.
    pub fn keep_structure(mut self, keep: bool) -> Self {
        self.config.batch.keep_structure = keep;
        self
    }

    /// Set the number of LibreOffice instances.
    pub fn office_pool_size(mut self, size: usize) -> Self {
        self.config.office.pool_size = size;
        self
    }

    /// Set the timeout for subprocess backends.
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.config.office.conversion_timeout = timeout;
        self.config.pandoc.timeout = timeout;
        self
    }

    /// Set the path to soffice binary.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.config.office.soffice_path = Some(path);
        self
    }

    /// Set the path to the pandoc binary.
    pub fn pandoc_path(mut self, path: PathBuf) -> Self {
        self.config.pandoc.pandoc_path = Some(path);
        self
    }

    /// Set the directory holding the pdfium library.
    pub fn pdfium_library_path(mut self, path: PathBuf) -> Self {
        self.config.pdf.library_path = Some(path);
        self
    }

    /// Replace the support matrix.
    pub fn matrix(mut self, matrix: FormatMatrix) -> Self {
        self.config.matrix = matrix;
        self
    }

    /// Build the converter.
    pub fn build(self) -> Result<Converter> {
        Converter::new(self.config)
    }
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
