//! Configuration types for document conversion.

use crate::dispatch::Route;
use crate::error::{ConversionError, Result};
use crate::format::{DocFormat, FormatMatrix};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of concurrent batch jobs.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Configuration for the LibreOffice process pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfficeConfig {
    /// Number of LibreOffice instances in the pool.
    /// Default: number of CPU cores, capped at 4.
    pub pool_size: usize,

    /// Timeout for individual document conversions.
    /// Default: 120 seconds.
    pub conversion_timeout: Duration,

    /// Directory for scratch output.
    /// Default: system temp directory.
    pub temp_dir: Option<PathBuf>,

    /// Path to soffice binary. If None, searches common locations and PATH.
    pub soffice_path: Option<PathBuf>,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            pool_size: num_cpus::get().clamp(1, 4),
            conversion_timeout: Duration::from_secs(120),
            temp_dir: None,
            soffice_path: None,
        }
    }
}

impl OfficeConfig {
    /// Create a config with the given pool size.
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    /// Set the conversion timeout.
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    /// Set the scratch directory.
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    /// Set the soffice binary path.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.soffice_path = Some(path);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(ConversionError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.conversion_timeout.is_zero() {
            return Err(ConversionError::InvalidConfig(
                "conversion_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the pandoc runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PandocConfig {
    /// Path to the pandoc binary. If None, searches PATH.
    pub pandoc_path: Option<PathBuf>,

    /// Timeout for a single pandoc run.
    /// Default: 60 seconds.
    pub timeout: Duration,

    /// Extra arguments appended to every invocation.
    pub extra_args: Vec<String>,
}

impl Default for PandocConfig {
    fn default() -> Self {
        Self {
            pandoc_path: None,
            timeout: Duration::from_secs(60),
            extra_args: Vec::new(),
        }
    }
}

impl PandocConfig {
    /// Set the pandoc binary path.
    pub fn pandoc_path(mut self, path: PathBuf) -> Self {
        self.pandoc_path = Some(path);
        self
    }

    /// Append an extra argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ConversionError::InvalidConfig(
                "pandoc timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the pdfium binding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Directory containing the pdfium shared library.
    pub library_path: Option<PathBuf>,
}

/// Configuration for directory-wide conversions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of files converted concurrently.
    /// Default: 5.
    pub max_workers: usize,

    /// Mirror the input directory tree under the output directory.
    /// Default: false (flatten).
    pub keep_structure: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            keep_structure: false,
        }
    }
}

impl BatchConfig {
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Default::default()
        }
    }

    pub fn keep_structure(mut self, keep: bool) -> Self {
        self.keep_structure = keep;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(ConversionError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Combined configuration for the converter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// LibreOffice pool configuration.
    pub office: OfficeConfig,

    /// pandoc configuration.
    pub pandoc: PandocConfig,

    /// pdfium configuration.
    pub pdf: PdfConfig,

    /// Batch configuration.
    pub batch: BatchConfig,

    /// Supported conversions.
    pub matrix: FormatMatrix,
}

impl ConverterConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|_| ConversionError::InputNotFound(path.to_path_buf()))?;
        serde_json::from_str(&raw).map_err(|e| {
            ConversionError::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        self.office.validate()?;
        self.pandoc.validate()?;
        self.batch.validate()?;
        if self.matrix.pair_count() == 0 {
            return Err(ConversionError::InvalidConfig(
                "format matrix must contain at least one conversion".to_string(),
            ));
        }
        for from in self.matrix.sources() {
            for &to in self.matrix.targets(from) {
                let readable = from.pandoc_reader().is_some() && to.pandoc_writer().is_some();
                if crate::dispatch::route(from, to) == Route::Pandoc && !readable {
                    return Err(ConversionError::InvalidConfig(format!(
                        "no backend can convert {} to {}",
                        from, to
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A single conversion request: one input file, one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    /// Path to the input document.
    pub input_path: PathBuf,

    /// Path of the file to write.
    pub output_path: PathBuf,

    /// Source format. Inferred from the input extension when None.
    pub from: Option<DocFormat>,

    /// Target format. Inferred from the output extension when None.
    pub to: Option<DocFormat>,
}

impl ConversionJob {
    /// Create a job whose formats are inferred from the file extensions.
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            from: None,
            to: None,
        }
    }

    /// Set the source format explicitly.
    pub fn from_format(mut self, format: DocFormat) -> Self {
        self.from = Some(format);
        self
    }

    /// Set the target format explicitly.
    pub fn to_format(mut self, format: DocFormat) -> Self {
        self.to = Some(format);
        self
    }

    /// Resolve explicit or extension-inferred formats.
    pub fn resolve(&self) -> Result<(DocFormat, DocFormat)> {
        let from = match self.from {
            Some(f) => f,
            None => infer(&self.input_path)?,
        };
        let to = match self.to {
            Some(f) => f,
            None => infer(&self.output_path)?,
        };
        Ok((from, to))
    }

    /// Input file name, for progress and summaries.
    pub fn file_name(&self) -> String {
        file_name_of(&self.input_path)
    }
}

fn infer(path: &Path) -> Result<DocFormat> {
    DocFormat::from_path(path).ok_or_else(|| {
        ConversionError::UnknownFormat(
            path.extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        )
    })
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Progress information for a conversion operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// Index of the file in the job list.
    pub file_index: usize,

    /// Total number of files to process.
    pub total_files: usize,

    /// Name of the file.
    pub current_file: String,

    /// Stage reached by this file.
    pub stage: ConversionStage,
}

/// Stage of the conversion process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConversionStage {
    /// Queued, waiting for a worker.
    Queued,
    /// Running in a backend.
    Converting,
    /// Completed successfully.
    Completed,
    /// Failed with error.
    Failed,
}

impl ConversionStage {
    /// Whether no further events follow for this file.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Result of a batch conversion operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    /// Successfully converted files.
    pub successful: Vec<FileResult>,

    /// Failed conversions.
    pub failed: Vec<FailedFile>,

    /// Total processing time.
    pub total_duration: Duration,
}

impl BatchResult {
    pub fn success_count(&self) -> usize {
        self.successful.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Base names of the failed inputs.
    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(FailedFile::file_name).collect()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result for a single successfully converted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// Original input path.
    pub input_path: PathBuf,

    /// Written output path.
    pub output_path: PathBuf,

    /// Source format.
    pub from: DocFormat,

    /// Target format.
    pub to: DocFormat,

    /// Backend that did the work.
    pub route: Route,

    /// Processing time for this file.
    pub duration: Duration,
}

/// Information about a failed conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    /// Original input path.
    pub input_path: PathBuf,

    /// Error message.
    pub error: String,

    /// The format pair was not supported (as opposed to a backend failure).
    pub unsupported: bool,
}

impl FailedFile {
    pub fn new(input_path: PathBuf, error: &ConversionError) -> Self {
        Self {
            input_path,
            error: error.to_string(),
            unsupported: error.is_unsupported(),
        }
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.input_path)
    }
}
