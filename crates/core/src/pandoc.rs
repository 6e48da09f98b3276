//! pandoc runner for markup conversions.

use crate::config::PandocConfig;
use crate::error::{ConversionError, Result};
use crate::format::DocFormat;
use async_process::Command;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error};

/// Runs pandoc as a subprocess.
#[derive(Debug)]
pub struct PandocRunner {
    config: PandocConfig,
    pandoc_path: Option<PathBuf>,
}

impl PandocRunner {
    /// Create a runner. A missing pandoc is reported when a conversion needs it.
    pub fn new(config: PandocConfig) -> Result<Self> {
        config.validate()?;
        let pandoc_path = Self::find_pandoc(&config).ok();
        match pandoc_path {
            Some(ref path) => debug!("Found pandoc at: {:?}", path),
            None => debug!("pandoc not found; markup routes are unavailable"),
        }
        Ok(Self {
            config,
            pandoc_path,
        })
    }

    fn find_pandoc(config: &PandocConfig) -> Result<PathBuf> {
        if let Some(ref path) = config.pandoc_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(ConversionError::PandocNotFound);
        }
        which::which("pandoc").map_err(|_| ConversionError::PandocNotFound)
    }

    /// Whether a pandoc binary is available.
    pub fn is_available(&self) -> bool {
        self.pandoc_path.is_some()
    }

    /// Build the argument list for one conversion.
    pub fn build_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        from: DocFormat,
        to: DocFormat,
    ) -> Result<Vec<OsString>> {
        let reader = from.pandoc_reader().ok_or_else(|| unsupported(from, to))?;
        let writer = to.pandoc_writer().ok_or_else(|| unsupported(from, to))?;

        let mut args: Vec<OsString> = vec![
            "-f".into(),
            reader.into(),
            "-t".into(),
            writer.into(),
        ];
        // HTML fragments are not useful as standalone files.
        if to == DocFormat::Html {
            args.push("--standalone".into());
        }
        args.extend(self.config.extra_args.iter().map(OsString::from));
        args.push("-o".into());
        args.push(output_path.as_os_str().to_owned());
        args.push(input_path.as_os_str().to_owned());
        Ok(args)
    }

    /// Convert `input_path` into `output_path`.
    pub async fn convert(
        &self,
        input_path: &Path,
        output_path: &Path,
        from: DocFormat,
        to: DocFormat,
    ) -> Result<()> {
        let pandoc = self
            .pandoc_path
            .as_deref()
            .ok_or(ConversionError::PandocNotFound)?;
        let args = self.build_args(input_path, output_path, from, to)?;
        let start = Instant::now();

        let mut cmd = Command::new(pandoc);
        cmd.args(&args);
        cmd.kill_on_drop(true);
        debug!("Running pandoc {:?}", args);

        let output = timeout(self.config.timeout, cmd.output())
            .await
            .map_err(|_| ConversionError::Timeout {
                path: input_path.to_path_buf(),
                timeout_secs: self.config.timeout.as_secs(),
            })?
            .map_err(ConversionError::ProcessStartFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("pandoc failed for {:?}: {}", input_path, stderr);
            return Err(ConversionError::ConversionFailed {
                path: input_path.to_path_buf(),
                message: stderr.trim().to_string(),
            });
        }

        if !tokio::fs::try_exists(output_path).await.unwrap_or(false) {
            return Err(ConversionError::ConversionFailed {
                path: input_path.to_path_buf(),
                message: "pandoc exited successfully but wrote no output".to_string(),
            });
        }

        debug!("pandoc converted {:?} in {:?}", input_path, start.elapsed());
        Ok(())
    }
}

fn unsupported(from: DocFormat, to: DocFormat) -> ConversionError {
    ConversionError::UnsupportedConversion {
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> PandocRunner {
        PandocRunner::new(PandocConfig::default().arg("--wrap=none")).unwrap()
    }

    #[test]
    fn test_build_args_markdown_to_docx() {
        let args = runner()
            .build_args(
                Path::new("in/a.md"),
                Path::new("out/a.docx"),
                DocFormat::Markdown,
                DocFormat::Docx,
            )
            .unwrap();
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-f", "markdown", "-t", "docx", "--wrap=none", "-o", "out/a.docx", "in/a.md"]
        );
    }

    #[test]
    fn test_build_args_html_output_is_standalone() {
        let args = runner()
            .build_args(
                Path::new("a.docx"),
                Path::new("a.html"),
                DocFormat::Docx,
                DocFormat::Html,
            )
            .unwrap();
        assert!(args.iter().any(|a| a == "--standalone"));
    }

    #[test]
    fn test_build_args_rejects_pdf() {
        let err = runner()
            .build_args(
                Path::new("a.pdf"),
                Path::new("a.md"),
                DocFormat::Pdf,
                DocFormat::Markdown,
            )
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_build_args_rejects_csv_output() {
        let err = runner()
            .build_args(
                Path::new("a.md"),
                Path::new("a.csv"),
                DocFormat::Markdown,
                DocFormat::Csv,
            )
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_build_args_reads_csv() {
        let args = runner()
            .build_args(
                Path::new("t.csv"),
                Path::new("t.html"),
                DocFormat::Csv,
                DocFormat::Html,
            )
            .unwrap();
        assert_eq!(args[1], "csv");
    }

    #[test]
    fn test_explicit_missing_binary() {
        let config = PandocConfig::default().pandoc_path(PathBuf::from("/nonexistent/pandoc"));
        let runner = PandocRunner::new(config).unwrap();
        assert!(!runner.is_available());
    }

    #[tokio::test]
    async fn test_missing_binary_reported_at_conversion_time() {
        let config = PandocConfig::default().pandoc_path(PathBuf::from("/nonexistent/pandoc"));
        let runner = PandocRunner::new(config).unwrap();
        let err = runner
            .convert(
                Path::new("a.md"),
                Path::new("a.html"),
                DocFormat::Markdown,
                DocFormat::Html,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::PandocNotFound));
    }
}
