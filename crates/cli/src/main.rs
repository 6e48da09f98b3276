//! docmorph CLI entry point.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use docmorph_core::batch::collect_inputs;
use docmorph_core::{
    BatchConfig, ConversionProgress, Converter, ConverterConfig, DocFormat,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::debug;

mod output;

/// Convert documents between PDF, DOCX, XLSX, CSV, Markdown, HTML and text.
#[derive(Debug, Parser)]
#[command(name = "docmorph", version, about)]
struct Cli {
    /// Input file, or directory with --batch/--merge
    #[arg(default_value = "./input")]
    input: PathBuf,

    /// Output file or directory
    #[arg(default_value = "./output")]
    output: PathBuf,

    /// Source format (inferred from the input extension for single files)
    #[arg(long)]
    from: Option<DocFormat>,

    /// Target format (inferred from the output extension for single files)
    #[arg(long)]
    to: Option<DocFormat>,

    /// Convert every matching file under INPUT
    #[arg(long)]
    batch: bool,

    /// Mirror the input folder structure under OUTPUT
    #[arg(long)]
    keep_structure: bool,

    /// Maximum concurrent conversions in batch mode
    #[arg(long)]
    workers: Option<usize>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print batch results as JSON
    #[arg(long)]
    json: bool,

    /// List supported conversions, optionally for one source extension
    #[arg(long, value_name = "FMT", num_args = 0..=1, default_missing_value = "")]
    list_formats: Option<String>,

    /// Merge all PDFs under INPUT into one file
    #[arg(long, conflicts_with = "batch")]
    merge: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    fn load_config(&self) -> Result<ConverterConfig> {
        let mut config = match &self.config {
            Some(path) => ConverterConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ConverterConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.batch.max_workers = workers;
        }
        if self.keep_structure {
            config.batch.keep_structure = true;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    docmorph_core::init_logging(cli.log_level());

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    let converter = Converter::new(config)?;

    if let Some(filter) = &cli.list_formats {
        output::print_formats(converter.matrix(), filter);
        return Ok(());
    }

    prepare_dir(&cli.input)?;
    prepare_dir(&cli.output)?;

    if cli.merge {
        merge(&converter, &cli).await;
    } else if cli.batch {
        batch(&converter, &cli).await?;
    } else {
        single(&converter, &cli).await;
    }

    converter.shutdown();
    Ok(())
}

/// Create `path` as a directory unless it names a document.
fn prepare_dir(path: &Path) -> Result<()> {
    if path.exists() || DocFormat::from_path(path).is_some() {
        return Ok(());
    }
    debug!("Creating {}", path.display());
    std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))
}

async fn single(converter: &Converter, cli: &Cli) {
    if cli.input.is_dir() {
        output::print_warning(&format!(
            "{} is a directory; pass --batch --from F --to T to convert its contents",
            cli.input.display()
        ));
        return;
    }

    let to = match cli.to.or_else(|| DocFormat::from_path(&cli.output)) {
        Some(to) => to,
        None => {
            output::print_warning("target format unknown; pass --to or an output file name");
            return;
        }
    };
    let output_path = if cli.output.is_dir() {
        let name = cli.input.file_name().unwrap_or(cli.input.as_os_str());
        cli.output.join(name).with_extension(to.extension())
    } else {
        cli.output.clone()
    };

    match converter
        .convert_path(&cli.input, &output_path, cli.from, Some(to))
        .await
    {
        Ok(result) => output::print_success(&format!(
            "{} -> {} ({}, {:.2?})",
            result.input_path.display(),
            result.output_path.display(),
            result.route.backend_name(),
            result.duration
        )),
        Err(e) => output::print_failure(&format!("{}: {}", cli.input.display(), e)),
    }
}

async fn batch(converter: &Converter, cli: &Cli) -> Result<()> {
    let (Some(from), Some(to)) = (cli.from, cli.to) else {
        output::print_warning("--batch needs both --from and --to");
        return Ok(());
    };
    if !converter.matrix().supports(from, to) {
        output::print_failure(&format!("{} -> {} is not supported", from, to));
        return Ok(());
    }

    let options: BatchConfig = converter.config().batch.clone();
    let (tx, rx) = async_channel::unbounded::<ConversionProgress>();
    let pb = if cli.json {
        ProgressBar::hidden()
    } else {
        progress_bar()?
    };

    let watcher = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                pb.set_length(event.total_files as u64);
                pb.set_message(event.current_file);
                if event.stage.is_terminal() {
                    pb.inc(1);
                }
            }
        })
    };

    let outcome = converter
        .convert_batch_with(&cli.input, &cli.output, from, to, &options, Some(tx))
        .await;
    let _ = watcher.await;
    pb.finish_and_clear();

    match outcome {
        Ok(result) if cli.json => output::print_json(&result),
        Ok(result) => output::print_summary(&result),
        Err(e) => output::print_failure(&format!("batch failed: {}", e)),
    }
    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("#>-"),
    );
    Ok(pb)
}

async fn merge(converter: &Converter, cli: &Cli) {
    let inputs = match collect_inputs(&cli.input, DocFormat::Pdf) {
        Ok(inputs) if inputs.is_empty() => {
            output::print_warning(&format!("no PDFs under {}", cli.input.display()));
            return;
        }
        Ok(inputs) => inputs,
        Err(e) => {
            output::print_failure(&e.to_string());
            return;
        }
    };
    let target = if cli.output.is_dir() {
        cli.output.join("merged.pdf")
    } else {
        cli.output.clone()
    };

    match converter.merge_pdfs(&inputs, &target).await {
        Ok(pages) => output::print_success(&format!(
            "merged {} PDFs into {} ({} pages)",
            inputs.len(),
            target.display(),
            pages
        )),
        Err(e) => output::print_failure(&format!("merge failed: {}", e)),
    }
}
