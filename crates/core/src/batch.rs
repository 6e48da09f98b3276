//! Directory-wide conversion: enumeration, output planning and bounded fan-out.
//!
//! Each file is an independent job. A failure is recorded in the batch result
//! and never stops the other jobs.

use crate::config::{
    BatchResult, ConversionJob, ConversionProgress, ConversionStage, FailedFile,
};
use crate::converter::Converter;
use crate::error::{ConversionError, Result};
use crate::format::DocFormat;
use async_channel::Sender;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Recursively collect files under `dir` whose extension maps to `from`.
///
/// The result is sorted so that job indices are stable between runs.
pub fn collect_inputs(dir: &Path, from: DocFormat) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConversionError::InputNotFound(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", dir, e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| DocFormat::from_path(path) == Some(from))
        .collect();

    files.sort();
    debug!("Found {} .{} files under {:?}", files.len(), from, dir);
    Ok(files)
}

/// Compute where the converted form of `input` goes.
///
/// With `keep_structure` the path relative to `input_dir` is mirrored under
/// `output_dir`; otherwise only the base name is kept.
pub fn plan_output_path(
    input_dir: &Path,
    input: &Path,
    output_dir: &Path,
    to: DocFormat,
    keep_structure: bool,
) -> PathBuf {
    let relative = if keep_structure {
        input.strip_prefix(input_dir).unwrap_or(input)
    } else {
        Path::new(input.file_name().unwrap_or(input.as_os_str()))
    };
    output_dir.join(relative).with_extension(to.extension())
}

/// Plan one job per matching file under `input_dir`.
pub fn plan_jobs(
    input_dir: &Path,
    output_dir: &Path,
    from: DocFormat,
    to: DocFormat,
    keep_structure: bool,
) -> Result<Vec<ConversionJob>> {
    let jobs = collect_inputs(input_dir, from)?
        .into_iter()
        .map(|input| {
            let output = plan_output_path(input_dir, &input, output_dir, to, keep_structure);
            ConversionJob::new(input, output)
                .from_format(from)
                .to_format(to)
        })
        .collect();
    Ok(disambiguate_outputs(jobs))
}

/// Plan jobs for an explicit list of files, each converted into `output_dir`.
///
/// The source format of each file comes from its extension.
pub fn plan_file_jobs(inputs: &[PathBuf], output_dir: &Path, to: DocFormat) -> Vec<ConversionJob> {
    let jobs: Vec<ConversionJob> = inputs
        .iter()
        .map(|input| {
            let name = input.file_name().unwrap_or(input.as_os_str());
            let output = output_dir.join(name).with_extension(to.extension());
            ConversionJob::new(input.clone(), output).to_format(to)
        })
        .collect();
    disambiguate_outputs(jobs)
}

/// Give every job its own output path.
///
/// Flattening (`a/x.md`, `b/x.md`) or extension aliases (`x.md`, `x.markdown`)
/// can map several inputs to one output. Later jobs get a numbered stem
/// (`x_2.html`) that no other job plans to write.
fn disambiguate_outputs(mut jobs: Vec<ConversionJob>) -> Vec<ConversionJob> {
    let planned: HashSet<PathBuf> = jobs.iter().map(|j| j.output_path.clone()).collect();
    let mut taken: HashSet<PathBuf> = HashSet::with_capacity(jobs.len());

    for job in &mut jobs {
        if taken.insert(job.output_path.clone()) {
            continue;
        }
        let stem = job
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = job
            .output_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        let renamed = (2usize..)
            .map(|n| {
                job.output_path
                    .with_file_name(format!("{}_{}.{}", stem, n, extension))
            })
            .find(|candidate| !planned.contains(candidate) && !taken.contains(candidate))
            .unwrap_or_else(|| job.output_path.clone());

        warn!(
            "{:?} would overwrite {:?}; writing {:?} instead",
            job.input_path, job.output_path, renamed
        );
        taken.insert(renamed.clone());
        job.output_path = renamed;
    }
    jobs
}

fn report(progress: Option<&Sender<ConversionProgress>>, event: ConversionProgress) {
    if let Some(tx) = progress {
        // A dropped receiver only means nobody is watching.
        let _ = tx.try_send(event);
    }
}

/// Run `jobs` with at most `max_workers` in flight.
///
/// Progress events for one file index are sent in stage order by a single
/// task: `Queued`, `Converting`, then `Completed` or `Failed`.
pub async fn run_jobs(
    converter: &Converter,
    jobs: Vec<ConversionJob>,
    max_workers: usize,
    progress: Option<Sender<ConversionProgress>>,
) -> BatchResult {
    let start = Instant::now();
    let total_files = jobs.len();
    let max_workers = max_workers.max(1);

    if total_files == 0 {
        warn!("No files to convert");
        return BatchResult::default();
    }

    info!(
        "Converting {} files with {} workers",
        total_files, max_workers
    );

    for (file_index, job) in jobs.iter().enumerate() {
        report(
            progress.as_ref(),
            ConversionProgress {
                file_index,
                total_files,
                current_file: job.file_name(),
                stage: ConversionStage::Queued,
            },
        );
    }

    let progress = progress.as_ref();
    let outcomes: Vec<_> = stream::iter(jobs.into_iter().enumerate())
        .map(|(file_index, job)| async move {
            let current_file = job.file_name();
            report(
                progress,
                ConversionProgress {
                    file_index,
                    total_files,
                    current_file: current_file.clone(),
                    stage: ConversionStage::Converting,
                },
            );

            let input_path = job.input_path.clone();
            let outcome = converter.convert(job).await;

            let stage = if outcome.is_ok() {
                ConversionStage::Completed
            } else {
                ConversionStage::Failed
            };
            report(
                progress,
                ConversionProgress {
                    file_index,
                    total_files,
                    current_file,
                    stage,
                },
            );
            (input_path, outcome)
        })
        .buffer_unordered(max_workers)
        .collect()
        .await;

    let mut result = BatchResult::default();
    for (input_path, outcome) in outcomes {
        match outcome {
            Ok(file_result) => result.successful.push(file_result),
            Err(e) => {
                warn!("Skipped {:?}: {}", input_path, e);
                result.failed.push(FailedFile::new(input_path, &e));
            }
        }
    }
    result.successful.sort_by(|a, b| a.input_path.cmp(&b.input_path));
    result.failed.sort_by(|a, b| a.input_path.cmp(&b.input_path));
    result.total_duration = start.elapsed();

    info!(
        "Batch finished: {} converted, {} failed in {:?}",
        result.success_count(),
        result.failure_count(),
        result.total_duration
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_collect_inputs_recursive_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.md"));
        touch(&root.join("nested/deeper/b.markdown"));
        touch(&root.join("nested/c.MD"));
        touch(&root.join("nested/skip.html"));
        touch(&root.join("notes.txt"));

        let files = collect_inputs(root, DocFormat::Markdown).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.md"),
                PathBuf::from("nested/c.MD"),
                PathBuf::from("nested/deeper/b.markdown"),
            ]
        );
    }

    #[test]
    fn test_collect_inputs_missing_dir() {
        let err = collect_inputs(Path::new("/definitely/not/here"), DocFormat::Pdf).unwrap_err();
        assert!(matches!(err, ConversionError::InputNotFound(_)));
    }

    #[test]
    fn test_plan_output_path_keep_structure() {
        let out = plan_output_path(
            Path::new("/in"),
            Path::new("/in/2024/q1/report.docx"),
            Path::new("/out"),
            DocFormat::Pdf,
            true,
        );
        assert_eq!(out, PathBuf::from("/out/2024/q1/report.pdf"));
    }

    #[test]
    fn test_plan_output_path_flatten() {
        let out = plan_output_path(
            Path::new("/in"),
            Path::new("/in/2024/q1/report.docx"),
            Path::new("/out"),
            DocFormat::Markdown,
            false,
        );
        assert_eq!(out, PathBuf::from("/out/report.md"));
    }

    #[test]
    fn test_plan_jobs_sets_explicit_formats() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("x/sheet.xlsx"));
        let jobs = plan_jobs(
            dir.path(),
            Path::new("/out"),
            DocFormat::Xlsx,
            DocFormat::Csv,
            true,
        )
        .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].from, Some(DocFormat::Xlsx));
        assert_eq!(jobs[0].to, Some(DocFormat::Csv));
        assert_eq!(jobs[0].output_path, PathBuf::from("/out/x/sheet.csv"));
    }

    #[test]
    fn test_plan_jobs_flatten_gives_duplicate_basenames_distinct_outputs() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.xlsx"));
        touch(&dir.path().join("nested/a.xlsx"));
        touch(&dir.path().join("nested/a_2.xlsx"));
        let jobs = plan_jobs(
            dir.path(),
            Path::new("/out"),
            DocFormat::Xlsx,
            DocFormat::Csv,
            false,
        )
        .unwrap();

        let outputs: Vec<_> = jobs.iter().map(|j| j.output_path.clone()).collect();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("/out/a.csv"),
                PathBuf::from("/out/a_3.csv"),
                PathBuf::from("/out/a_2.csv"),
            ]
        );
    }

    #[test]
    fn test_plan_jobs_keep_structure_separates_extension_aliases() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("docs/x.markdown"));
        touch(&dir.path().join("docs/x.md"));
        let jobs = plan_jobs(
            dir.path(),
            Path::new("/out"),
            DocFormat::Markdown,
            DocFormat::Html,
            true,
        )
        .unwrap();
        assert_eq!(jobs[0].output_path, PathBuf::from("/out/docs/x.html"));
        assert_eq!(jobs[1].output_path, PathBuf::from("/out/docs/x_2.html"));
    }

    #[test]
    fn test_plan_file_jobs_infers_source() {
        let jobs = plan_file_jobs(
            &[PathBuf::from("/a/one.md"), PathBuf::from("/b/two.html")],
            Path::new("/out"),
            DocFormat::Docx,
        );
        assert_eq!(jobs[0].from, None);
        assert_eq!(jobs[0].output_path, PathBuf::from("/out/one.docx"));
        assert_eq!(jobs[1].output_path, PathBuf::from("/out/two.docx"));
        assert_eq!(jobs[1].resolve().unwrap().0, DocFormat::Html);
    }
}
