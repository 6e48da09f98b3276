//! LibreOffice process pool for parallel office conversions.
//!
//! Each instance runs headless with its own user profile so that several
//! `soffice` processes can work at the same time. A semaphore bounds the number
//! of concurrent conversions to the pool size.

use crate::config::OfficeConfig;
use crate::dispatch::OfficeFilter;
use crate::error::{ConversionError, Result};
use async_process::Command;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info};
use uuid::Uuid;

/// A single LibreOffice instance in the pool.
struct OfficeInstance {
    /// Instance ID for logging.
    id: usize,
    /// Unique user profile directory (required for parallel execution).
    profile_dir: TempDir,
    /// Number of documents processed by this instance.
    docs_processed: AtomicU32,
    /// Whether this instance is currently processing.
    is_busy: AtomicBool,
}

impl std::fmt::Debug for OfficeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfficeInstance")
            .field("id", &self.id)
            .field("profile_dir", &self.profile_dir.path())
            .field("docs_processed", &self.docs_processed.load(Ordering::SeqCst))
            .field("is_busy", &self.is_busy.load(Ordering::SeqCst))
            .finish()
    }
}

impl OfficeInstance {
    fn new(id: usize, temp_root: Option<&Path>) -> Result<Self> {
        let prefix = format!("docmorph-lo-profile-{}-", id);
        let profile_dir = match temp_root {
            Some(root) => TempDir::with_prefix_in(&prefix, root),
            None => TempDir::with_prefix(&prefix),
        }
        .map_err(ConversionError::ProcessStartFailed)?;

        debug!(
            "Created LibreOffice instance {} with profile at {:?}",
            id,
            profile_dir.path()
        );

        Ok(Self {
            id,
            profile_dir,
            docs_processed: AtomicU32::new(0),
            is_busy: AtomicBool::new(false),
        })
    }

    fn profile_path(&self) -> &Path {
        self.profile_dir.path()
    }

    fn increment_docs(&self) -> u32 {
        self.docs_processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn docs_processed(&self) -> u32 {
        self.docs_processed.load(Ordering::SeqCst)
    }

    fn set_busy(&self, busy: bool) {
        self.is_busy.store(busy, Ordering::SeqCst);
    }
}

/// Pool of LibreOffice instances.
#[derive(Debug)]
pub struct LibreOfficePool {
    config: OfficeConfig,
    /// Path to soffice binary, if one was found.
    soffice_path: Option<PathBuf>,
    instances: Vec<Arc<Mutex<OfficeInstance>>>,
    semaphore: Arc<Semaphore>,
    is_shutdown: AtomicBool,
    /// Scratch directory; LibreOffice only lets us choose an output directory.
    scratch_dir: TempDir,
    total_processed: AtomicUsize,
}

impl LibreOfficePool {
    /// Create a pool. A missing `soffice` is not an error here; conversions
    /// report `LibreOfficeNotFound` when they need it.
    pub fn new(config: OfficeConfig) -> Result<Self> {
        config.validate()?;

        let soffice_path = match Self::find_soffice(&config) {
            Ok(path) => {
                info!("Found LibreOffice at: {:?}", path);
                Some(path)
            }
            Err(_) => {
                debug!("LibreOffice not found; office routes are unavailable");
                None
            }
        };

        let temp_root = config.temp_dir.as_deref();
        let mut instances = Vec::with_capacity(config.pool_size);
        for i in 0..config.pool_size {
            instances.push(Arc::new(Mutex::new(OfficeInstance::new(i, temp_root)?)));
        }

        let scratch_dir = match temp_root {
            Some(root) => TempDir::with_prefix_in("docmorph-lo-out-", root),
            None => TempDir::with_prefix("docmorph-lo-out-"),
        }
        .map_err(ConversionError::ProcessStartFailed)?;

        let pool_size = config.pool_size;
        Ok(Self {
            config,
            soffice_path,
            instances,
            semaphore: Arc::new(Semaphore::new(pool_size)),
            is_shutdown: AtomicBool::new(false),
            scratch_dir,
            total_processed: AtomicUsize::new(0),
        })
    }

    /// Find the soffice binary.
    fn find_soffice(config: &OfficeConfig) -> Result<PathBuf> {
        if let Some(ref path) = config.soffice_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(ConversionError::LibreOfficeNotFound);
        }

        let candidates = [
            // macOS
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
            // Linux
            "/usr/bin/soffice",
            "/usr/lib/libreoffice/program/soffice",
            "/opt/libreoffice/program/soffice",
            // Snap (Ubuntu)
            "/snap/bin/libreoffice.soffice",
        ];

        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        which::which("soffice")
            .or_else(|_| which::which("libreoffice"))
            .map_err(|_| ConversionError::LibreOfficeNotFound)
    }

    /// Whether an soffice binary is available.
    pub fn is_available(&self) -> bool {
        self.soffice_path.is_some()
    }

    /// Convert `input_path` with the given filter and place the result at `output_path`.
    pub async fn convert(
        &self,
        input_path: &Path,
        output_path: &Path,
        filter: OfficeFilter,
    ) -> Result<()> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(ConversionError::PoolShutdown);
        }
        let soffice = self
            .soffice_path
            .as_deref()
            .ok_or(ConversionError::LibreOfficeNotFound)?;

        if !input_path.exists() {
            return Err(ConversionError::InputNotFound(input_path.to_path_buf()));
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ConversionError::PoolShutdown)?;

        let instance = self.get_available_instance().await?;
        let result = self
            .run_conversion(soffice, &instance, input_path, output_path, filter)
            .await;

        instance.lock().await.set_busy(false);

        result
    }

    async fn get_available_instance(&self) -> Result<Arc<Mutex<OfficeInstance>>> {
        for instance in &self.instances {
            let inst = instance.lock().await;
            if !inst.is_busy.load(Ordering::SeqCst) {
                inst.set_busy(true);
                drop(inst);
                return Ok(Arc::clone(instance));
            }
        }

        // The semaphore keeps us from getting here.
        Err(ConversionError::ChannelError(format!(
            "no idle LibreOffice instance among {}",
            self.config.pool_size
        )))
    }

    async fn run_conversion(
        &self,
        soffice: &Path,
        instance: &Arc<Mutex<OfficeInstance>>,
        input_path: &Path,
        output_path: &Path,
        filter: OfficeFilter,
    ) -> Result<()> {
        let start = Instant::now();

        let (instance_id, profile_path) = {
            let inst = instance.lock().await;
            (inst.id, inst.profile_path().to_path_buf())
        };

        let work_dir = self.scratch_dir.path().join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| ConversionError::OutputDirError {
                path: work_dir.clone(),
                message: e.to_string(),
            })?;

        let mut cmd = Command::new(soffice);
        cmd.args([
            "--headless",
            "--invisible",
            "--nologo",
            "--nofirststartwizard",
            "--norestore",
        ]);
        cmd.arg(format!(
            "-env:UserInstallation=file://{}",
            profile_path.display()
        ));
        if let Some(import) = filter.import_filter() {
            cmd.arg(format!("--infilter={}", import));
        }
        cmd.args(["--convert-to", filter.export_filter(), "--outdir"]);
        cmd.arg(&work_dir);
        cmd.arg(input_path);
        cmd.kill_on_drop(true);

        debug!(
            "Instance {} converting {:?} with {}",
            instance_id,
            input_path.file_name(),
            filter.export_filter()
        );

        let result = self
            .execute(cmd, input_path, &work_dir, output_path, filter)
            .await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            debug!("Could not remove scratch dir {:?}: {}", work_dir, e);
        }

        if result.is_ok() {
            instance.lock().await.increment_docs();
            self.total_processed.fetch_add(1, Ordering::SeqCst);
            debug!(
                "Instance {} converted {:?} in {:?}",
                instance_id,
                input_path.file_name(),
                start.elapsed()
            );
        }
        result
    }

    async fn execute(
        &self,
        mut cmd: Command,
        input_path: &Path,
        work_dir: &Path,
        output_path: &Path,
        filter: OfficeFilter,
    ) -> Result<()> {
        let output = timeout(self.config.conversion_timeout, cmd.output())
            .await
            .map_err(|_| ConversionError::Timeout {
                path: input_path.to_path_buf(),
                timeout_secs: self.config.conversion_timeout.as_secs(),
            })?
            .map_err(ConversionError::ProcessStartFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "LibreOffice conversion failed for {:?}: {}",
                input_path, stderr
            );
            return Err(ConversionError::ConversionFailed {
                path: input_path.to_path_buf(),
                message: stderr.trim().to_string(),
            });
        }

        let produced = find_output(work_dir, input_path, filter.output_extension())
            .await
            .ok_or_else(|| ConversionError::ConversionFailed {
                path: input_path.to_path_buf(),
                message: format!(
                    "LibreOffice produced no .{} file",
                    filter.output_extension()
                ),
            })?;

        move_file(&produced, output_path).await
    }

    /// Number of instances.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Get pool health information.
    pub async fn health(&self) -> PoolHealth {
        let mut instances = Vec::with_capacity(self.instances.len());
        for instance in &self.instances {
            let inst = instance.lock().await;
            instances.push(InstanceHealth {
                id: inst.id,
                docs_processed: inst.docs_processed(),
                is_busy: inst.is_busy.load(Ordering::SeqCst),
            });
        }

        PoolHealth {
            pool_size: self.config.pool_size,
            available: self.is_available(),
            total_processed: self.total_processed.load(Ordering::SeqCst),
            is_shutdown: self.is_shutdown.load(Ordering::SeqCst),
            instances,
        }
    }

    /// Shutdown the pool. Profile and scratch directories go away on drop.
    pub fn shutdown(&self) {
        info!("Shutting down LibreOffice pool");
        self.is_shutdown.store(true, Ordering::SeqCst);
        self.semaphore.close();
    }

    /// Total number of documents converted.
    pub fn total_processed(&self) -> usize {
        self.total_processed.load(Ordering::SeqCst)
    }
}

/// Locate the file LibreOffice wrote into `work_dir`.
async fn find_output(work_dir: &Path, input_path: &Path, ext: &str) -> Option<PathBuf> {
    let stem = input_path.file_stem().and_then(|s| s.to_str())?;
    let expected = work_dir.join(format!("{}.{}", stem, ext));
    if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
        return Some(expected);
    }

    // LibreOffice sometimes normalises the file name.
    let mut entries = tokio::fs::read_dir(work_dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().map(|e| e == ext).unwrap_or(false) {
            return Some(path);
        }
    }
    None
}

/// Move a file, falling back to copy + remove across filesystems. Overwrites `to`.
pub(crate) async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| ConversionError::OutputDirError {
            path: to.to_path_buf(),
            message: e.to_string(),
        })?;
    let _ = tokio::fs::remove_file(from).await;
    Ok(())
}

/// Health information for the pool.
#[derive(Debug, Clone)]
pub struct PoolHealth {
    pub pool_size: usize,
    /// Whether an soffice binary was found.
    pub available: bool,
    pub total_processed: usize,
    pub is_shutdown: bool,
    pub instances: Vec<InstanceHealth>,
}

/// Health information for a single instance.
#[derive(Debug, Clone)]
pub struct InstanceHealth {
    pub id: usize,
    pub docs_processed: u32,
    pub is_busy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_creation() {
        let instance = OfficeInstance::new(0, None).unwrap();
        assert_eq!(instance.id, 0);
        assert_eq!(instance.docs_processed(), 0);
        assert!(!instance.is_busy.load(Ordering::SeqCst));
        assert!(instance.profile_path().exists());
    }

    #[test]
    fn test_instance_profile_path_is_unique() {
        let a = OfficeInstance::new(0, None).unwrap();
        let b = OfficeInstance::new(1, None).unwrap();
        assert_ne!(a.profile_path(), b.profile_path());
    }

    #[test]
    fn test_instance_in_custom_temp_root() {
        let root = tempfile::tempdir().unwrap();
        let instance = OfficeInstance::new(3, Some(root.path())).unwrap();
        assert!(instance.profile_path().starts_with(root.path()));
    }

    #[test]
    fn test_instance_increment_docs() {
        let instance = OfficeInstance::new(0, None).unwrap();
        assert_eq!(instance.increment_docs(), 1);
        assert_eq!(instance.increment_docs(), 2);
        assert_eq!(instance.docs_processed(), 2);
    }

    #[test]
    fn test_pool_rejects_zero_size() {
        let result = LibreOfficePool::new(OfficeConfig::with_pool_size(0));
        assert!(matches!(result, Err(ConversionError::InvalidConfig(_))));
    }

    #[test]
    fn test_find_soffice_with_explicit_nonexistent_path() {
        let config = OfficeConfig::default().soffice_path(PathBuf::from("/nonexistent/soffice"));
        let result = LibreOfficePool::find_soffice(&config);
        assert!(matches!(result, Err(ConversionError::LibreOfficeNotFound)));
    }

    #[test]
    fn test_find_soffice_with_explicit_valid_path() {
        let current_exe = std::env::current_exe().unwrap();
        let config = OfficeConfig::default().soffice_path(current_exe.clone());
        assert_eq!(LibreOfficePool::find_soffice(&config).unwrap(), current_exe);
    }

    #[tokio::test]
    async fn test_missing_soffice_reported_at_conversion_time() {
        let config =
            OfficeConfig::with_pool_size(1).soffice_path(PathBuf::from("/nonexistent/soffice"));
        let pool = LibreOfficePool::new(config).unwrap();
        assert!(!pool.is_available());

        let err = pool
            .convert(
                Path::new("in.docx"),
                Path::new("out.pdf"),
                OfficeFilter::WriterPdf,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::LibreOfficeNotFound));
    }

    #[tokio::test]
    async fn test_shutdown_pool_rejects_work() {
        let pool = LibreOfficePool::new(OfficeConfig::with_pool_size(1)).unwrap();
        pool.shutdown();
        let err = pool
            .convert(
                Path::new("in.docx"),
                Path::new("out.pdf"),
                OfficeFilter::WriterPdf,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::PoolShutdown));

        let health = pool.health().await;
        assert!(health.is_shutdown);
        assert_eq!(health.instances.len(), 1);
    }

    #[tokio::test]
    async fn test_find_output_prefers_stem_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("other.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"y").unwrap();
        let found = find_output(dir.path(), Path::new("/in/report.docx"), "pdf")
            .await
            .unwrap();
        assert_eq!(found, dir.path().join("report.pdf"));
    }

    #[tokio::test]
    async fn test_find_output_none_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_output(dir.path(), Path::new("a.docx"), "pdf").await.is_none());
    }

    #[tokio::test]
    async fn test_move_file_overwrites_target() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.tmp");
        let to = dir.path().join("b.pdf");
        std::fs::write(&from, b"new").unwrap();
        std::fs::write(&to, b"old").unwrap();
        move_file(&from, &to).await.unwrap();
        assert_eq!(std::fs::read(&to).unwrap(), b"new");
        assert!(!from.exists());
    }
}
