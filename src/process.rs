//! Pipeline coordinator
//!
//! Drives one run through scan, provision and relocate:
//! - Eager: scan the whole tree, then provision every date folder and
//!   relocate every record in one pass
//! - Streaming: relocate in batches of `batch_size` while the tree is still
//!   being scanned, so only one batch of records is held at a time
//!
//! All per-run state lives in a [`RunContext`] owned by the [`Processor`] and
//! is cleared when the run ends, however it ends.

use crate::config::{Config, ScanStrategy};
use crate::error::Result;
use crate::provision::FolderProvisioner;
use crate::relocate::{RelocationResult, RelocationStatus, WorkerPool};
use crate::scan::{FileRecord, Scanner};
use crate::time::{DateKey, ExifReader, MetadataReader};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{Level, debug, info, span, trace};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Scanning,
    Provisioning,
    Relocating,
}

impl Phase {
    /// Check whether moving from `self` to `next` is legal
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Scanning)
                | (Scanning, Provisioning)
                | (Scanning, Idle)
                | (Provisioning, Relocating)
                | (Relocating, Scanning)
                | (Relocating, Idle)
        )
    }
}

/// Outcome of one run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Regular files examined by the scanner
    pub scanned: usize,
    /// Files that resolved to a capture date
    pub classified: usize,
    pub relocated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Date folders created (folders that already existed are not counted)
    pub folders_created: usize,
    /// Date folders that could not be created
    pub folder_failures: usize,
    /// Entries the scanner could not read
    pub scan_errors: usize,
    /// Provision/relocate passes performed
    pub batches: usize,
    /// Most records held in memory at once
    pub peak_pending: usize,
    /// Wall-clock time of the run
    pub elapsed: Duration,
    /// Every record that failed to relocate
    pub failures: Vec<RelocationResult>,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "Scanned: {}, Classified: {}, Relocated: {}, Skipped: {}, Failed: {}, Folders created: {}, Folder failures: {}, Scan errors: {}, Elapsed: {:.2?}",
            self.scanned,
            self.classified,
            self.relocated,
            self.skipped,
            self.failed,
            self.folders_created,
            self.folder_failures,
            self.scan_errors,
            self.elapsed
        )
    }

    fn record(&mut self, result: RelocationResult) {
        match result.status {
            RelocationStatus::Relocated => self.relocated += 1,
            RelocationStatus::Skipped => self.skipped += 1,
            RelocationStatus::Failed => {
                self.failed += 1;
                self.failures.push(result);
            }
        }
    }
}

/// State of the run in progress
#[derive(Debug, Default)]
struct RunContext {
    phase: Phase,
    /// Date folders needed by the buffered records
    folders: BTreeSet<DateKey>,
    /// Classified records waiting for relocation
    records: Vec<FileRecord>,
    output_ready: bool,
    report: RunReport,
}

impl RunContext {
    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        trace!(from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
    }

    fn push(&mut self, record: FileRecord) {
        self.folders.insert(record.date_key.clone());
        self.records.push(record);
        self.report.classified += 1;
        self.report.peak_pending = self.report.peak_pending.max(self.records.len());
    }

    /// Provision the folders of the buffered records, then relocate them.
    /// The buffers are released afterwards and `capacity` slots reserved for
    /// the next batch.
    fn flush(
        &mut self,
        pool: &WorkerPool,
        provisioner: &FolderProvisioner,
        capacity: usize,
    ) -> Result<()> {
        if self.records.is_empty() {
            return Ok(());
        }

        self.advance(Phase::Provisioning);
        if !self.output_ready {
            provisioner.ensure_output_root()?;
            self.output_ready = true;
        }
        let provisioned = provisioner.provision(&self.folders);
        self.report.folders_created += provisioned.created;
        self.report.folder_failures += provisioned.failed;
        self.folders.clear();

        self.advance(Phase::Relocating);
        let batch = std::mem::replace(&mut self.records, Vec::with_capacity(capacity));
        let size = batch.len();
        for result in pool.relocate(batch) {
            self.report.record(result);
        }
        self.report.batches += 1;

        info!(
            batch = self.report.batches,
            size,
            relocated = self.report.relocated,
            failed = self.report.failed,
            "Batch done"
        );
        Ok(())
    }

    /// Back to idle with empty buffers
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Runs the pipeline for one configuration
pub struct Processor {
    config: Config,
    reader: Box<dyn MetadataReader>,
    context: RunContext,
}

impl Processor {
    /// Create a processor that dates files from their EXIF metadata
    pub fn new(config: Config) -> Self {
        let reader = ExifReader::from_config(&config);
        Self::with_reader(config, reader)
    }

    /// Create a processor with a custom metadata reader
    pub fn with_reader<R>(config: Config, reader: R) -> Self
    where
        R: MetadataReader + 'static,
    {
        Self {
            config,
            reader: Box::new(reader),
            context: RunContext::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current phase; `Idle` whenever no run is in progress
    pub fn phase(&self) -> Phase {
        self.context.phase
    }

    /// Check that no records or folders are left over from a run
    pub fn is_clear(&self) -> bool {
        self.context.phase == Phase::Idle
            && self.context.records.is_empty()
            && self.context.folders.is_empty()
    }

    /// Run the pipeline once
    ///
    /// Configuration errors and a failure to create the output folder end
    /// the run with an error. Everything else is counted in the report. The
    /// processor can be run again afterwards.
    pub fn run(&mut self) -> Result<RunReport> {
        let _span = span!(Level::INFO, "processor_run", root = ?self.config.root).entered();

        let started = Instant::now();
        let mut result = self.run_inner();
        self.context.reset();

        if let Ok(report) = &mut result {
            report.elapsed = started.elapsed();
            info!("{}", report.summary());
        }
        result
    }

    fn run_inner(&mut self) -> Result<RunReport> {
        self.config.validate()?;

        let pool = WorkerPool::new(&self.config)?;
        let provisioner = FolderProvisioner::new(self.config.output_root());
        let (batch_limit, capacity) = match self.config.strategy {
            ScanStrategy::Eager => (usize::MAX, 0),
            ScanStrategy::Streaming => (self.config.batch_size, self.config.batch_size),
        };

        info!(
            strategy = ?self.config.strategy,
            mode = ?self.config.concurrency,
            workers = pool.workers(),
            "Scanning {}",
            self.config.root.display()
        );

        let scanner = Scanner::new(&self.config, self.reader.as_ref());
        let context = &mut self.context;
        context.records.reserve(capacity);
        context.advance(Phase::Scanning);

        let mut scan = scanner.scan();
        for record in scan.by_ref() {
            context.push(record);
            if context.records.len() >= batch_limit {
                context.flush(&pool, &provisioner, capacity)?;
                context.advance(Phase::Scanning);
            }
        }

        context.report.scanned = scan.files_seen();
        context.report.scan_errors = scan.errors();
        debug!(
            scanned = context.report.scanned,
            classified = context.report.classified,
            "Scan finished"
        );

        context.flush(&pool, &provisioner, 0)?;
        context.advance(Phase::Idle);

        Ok(std::mem::take(&mut context.report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConcurrencyMode;
    use crate::error::Error;
    use crate::time::NameDateReader;
    use crate::time::exif::jpeg_with_exif;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_dated(root: &Path, count: usize) {
        for i in 0..count {
            let day = i % 3 + 1;
            fs::write(root.join(format!("2024030{day}_{i:03}.jpg")), b"data").unwrap();
        }
    }

    #[test]
    fn test_phase_transitions() {
        use Phase::*;
        assert!(Idle.can_advance_to(Scanning));
        assert!(Scanning.can_advance_to(Provisioning));
        assert!(Provisioning.can_advance_to(Relocating));
        assert!(Relocating.can_advance_to(Scanning));
        assert!(Relocating.can_advance_to(Idle));
        assert!(Scanning.can_advance_to(Idle));

        assert!(!Idle.can_advance_to(Relocating));
        assert!(!Provisioning.can_advance_to(Scanning));
        assert!(!Scanning.can_advance_to(Relocating));
    }

    #[test]
    fn test_report_summary() {
        let report = RunReport {
            scanned: 10,
            classified: 8,
            relocated: 6,
            skipped: 1,
            failed: 1,
            folder_failures: 2,
            elapsed: Duration::from_millis(1500),
            ..Default::default()
        };
        let summary = report.summary();
        assert!(summary.contains("Scanned: 10"));
        assert!(summary.contains("Relocated: 6"));
        assert!(summary.contains("Failed: 1"));
        assert!(summary.contains("Folder failures: 2"));
        assert!(summary.contains("Elapsed: 1.50s"));
    }

    #[test]
    fn test_exif_file_relocated_other_file_untouched() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.jpg"), jpeg_with_exif(Some("2024:03:05 10:00:00"), None)).unwrap();
        fs::write(root.join("b.txt"), b"notes").unwrap();

        let mut processor = Processor::new(Config::for_root(root));
        let report = processor.run().unwrap();

        assert!(root.join("generated/20240305/a.jpg").is_file());
        assert!(!root.join("a.jpg").exists());
        assert!(root.join("b.txt").is_file());
        assert_eq!(report.scanned, 2);
        assert_eq!(report.classified, 1);
        assert_eq!(report.relocated, 1);
        assert_eq!(report.folders_created, 1);
        assert!(report.elapsed > Duration::ZERO);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_processor_is_reusable() {
        let dir = tempdir().unwrap();
        write_dated(dir.path(), 5);

        let mut processor = Processor::with_reader(Config::for_root(dir.path()), NameDateReader);
        let first = processor.run().unwrap();
        assert_eq!(first.relocated, 5);
        assert_eq!(processor.phase(), Phase::Idle);
        assert!(processor.is_clear());

        // Relocated files live in the output folder, which is never rescanned
        let second = processor.run().unwrap();
        assert_eq!(second.scanned, 0);
        assert_eq!(second.relocated, 0);
        assert!(processor.is_clear());
    }

    #[test]
    fn test_nothing_classified_creates_no_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), b"hello").unwrap();

        let mut processor = Processor::with_reader(Config::for_root(dir.path()), NameDateReader);
        let report = processor.run().unwrap();

        assert_eq!(report.scanned, 1);
        assert_eq!(report.batches, 0);
        assert!(!dir.path().join("generated").exists());
    }

    #[test]
    fn test_output_root_failure_is_fatal() {
        let dir = tempdir().unwrap();
        write_dated(dir.path(), 3);
        fs::write(dir.path().join("generated"), b"in the way").unwrap();

        let mut processor = Processor::with_reader(Config::for_root(dir.path()), NameDateReader);
        let err = processor.run().unwrap_err();
        assert!(matches!(err, Error::OutputRoot { .. }));
        assert!(processor.is_clear());

        // Sources are untouched and a later run succeeds
        fs::remove_file(dir.path().join("generated")).unwrap();
        assert_eq!(processor.run().unwrap().relocated, 3);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut processor =
            Processor::with_reader(Config::for_root("/no/such/picgroup/root"), NameDateReader);
        assert!(matches!(processor.run(), Err(Error::Config(_))));
        assert_eq!(processor.phase(), Phase::Idle);
    }

    #[test]
    fn test_streaming_bounds_pending_records() {
        let dir = tempdir().unwrap();
        write_dated(dir.path(), 25);

        let mut config = Config::for_root(dir.path());
        config.strategy = ScanStrategy::Streaming;
        config.batch_size = 10;
        let mut processor = Processor::with_reader(config, NameDateReader);
        let report = processor.run().unwrap();

        assert_eq!(report.relocated, 25);
        assert_eq!(report.batches, 3);
        assert_eq!(report.peak_pending, 10);
        // Three distinct days; later batches find their folders already there
        assert_eq!(report.folders_created, 3);
    }

    #[test]
    fn test_eager_holds_everything() {
        let dir = tempdir().unwrap();
        write_dated(dir.path(), 25);

        let mut config = Config::for_root(dir.path());
        config.strategy = ScanStrategy::Eager;
        config.batch_size = 10;
        config.concurrency = ConcurrencyMode::Parallel;
        config.workers = 4;
        let mut processor = Processor::with_reader(config, NameDateReader);
        let report = processor.run().unwrap();

        assert_eq!(report.relocated, 25);
        assert_eq!(report.batches, 1);
        assert_eq!(report.peak_pending, 25);
    }

    #[test]
    fn test_failures_are_reported() {
        let dir = tempdir().unwrap();
        write_dated(dir.path(), 4);
        // A directory where a file should go makes that record fail
        fs::create_dir_all(dir.path().join("generated/20240301/20240301_000.jpg")).unwrap();

        let mut config = Config::for_root(dir.path());
        config.on_conflict = crate::config::ConflictPolicy::Overwrite;
        let mut processor = Processor::with_reader(config, NameDateReader);
        let report = processor.run().unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.relocated, 3);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].source.ends_with("20240301_000.jpg"));
        assert!(dir.path().join("20240301_000.jpg").exists());
    }
}
