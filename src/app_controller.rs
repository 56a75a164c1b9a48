use anyhow::{anyhow, Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::content_at::{remove_tokens, replace_tokens, TextReplayer, TokenKind, TokenStream};
use crate::errors::{ReplayError, TransferError};
use crate::file_utils::FileManager;
use crate::operations::{
    apply_operations, CommitRange, ExtractedFile, ForeignDocument, ForeignTransfer,
    OperationsForFile, OperationsForRepository, OperationsStore, ReviewNote, SnapshotPair,
    SubtitleOperationExtractor,
};
use crate::report::{BatchReport, FileOutcome, Location, LogSink, ReportRecord, ReportSink, Severity};
use crate::subtitle::{bind_subtitles, PersistentIdGenerator, StidInventory, SubtitleSidecar};

// @module: Application controller for subtitle operation batches

/// Access to the two snapshots of a primary repository.
///
/// The git layer lives behind this trait; the CLI ships a directory pair
/// implementation.
pub trait SnapshotSource: Send + Sync {
    /// Repository name written into operations files
    fn repository(&self) -> String;

    /// Commit pair the snapshots belong to
    fn commits(&self) -> CommitRange;

    /// Documents that differ between the two snapshots, in a stable order
    fn changed_files(&self) -> Result<Vec<String>>;

    /// Both versions of a document and its subtitles at the from commit
    fn load_pair(&self, file: &str) -> Result<SnapshotPair>;

    /// Store the subtitles of a document at the to commit
    fn store_subtitles(&self, file: &str, sidecar: &SubtitleSidecar) -> Result<()>;
}

/// Two checked-out snapshot directories with sidecars next to each document
#[derive(Debug, Clone)]
pub struct DirectorySnapshots {
    // @field: Repository name
    repository: String,
    // @field: Snapshot at the from commit
    from_dir: PathBuf,
    // @field: Snapshot at the to commit
    to_dir: PathBuf,
    commits: CommitRange,
}

impl DirectorySnapshots {
    pub fn new(
        repository: impl Into<String>,
        from_dir: impl Into<PathBuf>,
        to_dir: impl Into<PathBuf>,
        commits: CommitRange,
    ) -> Self {
        Self {
            repository: repository.into(),
            from_dir: from_dir.into(),
            to_dir: to_dir.into(),
            commits,
        }
    }
}

impl SnapshotSource for DirectorySnapshots {
    fn repository(&self) -> String {
        self.repository.clone()
    }

    fn commits(&self) -> CommitRange {
        self.commits.clone()
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        for file in FileManager::find_content_at_files(&self.to_dir)? {
            let from_path = self.from_dir.join(&file);
            if !FileManager::file_exists(&from_path) {
                debug!("Skipping {}: not present at the from commit", file);
                continue;
            }
            let from = FileManager::read_to_string(&from_path)?;
            let to = FileManager::read_to_string(self.to_dir.join(&file))?;
            if from != to {
                changed.push(file);
            }
        }
        Ok(changed)
    }

    fn load_pair(&self, file: &str) -> Result<SnapshotPair> {
        let from_path = self.from_dir.join(file);
        Ok(SnapshotPair {
            file_path: file.to_string(),
            from_content: FileManager::read_to_string(&from_path)?,
            to_content: FileManager::read_to_string(self.to_dir.join(file))?,
            from_subtitles: FileManager::read_sidecar(&from_path)?.subtitles,
        })
    }

    fn store_subtitles(&self, file: &str, sidecar: &SubtitleSidecar) -> Result<()> {
        FileManager::write_sidecar(self.to_dir.join(file), sidecar)
    }
}

/// Result of an extraction run
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    /// Operations of every successfully processed document, numbered
    pub operations: OperationsForRepository,
    /// Operations file written, if there was anything to write
    pub saved_to: Option<PathBuf>,
    pub report: BatchReport,
}

/// Main application controller for subtitle operation batches
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Receives per-file messages
    sink: Arc<dyn ReportSink>,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        Ok(Self {
            config,
            sink: Arc::new(LogSink),
        })
    }

    /// Replace the report sink
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn operations_store(&self) -> OperationsStore {
        OperationsStore::new(&self.config.operations_dir)
    }

    /// Extract subtitle operations for every changed document of `source`.
    ///
    /// Documents are processed concurrently; operation ids are assigned in
    /// document order once all of them are done, continuing the newest
    /// operations file. New subtitles get persistent ids from one inventory
    /// batch, and the to-side sidecars are written.
    pub async fn extract_operations(&self, source: Arc<dyn SnapshotSource>) -> Result<ExtractionRun> {
        let start_time = std::time::Instant::now();
        let commits = source.commits();
        let files = source
            .changed_files()
            .context("Failed to list changed documents")?;
        info!(
            "Extracting subtitle operations from {} documents ({} -> {})",
            files.len(),
            short_commit(&commits.from_git_commit),
            short_commit(&commits.to_git_commit)
        );

        let progress = self.progress_bar(files.len() as u64, "documents");
        let extractor = SubtitleOperationExtractor::from_config(&self.config.extraction);
        let results: Vec<(String, Result<ExtractedFile>)> = stream::iter(files)
            .map(|file| {
                let source = Arc::clone(&source);
                let extractor = extractor.clone();
                let commits = commits.clone();
                let task_file = file.clone();
                async move {
                    let result = tokio::task::spawn_blocking(move || -> Result<ExtractedFile> {
                        let pair = source.load_pair(&task_file)?;
                        Ok(extractor.extract(&pair, &commits, 1)?)
                    })
                    .await
                    .map_err(|e| anyhow!("Extraction task failed: {}", e))
                    .and_then(|result| result);
                    (file, result)
                }
            })
            .buffered(self.config.concurrent_files.max(1))
            .inspect(|(file, _)| {
                progress.set_message(file.clone());
                progress.inc(1);
            })
            .collect()
            .await;
        progress.finish_and_clear();

        let mut report = BatchReport::new();
        let mut extracted = Vec::new();
        for (file, result) in results {
            match result {
                Ok(file_result) => extracted.push(file_result),
                Err(e) => {
                    self.sink.record(ReportRecord::new(
                        Location::file(&file),
                        format!("{:#}", e),
                        Severity::Error,
                    ));
                    report.push(file, FileOutcome::Failed(format!("{:#}", e)));
                }
            }
        }

        self.resolve_placeholders(&mut extracted)?;

        let store = self.operations_store();
        let first_operation_id = store.next_operation_id()?;
        let file_operations: Vec<OperationsForFile> = extracted
            .iter()
            .filter(|file| !file.operations.is_empty())
            .map(|file| file.operations.clone())
            .collect();
        let operations = OperationsForRepository::new(
            source.repository(),
            &commits,
            first_operation_id,
            file_operations,
        );

        // Operations are saved before any sidecar is stamped with the to commit
        let saved_to = if operations.files.is_empty() {
            info!("No subtitle operations found");
            None
        } else {
            Some(store.save(&operations)?)
        };

        for file in &extracted {
            let path = file.operations.file_path.as_str();
            let sidecar = SubtitleSidecar::new(
                Some(commits.to_git_commit.clone()),
                file.to_subtitles.clone(),
            );
            if let Err(e) = source
                .store_subtitles(path, &sidecar)
                .with_context(|| format!("Failed to store subtitles of {}", path))
            {
                self.sink.record(ReportRecord::new(
                    Location::file(path),
                    format!("{:#}", e),
                    Severity::Error,
                ));
                report.push(path, FileOutcome::Failed(format!("{:#}", e)));
                continue;
            }
            let count = operations.file(path).map_or(0, |f| f.operations.len());
            self.sink.record(ReportRecord::new(
                Location::file(path),
                format!("{} operations", count),
                Severity::Info,
            ));
            report.push(path, FileOutcome::Succeeded { operations: count });
        }

        info!(
            "Extraction finished in {:.1}s: {}",
            start_time.elapsed().as_secs_f64(),
            report.summary()
        );
        Ok(ExtractionRun {
            operations,
            saved_to,
            report,
        })
    }

    /// Draw persistent ids for the placeholders of all files in one inventory batch
    fn resolve_placeholders(&self, extracted: &mut [ExtractedFile]) -> Result<()> {
        let total: usize = extracted.iter().map(|f| f.placeholder_ids().len()).sum();
        if total == 0 {
            return Ok(());
        }
        let inventory = StidInventory::open(&self.config.inventory.path)?;
        let generator = PersistentIdGenerator::from_config(&self.config.inventory)?;
        let fresh = generator.generate(&inventory, total)?;
        debug!("Drew {} persistent ids for new subtitles", fresh.len());

        let mut rest = fresh.as_slice();
        for file in extracted.iter_mut() {
            let (ids, tail) = rest.split_at(file.placeholder_ids().len());
            file.resolve_placeholders(ids)?;
            rest = tail;
        }
        Ok(())
    }

    /// Replay stored operations onto the foreign documents below `foreign_dir`.
    ///
    /// `primary` provides the primary documents at the from commit. Foreign
    /// documents are rewritten in place together with their sidecars.
    pub async fn transfer_operations(
        &self,
        operations: &OperationsForRepository,
        primary: Arc<dyn SnapshotSource>,
        foreign_dir: &Path,
    ) -> Result<BatchReport> {
        info!(
            "Transferring {} operations to foreign documents in {:?}",
            operations.operations_count(),
            foreign_dir
        );
        let progress = self.progress_bar(operations.files.len() as u64, "documents");
        let transfer = ForeignTransfer::from_config(&self.config.transfer);

        let results: Vec<(String, Result<Option<Vec<ReviewNote>>>)> =
            stream::iter(operations.files.clone())
                .map(|file_operations| {
                    let primary = Arc::clone(&primary);
                    let transfer = transfer.clone();
                    let foreign_path = foreign_dir.join(&file_operations.file_path);
                    let file = file_operations.file_path.clone();
                    async move {
                        let result = tokio::task::spawn_blocking(move || {
                            transfer_file(&*primary, &transfer, &file_operations, &foreign_path)
                        })
                        .await
                        .map_err(|e| anyhow!("Transfer task failed: {}", e))
                        .and_then(|result| result);
                        (file, result)
                    }
                })
                .buffered(self.config.concurrent_files.max(1))
                .inspect(|_| progress.inc(1))
                .collect()
                .await;
        progress.finish_and_clear();

        let mut report = BatchReport::new();
        for (file, result) in results {
            let count = operations.file(&file).map_or(0, |f| f.operations.len());
            match result {
                Ok(None) => {
                    self.sink.record(ReportRecord::new(
                        Location::file(&file),
                        "no foreign document",
                        Severity::Info,
                    ));
                }
                Ok(Some(notes)) if notes.is_empty() => {
                    report.push(file, FileOutcome::Succeeded { operations: count });
                }
                Ok(Some(notes)) => {
                    for note in &notes {
                        let location = Location::file(&file)
                            .with_operation(note.operation_id)
                            .with_stid(&note.persistent_id);
                        self.sink
                            .record(ReportRecord::new(location, &note.message, Severity::Warning));
                    }
                    let reason = format!("{} subtitles changed wording", notes.len());
                    report.push(
                        file,
                        FileOutcome::SucceededWithReview {
                            operations: count,
                            reason,
                        },
                    );
                }
                Err(e) if is_review_item(&e) => {
                    self.sink.record(ReportRecord::new(
                        Location::file(&file),
                        e.to_string(),
                        Severity::Warning,
                    ));
                    report.push(file, FileOutcome::NeedsReview(e.to_string()));
                }
                Err(e) => {
                    self.sink.record(ReportRecord::new(
                        Location::file(&file),
                        format!("{:#}", e),
                        Severity::Error,
                    ));
                    report.push(file, FileOutcome::Failed(format!("{:#}", e)));
                }
            }
        }

        info!("Transfer finished: {}", report.summary());
        Ok(report)
    }

    /// Draw `count` fresh persistent ids and record them in the inventory
    pub fn generate_stids(&self, count: usize) -> Result<Vec<String>> {
        let inventory = StidInventory::open(&self.config.inventory.path)?;
        let generator = PersistentIdGenerator::from_config(&self.config.inventory)?;
        Ok(generator.generate(&inventory, count)?)
    }

    /// Carry the `kinds` tokens of `tokens_from` over to the edited text of `text_from`
    pub fn replay_document(
        &self,
        tokens_from: &Path,
        text_from: &Path,
        kinds: &[TokenKind],
        output: &Path,
    ) -> Result<()> {
        let old = TokenStream::parse(&FileManager::read_to_string(tokens_from)?)?;
        let new = TokenStream::parse(&FileManager::read_to_string(text_from)?)?;
        let replayed = TextReplayer::from_config(&self.config.replay)
            .with_kinds(kinds)
            .replay(&old, &new)?;
        FileManager::write_to_file(output, &replayed.to_content_at())?;
        info!("Replayed {} onto {:?}", kinds_label(kinds), output);
        Ok(())
    }

    /// Replace the `kinds` tokens of `target` with those of the text-equivalent `source`
    pub fn replace_document_tokens(
        &self,
        source: &Path,
        target: &Path,
        kinds: &[TokenKind],
        output: &Path,
    ) -> Result<()> {
        let source_stream = TokenStream::parse(&FileManager::read_to_string(source)?)?;
        let target_stream = TokenStream::parse(&FileManager::read_to_string(target)?)?;
        let replaced = replace_tokens(&source_stream, &target_stream, kinds)
            .with_context(|| format!("{:?} and {:?} are not text-equivalent", source, target))?;
        FileManager::write_to_file(output, &replaced.to_content_at())?;
        info!("Replaced {} in {:?}", kinds_label(kinds), output);
        Ok(())
    }

    /// Remove the `kinds` tokens from a document
    pub fn strip_document(&self, input: &Path, kinds: &[TokenKind], output: &Path) -> Result<()> {
        let stripped = remove_tokens(&FileManager::read_to_string(input)?, kinds)?;
        FileManager::write_to_file(output, &stripped)?;
        info!("Removed {} from {:?}", kinds_label(kinds), output);
        Ok(())
    }

    fn progress_bar(&self, len: u64, unit: &str) -> ProgressBar {
        let progress_bar = ProgressBar::new(len);
        let template = format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}}",
            unit
        );
        let style = ProgressStyle::default_bar()
            .template(&template)
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("=> "));
        progress_bar
    }
}

// @returns: Review notes, or None when there is no foreign document
fn transfer_file(
    primary: &dyn SnapshotSource,
    transfer: &ForeignTransfer,
    operations: &OperationsForFile,
    foreign_path: &Path,
) -> Result<Option<Vec<ReviewNote>>> {
    if !FileManager::file_exists(foreign_path) {
        return Ok(None);
    }
    let pair = primary.load_pair(&operations.file_path)?;
    let from_stream = TokenStream::parse(&pair.from_content)?;
    let from_subtitles = bind_subtitles(&from_stream, &pair.from_subtitles)?;
    let mut to_subtitles = from_subtitles.clone();
    apply_operations(&mut to_subtitles, &operations.operations)?;

    let document = ForeignDocument {
        file_path: operations.file_path.clone(),
        content: FileManager::read_to_string(foreign_path)?,
        sidecar: FileManager::read_sidecar(foreign_path)?,
    };
    let result = transfer.transfer(&document, &from_subtitles, &to_subtitles, operations)?;
    FileManager::write_to_file(foreign_path, &result.content)?;
    FileManager::write_sidecar(foreign_path, &result.sidecar)?;
    if !result.review_notes.is_empty() {
        warn!(
            "{}: {} subtitles need a wording review",
            operations.file_path,
            result.review_notes.len()
        );
    }
    Ok(Some(result.review_notes))
}

// Ambiguity goes to the review queue, everything else is a failure
fn is_review_item(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<TransferError>()
        .is_some_and(|e| e.needs_review())
        || error.downcast_ref::<ReplayError>().is_some()
}

fn short_commit(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}

fn kinds_label(kinds: &[TokenKind]) -> String {
    kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
}
