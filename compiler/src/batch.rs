// batch.rs — Multi-file batch parser
//
// Expands file/directory inputs into a sorted file list, parses and
// classifies every file in parallel, and merges the per-file results in
// sorted-path order.
//
// Preconditions: the engine's directive registry carries the enabled schemas.
// Postconditions: the merged data is identical for any worker count or
//   completion order; every unit is registered with the engine before its
//   diagnostics are delivered.
// Failure modes: a missing input, a failed directory walk, or an unreadable
//   file aborts the whole batch with `BatchError`.
// Side effects: reads the filesystem; delivers diagnostics to the engine.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::classify::{classify, FileOutput};
use crate::data::HookData;
use crate::engine::DiagnosticEngine;
use crate::id::{FileId, IdAllocator};
use crate::source::SourceUnit;

/// Extension of files picked up from directory inputs.
pub const SOURCE_EXTENSION: &str = "x";

/// Display name of the unit read from standard input.
pub const STDIN_NAME: &str = "<stdin>";

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("File '{}' does not exist.", .0.display())]
    Missing(PathBuf),
    #[error("cannot enumerate '{}': {source}", path.display())]
    Enumerate {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── File list ────────────────────────────────────────────────────────────

/// Expand `inputs` into the sorted, de-duplicated list of files to parse.
///
/// Files are taken as given; directories are walked recursively and filtered
/// to `SOURCE_EXTENSION`.
pub fn compute_files<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if !input.exists() {
            return Err(BatchError::Missing(input.to_path_buf()));
        }
        if !input.is_dir() {
            files.push(input.to_path_buf());
            continue;
        }
        for entry in WalkDir::new(input).follow_links(true) {
            let entry = entry.map_err(|source| BatchError::Enumerate {
                path: input.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
            {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

// ── Parsing ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Enabled directive schemas.
    pub schemas: Vec<String>,
    /// Worker threads; `None` uses the global pool.
    pub jobs: Option<usize>,
}

/// One file's parse and classification result, tagged with its position in
/// the sorted file list.
#[derive(Debug)]
pub struct ParsedFile {
    pub index: usize,
    pub unit: Arc<SourceUnit>,
    pub output: FileOutput,
}

/// The merged result of a batch.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub data: HookData,
    pub units: Vec<Arc<SourceUnit>>,
    /// True if any file produced an error diagnostic.
    pub failed: bool,
}

pub struct BatchParser {
    engine: Arc<DiagnosticEngine>,
    jobs: Option<usize>,
}

impl BatchParser {
    pub fn new(engine: Arc<DiagnosticEngine>, jobs: Option<usize>) -> Self {
        Self { engine, jobs }
    }

    /// Parse every file in `files` (already sorted) and merge the results.
    pub fn parse_files(&self, files: &[PathBuf]) -> Result<BatchOutput, BatchError> {
        let span = tracing::debug_span!("batch", files = files.len());
        let _enter = span.enter();
        let start = Instant::now();

        let work = with_ids(files);
        let parsed = self.run(|| {
            work.par_iter()
                .map(|(id, path)| {
                    let text =
                        std::fs::read_to_string(path).map_err(|source| BatchError::Read {
                            path: path.to_path_buf(),
                            source,
                        })?;
                    Ok(self.parse_one(*id, path.display().to_string(), text))
                })
                .collect::<Result<Vec<_>, BatchError>>()
        })?;

        let output = self.merge(files.len(), parsed);
        tracing::debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            failed = output.failed,
            "batch parsed"
        );
        Ok(output)
    }

    /// Parse in-memory sources, in the order given.
    pub fn parse_sources(&self, sources: Vec<(String, String)>) -> BatchOutput {
        let count = sources.len();
        let work = with_ids(sources);
        let parsed = self.run(|| {
            work.into_par_iter()
                .map(|(id, (name, text))| self.parse_one(id, name, text))
                .collect::<Vec<_>>()
        });
        self.merge(count, parsed)
    }

    /// Parse the whole of `reader` as one unit named `STDIN_NAME`.
    pub fn parse_reader(&self, mut reader: impl Read) -> Result<BatchOutput, BatchError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|source| BatchError::Read {
                path: PathBuf::from(STDIN_NAME),
                source,
            })?;
        Ok(self.parse_sources(vec![(STDIN_NAME.to_string(), text)]))
    }

    fn parse_one(&self, id: FileId, name: String, text: String) -> ParsedFile {
        let start = Instant::now();
        let unit = SourceUnit::parse(id, name, text);
        let output = classify(&unit, self.engine.directives());
        tracing::debug!(
            file = %unit.name,
            elapsed_us = start.elapsed().as_micros() as u64,
            "parsed file"
        );
        ParsedFile {
            index: id.0 as usize,
            unit: Arc::new(unit),
            output,
        }
    }

    /// Run `work` on a dedicated pool when a worker count was requested.
    fn run<T: Send>(&self, work: impl FnOnce() -> T + Send) -> T {
        let Some(jobs) = self.jobs else {
            return work();
        };
        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(work),
            Err(e) => {
                tracing::warn!("failed to create thread pool ({e}), using the global pool");
                work()
            }
        }
    }

    /// Register units and forward diagnostics in sorted-path order, then
    /// concatenate the per-file data.
    fn merge(&self, count: usize, parsed: Vec<ParsedFile>) -> BatchOutput {
        let ordered = assemble(count, parsed);
        let mut output = BatchOutput::default();
        let mut parts = Vec::with_capacity(ordered.len());
        for file in ordered {
            self.engine.register(&file.unit);
            self.engine.diagnose_all(file.output.diagnostics);
            output.failed |= file.output.failed;
            output.units.push(file.unit);
            parts.push(file.output.data);
        }
        output.data = HookData::merge(parts);
        output
    }
}

/// Pair each item with a file ID allocated in list order.
fn with_ids<T>(items: impl IntoIterator<Item = T>) -> Vec<(FileId, T)> {
    let mut ids = IdAllocator::new();
    items.into_iter().map(|item| (ids.alloc_file(), item)).collect()
}

/// Place results into a positionally indexed buffer, independent of the
/// order they arrive in. Slots that never received a result are skipped.
pub fn assemble(count: usize, parsed: impl IntoIterator<Item = ParsedFile>) -> Vec<ParsedFile> {
    let mut slots: Vec<Option<ParsedFile>> = (0..count).map(|_| None).collect();
    for file in parsed {
        let index = file.index;
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(file);
        }
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::CollectingConsumer;
    use crate::directive::DirectiveRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn temp_dir() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("snarec_batch_{}_{}", std::process::id(), n));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn engine() -> Arc<DiagnosticEngine> {
        Arc::new(DiagnosticEngine::new(Arc::new(DirectiveRegistry::default())))
    }

    fn hook(name: &str) -> String {
        format!("class {name}: ClassHook<NSObject> {{\n    func description() -> String {{ orig {{ }} }}\n}}\n")
    }

    #[test]
    fn compute_files_walks_and_sorts() {
        let dir = temp_dir();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("c.x"), "").unwrap();
        std::fs::write(dir.join("nested/a.x"), "").unwrap();
        std::fs::write(dir.join("b.x"), "").unwrap();
        std::fs::write(dir.join("notes.txt"), "").unwrap();

        let files = compute_files(&[&dir]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(&dir).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["b.x", "c.x", "nested/a.x"]);
    }

    #[test]
    fn compute_files_keeps_explicit_files_and_dedups() {
        let dir = temp_dir();
        let file = dir.join("hooks.txt");
        std::fs::write(&file, "").unwrap();
        let files = compute_files(&[file.clone(), file.clone()]).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn missing_input_aborts() {
        let dir = temp_dir();
        let missing = dir.join("absent.x");
        let err = compute_files(&[&missing]).unwrap_err();
        assert!(matches!(err, BatchError::Missing(_)));
        assert_eq!(
            err.to_string(),
            format!("File '{}' does not exist.", missing.display())
        );
    }

    #[test]
    fn parse_files_merges_in_sorted_order() {
        let dir = temp_dir();
        for name in ["c", "a", "b"] {
            std::fs::write(dir.join(format!("{name}.x")), hook(name)).unwrap();
        }
        let files = compute_files(&[&dir]).unwrap();
        let parser = BatchParser::new(engine(), Some(3));
        let output = parser.parse_files(&files).unwrap();
        let names: Vec<&str> = output
            .data
            .class_hooks
            .iter()
            .map(|h| h.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(output.units.len(), 3);
        assert!(!output.failed);
    }

    #[test]
    fn unreadable_file_aborts() {
        let dir = temp_dir();
        let parser = BatchParser::new(engine(), None);
        let err = parser.parse_files(&[dir.join("gone.x")]).unwrap_err();
        assert!(matches!(err, BatchError::Read { .. }));
    }

    #[test]
    fn diagnostics_are_forwarded_in_file_order() {
        let engine = engine();
        let (collector, log) = CollectingConsumer::new();
        engine.add_consumer(Box::new(collector));
        let parser = BatchParser::new(Arc::clone(&engine), Some(2));
        let output = parser.parse_sources(vec![
            ("one.x".to_string(), "private class A: Tweak {}".to_string()),
            ("two.x".to_string(), "class B: ClassHook<X>, Tweak {}".to_string()),
        ]);
        assert!(output.failed);
        let files: Vec<String> = log
            .diagnostics()
            .iter()
            .map(|d| d.location.file.to_string())
            .collect();
        assert_eq!(files, vec!["one.x", "two.x"]);
        assert_eq!(engine.error_count(), 2);
    }

    #[test]
    fn reader_input_is_named_stdin() {
        let parser = BatchParser::new(engine(), None);
        let output = parser.parse_reader(hook("S").as_bytes()).unwrap();
        assert_eq!(&*output.units[0].name, STDIN_NAME);
        assert_eq!(output.data.class_hooks.len(), 1);
    }

    #[test]
    fn assemble_ignores_arrival_order() {
        let parser = BatchParser::new(engine(), None);
        let mut parsed: Vec<ParsedFile> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, name)| parser.parse_one(FileId(i as u32), format!("{name}.x"), hook(name)))
            .collect();
        parsed.reverse();
        let ordered = assemble(3, parsed);
        let indices: Vec<usize> = ordered.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
