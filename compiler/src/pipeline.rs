// pipeline.rs — Session state and end-to-end orchestration
//
// Wires the shared services (directive registry, diagnostic engine) into one
// session and runs batch parse → generate → finalize for a set of inputs.
//
// Preconditions: consumers are attached to the session's engine before `run`.
// Postconditions: the engine is finalized exactly once per `run`; unused
//   directives are reported only when generation succeeded.
// Failure modes: I/O failures (`PipelineError::Batch`); any error-level
//   diagnostic (`PipelineError::Failed`), in which case no glue is produced.
// Side effects: reads inputs; delivers diagnostics to the engine's consumers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::batch::{compute_files, BatchError, BatchOutput, BatchParser, ParseOptions};
use crate::codegen::{generate, GeneratorOptions};
use crate::data::HookData;
use crate::diag::has_errors;
use crate::directive::DirectiveRegistry;
use crate::engine::DiagnosticEngine;
use crate::source::SourceUnit;

/// Input path that stands for standard input.
pub const STDIN_SENTINEL: &str = "-";

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible builds and cache-key use.
///
/// `source_hash`: SHA-256 over every (name, content) pair in sorted order.
/// `options_fingerprint`: SHA-256 of the canonical JSON of the generator
/// options and enabled schemas.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub options_fingerprint: [u8; 32],
    pub file_count: usize,
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the options fingerprint (64 characters).
    pub fn options_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.options_fingerprint)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        let value = serde_json::json!({
            "source_hash": self.source_hash_hex(),
            "options_fingerprint": self.options_fingerprint_hex(),
            "file_count": self.file_count,
            "compiler_version": self.compiler_version,
        });
        format!("{:#}\n", value)
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Compute provenance from the parsed units and the options that shape output.
pub fn compute_provenance(
    units: &[Arc<SourceUnit>],
    schemas: &[String],
    options: &GeneratorOptions,
) -> Provenance {
    use sha2::{Digest, Sha256};

    let source_hash = {
        let mut hasher = Sha256::new();
        for unit in units {
            hasher.update(unit.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(unit.text.as_bytes());
            hasher.update([0u8]);
        }
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    let options_fingerprint = {
        let mut schemas = schemas.to_vec();
        schemas.sort();
        schemas.dedup();
        let canonical = serde_json::json!({
            "backend": options.backend,
            "extra_backend_modules": options.extra_backend_modules,
            "emit_source_locations": options.emit_source_locations,
            "schemas": schemas,
        })
        .to_string();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    Provenance {
        source_hash,
        options_fingerprint,
        file_count: units.len(),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    /// The specific diagnostics went to the engine's consumers.
    #[error("{0} error(s) reported, no output generated")]
    Failed(usize),
}

// ── Session ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub parse: ParseOptions,
    pub generator: GeneratorOptions,
}

/// Everything a successful run produced.
#[derive(Debug)]
pub struct Artifacts {
    pub data: HookData,
    pub glue: String,
    pub provenance: Provenance,
}

/// The shared services of one invocation.
pub struct Session {
    pub engine: Arc<DiagnosticEngine>,
    options: PipelineOptions,
}

impl Session {
    pub fn new(options: PipelineOptions) -> Self {
        let registry = Arc::new(DirectiveRegistry::new(options.parse.schemas.iter().cloned()));
        Self {
            engine: Arc::new(DiagnosticEngine::new(registry)),
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Parse `inputs`, generate glue, and finalize diagnostics.
    ///
    /// A single `-` input reads one unit from standard input.
    pub fn run(&self, inputs: &[PathBuf]) -> Result<Artifacts, PipelineError> {
        let result = match inputs {
            [only] if only.as_os_str() == STDIN_SENTINEL => {
                self.parse_reader(std::io::stdin().lock())
                    .and_then(|batch| self.generate(batch))
            }
            _ => self.run_files(inputs),
        };
        self.finish(result)
    }

    /// Like `run`, over in-memory `(name, text)` sources in the given order.
    pub fn run_sources(&self, sources: Vec<(String, String)>) -> Result<Artifacts, PipelineError> {
        let batch = self.parser().parse_sources(sources);
        let result = self.generate(batch);
        self.finish(result)
    }

    /// Finalize diagnostics; unused directives are only reported once
    /// generation has had the chance to consume them.
    fn finish(&self, result: Result<Artifacts, PipelineError>) -> Result<Artifacts, PipelineError> {
        if result.is_ok() {
            self.engine.finalize();
        } else {
            self.engine.finalize_without_unused();
        }
        result
    }

    fn parser(&self) -> BatchParser {
        BatchParser::new(Arc::clone(&self.engine), self.options.parse.jobs)
    }

    fn parse_reader(&self, reader: impl std::io::Read) -> Result<BatchOutput, PipelineError> {
        Ok(self.parser().parse_reader(reader)?)
    }

    fn run_files(&self, inputs: &[PathBuf]) -> Result<Artifacts, PipelineError> {
        let files = compute_files(inputs)?;
        tracing::info!(files = files.len(), "parsing");
        let batch = self.parser().parse_files(&files)?;
        self.generate(batch)
    }

    fn generate(&self, batch: BatchOutput) -> Result<Artifacts, PipelineError> {
        if batch.failed || self.engine.has_errors() {
            return Err(PipelineError::Failed(self.engine.error_count()));
        }

        let start = Instant::now();
        let result = generate(&batch.data, &self.options.generator);
        let failed = has_errors(&result.diagnostics);
        self.engine.diagnose_all(result.diagnostics);
        let glue = match result.output {
            Some(glue) if !failed => glue,
            _ => return Err(PipelineError::Failed(self.engine.error_count())),
        };
        tracing::debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            bytes = glue.len(),
            "generation complete"
        );

        let provenance = compute_provenance(
            &batch.units,
            &self.options.parse.schemas,
            &self.options.generator,
        );
        Ok(Artifacts {
            data: batch.data,
            glue,
            provenance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::CollectingConsumer;

    fn sources(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn provenance_is_stable_and_sensitive() {
        let session = Session::new(PipelineOptions::default());
        let a = session
            .run_sources(sources(&[("a.x", "class A: Tweak {}")]))
            .unwrap()
            .provenance;
        let again = Session::new(PipelineOptions::default())
            .run_sources(sources(&[("a.x", "class A: Tweak {}")]))
            .unwrap()
            .provenance;
        assert_eq!(a, again);
        assert_eq!(a.source_hash_hex().len(), 64);
        assert_eq!(a.file_count, 1);

        let changed = Session::new(PipelineOptions::default())
            .run_sources(sources(&[("a.x", "class B: Tweak {}")]))
            .unwrap()
            .provenance;
        assert_ne!(a.source_hash, changed.source_hash);
        assert_eq!(a.options_fingerprint, changed.options_fingerprint);

        let mut options = PipelineOptions::default();
        options.generator.emit_source_locations = false;
        let quiet = Session::new(options)
            .run_sources(sources(&[("a.x", "class A: Tweak {}")]))
            .unwrap()
            .provenance;
        assert_ne!(a.options_fingerprint, quiet.options_fingerprint);
    }

    #[test]
    fn build_info_json() {
        let session = Session::new(PipelineOptions::default());
        let artifacts = session.run_sources(Vec::new()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&artifacts.provenance.to_json()).unwrap();
        assert_eq!(value["file_count"], 0);
        assert_eq!(value["compiler_version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(
            value["source_hash"],
            artifacts.provenance.source_hash_hex().as_str()
        );
        assert_eq!(value.as_object().map(|o| o.len()), Some(4));
        assert!(artifacts.provenance.to_json().ends_with("}\n"));
    }

    #[test]
    fn classification_errors_refuse_generation() {
        let session = Session::new(PipelineOptions::default());
        let (collector, log) = CollectingConsumer::new();
        session.engine.add_consumer(Box::new(collector));
        let err = session
            .run_sources(sources(&[("a.x", "final class H: ClassHook<UIView> {}")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Failed(1)));
        assert_eq!(
            log.messages(),
            vec!["A class hook cannot be private, fileprivate, or final".to_string()]
        );
    }

    #[test]
    fn refused_generation_does_not_report_unused_directives() {
        let session = Session::new(PipelineOptions::default());
        let (collector, log) = CollectingConsumer::new();
        session.engine.add_consumer(Box::new(collector));
        let a = concat!(
            "class A: ClassHook<NSObject> {\n",
            "    // snare:new\n",
            "    func added() {}\n",
            "    // snare:returns_retained true\n",
            "    func make() -> NSObject { orig { } }\n",
            "}\n",
        );
        let err = session
            .run_sources(sources(&[
                ("a.x", a),
                ("b.x", "final class B: ClassHook<UIView> {}"),
            ]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Failed(1)));
        assert_eq!(
            log.messages(),
            vec!["A class hook cannot be private, fileprivate, or final".to_string()]
        );
    }

    #[test]
    fn multiple_tweaks_across_files_fail() {
        let session = Session::new(PipelineOptions::default());
        let err = session
            .run_sources(sources(&[("a.x", "class A: Tweak {}"), ("b.x", "class B: Tweak {}")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Failed(1)));
    }

    #[test]
    fn unused_directives_reported_after_generation() {
        let session = Session::new(PipelineOptions::default());
        let (collector, log) = CollectingConsumer::new();
        session.engine.add_consumer(Box::new(collector));
        let source = "class H: ClassHook<NSObject> {\n    // snare:new\n    func added() {}\n    // snare:supr_tramp\n    func deinitializer() -> DeinitPolicy { .callOrig }\n}";
        let artifacts = session.run_sources(sources(&[("a.x", source)])).unwrap();
        assert!(artifacts.glue.contains("builder.addMethod"));
        let diags = log.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Unused directive");
        assert_eq!(diags[0].location.line, 4);
    }

    #[test]
    fn missing_input_is_io_error() {
        let session = Session::new(PipelineOptions::default());
        let err = session
            .run(&[PathBuf::from("/definitely/not/here.x")])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Batch(BatchError::Missing(_))));
        assert_eq!(
            err.to_string(),
            "File '/definitely/not/here.x' does not exist."
        );
    }
}
