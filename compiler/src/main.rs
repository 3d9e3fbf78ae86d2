use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Parser;

use snarec::batch::ParseOptions;
use snarec::codegen::{Backend, GeneratorOptions};
use snarec::consumer::{IdeConsumer, JsonConsumer, PrintingConsumer};
use snarec::engine::DiagnosticConsumer;
use snarec::pipeline::{PipelineError, PipelineOptions, Session};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    /// Generated glue source
    Glue,
    /// Merged hook data as JSON
    Ir,
    /// Provenance JSON
    BuildInfo,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum DiagnosticsFormat {
    Human,
    Json,
    Ide,
}

#[derive(Parser, Debug)]
#[command(
    name = "snarec",
    version,
    about = "snare glue compiler: generates method-interception glue from hook declarations"
)]
struct Cli {
    /// Input .x files or directories, or `-` for standard input
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file path (default: standard output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Backend that installs hooks (`internal` or a name under `Backends.`)
    #[arg(short, long, default_value = "internal")]
    backend: String,

    /// Additional backend module to import when available (repeatable)
    #[arg(long = "backend-module")]
    backend_modules: Vec<String>,

    /// Enabled directive schema (repeatable)
    #[arg(long = "schema")]
    schemas: Vec<String>,

    /// Do not emit #sourceLocation markers
    #[arg(long)]
    no_source_locations: bool,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Glue)]
    emit: EmitStage,

    /// Diagnostic output format (always written to stderr)
    #[arg(long, value_enum, default_value_t = DiagnosticsFormat::Human)]
    diagnostics: DiagnosticsFormat,

    /// Parser worker threads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose { "snarec=debug" } else { "snarec=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        eprintln!("snarec: inputs  = {}", cli.inputs.len());
        eprintln!("snarec: backend = {}", cli.backend);
        eprintln!("snarec: emit    = {:?}", cli.emit);
    }

    let backend = match Backend::from_name(&cli.backend) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("snarec: error: {}", e);
            std::process::exit(2);
        }
    };

    let options = PipelineOptions {
        parse: ParseOptions {
            schemas: cli.schemas.clone(),
            jobs: cli.jobs,
        },
        generator: GeneratorOptions {
            backend,
            extra_backend_modules: cli.backend_modules.iter().cloned().collect::<BTreeSet<_>>(),
            emit_source_locations: !cli.no_source_locations,
        },
    };

    let session = Session::new(options);
    let consumer: Box<dyn DiagnosticConsumer> = match cli.diagnostics {
        DiagnosticsFormat::Human => Box::new(PrintingConsumer::stderr()),
        DiagnosticsFormat::Json => Box::new(JsonConsumer::stderr()),
        DiagnosticsFormat::Ide => Box::new(IdeConsumer::stderr()),
    };
    session.engine.add_consumer(consumer);

    let artifacts = match session.run(&cli.inputs) {
        Ok(a) => a,
        Err(PipelineError::Batch(e)) => {
            eprintln!("snarec: error: {}", e);
            std::process::exit(2);
        }
        Err(e @ PipelineError::Failed(_)) => {
            if cli.verbose {
                eprintln!("snarec: {}", e);
            }
            std::process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!(
            "snarec: {} class hooks, {} function hooks, {} warnings",
            artifacts.data.class_hooks.len(),
            artifacts.data.function_hooks.len(),
            session.engine.warning_count(),
        );
    }

    let text = match cli.emit {
        EmitStage::Glue => artifacts.glue,
        EmitStage::Ir => match serde_json::to_string_pretty(&artifacts.data) {
            Ok(json) => json + "\n",
            Err(e) => {
                eprintln!("snarec: error: cannot serialize IR: {}", e);
                std::process::exit(2);
            }
        },
        EmitStage::BuildInfo => artifacts.provenance.to_json(),
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("snarec: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
            if cli.verbose {
                eprintln!("snarec: wrote {}", path.display());
            }
        }
        None => print!("{}", text),
    }
}
