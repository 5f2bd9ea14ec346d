use clap::Parser;
use std::path::PathBuf;

use fec::pass::PassId;
use fec::pipeline::{compute_provenance, run_pipeline, CompilationState};
use fec::spec::EngineParams;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    /// Generated Verilog (default)
    Rtl,
    /// Bound schedule dump
    Bind,
    /// Lowered artifacts as JSON
    Json,
    /// HTML schedule report
    Report,
    /// Provenance JSON
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "fec",
    version,
    about = "fec — FIR Engine Compiler — maps .fsp filter banks onto time-multiplexed MAC pipelines"
)]
struct Cli {
    /// Input .fsp specification file
    source: PathBuf,

    /// Engine clock frequency in Hz
    #[arg(short = 'f', long, default_value_t = 400e6)]
    clock_freq: f64,

    /// Number of time slots in the schedule cycle
    #[arg(short = 't', long, default_value_t = 16)]
    time_slots: u32,

    /// Engine name (defaults to the source file stem)
    #[arg(long)]
    name: Option<String>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Rtl)]
    emit: EmitStage,

    /// Output directory (artifacts go to stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let engine_name = cli.name.clone().unwrap_or_else(|| {
        cli.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "firengine".to_string())
    });

    if cli.verbose {
        eprintln!("fec: source = {}", cli.source.display());
        eprintln!("fec: engine = {engine_name}");
        eprintln!("fec: emit   = {:?}", cli.emit);
    }

    // ── Read and parse source ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("fec: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    let parse_result = fec::parser::parse(&source);
    if !parse_result.errors.is_empty() {
        for err in &parse_result.errors {
            eprintln!("fec: parse error: {}", err);
        }
        std::process::exit(1);
    }
    let program = match parse_result.program {
        Some(p) => p,
        None => {
            eprintln!("fec: parse failed with no output");
            std::process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!("fec: parsed {} statements", program.statements.len());
    }

    // ── Build the spec model ──
    let params = EngineParams {
        clock_freq: cli.clock_freq,
        num_time_slots: cli.time_slots,
    };
    let spec_result = fec::spec::build_spec(&program, params);
    for diag in &spec_result.diagnostics {
        eprintln!("fec: {}", diag);
    }
    let spec = match spec_result.spec {
        Some(s) => s,
        None => std::process::exit(1),
    };

    if cli.verbose {
        eprintln!("fec: {} FIR(s) specified", spec.firs.len());
    }

    let mut state = CompilationState::new(engine_name.clone(), spec, program.span);
    state.provenance = Some(compute_provenance(&source, &engine_name, &state.spec));

    // ── Run the pipeline to the requested stage ──
    let terminal = match cli.emit {
        EmitStage::Rtl => Some(PassId::Codegen),
        EmitStage::Bind => Some(PassId::Bind),
        EmitStage::Json => Some(PassId::Lower),
        EmitStage::Report => Some(PassId::Report),
        EmitStage::BuildInfo => None,
    };

    if let Some(terminal) = terminal {
        let run = run_pipeline(&mut state, terminal, cli.verbose, |_, diags| {
            for diag in diags {
                eprintln!("fec: {}", diag);
            }
        });
        if run.is_err() || state.has_error {
            std::process::exit(1);
        }
    }

    // ── Emit ──
    if let Err(e) = emit(&cli, &engine_name, &state) {
        eprintln!("fec: error: {}", e);
        std::process::exit(2);
    }
}

fn emit(cli: &Cli, engine_name: &str, state: &CompilationState) -> std::io::Result<()> {
    match cli.emit {
        EmitStage::Rtl => {
            let rtl = state.rtl.as_ref().expect("codegen pass ran");
            match &cli.output {
                Some(dir) => {
                    std::fs::create_dir_all(dir)?;
                    for file in &rtl.files {
                        std::fs::write(dir.join(&file.name), &file.contents)?;
                    }
                }
                None => print!("{}", rtl.concatenated()),
            }
        }
        EmitStage::Bind => {
            let bound = state.bound.as_ref().expect("bind pass ran");
            write_or_print(cli, format!("{engine_name}.bind.txt"), &bound.to_string())?;
        }
        EmitStage::Json => {
            let lowered = state.lowered.as_ref().expect("lower pass ran");
            let json = serde_json::to_string_pretty(lowered).expect("lowered artifacts serialize");
            write_or_print(cli, format!("{engine_name}.json"), &(json + "\n"))?;
        }
        EmitStage::Report => {
            let report = state.report.as_ref().expect("report pass ran");
            write_or_print(cli, format!("{engine_name}.html"), report)?;
        }
        EmitStage::BuildInfo => {
            let prov = state.provenance.as_ref().expect("provenance computed");
            write_or_print(cli, format!("{engine_name}.build-info.json"), &prov.to_json())?;
        }
    }
    Ok(())
}

fn write_or_print(cli: &Cli, file_name: String, contents: &str) -> std::io::Result<()> {
    match &cli.output {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            std::fs::write(dir.join(file_name), contents)
        }
        None => {
            print!("{contents}");
            Ok(())
        }
    }
}
