//! `graphsel`: reduce or select instructions for the functions of a `.tir` file.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use bumpalo::Bump;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use graphsel::codegen::{CodeGenerator, ListingGenerator};
use graphsel::core::CompilationSession;
use graphsel::reduce::DEFAULT_MAX_ATTEMPTS;
use graphsel::select::TargetFeatures;
use graphsel::test_ir::{parse_module, TirModule};

#[derive(Parser, Debug)]
#[command(name = "graphsel", version, about = "Graph reducer and instruction selector driver")]
struct Cli {
    /// Log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reduce every function and print the resulting graphs.
    Reduce {
        file: PathBuf,
        /// Bound on reduction attempts per node.
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: usize,
        /// Only this function.
        #[arg(long)]
        function: Option<String>,
        /// Print session statistics.
        #[arg(long)]
        stats: bool,
    },
    /// Select instructions for every scheduled function and print the listing.
    Select {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Target::X64)]
        target: Target,
        /// Only this function.
        #[arg(long)]
        function: Option<String>,
        /// Print session statistics.
        #[arg(long)]
        stats: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    X64,
    Ia32,
}

impl Target {
    fn features(self) -> TargetFeatures {
        match self {
            Target::X64 => TargetFeatures::x64(),
            Target::Ia32 => TargetFeatures::ia32(),
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load(file: &PathBuf) -> Result<TirModule, String> {
    let text = fs::read_to_string(file).map_err(|e| format!("{}: {}", file.display(), e))?;
    parse_module(&text).map_err(|e| format!("{}: {}", file.display(), e))
}

fn wanted(filter: &Option<String>, name: &str) -> bool {
    filter.as_deref().map_or(true, |f| f == name)
}

fn run(cli: Cli) -> Result<(), String> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);

    let show_stats = match cli.command {
        Command::Reduce {
            file,
            max_attempts,
            function,
            stats,
        } => {
            let mut module = load(&file)?;
            let TirModule { heap, functions, .. } = &mut module;
            for tir in functions.iter_mut().filter(|f| wanted(&function, &f.name)) {
                tir.reduce(heap, &session, max_attempts)
                    .map_err(|e| format!("{}: {}", tir.name, e))?;
                println!("function {}", tir.name);
                print!("{}", tir.graph);
            }
            stats
        }
        Command::Select {
            file,
            target,
            function,
            stats,
        } => {
            let module = load(&file)?;
            let features = target.features();
            info!("selecting for {}", features.name);
            let mut generator = ListingGenerator::new();
            for tir in module.functions.iter().filter(|f| wanted(&function, &f.name)) {
                if !tir.scheduled {
                    info!("skipping {}: no schedule", tir.name);
                    continue;
                }
                let sequence = tir
                    .select(features, &session)
                    .map_err(|e| format!("{}: {}", tir.name, e))?;
                let listing = generator
                    .generate(&tir.name, &sequence)
                    .map_err(|e| format!("{}: {}", tir.name, e))?;
                print!("{}", listing);
            }
            stats
        }
    };

    if show_stats {
        eprint!("{}", session.stats());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{}", message);
            eprintln!("graphsel: {}", message);
            ExitCode::FAILURE
        }
    }
}
