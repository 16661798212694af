use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{thread_rng, SeedableRng};
use slider_ida::config::{DEFAULT_MOVE_THRESHOLD, DEFAULT_PUZZLE_SIZE, DEFAULT_THREADS};
use slider_ida::distributed::{
    run_worker, ChannelTransport, Master, ProcessTransport, StdioWorkerLink,
};
use slider_ida::puzzle::check_size;
use slider_ida::{ParallelRunner, Puzzle, RunReport, SequentialRunner, Solution, SolverConfig};
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum Strategy {
    Sequential,
    Parallel,
    Distributed,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum Transport {
    /// Worker threads inside this process
    Threads,
    /// One child process per worker
    Processes,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Solve a puzzle and print the run report
    Solve {
        #[arg(short, long, help = "Puzzle file: one row per line, 0 for the blank")]
        input: Option<PathBuf>,

        #[arg(long, default_value_t = 30, help = "Random walk length for a generated puzzle")]
        scramble: usize,

        #[arg(long, help = "Generate a uniformly shuffled puzzle instead of a random walk")]
        shuffle: bool,

        #[arg(long, help = "Seed for puzzle generation")]
        seed: Option<u64>,

        #[arg(long, value_enum, default_value_t = Strategy::Sequential)]
        strategy: Strategy,

        #[arg(long, value_enum, default_value_t = Transport::Processes)]
        transport: Transport,

        #[arg(
            long,
            default_value_t = DEFAULT_THREADS,
            help = "Thread budget for the parallel strategy"
        )]
        threads: usize,

        #[arg(
            long,
            default_value_t = DEFAULT_MOVE_THRESHOLD,
            help = "Give up past this many moves"
        )]
        threshold: u32,

        #[arg(long, default_value_t = DEFAULT_PUZZLE_SIZE, help = "Puzzle dimension")]
        size: usize,

        #[arg(long, help = "Distributed worker pool size (default: one per root move)")]
        workers: Option<usize>,

        #[arg(long, help = "Append a timing line to this file")]
        log_file: Option<PathBuf>,
    },
    /// Serve a distributed master over stdin/stdout
    #[command(hide = true)]
    Worker {
        #[arg(long, default_value_t = DEFAULT_MOVE_THRESHOLD)]
        threshold: u32,
    },
}

#[derive(Debug, Parser)]
#[command(version, about = "Sliding-tile puzzle solver (IDA*)")]
struct Cli {
    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity level (-v = WARN, -vv = INFO, -vvv = DEBUG, -vvvv = TRACE)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // Protocol frames own stdout in worker processes.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .init();
}

fn load_puzzle(
    input: Option<PathBuf>,
    size: usize,
    scramble: usize,
    shuffle: bool,
    seed: Option<u64>,
) -> Result<Puzzle> {
    check_size(size)?;
    if let Some(path) = input {
        let puzzle = Puzzle::load(&path)?;
        ensure!(
            puzzle.size() == size,
            "{} holds a {}x{} puzzle but the configured size is {size}",
            path.display(),
            puzzle.size(),
            puzzle.size()
        );
        return Ok(puzzle);
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(thread_rng()).context("failed to seed the puzzle generator")?,
    };
    Ok(if shuffle {
        Puzzle::shuffle(size, &mut rng)
    } else {
        Puzzle::scramble(size, scramble, &mut rng)
    })
}

fn run_distributed(root: &Puzzle, config: SolverConfig, transport: Transport) -> Result<Solution> {
    let workers = config.workers.unwrap_or_else(|| root.successors().len());
    let threshold = config.move_threshold;

    match transport {
        Transport::Threads => {
            let link = ChannelTransport::spawn(workers, threshold)?;
            Master::new(link, config).run(root)
        }
        Transport::Processes => {
            let program = std::env::current_exe().context("failed to locate the solver binary")?;
            let link = ProcessTransport::spawn(program, workers, threshold)?;
            Master::new(link, config).run(root)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Worker { threshold } => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            let mut link = StdioWorkerLink::new(stdin.lock(), stdout.lock());
            run_worker(&mut link, threshold)
        }
        Commands::Solve {
            input,
            scramble,
            shuffle,
            seed,
            strategy,
            transport,
            threads,
            threshold,
            size,
            workers,
            log_file,
        } => {
            let mut config = SolverConfig::new(size)
                .with_threads(threads)
                .with_move_threshold(threshold);
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }

            let root = load_puzzle(input, size, scramble, shuffle, seed)?;
            println!("Initial puzzle:\n{}", root);
            info!(?strategy, "solving");

            let start = Instant::now();
            let solution = match strategy {
                Strategy::Sequential => SequentialRunner::new(config).run(&root),
                Strategy::Parallel => ParallelRunner::new(config)?.run(&root),
                Strategy::Distributed => run_distributed(&root, config, transport)?,
            };
            let report = RunReport::new(format!("{strategy:?}"), start.elapsed(), solution);

            println!("{}\n", report);
            if report.solution.solved {
                let moves = report.solution.moves();
                let mut replayed = root.clone();
                println!("Found solution with {} moves:", moves.len());
                for item in moves {
                    replayed = replayed.replay(&[item])?;
                    println!("{}\n{}", item, replayed);
                }
            }

            if let Some(path) = log_file {
                report.append_to(&path)?;
            }
            Ok(())
        }
    }
}
