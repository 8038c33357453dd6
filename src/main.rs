extern crate clap;
extern crate pbr;

use clap::{Parser, Subcommand, ValueEnum};
use pbr::ProgressBar;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256StarStar;
use swiss_blossom::solver::get_matching;
use swiss_blossom::util::*;

pub fn main() {
    env_logger::init();
    Cli::parse().run();
}

#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Weighted perfect matching solver (Blossom V) for tournament pairing")]
#[clap(propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ObjectiveArg {
    Minimize,
    Maximize,
}

#[derive(Clone, Copy, ValueEnum)]
enum InitializationArg {
    None,
    Greedy,
    Fractional,
}

#[derive(Subcommand)]
enum Commands {
    /// solve a matching instance from a JSON file and print the result
    Solve {
        /// path of a JSON file with { vertex_num, weighted_edges }
        #[clap(value_parser)]
        input: String,
        #[clap(short, long, value_enum, default_value_t = ObjectiveArg::Minimize)]
        objective: ObjectiveArg,
        #[clap(short, long, value_enum, default_value_t = InitializationArg::Fractional)]
        initialization: InitializationArg,
        /// also print the dual solution and the statistics
        #[clap(short, long)]
        verbose: bool,
    },
    /// time the solver on random complete graphs
    Benchmark {
        /// number of vertices of each instance, must be even
        #[clap(value_parser)]
        vertex_num: usize,
        /// how many instances to run
        #[clap(short, long, default_value_t = 10)]
        rounds: usize,
        #[clap(short, long, default_value_t = 0)]
        seed: u64,
        #[clap(short, long, value_enum, default_value_t = InitializationArg::Fractional)]
        initialization: InitializationArg,
    },
}

impl Cli {
    fn run(self) {
        match self.command {
            Commands::Solve {
                input,
                objective,
                initialization,
                verbose,
            } => {
                let content = std::fs::read_to_string(&input).unwrap_or_else(|error| {
                    eprintln!("cannot read {input}: {error}");
                    std::process::exit(1);
                });
                let input: SolverInput = serde_json::from_str(&content).unwrap_or_else(|error| {
                    eprintln!("invalid input file: {error}");
                    std::process::exit(1);
                });
                let objective = match objective {
                    ObjectiveArg::Minimize => ObjectiveSense::Minimize,
                    ObjectiveArg::Maximize => ObjectiveSense::Maximize,
                };
                let options = BlossomOptions::with_initialization(initialization.into());
                match get_matching(&input, objective, &options) {
                    Ok(outcome) => {
                        println!("{}", serde_json::to_string_pretty(&outcome.matching).unwrap());
                        if verbose {
                            println!("{}", serde_json::to_string_pretty(&outcome.dual_solution).unwrap());
                            println!("{}", serde_json::to_string_pretty(&outcome.statistics).unwrap());
                        }
                    }
                    Err(error) => {
                        eprintln!("{error}");
                        std::process::exit(1);
                    }
                }
            }
            Commands::Benchmark {
                vertex_num,
                rounds,
                seed,
                initialization,
            } => {
                assert!(vertex_num % 2 == 0, "an odd instance has no perfect matching");
                let options = BlossomOptions::with_initialization(initialization.into());
                let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
                let mut progress = ProgressBar::new(rounds as u64);
                let mut statistics = MatchingStatistics::default();
                let started = std::time::Instant::now();
                for _ in 0..rounds {
                    let mut weighted_edges = vec![];
                    for u in 0..vertex_num {
                        for v in u + 1..vertex_num {
                            let weight = (rng.next_u32() % 100_000) as Weight / 100.;
                            weighted_edges.push((u as VertexIndex, v as VertexIndex, weight));
                        }
                    }
                    let input = SolverInput::new(vertex_num as VertexIndex, weighted_edges);
                    let outcome = get_matching(&input, ObjectiveSense::Minimize, &options).unwrap();
                    statistics.grow_num += outcome.statistics.grow_num;
                    statistics.shrink_num += outcome.statistics.shrink_num;
                    statistics.expand_num += outcome.statistics.expand_num;
                    statistics.augment_num += outcome.statistics.augment_num;
                    statistics.grow_time += outcome.statistics.grow_time;
                    statistics.shrink_time += outcome.statistics.shrink_time;
                    statistics.expand_time += outcome.statistics.expand_time;
                    statistics.augment_time += outcome.statistics.augment_time;
                    statistics.dual_update_time += outcome.statistics.dual_update_time;
                    progress.inc();
                }
                progress.finish();
                let elapsed = started.elapsed();
                println!(
                    "\n[{}] {} rounds of n = {} in {:.3}s ({:.3}s per instance)",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    rounds,
                    vertex_num,
                    elapsed.as_secs_f64(),
                    elapsed.as_secs_f64() / rounds as f64,
                );
                println!("{}", serde_json::to_string_pretty(&statistics).unwrap());
            }
        }
    }
}

impl From<InitializationArg> for InitializationType {
    fn from(value: InitializationArg) -> Self {
        match value {
            InitializationArg::None => InitializationType::None,
            InitializationArg::Greedy => InitializationType::Greedy,
            InitializationArg::Fractional => InitializationType::Fractional,
        }
    }
}
