//! Offline validation driver for the environment map sampling library.

#[macro_use]
extern crate log;

use clap::Parser;
use envlight::validate;

/// Command line options.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Options {
    /// Seed for the statistical checks.
    #[clap(
        long = "seed",
        short = 's',
        value_name = "NUM",
        default_value_t = 1,
        help = "Seed the statistical checks with the given value."
    )]
    seed: u64,

    /// Number of samples drawn by each statistical check.
    #[clap(
        long = "samples",
        short = 'n',
        value_name = "NUM",
        help = "Draw the given number of samples in each statistical check."
    )]
    samples: Option<usize>,

    /// Suppress per-check output; only the final verdict is printed.
    #[clap(long, help = "Suppress all text output other than the final verdict.")]
    quiet: bool,
}

fn main() {
    // Initialize `env_logger`.
    env_logger::init();

    let options = Options::parse();

    let results = validate::run_all(options.seed, options.samples);
    let failed = results.iter().filter(|r| !r.passed).count();

    if !options.quiet {
        for r in results.iter() {
            println!("{r}");
        }
    }

    if failed > 0 {
        error!("{failed} of {} validation checks failed", results.len());
        std::process::exit(1);
    }
    println!("all {} validation checks passed", results.len());
}
