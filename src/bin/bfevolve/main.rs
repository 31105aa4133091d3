//
// genetic - genetic programming experiments
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Driver: evolve a Brainfuck program towards a target output.
//

use bfevolve::codec;
use bfevolve::interp::{DEFAULT_TAPE_SIZE, DEFAULT_TIME_LIMIT};
use bfevolve::population::{Config, Population};
use clap::{ArgGroup, Parser};
use log::info;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use std::fs;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "bfevolve",
    about = "Evolves a Brainfuck program that prints a target string",
    group(ArgGroup::new("target_mode").required(true).args(["target", "resume_from"]))
)]
struct Args {
    /// Literal target string to evolve towards.
    #[arg(short = 'o', long = "output")]
    target: Option<String>,

    /// Resume from a previously saved population.
    #[arg(short = 'f', long = "file")]
    resume_from: Option<String>,

    /// Population size.
    #[arg(short = 's', long = "size", default_value_t = 128)]
    size: usize,

    /// Mutation probability, applied to a freshly produced pair of children.
    #[arg(short = 'm', long = "mutation", default_value_t = 0.5)]
    mutation: f64,

    /// Crossover probability for each breeding slot.
    #[arg(short = 'c', long = "crossover", default_value_t = 0.5)]
    crossover: f64,

    /// Fraction of the population carried forward unchanged each generation.
    #[arg(short = 'e', long = "elitism", default_value_t = 0.5)]
    elitism: f64,

    /// Penalize longer programs once the target is otherwise matched.
    #[arg(short = 'O', long = "optimize")]
    optimize: bool,

    /// Tape size given to the interpreter.
    #[arg(long = "tape-size", default_value_t = DEFAULT_TAPE_SIZE)]
    tape_size: usize,

    /// Per-genome execution time limit, in milliseconds.
    #[arg(long = "time-limit-ms", default_value_t = DEFAULT_TIME_LIMIT.as_millis() as u64)]
    time_limit_ms: u64,

    /// RNG seed; defaults to a fixed value for reproducible runs.
    #[arg(long = "seed", default_value_t = 0)]
    seed: u64,

    /// Write the final population to this path when the run ends.
    #[arg(long = "save")]
    save: Option<String>,

    /// Print a human-readable progress line for every generation.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let time_limit = Duration::from_millis(args.time_limit_ms);
    let mut rng = XorShiftRng::seed_from_u64(args.seed);

    let mut population = if let Some(path) = &args.resume_from {
        match fs::read_to_string(path) {
            Ok(text) => match codec::deserialize(&text, args.tape_size, time_limit, args.optimize) {
                Ok(pop) => pop,
                Err(e) => {
                    eprintln!("error: could not read save file {path:?}: {e}");
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => {
                eprintln!("error: could not open save file {path:?}: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        let target = args.target.clone().expect("clap guarantees exactly one of -o/-f");
        let config = Config {
            size: args.size,
            elitism: args.elitism,
            crossover: args.crossover,
            mutation: args.mutation,
            optimize: args.optimize,
            tape_size: args.tape_size,
            time_limit,
        };
        info!("starting a fresh population of {} genomes targeting {:?}", args.size, target);
        Population::new_random(target.into_bytes(), config, &mut rng)
    };

    let stop_requested = Arc::new(AtomicBool::new(false));
    {
        let stop_requested = stop_requested.clone();
        if let Err(e) = ctrlc::set_handler(move || stop_requested.store(true, Ordering::SeqCst)) {
            eprintln!("warning: could not install Ctrl-C handler: {e}");
        }
    }

    population.evolve_to(
        0,
        &mut rng,
        || stop_requested.load(Ordering::SeqCst),
        |pop, elapsed| {
            let best = pop.best();
            info!(
                "generation {} total_scored {} best_fitness {}",
                pop.generation(),
                pop.total_scored(),
                best.fitness()
            );
            if args.verbose {
                println!(
                    "generation={} fitness={} time={:?} genome={} captured_output={:?}",
                    pop.generation(),
                    best.fitness(),
                    elapsed,
                    best,
                    best.output().map(String::from_utf8_lossy),
                );
            }
        },
    );

    if let Some(path) = &args.save {
        let text = codec::serialize(&population);
        if let Err(e) = fs::write(path, text) {
            eprintln!("error: could not write save file {path:?}: {e}");
            return ExitCode::FAILURE;
        }
        info!("wrote final population to {path:?}");
    }

    let best = population.best();
    println!(
        "generation={} fitness={} genome={} captured_output={:?}",
        population.generation(),
        best.fitness(),
        best,
        best.output().map(String::from_utf8_lossy),
    );

    ExitCode::SUCCESS
}
