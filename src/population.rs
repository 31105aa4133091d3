//
// genetic - genetic programming experiments
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: generational evolution of a Brainfuck genome population.
//

use crate::genome::{mate, mutate, random_gene, Genome, ScoringConfig};
use crate::interp::{Interpreter, DEFAULT_TAPE_SIZE, DEFAULT_TIME_LIMIT};
use rand::Rng;
use rayon::prelude::*;
use std::cell::RefCell;
use std::time::{Duration, Instant};

thread_local! {
    static SCRATCH_INTERP: RefCell<Option<Interpreter>> = RefCell::new(None);
}

/// Runs `f` against a per-thread scratch interpreter, creating or resizing
/// it as needed. Reusing the tape across calls is what keeps scoring
/// millions of genomes affordable (§5 of the design notes).
fn with_scratch_interpreter<T>(tape_size: usize, f: impl FnOnce(&mut Interpreter) -> T) -> T {
    SCRATCH_INTERP.with(|cell| {
        let mut slot = cell.borrow_mut();
        let interp = slot.get_or_insert_with(|| Interpreter::new(tape_size));
        if interp.tape_size() != tape_size {
            *interp = Interpreter::new(tape_size);
        }
        f(interp)
    })
}

/// The four GA knobs plus the interpreter limits used while scoring.
#[derive(Debug, Clone)]
pub struct Config {
    pub size: usize,
    pub elitism: f64,
    pub crossover: f64,
    pub mutation: f64,
    pub optimize: bool,
    pub tape_size: usize,
    pub time_limit: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            size: 128,
            elitism: 0.5,
            crossover: 0.5,
            mutation: 0.5,
            optimize: false,
            tape_size: DEFAULT_TAPE_SIZE,
            time_limit: DEFAULT_TIME_LIMIT,
        }
    }
}

/// A child about to join the next generation: either scored already
/// (carried forward unchanged) or a raw gene still needing a fitness
/// evaluation.
enum PendingChild {
    Existing(Genome),
    Fresh(Vec<u8>),
}

impl PendingChild {
    fn gene_bytes(&self) -> &[u8] {
        match self {
            PendingChild::Existing(g) => g.gene(),
            PendingChild::Fresh(gene) => gene,
        }
    }
}

/// A sorted (ascending by fitness) collection of genomes, with a
/// one-generation evolution step.
pub struct Population {
    target: Vec<u8>,
    config: Config,
    genomes: Vec<Genome>,
    generation: u64,
    total_scored: u64,
}

impl Population {
    /// Builds a fresh population of `config.size` random genomes, scored
    /// in parallel, and sorted ascending by fitness.
    pub fn new_random(target: Vec<u8>, config: Config, rng: &mut impl Rng) -> Self {
        let genes: Vec<Vec<u8>> = (0..config.size).map(|_| random_gene(rng)).collect();
        let tape_size = config.tape_size;
        let time_limit = config.time_limit;
        let optimize = config.optimize;
        let target_ref = &target;

        let mut genomes: Vec<Genome> = genes
            .into_par_iter()
            .map(|gene| {
                let scoring = ScoringConfig {
                    target: target_ref,
                    optimize,
                    tape_size,
                    time_limit,
                    stdin: None,
                };
                with_scratch_interpreter(tape_size, |interp| Genome::from_gene(gene, &scoring, interp))
            })
            .collect();
        genomes.sort_by_key(Genome::fitness);

        let total_scored = genomes.len() as u64;
        Population { target, config, genomes, generation: 1, total_scored }
    }

    /// Rebuilds a population from already-scored genomes (used by the
    /// save-state codec); `total_scored` and `generation` are restored
    /// from the blob, genomes are rescored against `target`.
    pub(crate) fn from_parts(
        target: Vec<u8>,
        config: Config,
        raw_genes: Vec<Vec<u8>>,
        generation: u64,
        total_scored: u64,
    ) -> Self {
        let tape_size = config.tape_size;
        let time_limit = config.time_limit;
        let optimize = config.optimize;
        let target_ref = &target;

        let mut genomes: Vec<Genome> = raw_genes
            .into_par_iter()
            .map(|gene| {
                let scoring = ScoringConfig {
                    target: target_ref,
                    optimize,
                    tape_size,
                    time_limit,
                    stdin: None,
                };
                with_scratch_interpreter(tape_size, |interp| Genome::from_gene(gene, &scoring, interp))
            })
            .collect();
        genomes.sort_by_key(Genome::fitness);

        Population { target, config, genomes, generation, total_scored }
    }

    pub fn target(&self) -> &[u8] {
        &self.target
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn total_scored(&self) -> u64 {
        self.total_scored
    }

    /// The fittest genome (`pop[0]`).
    pub fn best(&self) -> &Genome {
        &self.genomes[0]
    }

    /// Index where the elite prefix ends: `size * elitism`, rounded to the
    /// nearest multiple of 10. Ties round half-to-even, matching Python's
    /// `round(size * elitism, -1)`.
    fn elite_cut(&self) -> usize {
        let size = self.config.size as f64;
        let raw = size * self.config.elitism;
        let rounded = (raw / 10.0).round_ties_even() * 10.0;
        rounded.clamp(0.0, size) as usize
    }

    /// Picks a random incumbent, then keeps the fittest of three further
    /// random picks (tournament size 3, §4.3).
    fn tournament(&self, rng: &mut impl Rng) -> &Genome {
        let len = self.genomes.len();
        let mut best = &self.genomes[rng.gen_range(0..len)];
        for _ in 0..3 {
            let contender = &self.genomes[rng.gen_range(0..len)];
            if contender.fitness() < best.fitness() {
                best = contender;
            }
        }
        best
    }

    /// Advances the population by one generation: carries the elite prefix
    /// forward unchanged, then fills the rest via crossover/duplication and
    /// optional mutation, scoring new children in parallel.
    pub fn evolve(&mut self, rng: &mut impl Rng) {
        let size = self.config.size;
        let elite_end = self.elite_cut();
        let mut next = self.genomes[..elite_end.min(self.genomes.len())].to_vec();

        let mut idx = elite_end;
        let mut pending: Vec<PendingChild> = Vec::with_capacity(size.saturating_sub(elite_end) + 2);

        while idx < size {
            let bred = rng.gen::<f64>() <= self.config.crossover;

            let (mut c1, mut c2) = if bred {
                let partner_gene = if rng.gen_bool(0.5) {
                    self.tournament(rng).gene().to_vec()
                } else {
                    self.genomes[idx].gene().to_vec()
                };
                let best_gene = self.genomes[0].gene().to_vec();
                let (g1, g2) = mate(&partner_gene, &best_gene);
                self.total_scored += 2;
                (PendingChild::Fresh(g1), PendingChild::Fresh(g2))
            } else {
                let dup1 = self.genomes[idx].clone();
                let dup2 = self.tournament(rng).clone();
                (PendingChild::Existing(dup1), PendingChild::Existing(dup2))
            };

            if rng.gen::<f64>() <= self.config.mutation {
                c1 = PendingChild::Fresh(mutate(c1.gene_bytes(), rng));
                c2 = PendingChild::Fresh(mutate(c2.gene_bytes(), rng));
                self.total_scored += 2;
            }

            pending.push(c1);
            pending.push(c2);
            idx += 2;
        }

        let tape_size = self.config.tape_size;
        let time_limit = self.config.time_limit;
        let optimize = self.config.optimize;
        let target_ref = &self.target;

        let scored: Vec<Genome> = pending
            .into_par_iter()
            .map(|child| match child {
                PendingChild::Existing(g) => g,
                PendingChild::Fresh(gene) => {
                    let scoring = ScoringConfig {
                        target: target_ref,
                        optimize,
                        tape_size,
                        time_limit,
                        stdin: None,
                    };
                    with_scratch_interpreter(tape_size, |interp| Genome::from_gene(gene, &scoring, interp))
                }
            })
            .collect();

        next.extend(scored);
        next.truncate(size);
        next.sort_by_key(Genome::fitness);

        self.genomes = next;
        self.generation += 1;
    }

    /// Repeatedly evolves until the fittest genome's fitness is `<= level`
    /// (0 is the goal) or `should_stop` returns true at a generation
    /// boundary. `on_generation` is called after every completed
    /// generation with the elapsed wall-clock time, for progress reporting.
    pub fn evolve_to(
        &mut self,
        level: u64,
        rng: &mut impl Rng,
        mut should_stop: impl FnMut() -> bool,
        mut on_generation: impl FnMut(&Population, Duration),
    ) {
        while self.best().fitness() > level {
            if should_stop() {
                break;
            }
            let start = Instant::now();
            self.evolve(rng);
            on_generation(self, start.elapsed());
        }
    }
}
