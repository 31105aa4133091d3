//
// genetic - genetic programming experiments
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: program synthesis, mutation, crossover and fitness scoring.
//

use crate::interp::{Interpreter, RunOutcome};
use rand::Rng;
use std::time::Duration;

/// Sentinel fitness for a genome whose program faulted, timed out, or
/// produced no output at all. Kept distinct from any attainable quadratic
/// sum by scoring with a wide accumulator (see `score`).
pub const MOST_UNFIT: u64 = 0xFFFF_FFFF;

/// Characters allowed when inserting or substituting a single instruction
/// (the `add-char` and `change` mutation operators).
const SINGLE_CHAR_ALPHABET: &[u8] = b".><+-";

/// Characters allowed when generating 32 bytes of `garbage`.
const GARBAGE_ALPHABET: &[u8] = b"[]<>-+.";

/// Immutable scoring configuration threaded into every fitness evaluation.
///
/// Holding `target`/`optimize` here rather than as mutable fields on the
/// genome type (as the original implementation did) means scoring is a
/// pure function of `(gene, config)` and never depends on hidden state.
pub struct ScoringConfig<'a> {
    pub target: &'a [u8],
    pub optimize: bool,
    pub tape_size: usize,
    pub time_limit: Duration,
    /// Pre-supplied stdin buffer for the evolved program, if any. Evolved
    /// programs never read interactively during fitness evaluation.
    pub stdin: Option<&'a [u8]>,
}

/// An immutable scored program. Evolution replaces genomes, it never edits
/// one in place.
#[derive(Debug, Clone)]
pub struct Genome {
    gene: Vec<u8>,
    output: Option<Vec<u8>>,
    fitness: u64,
}

impl Genome {
    /// Builds and scores a genome from a raw gene (program text).
    pub fn from_gene(gene: Vec<u8>, config: &ScoringConfig, interp: &mut Interpreter) -> Self {
        let (fitness, output) = score(&gene, config, interp);
        Genome { gene, output, fitness }
    }

    /// Generates and scores a brand-new random genome.
    pub fn random(rng: &mut impl Rng, config: &ScoringConfig, interp: &mut Interpreter) -> Self {
        Self::from_gene(random_gene(rng), config, interp)
    }

    pub fn gene(&self) -> &[u8] {
        &self.gene
    }

    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn fitness(&self) -> u64 {
        self.fitness
    }
}

impl std::fmt::Display for Genome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gene = String::from_utf8_lossy(&self.gene);
        match &self.output {
            Some(out) => write!(f, "{} ({})", gene, String::from_utf8_lossy(out)),
            None => write!(f, "{} (<no output>)", gene),
        }
    }
}

/// Scores `gene` against `config.target`, running it through `interp` in
/// buffered mode. Any interpreter failure, a timeout, or fewer than one
/// output byte yields `MOST_UNFIT`.
pub fn score(gene: &[u8], config: &ScoringConfig, interp: &mut Interpreter) -> (u64, Option<Vec<u8>>) {
    let outcome = interp.run(gene, config.stdin, Some(config.time_limit), true);

    let out = match outcome {
        Ok(RunOutcome::Output(bytes)) => bytes,
        Ok(RunOutcome::WrittenToStdout) => {
            unreachable!("fitness scoring always runs the interpreter in buffered mode")
        }
        Err(_) => return (MOST_UNFIT, None),
    };

    if out.is_empty() {
        return (MOST_UNFIT, None);
    }

    let target = config.target;
    let fitness = if out.len() != target.len() {
        let diff = (out.len() as i64 - target.len() as i64).unsigned_abs();
        diff.saturating_mul(10_000_000)
    } else {
        let mut sum: u64 = 0;
        for (i, (&o, &t)) in out.iter().zip(target.iter()).enumerate() {
            let weight = (out.len() - i) as u64;
            let diff = (o as i32 - t as i32).unsigned_abs() as u64;
            sum = sum.saturating_add(weight.saturating_mul(weight).saturating_mul(diff));
        }
        if sum == 0 {
            return (0, Some(out));
        }
        if config.optimize {
            sum.saturating_add(gene.len() as u64)
        } else {
            sum
        }
    };

    (fitness, Some(out))
}

/// Picks a random `gene`: `program()` or `garbage()`, each with 50%
/// probability.
pub fn random_gene(rng: &mut impl Rng) -> Vec<u8> {
    if rng.gen_bool(0.5) {
        program(rng)
    } else {
        garbage_gene(rng)
    }
}

/// Concatenates 20 random statements.
fn program(rng: &mut impl Rng) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..20 {
        out.extend(statement(rng));
    }
    out
}

/// A statement is one or two back-to-back sub-expressions.
fn statement(rng: &mut impl Rng) -> Vec<u8> {
    let sub_expr_count = if rng.gen_bool(0.5) { 1 } else { 2 };
    let mut out = Vec::new();
    for _ in 0..sub_expr_count {
        out.extend(sub_expr(rng));
    }
    out
}

/// One of: a recursive bracketed statement, a run of `-`/`+`/`>`/`<` of
/// length `uniform(0, 16)`, or a single `.`.
fn sub_expr(rng: &mut impl Rng) -> Vec<u8> {
    match rng.gen_range(0..6) {
        0 => {
            let mut out = vec![b'['];
            out.extend(statement(rng));
            out.push(b']');
            out
        }
        1 => run_of(rng, b'-'),
        2 => run_of(rng, b'+'),
        3 => run_of(rng, b'>'),
        4 => run_of(rng, b'<'),
        _ => vec![b'.'],
    }
}

fn run_of(rng: &mut impl Rng, byte: u8) -> Vec<u8> {
    let len = rng.gen_range(0..=16);
    vec![byte; len]
}

/// 32 uniformly-random picks from the bracket/pointer/arithmetic/output
/// alphabet.
fn garbage_gene(rng: &mut impl Rng) -> Vec<u8> {
    (0..32).map(|_| GARBAGE_ALPHABET[rng.gen_range(0..GARBAGE_ALPHABET.len())]).collect()
}

/// Picks an index into a slice of length `len`, the way the original
/// generator does: `0` for length `<= 1`, otherwise uniform over
/// `0..len`.
fn pick_index(rng: &mut impl Rng, len: usize) -> usize {
    if len <= 1 {
        0
    } else {
        rng.gen_range(0..len)
    }
}

/// One-point crossover at the midpoint (floor division) of each parent.
pub fn mate(a: &[u8], b: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mid_a = a.len() / 2;
    let mid_b = b.len() / 2;
    let mut child1 = Vec::with_capacity(mid_a + (b.len() - mid_b));
    child1.extend_from_slice(&a[..mid_a]);
    child1.extend_from_slice(&b[mid_b..]);

    let mut child2 = Vec::with_capacity(mid_b + (a.len() - mid_a));
    child2.extend_from_slice(&b[..mid_b]);
    child2.extend_from_slice(&a[mid_a..]);

    (child1, child2)
}

/// Applies one of the eight mutation operators, chosen uniformly at
/// random. Genes of length <= 2 are too short to mutate meaningfully and
/// are replaced by a fresh random gene instead.
pub fn mutate(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    if gene.len() <= 2 {
        return random_gene(rng);
    }

    match rng.gen_range(0..8) {
        0 => op_move(gene, rng),
        1 => op_copy(gene, rng),
        2 => op_add_char(gene, rng),
        3 => op_add_stmt(gene, rng),
        4 => op_change(gene, rng),
        5 => op_snip(gene, rng),
        6 => op_remove(gene, rng),
        _ => op_add_garbage(gene, rng),
    }
}

/// Removes a randomly chosen character and re-inserts it at a new random
/// position.
fn op_move(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let mut g = gene.to_vec();
    let old = pick_index(rng, g.len());
    let ch = g.remove(old);
    let new = pick_index(rng, g.len());
    g.insert(new, ch);
    g
}

/// Duplicates a randomly chosen character in place.
fn op_copy(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let mut g = gene.to_vec();
    let ix = pick_index(rng, g.len());
    let ch = g[ix];
    g.insert(ix, ch);
    g
}

/// Inserts one uniformly-random instruction character at a random
/// position.
fn op_add_char(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let mut g = gene.to_vec();
    let ch = SINGLE_CHAR_ALPHABET[rng.gen_range(0..SINGLE_CHAR_ALPHABET.len())];
    let pos = rng.gen_range(0..=g.len());
    g.insert(pos, ch);
    g
}

/// Inserts one random statement at a random position.
fn op_add_stmt(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let ix = pick_index(rng, gene.len());
    splice(gene, ix, &statement(rng))
}

/// Overwrites a random character with a uniformly-random instruction
/// character.
fn op_change(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let mut g = gene.to_vec();
    let ix = pick_index(rng, g.len());
    g[ix] = SINGLE_CHAR_ALPHABET[rng.gen_range(0..SINGLE_CHAR_ALPHABET.len())];
    g
}

/// Removes 1..=len/2 characters from either the front or the back.
fn op_snip(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let max = (gene.len() / 2).max(1);
    let n = rng.gen_range(1..=max).min(gene.len());
    let mut g = gene.to_vec();
    if rng.gen_bool(0.5) {
        g.truncate(g.len() - n);
    } else {
        g.drain(0..n);
    }
    g
}

/// Removes the character at a randomly chosen index (including index 0,
/// which removes the first character).
fn op_remove(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let mut g = gene.to_vec();
    let ix = pick_index(rng, g.len());
    g.remove(ix);
    g
}

/// Inserts 32 random garbage characters at a random position.
fn op_add_garbage(gene: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let ix = pick_index(rng, gene.len());
    splice(gene, ix, &garbage_gene(rng))
}

fn splice(gene: &[u8], at: usize, insert: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(gene.len() + insert.len());
    out.extend_from_slice(&gene[..at]);
    out.extend_from_slice(insert);
    out.extend_from_slice(&gene[at..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::DEFAULT_TAPE_SIZE;
    use rand_xorshift::XorShiftRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn rng() -> XorShiftRng {
        XorShiftRng::seed_from_u64(42)
    }

    fn config<'a>(target: &'a [u8]) -> ScoringConfig<'a> {
        ScoringConfig {
            target,
            optimize: false,
            tape_size: DEFAULT_TAPE_SIZE,
            time_limit: Duration::from_millis(50),
            stdin: None,
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let mut interp = Interpreter::new(DEFAULT_TAPE_SIZE);
        let cfg = config(b"hi!");
        let gene = b"++++++++[>+++++++++<-]>+++++.".to_vec();
        let (f1, o1) = score(&gene, &cfg, &mut interp);
        let (f2, o2) = score(&gene, &cfg, &mut interp);
        assert_eq!(f1, f2);
        assert_eq!(o1, o2);
    }

    #[test]
    fn zero_fitness_implies_exact_match() {
        // "++++++++[>+++++++++<-]>." prints 'H' (0x48).
        let mut interp = Interpreter::new(DEFAULT_TAPE_SIZE);
        let cfg = config(b"H");
        let gene = b"++++++++[>+++++++++<-]>.".to_vec();
        let (fitness, output) = score(&gene, &cfg, &mut interp);
        assert_eq!(fitness, 0);
        assert_eq!(output.unwrap(), b"H");
    }

    #[test]
    fn unfit_programs_get_the_sentinel() {
        let mut interp = Interpreter::new(DEFAULT_TAPE_SIZE);
        let cfg = config(b"x");
        let (fitness, output) = score(b"[", &cfg, &mut interp);
        assert_eq!(fitness, MOST_UNFIT);
        assert!(output.is_none());

        let (fitness, output) = score(b"+[]", &cfg, &mut interp);
        assert_eq!(fitness, MOST_UNFIT);
        assert!(output.is_none());
    }

    #[test]
    fn crossover_preserves_total_length() {
        let mut r = rng();
        for _ in 0..50 {
            let a = random_gene(&mut r);
            let b = random_gene(&mut r);
            let (c1, c2) = mate(&a, &b);
            assert_eq!(c1.len() + c2.len(), a.len() + b.len());
        }
    }

    #[test]
    fn copy_increases_length_by_one() {
        let mut r = rng();
        let gene = b"+++>>><<<---...".to_vec();
        let result = op_copy(&gene, &mut r);
        assert_eq!(result.len(), gene.len() + 1);
    }

    #[test]
    fn add_char_increases_length_by_one() {
        let mut r = rng();
        let gene = b"+++>>><<<---...".to_vec();
        let result = op_add_char(&gene, &mut r);
        assert_eq!(result.len(), gene.len() + 1);
    }

    #[test]
    fn add_garbage_increases_length_by_32() {
        let mut r = rng();
        let gene = b"+++>>><<<---...".to_vec();
        let result = op_add_garbage(&gene, &mut r);
        assert_eq!(result.len(), gene.len() + 32);
    }

    #[test]
    fn remove_decreases_length_by_one() {
        let mut r = rng();
        let gene = b"+++>>><<<---...".to_vec();
        let result = op_remove(&gene, &mut r);
        assert_eq!(result.len(), gene.len() - 1);
    }

    #[test]
    fn change_and_move_preserve_length() {
        let mut r = rng();
        let gene = b"+++>>><<<---...".to_vec();
        assert_eq!(op_change(&gene, &mut r).len(), gene.len());
        assert_eq!(op_move(&gene, &mut r).len(), gene.len());
    }

    #[test]
    fn snip_removes_between_one_and_half_the_length() {
        let mut r = rng();
        let gene: Vec<u8> = b"+".repeat(40);
        for _ in 0..20 {
            let result = op_snip(&gene, &mut r);
            let removed = gene.len() - result.len();
            assert!(removed >= 1 && removed <= gene.len() / 2);
        }
    }

    #[test]
    fn short_genome_is_replaced_by_a_fresh_random_one() {
        // a gene of length <= 2 is mutated by discarding it and drawing a
        // fresh random gene from the same RNG stream.
        for short in [Vec::new(), vec![b'+'], vec![b'+', b'-']] {
            let mut r1 = XorShiftRng::seed_from_u64(7);
            let mut r2 = XorShiftRng::seed_from_u64(7);
            assert_eq!(mutate(&short, &mut r1), random_gene(&mut r2));
        }
    }

    #[test]
    fn remove_at_index_zero_removes_the_first_character() {
        // documented Open Question resolution: index 0 removes the first
        // character, not the last.
        let gene = b"ABCDE".to_vec();
        let mut g = gene.clone();
        g.remove(0);
        assert_eq!(g, b"BCDE");
    }
}
