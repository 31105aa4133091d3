//
// genetic - genetic programming experiments
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: save-state text codec for a Population.
//

use crate::error::CodecError;
use crate::population::{Config, Population};
use std::time::Duration;

/// Splits `input` at the first `;;\n` terminator, returning the field text
/// before it and everything after it.
fn take_field(input: &str) -> Result<(&str, &str), CodecError> {
    let idx = input
        .find(";;\n")
        .ok_or_else(|| CodecError::Malformed("missing ';;' field terminator".to_string()))?;
    Ok((&input[..idx], &input[idx + 3..]))
}

/// Serializes a population to the field-delimited save format:
/// `target;;\n\n\n`, then elitism/mutation/crossover/size/total/generation,
/// one `;;`-terminated field per line, then one gene per line.
pub fn serialize(pop: &Population) -> String {
    let mut out = String::new();
    out.push_str(&String::from_utf8_lossy(pop.target()));
    out.push_str(";;\n\n\n");
    out.push_str(&format!("{};;\n", pop.config().elitism));
    out.push_str(&format!("{};;\n", pop.config().mutation));
    out.push_str(&format!("{};;\n", pop.config().crossover));
    out.push_str(&format!("{};;\n", pop.config().size));
    out.push_str(&format!("{};;\n", pop.total_scored()));
    out.push_str(&format!("{};;\n", pop.generation()));
    for genome in pop.genomes() {
        out.push_str(&String::from_utf8_lossy(genome.gene()));
        out.push_str(";;\n");
    }
    out
}

/// Parses a save file produced by `serialize` and rebuilds a `Population`.
///
/// The GA knobs and the genomes are read from `text`; `tape_size`,
/// `time_limit` and `optimize` are not part of the save format (the original
/// implementation treated them as ambient run configuration, not saved
/// state) and are supplied by the caller. Every genome is rescored against
/// `target`, not restored from the file.
pub fn deserialize(
    text: &str,
    tape_size: usize,
    time_limit: Duration,
    optimize: bool,
) -> Result<Population, CodecError> {
    let (target, rest) = take_field(text)?;
    let rest = rest
        .strip_prefix("\n\n")
        .ok_or_else(|| CodecError::Malformed("missing blank separator lines after target".to_string()))?;

    let (elitism_s, rest) = take_field(rest)?;
    let (mutation_s, rest) = take_field(rest)?;
    let (crossover_s, rest) = take_field(rest)?;
    let (size_s, rest) = take_field(rest)?;
    let (total_s, rest) = take_field(rest)?;
    let (gen_s, rest) = take_field(rest)?;

    let elitism: f64 = parse_field("elitism", elitism_s)?;
    let mutation: f64 = parse_field("mutation", mutation_s)?;
    let crossover: f64 = parse_field("crossover", crossover_s)?;
    let size: usize = parse_field("size", size_s)?;
    let total_scored: u64 = parse_field("total", total_s)?;
    let generation: u64 = parse_field("generation", gen_s)?;

    let mut raw_genes = Vec::new();
    let mut remaining = rest;
    while !remaining.is_empty() {
        let (gene, next) = take_field(remaining)?;
        raw_genes.push(gene.as_bytes().to_vec());
        remaining = next;
    }

    if raw_genes.len() != size {
        return Err(CodecError::Malformed(format!(
            "declared size {size} but found {} genomes",
            raw_genes.len()
        )));
    }

    let config = Config { size, elitism, crossover, mutation, optimize, tape_size, time_limit };
    Ok(Population::from_parts(target.as_bytes().to_vec(), config, raw_genes, generation, total_scored))
}

fn parse_field<T: std::str::FromStr>(name: &str, text: &str) -> Result<T, CodecError> {
    text.parse().map_err(|_| CodecError::Malformed(format!("bad {name} value {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn round_trips_a_population() {
        let mut rng = XorShiftRng::seed_from_u64(5);
        let config = Config { size: 16, ..Config::default() };
        let pop = Population::new_random(b"hi!".to_vec(), config, &mut rng);

        let text = serialize(&pop);
        let reloaded = deserialize(&text, pop.config().tape_size, pop.config().time_limit, pop.config().optimize).unwrap();

        assert_eq!(reloaded.target(), pop.target());
        assert_eq!(reloaded.config().size, pop.config().size);
        assert_eq!(reloaded.config().elitism, pop.config().elitism);
        assert_eq!(reloaded.config().mutation, pop.config().mutation);
        assert_eq!(reloaded.config().crossover, pop.config().crossover);
        assert_eq!(reloaded.generation(), pop.generation());
        assert_eq!(reloaded.total_scored(), pop.total_scored());

        let mut original_genes: Vec<&[u8]> = pop.genomes().iter().map(|g| g.gene()).collect();
        let mut reloaded_genes: Vec<&[u8]> = reloaded.genomes().iter().map(|g| g.gene()).collect();
        original_genes.sort();
        reloaded_genes.sort();
        assert_eq!(original_genes, reloaded_genes);

        for (a, b) in pop.genomes().iter().zip(reloaded.genomes().iter()) {
            assert_eq!(a.fitness(), b.fitness());
        }
    }

    #[test]
    fn rejects_a_file_with_no_field_terminator() {
        let err = deserialize("garbage with no terminators", 30_000, Duration::from_millis(50), false).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn rejects_a_genome_count_mismatch() {
        let text = "hi;;\n\n\n0.5;;\n0.5;;\n0.5;;\n2;;\n2;;\n1;;\n+.;;\n";
        let err = deserialize(text, 30_000, Duration::from_millis(50), false).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn rejects_a_malformed_numeric_field() {
        let text = "hi;;\n\n\nnot-a-number;;\n0.5;;\n0.5;;\n2;;\n2;;\n1;;\n+.;;\n-.;;\n";
        let err = deserialize(text, 30_000, Duration::from_millis(50), false).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
