//
// genetic - genetic programming experiments
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: crate-wide error types.
//

use std::time::Duration;

/// Failure taxonomy for a single Brainfuck interpreter run.
///
/// An evolved program is untrusted input: none of these are bugs, they are
/// just the three ways a sandboxed run can fail to produce output.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InterpError {
    #[error("unmatched '['")]
    UnmatchedOpen,

    #[error("unmatched ']'")]
    UnmatchedClose,

    #[error("memory access outside cells 0..{tape_size} (index {index})")]
    MemoryFault { tape_size: usize, index: isize },

    #[error("execution timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure reading back a saved population.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed save file: {0}")]
    Malformed(String),
}
