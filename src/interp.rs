//
// genetic - genetic programming experiments
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Module: Brainfuck sandbox (bounded, deterministic interpreter).
//

use crate::error::InterpError;
use std::collections::VecDeque;
use std::io::Write;
use std::time::{Duration, Instant};

/// Default tape size used by the evolutionary search.
pub const DEFAULT_TAPE_SIZE: usize = 30_000;

/// Default per-run time limit used when scoring genomes.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_millis(50);

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// `buffer_stdout = true`: the bytes emitted by `.`.
    Output(Vec<u8>),
    /// `buffer_stdout = false`: bytes were written directly to the host's stdout.
    WrittenToStdout,
}

impl RunOutcome {
    /// Returns the captured output, if this was a buffered run.
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            RunOutcome::Output(bytes) => Some(bytes),
            RunOutcome::WrittenToStdout => None,
        }
    }
}

/// Builds the `[`/`]` jump table by scanning `program` once with a stack of
/// open-bracket positions. `jump_table[i]` holds the matching partner's
/// index for every `[`/`]` in `program`, `None` elsewhere.
fn build_jump_table(program: &[u8]) -> Result<Vec<Option<usize>>, InterpError> {
    let mut jump_table = vec![None; program.len()];
    let mut open_stack = Vec::new();

    for (i, &token) in program.iter().enumerate() {
        match token {
            b'[' => open_stack.push(i),
            b']' => {
                let open = open_stack.pop().ok_or(InterpError::UnmatchedClose)?;
                jump_table[open] = Some(i);
                jump_table[i] = Some(open);
            }
            _ => (),
        }
    }

    if !open_stack.is_empty() {
        return Err(InterpError::UnmatchedOpen);
    }

    Ok(jump_table)
}

/// Counts how many bytes identical to `program[at]` immediately follow it,
/// so that a run of `k+1` identical tokens can be dispatched as one fused
/// operation.
fn count_trailing_duplicates(program: &[u8], at: usize) -> usize {
    let token = program[at];
    let mut i = at;
    let end = program.len() - 1;
    let mut count = 0;
    while i < end && program[i + 1] == token {
        i += 1;
        count += 1;
    }
    count
}

/// A sandboxed Brainfuck interpreter with a reusable tape.
///
/// Allocating a fresh tape for every fitness evaluation would dominate the
/// cost of a GA run that scores millions of genomes; callers (typically one
/// per worker thread) are expected to keep an `Interpreter` around and call
/// `run` repeatedly. The tape is zeroed at the start of each run; nothing
/// else carries over between calls.
pub struct Interpreter {
    tape: Vec<u8>,
    tape_size: usize,
}

impl Interpreter {
    pub fn new(tape_size: usize) -> Self {
        Interpreter { tape: vec![0; tape_size], tape_size }
    }

    pub fn tape_size(&self) -> usize {
        self.tape_size
    }

    fn check_index(&self, ptr: isize) -> Result<usize, InterpError> {
        if ptr < 0 || ptr as usize >= self.tape_size {
            Err(InterpError::MemoryFault { tape_size: self.tape_size, index: ptr })
        } else {
            Ok(ptr as usize)
        }
    }

    fn get(&self, ptr: isize) -> Result<u8, InterpError> {
        let idx = self.check_index(ptr)?;
        Ok(self.tape[idx])
    }

    fn put(&mut self, ptr: isize, value: u8) -> Result<(), InterpError> {
        let idx = self.check_index(ptr)?;
        self.tape[idx] = value;
        Ok(())
    }

    /// Applies a fused run of `run_len` increments (positive `sign`) or
    /// decrements (negative `sign`) to the cell at `ptr`, with a single
    /// bound check and wrap-mod-256 semantics.
    fn bump(&mut self, ptr: isize, run_len: usize, sign: i8) -> Result<(), InterpError> {
        let idx = self.check_index(ptr)?;
        let delta = (run_len % 256) as u8;
        self.tape[idx] = if sign >= 0 {
            self.tape[idx].wrapping_add(delta)
        } else {
            self.tape[idx].wrapping_sub(delta)
        };
        Ok(())
    }

    /// Runs `program` against a freshly zeroed tape.
    ///
    /// `stdin`, if given, is consumed as a FIFO byte queue; each `,` pops
    /// one byte, leaving the cell unchanged if the queue is empty or the
    /// popped byte is zero (the EOF sentinel).
    ///
    /// `time_limit`, if given, is checked once per dispatched token or
    /// fused block; exceeding it returns `Timeout`.
    ///
    /// `buffer_stdout = true` accumulates emitted bytes and returns them as
    /// `RunOutcome::Output`; otherwise each byte is written directly to the
    /// host's stdout and `RunOutcome::WrittenToStdout` is returned.
    pub fn run(
        &mut self,
        program: &[u8],
        stdin: Option<&[u8]>,
        time_limit: Option<Duration>,
        buffer_stdout: bool,
    ) -> Result<RunOutcome, InterpError> {
        self.tape.iter_mut().for_each(|cell| *cell = 0);

        let jump_table = build_jump_table(program)?;
        let mut input_queue: VecDeque<u8> =
            stdin.map(|bytes| bytes.iter().copied().collect()).unwrap_or_default();

        let mut ptr: isize = 0;
        let mut ip: usize = 0;
        let mut output = Vec::new();
        let start = time_limit.map(|_| Instant::now());
        let stdout = std::io::stdout();

        while ip < program.len() {
            match program[ip] {
                b'>' => {
                    let run_len = 1 + count_trailing_duplicates(program, ip);
                    ptr = ptr.wrapping_add(run_len as isize);
                    ip += run_len;
                }
                b'<' => {
                    let run_len = 1 + count_trailing_duplicates(program, ip);
                    ptr = ptr.wrapping_sub(run_len as isize);
                    ip += run_len;
                }
                b'+' => {
                    let run_len = 1 + count_trailing_duplicates(program, ip);
                    self.bump(ptr, run_len, 1)?;
                    ip += run_len;
                }
                b'-' => {
                    let run_len = 1 + count_trailing_duplicates(program, ip);
                    self.bump(ptr, run_len, -1)?;
                    ip += run_len;
                }
                b'.' => {
                    let value = self.get(ptr)?;
                    if buffer_stdout {
                        output.push(value);
                    } else {
                        let _ = stdout.lock().write_all(&[value]);
                    }
                    ip += 1;
                }
                b',' => {
                    if let Some(byte) = input_queue.pop_front() {
                        if byte != 0 {
                            self.put(ptr, byte)?;
                        }
                    }
                    ip += 1;
                }
                b'[' => {
                    if self.get(ptr)? == 0 {
                        ip = jump_table[ip].expect("jump table built for every bracket") + 1;
                    } else {
                        ip += 1;
                    }
                }
                b']' => {
                    if self.get(ptr)? != 0 {
                        ip = jump_table[ip].expect("jump table built for every bracket");
                    } else {
                        ip += 1;
                    }
                }
                _ => ip += 1,
            }

            if let (Some(limit), Some(start)) = (time_limit, start) {
                if start.elapsed() > limit {
                    return Err(InterpError::Timeout(limit));
                }
            }
        }

        if buffer_stdout {
            Ok(RunOutcome::Output(output))
        } else {
            Ok(RunOutcome::WrittenToStdout)
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new(DEFAULT_TAPE_SIZE)
    }
}
