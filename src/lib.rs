//
// genetic - genetic programming experiments
// Copyright (c) 2019 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Library: evolving Brainfuck programs towards a target output.
//

pub mod codec;
pub mod error;
pub mod genome;
pub mod interp;
pub mod population;
