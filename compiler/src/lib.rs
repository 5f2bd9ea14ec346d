// fec — FIR Engine Compiler
//
// Library root. Compiles a declarative FIR filter-bank specification onto a
// small set of shared, time-multiplexed MAC pipelines: front end (lexer,
// parser, spec model), binder, lowering (FIFO layout, coefficient encoding,
// control vectors), and renderers (Verilog, HTML report).

pub mod ast;
pub mod bind;
pub mod codegen;
pub mod coeff;
pub mod ctrl;
pub mod diag;
pub mod id;
pub mod layout;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod report;
pub mod spec;
