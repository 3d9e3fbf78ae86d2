// snarec — snare glue compiler
//
// Library root. Stages in pipeline order: lexer → parser → classify (one
// file) → batch (many files) → codegen, with the directive registry and the
// diagnostic engine shared across all of them.

pub mod ast;
pub mod batch;
pub mod classify;
pub mod codegen;
pub mod consumer;
pub mod data;
pub mod diag;
pub mod directive;
pub mod engine;
pub mod id;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod source;
