//! Indexing and retrieval core for a code-intelligence backend: source repo
//! → typed IR → chunks → five specialized indexes → intent-aware fusion
//! retrieval. Grounded on the teacher's top-level module layout
//! (`cache`, `chunk`, `config`, `error`, `indexing`, `ir`, `logging`,
//! `parsing`, `retrieve`, `semantic`, `storage`, `symbol`, `types`).

pub mod cache;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod indexing;
pub mod ir;
pub mod logging;
pub mod parsing;
pub mod retrieve;
pub mod semantic;
pub mod storage;
pub mod symbol;
pub mod types;
