//! Text dataset streaming library.
//!
//! This crate turns line-oriented text corpora into batches of integer
//! encoded training examples, including:
//! - Dictionary loading, caching and construction from a corpus
//! - Word-level and character-level text numberization
//! - The One Billion Word benchmark partition layout
//! - Batched, optionally shuffled, sentence streams
//! - Sliding-window n-gram extraction with next-token targets
//!
//! All iteration is pull-based: each `get_data` call either returns data
//! or fails with [`StreamError::EndOfData`].

/// Datasets (text files, named corpora) and the token dictionary.
pub mod datasets;

/// Streams built on top of datasets (batching, n-gram windowing).
pub mod streams;

/// Crate-wide error type.
pub mod error;

/// Data root configuration.
pub mod config;

/// I/O utilities (file loading, path helpers).
pub mod io;

pub use error::{Result, StreamError};
