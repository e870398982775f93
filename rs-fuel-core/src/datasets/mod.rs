//! Datasets producing integer-encoded sentences.
//!
//! This module provides:
//! - The token dictionary (`Dictionary`)
//! - Line-oriented text numberization (`TextFile`)
//! - The One Billion Word partition selector (`OneBillionWord`)
//! - The `Dataset` trait streams are built on

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, StreamError};

/// Immutable token-to-id mapping, loaded once and shared read-only.
pub mod dictionary;

/// Reads text files and numberizes them given a dictionary.
pub mod text_file;

/// Google's One Billion Word benchmark layout.
pub mod one_billion_word;

/// Integer-encoded sentence: `[BOS?] + tokens + [EOS?]`.
pub type Sentence = Vec<u32>;

/// Optional line normalization applied before tokenization.
pub type Preprocess = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Granularity used to split a line into tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Level {
	/// Split on whitespace, one token per word.
	#[default]
	Word,
	/// One token per character, from the first to the last non-whitespace one.
	Character,
}

impl FromStr for Level {
	type Err = StreamError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"word" => Ok(Level::Word),
			"character" => Ok(Level::Character),
			other => Err(StreamError::Configuration(format!(
				"unsupported level {other:?} (expected \"word\" or \"character\")"
			))),
		}
	}
}

impl fmt::Display for Level {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Level::Word => f.write_str("word"),
			Level::Character => f.write_str("character"),
		}
	}
}

/// A source of examples traversed through an explicit state.
///
/// `open` must return an independent traversal every time it is called:
/// no state is shared between two states returned by the same dataset.
pub trait Dataset {
	/// Traversal position.
	type State;

	/// Names of the sources each example carries, in order.
	fn sources(&self) -> &[String];

	/// Starts a new traversal from the beginning.
	fn open(&self) -> Result<Self::State>;

	/// Advances `state` and returns one value per source.
	///
	/// # Errors
	/// - `EndOfData` when the traversal is exhausted.
	/// - `InvalidRequest` when `request` is not supported by the dataset.
	fn get_data(&self, state: &mut Self::State, request: Option<usize>) -> Result<Vec<Sentence>>;

	/// Replaces `state` with a fresh traversal.
	fn reset(&self, state: &mut Self::State) -> Result<()> {
		*state = self.open()?;
		Ok(())
	}
}
