use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::text_file::for_each_token;
use super::{Level, Preprocess};
use crate::error::{Result, StreamError};
use crate::io::{build_output_path, read_file};

/// Mapping from token strings to non-negative integer ids.
///
/// A dictionary is built or loaded once and then only read. Datasets hold
/// it behind an `Arc` so several traversals can share it.
///
/// # Invariants
/// - Ids are never mutated after construction
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Dictionary {
	tokens: HashMap<String, u32>,
}

/// Parameters for [`Dictionary::build`].
#[derive(Clone)]
pub struct BuildOptions {
	/// Tokenization granularity.
	pub level: Level,
	/// Applied to every line before tokenization.
	pub preprocess: Option<Preprocess>,
	/// Tokens assigned ids `0..specials.len()`, in order.
	pub specials: Vec<String>,
	/// Upper bound on the number of entries, specials included.
	pub max_size: Option<usize>,
}

impl Default for BuildOptions {
	fn default() -> Self {
		Self {
			level: Level::Word,
			preprocess: None,
			specials: vec!["<UNK>".to_owned(), "<S>".to_owned(), "</S>".to_owned()],
			max_size: None,
		}
	}
}

impl Dictionary {
	/// Wraps an existing mapping.
	pub fn from_map(tokens: HashMap<String, u32>) -> Self {
		Self { tokens }
	}

	/// Returns the id of `token`, if present.
	pub fn lookup(&self, token: &str) -> Option<u32> {
		self.tokens.get(token).copied()
	}

	/// Returns the id of `token`, or `fallback` when it is absent.
	pub fn lookup_or(&self, token: &str, fallback: u32) -> u32 {
		self.lookup(token).unwrap_or(fallback)
	}

	pub fn contains(&self, token: &str) -> bool {
		self.tokens.contains_key(token)
	}

	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// Loads a dictionary from disk.
	///
	/// - `.bin` files are decoded with `postcard`.
	/// - Any other file is read as a text vocabulary, one `token id` pair
	///   per line. A `.bin` cache is written next to it and reused by the
	///   next load of the same path.
	///
	/// # Errors
	/// - `Configuration` if a text line is not a `token id` pair.
	/// - `Io` / `Serialization` on read or decode failures.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		if path.extension().is_some_and(|ext| ext == "bin") {
			return Self::load_binary(path);
		}

		let binary_path = build_output_path(path, "bin")?;
		if binary_path.exists() {
			return Self::load_binary(&binary_path);
		}

		let dictionary = Self::parse_text(path)?;
		dictionary.save(&binary_path)?;
		Ok(dictionary)
	}

	/// Serializes the dictionary with `postcard`.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let bytes = postcard::to_stdvec(self)?;
		std::fs::write(path.as_ref(), bytes)?;
		debug!("dictionary of {} tokens saved to {}", self.len(), path.as_ref().display());
		Ok(())
	}

	fn load_binary(path: &Path) -> Result<Self> {
		let bytes = std::fs::read(path)?;
		let dictionary: Self = postcard::from_bytes(&bytes)?;
		debug!("dictionary of {} tokens loaded from {}", dictionary.len(), path.display());
		Ok(dictionary)
	}

	fn parse_text(path: &Path) -> Result<Self> {
		let mut tokens = HashMap::new();
		for (number, line) in read_file(path)?.iter().enumerate() {
			let line = line.trim();
			if line.is_empty() {
				continue;
			}
			let parsed = line
				.rsplit_once(char::is_whitespace)
				.and_then(|(token, id)| Some((token.trim_end(), id.parse::<u32>().ok()?)));
			match parsed {
				Some((token, id)) if !token.is_empty() => {
					tokens.insert(token.to_owned(), id);
				}
				_ => {
					return Err(StreamError::Configuration(format!(
						"{}:{}: expected `token id`, got {line:?}",
						path.display(),
						number + 1
					)));
				}
			}
		}
		debug!("dictionary of {} tokens parsed from {}", tokens.len(), path.display());
		Ok(Self { tokens })
	}

	/// Builds a dictionary from the tokens of a corpus.
	///
	/// Lines are split into chunks (based on CPU cores * factor), counted on
	/// worker threads and merged. Specials come first, then tokens by
	/// descending count, ties broken alphabetically so the result is
	/// deterministic.
	///
	/// # Errors
	/// - `Configuration` if `max_size` cannot hold the specials.
	/// - `Io` if a file cannot be read or a worker fails.
	pub fn build<P: AsRef<Path>>(files: &[P], options: &BuildOptions) -> Result<Self> {
		if let Some(max_size) = options.max_size {
			if max_size < options.specials.len() {
				return Err(StreamError::Configuration(format!(
					"max_size {max_size} cannot hold the {} special tokens",
					options.specials.len()
				)));
			}
		}

		let mut lines = Vec::new();
		for file in files {
			lines.extend(read_file(file)?);
		}

		let counts = Self::count_tokens(lines, options)?;

		let mut tokens = HashMap::new();
		for special in &options.specials {
			let id = tokens.len() as u32;
			tokens.entry(special.clone()).or_insert(id);
		}

		let mut ranked: Vec<(String, usize)> = counts
			.into_iter()
			.filter(|(token, _)| !tokens.contains_key(token))
			.collect();
		ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

		let limit = options.max_size.unwrap_or(usize::MAX);
		for (token, _) in ranked {
			if tokens.len() >= limit {
				break;
			}
			let id = tokens.len() as u32;
			tokens.insert(token, id);
		}

		info!("built dictionary of {} tokens from {} files", tokens.len(), files.len());
		Ok(Self { tokens })
	}

	fn count_tokens(lines: Vec<String>, options: &BuildOptions) -> Result<HashMap<String, usize>> {
		let chunks = num_cpus::get() * 8;
		let chunk_size = lines.len().div_ceil(chunks).max(1);

		let (tx, rx) = mpsc::channel();
		let mut workers = Vec::new();
		for chunk in lines.chunks(chunk_size) {
			let tx = tx.clone();
			let chunk: Vec<String> = chunk.to_vec();
			let level = options.level;
			let preprocess = options.preprocess.clone();

			workers.push(thread::spawn(move || {
				let mut partial: HashMap<String, usize> = HashMap::new();
				for line in chunk {
					let line = match &preprocess {
						Some(preprocess) => preprocess(&line),
						None => line,
					};
					for_each_token(&line, level, |token| {
						*partial.entry(token.to_owned()).or_insert(0) += 1;
					});
				}
				// The receiver outlives every worker
				let _ = tx.send(partial);
			}));
		}
		drop(tx);

		let mut counts: HashMap<String, usize> = HashMap::new();
		for partial in rx.iter() {
			for (token, count) in partial {
				*counts.entry(token).or_insert(0) += count;
			}
		}

		for worker in workers {
			worker.join().map_err(|_| {
				StreamError::Io(std::io::Error::other("dictionary worker panicked"))
			})?;
		}

		Ok(counts)
	}
}

impl FromIterator<(String, u32)> for Dictionary {
	fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
		Self { tokens: iter.into_iter().collect() }
	}
}
