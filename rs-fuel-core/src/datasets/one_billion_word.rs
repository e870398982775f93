use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use super::dictionary::Dictionary;
use super::text_file::{LineCursor, TextFile, TextFileOptions};
use super::{Dataset, Sentence};
use crate::config::Config;
use crate::error::{Result, StreamError};

const CORPUS_DIR: &str = "1-billion-word";

/// Partition set of the One Billion Word benchmark.
///
/// The corpus is split into 100 partitions, one of which is the held-out
/// set. The held-out set is further divided into 50 partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subset {
	Training,
	Heldout,
}

impl Subset {
	/// Partition indices accepted for this subset.
	pub fn valid_partitions(&self) -> RangeInclusive<u32> {
		match self {
			Subset::Training => 1..=99,
			Subset::Heldout => 0..=49,
		}
	}

	/// Path of one partition under the configured data root.
	///
	/// # Errors
	/// Returns `Configuration` if `partition` is out of range.
	pub fn path_for(&self, partition: u32, config: &Config) -> Result<PathBuf> {
		if !self.valid_partitions().contains(&partition) {
			let range = self.valid_partitions();
			return Err(StreamError::Configuration(format!(
				"partition {partition} of the {self} set is outside [{}, {}]",
				range.start(),
				range.end()
			)));
		}
		let (directory, file) = match self {
			Subset::Training => (
				"training-monolingual.tokenized.shuffled",
				format!("news.en-{partition:05}-of-00100"),
			),
			Subset::Heldout => (
				"heldout-monolingual.tokenized.shuffled",
				format!("news.en.heldout-{partition:05}-of-00050"),
			),
		};
		Ok(config.resolve(CORPUS_DIR).join(directory).join(file))
	}
}

impl FromStr for Subset {
	type Err = StreamError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"training" => Ok(Subset::Training),
			"heldout" => Ok(Subset::Heldout),
			other => Err(StreamError::Configuration(format!(
				"unknown subset {other:?} (expected \"training\" or \"heldout\")"
			))),
		}
	}
}

impl fmt::Display for Subset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Subset::Training => f.write_str("training"),
			Subset::Heldout => f.write_str("heldout"),
		}
	}
}

/// Google's One Billion Word benchmark.
///
/// Resolves partitions to files under `<data_path>/1-billion-word` and
/// reads them through a [`TextFile`]. The dictionary is expected to
/// contain `<S>`, `</S>` and `<UNK>` unless `options` says otherwise.
pub struct OneBillionWord {
	subset: Subset,
	text: TextFile,
}

impl OneBillionWord {
	/// # Errors
	/// Returns `Configuration` if any partition is out of range for
	/// `subset`, or if `TextFile` validation fails.
	pub fn new(
		subset: Subset,
		partitions: &[u32],
		dictionary: Arc<Dictionary>,
		options: TextFileOptions,
		config: &Config,
	) -> Result<Self> {
		let files = partitions
			.iter()
			.map(|partition| subset.path_for(*partition, config))
			.collect::<Result<Vec<_>>>()?;
		let text = TextFile::new(files, dictionary, options)?;
		Ok(Self { subset, text })
	}

	/// Same as [`OneBillionWord::new`] with the subset given by name.
	pub fn from_name(
		which_set: &str,
		partitions: &[u32],
		dictionary: Arc<Dictionary>,
		options: TextFileOptions,
		config: &Config,
	) -> Result<Self> {
		Self::new(which_set.parse()?, partitions, dictionary, options, config)
	}

	pub fn subset(&self) -> Subset {
		self.subset
	}

	pub fn files(&self) -> &[PathBuf] {
		self.text.files()
	}

	pub fn into_inner(self) -> TextFile {
		self.text
	}
}

impl Dataset for OneBillionWord {
	type State = LineCursor;

	fn sources(&self) -> &[String] {
		self.text.sources()
	}

	fn open(&self) -> Result<LineCursor> {
		self.text.open()
	}

	fn get_data(&self, state: &mut LineCursor, request: Option<usize>) -> Result<Vec<Sentence>> {
		self.text.get_data(state, request)
	}
}
