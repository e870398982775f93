//! Streams pulling data out of datasets.
//!
//! This module provides:
//! - `DataStream`: one example at a time from a `Dataset`
//! - `BatchStream`: fixed-size, optionally shuffled, batches of examples
//! - `SentenceSource`: the refill capability consumed by `NGramStream`
//! - `NGramStream`: sliding-window n-grams with next-token targets

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::datasets::{Dataset, Sentence};
use crate::error::{Result, StreamError};

/// Sliding-window n-gram extraction.
pub mod ngram;

/// Dense integer arrays returned to consumers.
pub mod array;

/// Supplies batches of sentences on demand.
///
/// A batch holds one list of sentences per source, all of the same length.
pub trait SentenceSource {
	/// Names of the sources, in batch order.
	fn sources(&self) -> &[String];

	/// Returns the next batch, or `None` once the source is exhausted.
	fn next_batch(&mut self) -> Result<Option<Vec<Vec<Sentence>>>>;

	/// Starts over from the first batch.
	fn reset(&mut self) -> Result<()>;
}

/// How examples are grouped into batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationScheme {
	/// Batches of `batch_size` examples in dataset order.
	Constant { batch_size: usize },
	/// Batches of `batch_size` examples, each batch shuffled with a
	/// generator seeded from `seed`.
	ShuffledConstant { batch_size: usize, seed: u64 },
}

impl IterationScheme {
	pub fn batch_size(&self) -> usize {
		match self {
			IterationScheme::Constant { batch_size } => *batch_size,
			IterationScheme::ShuffledConstant { batch_size, .. } => *batch_size,
		}
	}
}

/// Iterates a [`Dataset`] one example at a time.
pub struct DataStream<D: Dataset> {
	dataset: D,
	state: D::State,
}

impl<D: Dataset> DataStream<D> {
	/// Opens a traversal of `dataset`.
	pub fn new(dataset: D) -> Result<Self> {
		let state = dataset.open()?;
		Ok(Self { dataset, state })
	}

	pub fn sources(&self) -> &[String] {
		self.dataset.sources()
	}

	pub fn dataset(&self) -> &D {
		&self.dataset
	}

	/// Returns the next example, one value per source.
	pub fn get_data(&mut self) -> Result<Vec<Sentence>> {
		self.dataset.get_data(&mut self.state, None)
	}

	/// Restarts the traversal from the beginning.
	pub fn reset(&mut self) -> Result<()> {
		self.dataset.reset(&mut self.state)
	}

	/// Iterates over the remaining examples of the current epoch.
	///
	/// Stops at `EndOfData`; any other error is yielded once.
	pub fn epoch_iter(&mut self) -> EpochIterator<'_, D> {
		EpochIterator { stream: self, done: false }
	}

	/// Groups examples into batches following `scheme`.
	pub fn batched(self, scheme: IterationScheme) -> Result<BatchStream<D>> {
		BatchStream::new(self, scheme)
	}
}

pub struct EpochIterator<'a, D: Dataset> {
	stream: &'a mut DataStream<D>,
	done: bool,
}

impl<D: Dataset> Iterator for EpochIterator<'_, D> {
	type Item = Result<Vec<Sentence>>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		match self.stream.get_data() {
			Ok(example) => Some(Ok(example)),
			Err(StreamError::EndOfData) => {
				self.done = true;
				None
			}
			Err(err) => {
				self.done = true;
				Some(Err(err))
			}
		}
	}
}

/// A [`DataStream`] read in batches.
///
/// With `ShuffledConstant` the generator is seeded once: successive
/// epochs are shuffled differently, but the sequence of epochs is the
/// same for a given seed.
pub struct BatchStream<D: Dataset> {
	stream: DataStream<D>,
	scheme: IterationScheme,
	rng: Option<StdRng>,
}

impl<D: Dataset> BatchStream<D> {
	/// # Errors
	/// Returns `Configuration` if the batch size is zero.
	pub fn new(stream: DataStream<D>, scheme: IterationScheme) -> Result<Self> {
		if scheme.batch_size() == 0 {
			return Err(StreamError::Configuration("batch size must be >= 1".to_owned()));
		}
		let rng = match scheme {
			IterationScheme::Constant { .. } => None,
			IterationScheme::ShuffledConstant { seed, .. } => Some(StdRng::seed_from_u64(seed)),
		};
		Ok(Self { stream, scheme, rng })
	}

	pub fn scheme(&self) -> IterationScheme {
		self.scheme
	}
}

impl<D: Dataset> SentenceSource for BatchStream<D> {
	fn sources(&self) -> &[String] {
		self.stream.sources()
	}

	fn next_batch(&mut self) -> Result<Option<Vec<Vec<Sentence>>>> {
		let batch_size = self.scheme.batch_size();
		let mut examples = Vec::with_capacity(batch_size);
		while examples.len() < batch_size {
			match self.stream.get_data() {
				Ok(example) => examples.push(example),
				Err(StreamError::EndOfData) => break,
				Err(err) => return Err(err),
			}
		}
		if examples.is_empty() {
			return Ok(None);
		}

		if let Some(rng) = self.rng.as_mut() {
			examples.shuffle(rng);
		}

		// Examples hold one value per source; batches hold one list per source
		let mut batch = vec![Vec::with_capacity(examples.len()); self.sources().len()];
		for example in examples {
			for (column, value) in batch.iter_mut().zip(example) {
				column.push(value);
			}
		}
		debug!("batch of {} examples read", batch.first().map_or(0, Vec::len));
		Ok(Some(batch))
	}

	fn reset(&mut self) -> Result<()> {
		self.stream.reset()
	}
}

/// In-memory batches, replayed in order.
pub struct MemorySource {
	sources: Vec<String>,
	batches: Vec<Vec<Vec<Sentence>>>,
	position: usize,
}

impl MemorySource {
	/// Single-source batches named `features`.
	pub fn new(batches: Vec<Vec<Sentence>>) -> Self {
		Self::with_sources(
			vec!["features".to_owned()],
			batches.into_iter().map(|batch| vec![batch]).collect(),
		)
	}

	/// Batches with one list of sentences per source.
	pub fn with_sources(sources: Vec<String>, batches: Vec<Vec<Vec<Sentence>>>) -> Self {
		Self { sources, batches, position: 0 }
	}
}

impl SentenceSource for MemorySource {
	fn sources(&self) -> &[String] {
		&self.sources
	}

	fn next_batch(&mut self) -> Result<Option<Vec<Vec<Sentence>>>> {
		let batch = self.batches.get(self.position).cloned();
		if batch.is_some() {
			self.position += 1;
		}
		Ok(batch)
	}

	fn reset(&mut self) -> Result<()> {
		self.position = 0;
		Ok(())
	}
}
