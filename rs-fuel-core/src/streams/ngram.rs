use std::collections::VecDeque;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::SentenceSource;
use super::array::IntArray;
use crate::datasets::Sentence;
use crate::error::{Result, StreamError};

/// Default name of the target source.
pub const DEFAULT_TARGET_SOURCE: &str = "targets";

/// One batch of n-grams and the token following each of them.
///
/// - `features`: shape `[n, ngram_order]`
/// - `targets`: shape `[n]`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NGramBatch {
	pub features: IntArray,
	pub targets: IntArray,
}

impl NGramBatch {
	/// Number of examples in the batch.
	pub fn len(&self) -> usize {
		self.targets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Returns n-grams from a stream of sentences.
///
/// Sentences pulled from `upstream` are kept in a cache. Each request
/// reads windows of `ngram_order` tokens from the head sentence, paired
/// with the token that follows each window, moving on to the next sentence
/// (and refilling the cache from upstream) until the request is satisfied.
///
/// A sentence of length `L` yields `max(0, L - ngram_order)` windows.
///
/// # Invariants
/// - No window spans two sentences
/// - Every cached sentence still has unconsumed tokens; the head is evicted
///   as soon as its last window is emitted (or at once if it has none)
/// - `offset` (windows already emitted from the head) is below the head's
///   window count, or zero for a head without windows
/// - The cache is refilled only when empty
///
/// Refilling is lazy: an emptied cache is refilled when the next window is
/// needed (later in the same request, or on the next call), so an upstream
/// error surfaces at that point rather than right after the eviction.
pub struct NGramStream<U: SentenceSource> {
	upstream: U,
	ngram_order: usize,
	sources: Vec<String>,
	cache: VecDeque<Sentence>,
	offset: usize,
}

impl<U: SentenceSource> NGramStream<U> {
	/// Wraps `upstream`, adding a `target_source` source.
	///
	/// # Errors
	/// Returns `Configuration` if `ngram_order` is zero, if `upstream` does
	/// not provide exactly one source, or if `target_source` collides with it.
	pub fn new(ngram_order: usize, upstream: U, target_source: &str) -> Result<Self> {
		if ngram_order == 0 {
			return Err(StreamError::Configuration("ngram order must be >= 1".to_owned()));
		}
		let upstream_sources = upstream.sources();
		if upstream_sources.len() != 1 {
			return Err(StreamError::Configuration(format!(
				"n-gram streams need exactly one upstream source, got {:?}",
				upstream_sources
			)));
		}
		if upstream_sources[0] == target_source {
			return Err(StreamError::Configuration(format!(
				"target source {target_source:?} is already provided upstream"
			)));
		}

		let mut sources = upstream_sources.to_vec();
		sources.push(target_source.to_owned());

		Ok(Self { upstream, ngram_order, sources, cache: VecDeque::new(), offset: 0 })
	}

	/// Same as [`NGramStream::new`] with targets named `targets`.
	pub fn with_default_target(ngram_order: usize, upstream: U) -> Result<Self> {
		Self::new(ngram_order, upstream, DEFAULT_TARGET_SOURCE)
	}

	/// Feature source (now carrying windows) followed by the target source.
	pub fn sources(&self) -> &[String] {
		&self.sources
	}

	pub fn ngram_order(&self) -> usize {
		self.ngram_order
	}

	/// Number of sentences waiting in the cache, head included.
	pub fn cached_sentences(&self) -> usize {
		self.cache.len()
	}

	/// Returns up to `request` examples.
	///
	/// Fewer examples are returned only when upstream runs dry mid-request.
	///
	/// # Errors
	/// - `InvalidRequest` if `request` is zero.
	/// - `EndOfData` if no example at all could be produced.
	pub fn get_data(&mut self, request: usize) -> Result<NGramBatch> {
		if request == 0 {
			return Err(StreamError::InvalidRequest("request must be >= 1".to_owned()));
		}

		let order = self.ngram_order;
		let mut features = Vec::with_capacity(request * order);
		let mut targets = Vec::with_capacity(request);

		while targets.len() < request {
			if self.cache.is_empty() && !self.refill()? {
				break;
			}
			let Some(sentence) = self.cache.front() else {
				break;
			};

			let windows = sentence.len().saturating_sub(order);
			let take = windows.saturating_sub(self.offset).min(request - targets.len());
			for start in self.offset..self.offset + take {
				features.extend_from_slice(&sentence[start..start + order]);
				targets.push(sentence[start + order]);
			}
			self.offset += take;

			if self.offset >= windows {
				self.cache.pop_front();
				self.offset = 0;
			}
		}

		if targets.is_empty() {
			return Err(StreamError::EndOfData);
		}

		Ok(NGramBatch {
			features: IntArray::matrix(targets.len(), order, features),
			targets: IntArray::vector(targets),
		})
	}

	/// Iterates over batches of `request` examples until the end of data.
	pub fn batches(&mut self, request: usize) -> NGramBatches<'_, U> {
		NGramBatches { stream: self, request, done: false }
	}

	/// Drops the cache and restarts upstream.
	pub fn reset(&mut self) -> Result<()> {
		self.cache.clear();
		self.offset = 0;
		self.upstream.reset()
	}

	/// Pulls the next non-empty batch into the cache.
	///
	/// Returns `false` once upstream is exhausted.
	fn refill(&mut self) -> Result<bool> {
		loop {
			let batch = match self.upstream.next_batch() {
				Ok(Some(batch)) => batch,
				Ok(None) => return Ok(false),
				Err(err) => {
					warn!("n-gram cache refill failed: {err}");
					return Err(err);
				}
			};
			let sentences = batch.into_iter().next().unwrap_or_default();
			if sentences.is_empty() {
				continue;
			}
			debug!("n-gram cache refilled with {} sentences", sentences.len());
			self.cache.extend(sentences);
			self.offset = 0;
			return Ok(true);
		}
	}
}

pub struct NGramBatches<'a, U: SentenceSource> {
	stream: &'a mut NGramStream<U>,
	request: usize,
	done: bool,
}

impl<U: SentenceSource> Iterator for NGramBatches<'_, U> {
	type Item = Result<NGramBatch>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		match self.stream.get_data(self.request) {
			Ok(batch) => Some(Ok(batch)),
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

#[cfg(test)]
mod tests {
	use super::*;
	use crate::streams::MemorySource;

	fn stream(order: usize, batches: Vec<Vec<Sentence>>) -> NGramStream<MemorySource> {
		NGramStream::with_default_target(order, MemorySource::new(batches)).unwrap()
	}

	#[test]
	fn windows_pair_with_next_token() {
		let mut ngrams = stream(2, vec![vec![vec![5, 6, 7, 8, 1]]]);
		let batch = ngrams.get_data(10).unwrap();
		assert_eq!(batch.features.to_rows(), vec![vec![5, 6], vec![6, 7], vec![7, 8]]);
		assert_eq!(batch.targets.data(), &[7, 8, 1]);
		assert_eq!(batch.features.shape(), &[3, 2]);
		assert!(ngrams.get_data(10).unwrap_err().is_end_of_data());
	}

	#[test]
	fn exposes_feature_and_target_sources() {
		let ngrams = stream(3, vec![]);
		assert_eq!(ngrams.sources(), &["features".to_owned(), "targets".to_owned()]);
		assert_eq!(ngrams.ngram_order(), 3);
	}

	#[test]
	fn short_sentences_are_evicted_without_output() {
		let mut ngrams = stream(3, vec![vec![vec![1, 2, 3], vec![4, 5, 6, 7]]]);
		let batch = ngrams.get_data(5).unwrap();
		assert_eq!(batch.features.to_rows(), vec![vec![4, 5, 6]]);
		assert_eq!(batch.targets.data(), &[7]);
		assert_eq!(ngrams.cached_sentences(), 0);
	}

	#[test]
	fn windows_never_cross_sentences() {
		let mut ngrams = stream(2, vec![vec![vec![1, 2, 3], vec![4, 5, 6]]]);
		let batch = ngrams.get_data(4).unwrap();
		assert_eq!(batch.features.to_rows(), vec![vec![1, 2], vec![4, 5]]);
		assert_eq!(batch.targets.data(), &[3, 6]);
	}

	#[test]
	fn partial_consumption_resumes_where_it_stopped() {
		let mut ngrams = stream(1, vec![vec![vec![1, 2, 3, 4, 5]], vec![vec![6, 7, 8]]]);

		let first = ngrams.get_data(3).unwrap();
		assert_eq!(first.targets.data(), &[2, 3, 4]);
		assert_eq!(ngrams.cached_sentences(), 1);

		// Finishes the first sentence, then refills mid-request
		let second = ngrams.get_data(3).unwrap();
		assert_eq!(second.features.to_rows(), vec![vec![4], vec![6], vec![7]]);
		assert_eq!(second.targets.data(), &[5, 7, 8]);

		assert!(ngrams.get_data(1).unwrap_err().is_end_of_data());
	}

	#[test]
	fn split_requests_match_a_single_request() {
		let batches = vec![
			vec![vec![1, 2, 3, 4], vec![5, 6]],
			vec![vec![7, 8, 9, 10, 11]],
			vec![vec![12], vec![13, 14, 15]],
		];

		let whole = stream(2, batches.clone()).get_data(100).unwrap();

		let mut split = stream(2, batches);
		let mut features = Vec::new();
		let mut targets = Vec::new();
		for batch in split.batches(2) {
			let batch = batch.unwrap();
			assert!(batch.len() <= 2);
			features.extend(batch.features.to_rows());
			targets.extend_from_slice(batch.targets.data());
		}

		assert_eq!(features, whole.features.to_rows());
		assert_eq!(targets, whole.targets.data());
		assert_eq!(whole.len(), 2 + 3 + 1);
	}

	#[test]
	fn short_batch_when_upstream_runs_dry() {
		let mut ngrams = stream(1, vec![vec![vec![1, 2, 3]]]);
		let batch = ngrams.get_data(5).unwrap();
		assert_eq!(batch.len(), 2);
		assert!(ngrams.get_data(5).unwrap_err().is_end_of_data());
	}

	#[test]
	fn reset_replays_from_the_start() {
		let mut ngrams = stream(1, vec![vec![vec![1, 2, 3]]]);
		ngrams.get_data(1).unwrap();
		ngrams.reset().unwrap();
		assert_eq!(ngrams.get_data(5).unwrap().targets.data(), &[2, 3]);
	}

	#[test]
	fn invalid_construction_and_requests() {
		let err = NGramStream::with_default_target(0, MemorySource::new(vec![]));
		assert!(matches!(err, Err(StreamError::Configuration(_))));

		let two_sources = MemorySource::with_sources(vec!["a".to_owned(), "b".to_owned()], vec![]);
		let err = NGramStream::with_default_target(2, two_sources);
		assert!(matches!(err, Err(StreamError::Configuration(_))));

		let err = NGramStream::new(2, MemorySource::new(vec![]), "features");
		assert!(matches!(err, Err(StreamError::Configuration(_))));

		let mut ngrams = stream(2, vec![vec![vec![1, 2, 3]]]);
		assert!(matches!(ngrams.get_data(0), Err(StreamError::InvalidRequest(_))));
	}

	#[test]
	fn empty_upstream_is_end_of_data() {
		let mut ngrams = stream(2, vec![]);
		assert!(ngrams.get_data(1).unwrap_err().is_end_of_data());
	}
}
