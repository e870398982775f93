use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use super::dictionary::Dictionary;
use super::{Dataset, Level, Preprocess, Sentence};
use crate::error::{Result, StreamError};

/// Splits `line` into tokens according to `level` and feeds them to `f`.
///
/// - `Word`: whitespace-separated words
/// - `Character`: every character between the first and the last
///   non-whitespace one, inner spaces included
pub(crate) fn for_each_token<F: FnMut(&str)>(line: &str, level: Level, mut f: F) {
	match level {
		Level::Word => line.split_whitespace().for_each(f),
		Level::Character => {
			let mut buffer = [0u8; 4];
			for c in line.trim().chars() {
				f(c.encode_utf8(&mut buffer));
			}
		}
	}
}

/// Construction parameters of a [`TextFile`].
#[derive(Clone)]
pub struct TextFileOptions {
	/// Prepended to every sentence. `None` disables it.
	pub bos_token: Option<String>,
	/// Appended to every sentence. `None` disables it.
	pub eos_token: Option<String>,
	/// Fallback for tokens missing from the dictionary.
	pub unk_token: String,
	pub level: Level,
	/// Applied to each line (terminator removed) before tokenization.
	pub preprocess: Option<Preprocess>,
}

impl Default for TextFileOptions {
	fn default() -> Self {
		Self {
			bos_token: Some("<S>".to_owned()),
			eos_token: Some("</S>".to_owned()),
			unk_token: "<UNK>".to_owned(),
			level: Level::Word,
			preprocess: None,
		}
	}
}

/// Lazy cursor over the lines of a sequence of files.
///
/// The position is explicit: `file_index` is the file being read and
/// `line_offset` the number of lines already returned from it. Files are
/// opened on the first line request and closed as soon as they are consumed.
///
/// # States
/// - Iterating: lines remain (or may remain) to be read
/// - Exhausted: the last file was consumed; every further call returns `None`
pub struct LineCursor {
	files: Arc<[PathBuf]>,
	file_index: usize,
	line_offset: usize,
	reader: Option<BufReader<File>>,
	exhausted: bool,
}

impl LineCursor {
	fn new(files: Arc<[PathBuf]>) -> Self {
		Self { files, file_index: 0, line_offset: 0, reader: None, exhausted: false }
	}

	/// Returns `(file_index, line_offset)`.
	pub fn position(&self) -> (usize, usize) {
		(self.file_index, self.line_offset)
	}

	pub fn is_exhausted(&self) -> bool {
		self.exhausted
	}

	/// Reads the next line, without its terminator.
	///
	/// Returns `Ok(None)` once every file has been consumed.
	pub fn next_line(&mut self) -> Result<Option<String>> {
		loop {
			if self.exhausted {
				return Ok(None);
			}
			let Some(path) = self.files.get(self.file_index) else {
				self.exhausted = true;
				return Ok(None);
			};

			if self.reader.is_none() {
				debug!("opening {}", path.display());
				self.reader = Some(BufReader::new(File::open(path)?));
			}
			let Some(reader) = self.reader.as_mut() else {
				continue;
			};

			let mut line = String::new();
			if reader.read_line(&mut line)? == 0 {
				self.reader = None;
				self.file_index += 1;
				self.line_offset = 0;
				continue;
			}

			if line.ends_with('\n') {
				line.pop();
				if line.ends_with('\r') {
					line.pop();
				}
			}
			self.line_offset += 1;
			return Ok(Some(line));
		}
	}
}

impl Iterator for LineCursor {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		self.next_line().transpose()
	}
}

/// Reads text files and numberizes them given a dictionary.
///
/// Each file is expected to hold one sentence per line. Every line becomes
/// one example: `[BOS?] + ids + [EOS?]`, where tokens missing from the
/// dictionary map to the unknown-token id.
///
/// # Invariants
/// - BOS/EOS (when set) and UNK tokens exist in the dictionary
/// - Traversals returned by `open` never share state
pub struct TextFile {
	files: Arc<[PathBuf]>,
	dictionary: Arc<Dictionary>,
	bos_id: Option<u32>,
	eos_id: Option<u32>,
	unk_id: u32,
	level: Level,
	preprocess: Option<Preprocess>,
	sources: Vec<String>,
}

impl TextFile {
	/// Creates a dataset over `files`, read in the given order.
	///
	/// # Errors
	/// Returns `Configuration` if the BOS, EOS or UNK token is missing from
	/// the dictionary.
	pub fn new<I, P>(files: I, dictionary: Arc<Dictionary>, options: TextFileOptions) -> Result<Self>
	where
		I: IntoIterator<Item = P>,
		P: AsRef<Path>,
	{
		let resolve = |role: &str, token: &str| {
			dictionary.lookup(token).ok_or_else(|| {
				StreamError::Configuration(format!("{role} token {token:?} is not in the dictionary"))
			})
		};

		let bos_id = options.bos_token.as_deref().map(|token| resolve("BOS", token)).transpose()?;
		let eos_id = options.eos_token.as_deref().map(|token| resolve("EOS", token)).transpose()?;
		let unk_id = resolve("unknown", &options.unk_token)?;

		Ok(Self {
			files: files.into_iter().map(|file| file.as_ref().to_path_buf()).collect(),
			dictionary,
			bos_id,
			eos_id,
			unk_id,
			level: options.level,
			preprocess: options.preprocess,
			sources: vec!["features".to_owned()],
		})
	}

	pub fn files(&self) -> &[PathBuf] {
		&self.files
	}

	pub fn level(&self) -> Level {
		self.level
	}

	pub fn dictionary(&self) -> &Dictionary {
		&self.dictionary
	}

	/// Numberizes a single line.
	pub fn encode(&self, line: &str) -> Sentence {
		let preprocessed;
		let line = match &self.preprocess {
			Some(preprocess) => {
				preprocessed = preprocess(line);
				preprocessed.as_str()
			}
			None => line,
		};

		let mut sentence = Vec::with_capacity(line.len() / 4 + 2);
		sentence.extend(self.bos_id);
		for_each_token(line, self.level, |token| {
			sentence.push(self.dictionary.lookup_or(token, self.unk_id));
		});
		sentence.extend(self.eos_id);
		sentence
	}
}

impl Dataset for TextFile {
	type State = LineCursor;

	fn sources(&self) -> &[String] {
		&self.sources
	}

	fn open(&self) -> Result<LineCursor> {
		Ok(LineCursor::new(Arc::clone(&self.files)))
	}

	/// Reads exactly one line from `state`.
	///
	/// # Errors
	/// - `InvalidRequest` if `request` is set: only single-item forward
	///   iteration is supported.
	/// - `EndOfData` once all files are consumed.
	fn get_data(&self, state: &mut LineCursor, request: Option<usize>) -> Result<Vec<Sentence>> {
		if let Some(request) = request {
			return Err(StreamError::InvalidRequest(format!(
				"text files are read one line at a time, got a request of {request}"
			)));
		}
		match state.next_line()? {
			Some(line) => Ok(vec![self.encode(&line)]),
			None => Err(StreamError::EndOfData),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	fn dictionary() -> Arc<Dictionary> {
		Arc::new(
			[("<UNK>", 0), ("</S>", 1), ("this", 2), ("a", 3), ("one", 4)]
				.into_iter()
				.map(|(token, id)| (token.to_owned(), id))
				.collect(),
		)
	}

	fn lowercase_options() -> TextFileOptions {
		TextFileOptions {
			bos_token: None,
			preprocess: Some(Arc::new(|s: &str| s.to_lowercase())),
			..TextFileOptions::default()
		}
	}

	#[test]
	fn numberizes_sentences_with_unknown_fallback() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("sentences.txt");
		fs::write(&path, "This is a sentence\nThis another one").unwrap();

		let text = TextFile::new([&path], dictionary(), lowercase_options()).unwrap();
		let mut state = text.open().unwrap();
		assert_eq!(text.get_data(&mut state, None).unwrap(), vec![vec![2, 0, 3, 0, 1]]);
		assert_eq!(text.get_data(&mut state, None).unwrap(), vec![vec![2, 0, 4, 1]]);
		assert!(text.get_data(&mut state, None).unwrap_err().is_end_of_data());
		assert!(state.is_exhausted());
	}

	#[test]
	fn character_level_strips_outer_whitespace() {
		let dictionary: Arc<Dictionary> = Arc::new(
			[("<UNK>", 0), ("<S>", 1), ("a", 2), ("b", 3), (" ", 4)]
				.into_iter()
				.map(|(token, id)| (token.to_owned(), id))
				.collect(),
		);
		let options = TextFileOptions {
			eos_token: None,
			level: Level::Character,
			..TextFileOptions::default()
		};
		let text = TextFile::new(Vec::<PathBuf>::new(), dictionary, options).unwrap();
		assert_eq!(text.encode("  ab c\t"), vec![1, 2, 3, 4, 0]);
	}

	#[test]
	fn missing_special_tokens_fail_at_construction() {
		let err = TextFile::new([Path::new("x")], dictionary(), TextFileOptions::default());
		assert!(matches!(err, Err(StreamError::Configuration(_))));

		let options = TextFileOptions { bos_token: None, eos_token: Some("<E>".to_owned()), ..TextFileOptions::default() };
		let err = TextFile::new([Path::new("x")], dictionary(), options);
		assert!(matches!(err, Err(StreamError::Configuration(_))));

		let options = TextFileOptions { bos_token: None, unk_token: "<OOV>".to_owned(), ..TextFileOptions::default() };
		let err = TextFile::new([Path::new("x")], dictionary(), options);
		assert!(matches!(err, Err(StreamError::Configuration(_))));
	}

	#[test]
	fn rejects_sized_requests() {
		let text = TextFile::new([Path::new("x")], dictionary(), lowercase_options()).unwrap();
		let mut state = text.open().unwrap();
		let err = text.get_data(&mut state, Some(2)).unwrap_err();
		assert!(matches!(err, StreamError::InvalidRequest(_)));
		// Nothing was read, the missing file has not been touched yet
		assert_eq!(state.position(), (0, 0));
	}

	#[test]
	fn open_restarts_from_first_file() {
		let dir = tempfile::tempdir().unwrap();
		let first = dir.path().join("first.txt");
		let second = dir.path().join("second.txt");
		fs::write(&first, "this\r\n").unwrap();
		fs::write(&second, "a\none\n").unwrap();

		let text = TextFile::new([&first, &second], dictionary(), lowercase_options()).unwrap();
		let mut state = text.open().unwrap();
		assert_eq!(text.get_data(&mut state, None).unwrap(), vec![vec![2, 1]]);
		assert_eq!(text.get_data(&mut state, None).unwrap(), vec![vec![3, 1]]);
		assert_eq!(state.position(), (1, 1));

		let mut fresh = text.open().unwrap();
		assert_eq!(text.get_data(&mut fresh, None).unwrap(), vec![vec![2, 1]]);
		assert_eq!(text.get_data(&mut state, None).unwrap(), vec![vec![4, 1]]);
	}

	#[test]
	fn missing_file_surfaces_on_first_read() {
		let dir = tempfile::tempdir().unwrap();
		let text = TextFile::new([dir.path().join("absent.txt")], dictionary(), lowercase_options()).unwrap();
		let mut state = text.open().unwrap();
		assert!(matches!(text.get_data(&mut state, None), Err(StreamError::Io(_))));
	}

	#[test]
	fn cursor_iterates_lines() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lines.txt");
		fs::write(&path, "x\n\ny").unwrap();

		let text = TextFile::new([&path], dictionary(), lowercase_options()).unwrap();
		let lines: Vec<String> = text.open().unwrap().collect::<Result<_>>().unwrap();
		assert_eq!(lines, vec!["x", "", "y"]);
	}
}
