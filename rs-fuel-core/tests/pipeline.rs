use std::fs;
use std::sync::Arc;

use rs_fuel_core::config::Config;
use rs_fuel_core::datasets::dictionary::{BuildOptions, Dictionary};
use rs_fuel_core::datasets::one_billion_word::{OneBillionWord, Subset};
use rs_fuel_core::datasets::text_file::{TextFile, TextFileOptions};
use rs_fuel_core::datasets::Level;
use rs_fuel_core::streams::ngram::NGramStream;
use rs_fuel_core::streams::{DataStream, IterationScheme};
use rs_fuel_core::StreamError;

#[test]
fn text_file_to_trigrams() {
	let dir = tempfile::tempdir().unwrap();
	let corpus = dir.path().join("corpus.txt");
	fs::write(&corpus, "the cat sat\nthe dog\nthe cat ran away\n").unwrap();

	let dictionary = Arc::new(Dictionary::build(&[&corpus], &BuildOptions::default()).unwrap());
	let the = dictionary.lookup("the").unwrap();
	let cat = dictionary.lookup("cat").unwrap();
	let bos = dictionary.lookup("<S>").unwrap();
	let eos = dictionary.lookup("</S>").unwrap();

	let text = TextFile::new([&corpus], Arc::clone(&dictionary), TextFileOptions::default()).unwrap();
	let batches = DataStream::new(text).unwrap().batched(IterationScheme::Constant { batch_size: 2 }).unwrap();
	let mut ngrams = NGramStream::with_default_target(3, batches).unwrap();

	// <S> the cat sat </S> -> 2 windows, <S> the dog </S> -> 1, <S> the cat ran away </S> -> 3
	let first = ngrams.get_data(4).unwrap();
	assert_eq!(first.len(), 4);
	assert_eq!(first.features.row(0), Some(&[bos, the, cat][..]));
	assert_eq!(first.targets.data()[1], eos);

	let rest = ngrams.get_data(10).unwrap();
	assert_eq!(rest.len(), 2);
	assert_eq!(rest.targets.data().last(), Some(&eos));
	assert!(ngrams.get_data(1).unwrap_err().is_end_of_data());

	ngrams.reset().unwrap();
	assert_eq!(ngrams.batches(1).count(), 6);
}

#[test]
fn one_billion_word_from_saved_vocabulary() {
	let dir = tempfile::tempdir().unwrap();
	let config = Config::new(dir.path());

	let vocabulary = dir.path().join("vocab.txt");
	fs::write(&vocabulary, "<UNK> 0\n<S> 1\n</S> 2\nh 3\ni 4\n").unwrap();
	let dictionary = Arc::new(Dictionary::load(&vocabulary).unwrap());

	let path = Subset::Heldout.path_for(4, &config).unwrap();
	fs::create_dir_all(path.parent().unwrap()).unwrap();
	fs::write(&path, "Hi!\n").unwrap();

	let options = TextFileOptions {
		level: "character".parse::<Level>().unwrap(),
		preprocess: Some(Arc::new(|s: &str| s.to_lowercase())),
		..TextFileOptions::default()
	};
	let corpus = OneBillionWord::new(Subset::Heldout, &[4], dictionary, options, &config).unwrap();
	let mut stream = DataStream::new(corpus).unwrap();
	assert_eq!(stream.get_data().unwrap(), vec![vec![1, 3, 4, 0, 2]]);

	let batches = stream.batched(IterationScheme::ShuffledConstant { batch_size: 4, seed: 7 }).unwrap();
	let mut ngrams = NGramStream::new(2, batches, "next").unwrap();
	assert_eq!(ngrams.sources(), &["features".to_owned(), "next".to_owned()]);
	assert!(matches!(ngrams.get_data(1), Err(StreamError::EndOfData)));
}
