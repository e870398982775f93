use std::sync::Arc;

use rs_fuel_core::config::Config;
use rs_fuel_core::datasets::dictionary::{BuildOptions, Dictionary};
use rs_fuel_core::datasets::one_billion_word::OneBillionWord;
use rs_fuel_core::datasets::Preprocess;
use rs_fuel_core::datasets::text_file::{TextFile, TextFileOptions};
use rs_fuel_core::io::list_files;
use rs_fuel_core::streams::ngram::NGramStream;
use rs_fuel_core::streams::{DataStream, IterationScheme};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Data root comes from FUEL_DATA_PATH, "./data" by default
    let config = Config::from_env();

    // Every .txt file in the data root is part of the corpus
    let files: Vec<_> = list_files(&config.data_path, "txt")?
        .into_iter()
        .map(|name| config.resolve(name))
        .collect();
    if files.is_empty() {
        println!("No .txt corpus found in {}", config.data_path.display());
        return Ok(());
    }

    // Build a lowercase word vocabulary of at most 10 000 entries,
    // <UNK>, <S> and </S> get the first ids
    let lowercase: Preprocess = Arc::new(|s: &str| s.to_lowercase());
    let build_options = BuildOptions {
        preprocess: Some(lowercase.clone()),
        max_size: Some(10_000),
        ..BuildOptions::default()
    };
    let dictionary = Arc::new(Dictionary::build(&files, &build_options)?);
    dictionary.save(config.resolve("dictionary.bin"))?;
    println!("Dictionary: {} tokens", dictionary.len());

    // Numberize the corpus, one sentence per line
    let options = TextFileOptions {
        preprocess: Some(lowercase),
        ..TextFileOptions::default()
    };
    let text = TextFile::new(&files, dictionary.clone(), options.clone())?;

    let mut sentences = DataStream::new(text)?;
    for (i, example) in sentences.epoch_iter().take(3).enumerate() {
        println!("Sentence {}: {:?}", i + 1, example?);
    }
    sentences.reset()?;

    // Trigrams, refilled from shuffled batches of 64 sentences
    let batches = sentences.batched(IterationScheme::ShuffledConstant { batch_size: 64, seed: 1234 })?;
    let mut trigrams = NGramStream::with_default_target(3, batches)?;
    println!("Sources: {:?}", trigrams.sources());

    let mut total = 0;
    for (i, batch) in trigrams.batches(128).enumerate() {
        let batch = batch?;
        if i == 0 {
            for (features, target) in batch.features.to_rows().iter().zip(batch.targets.data()).take(5) {
                println!("{:?} -> {}", features, target);
            }
        }
        total += batch.len();
    }
    println!("Trigrams in one epoch: {}", total);

    // Invalid partitions are rejected before any file is opened
    match OneBillionWord::from_name("training", &[0], dictionary.clone(), options.clone(), &config) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("Partition 0 is not a training partition: {}", e),
    }

    // Unknown subsets too
    match OneBillionWord::from_name("test", &[1], dictionary, options, &config) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{}", e),
    }

    Ok(())
}
