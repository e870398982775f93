use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};
use log::{info, warn};
use serde::Deserialize;

use rs_fuel_core::config::Config;
use rs_fuel_core::datasets::dictionary::Dictionary;
use rs_fuel_core::datasets::text_file::{TextFile, TextFileOptions};
use rs_fuel_core::datasets::Level;
use rs_fuel_core::io::{list_files, normalize_folder};
use rs_fuel_core::streams::ngram::NGramStream;
use rs_fuel_core::streams::{BatchStream, DataStream, IterationScheme};
use rs_fuel_core::StreamError;

/// Vocabulary of the data root, never served as a corpus.
const DICTIONARY_FILE: &str = "dictionary.txt";

type Feed = NGramStream<BatchStream<TextFile>>;

/// Query parameters for the `/v1/batch` endpoint
#[derive(Deserialize)]
struct BatchParams {
	size: Option<usize>,
}

/// Query parameters for the `/v1/load` endpoint
#[derive(Deserialize)]
struct LoadParams {
	files: Option<String>,
	order: Option<usize>,
	level: Option<String>,
}

struct Settings {
	ngram_order: usize,
	batch_size: usize,
	default_request: usize,
}

struct SharedData {
	config: Config,
	dictionary: Arc<Dictionary>,
	settings: Settings,
	feed: Option<Feed>,
}

impl SharedData {
	/// Builds an n-gram feed over `names` (corpus files without `.txt`).
	fn load(&mut self, names: &[&str], ngram_order: usize, level: Level) -> Result<(), StreamError> {
		let files = resolve_corpora(&self.config, names)?;
		let options = TextFileOptions { level, ..TextFileOptions::default() };
		let text = TextFile::new(files, Arc::clone(&self.dictionary), options)?;
		let batches = DataStream::new(text)?.batched(IterationScheme::Constant { batch_size: self.settings.batch_size })?;
		self.feed = Some(NGramStream::with_default_target(ngram_order, batches)?);
		info!("feed of {ngram_order}-grams loaded over {}", names.join(", "));
		Ok(())
	}
}

/// Corpus names (`.txt` files of the data root, extension removed), the
/// vocabulary excluded.
fn corpus_names(data_path: &Path) -> std::io::Result<Vec<String>> {
	Ok(list_files(data_path, "txt")?
		.into_iter()
		.filter(|file| file != DICTIONARY_FILE)
		.filter_map(|file| file.strip_suffix(".txt").map(str::to_owned))
		.collect())
}

/// Resolves corpus names to files of the data root.
///
/// # Errors
/// Returns `Configuration` for names that are not plain corpus names
/// listed by `corpus_names`.
fn resolve_corpora(config: &Config, names: &[&str]) -> Result<Vec<PathBuf>, StreamError> {
	let available = corpus_names(&config.data_path)?;
	names
		.iter()
		.map(|name| {
			let plain = !name.contains(['/', '\\']) && !name.contains("..") && !Path::new(name).is_absolute();
			if !plain || !available.iter().any(|corpus| corpus == name) {
				return Err(StreamError::Configuration(format!("Unknown corpus {name:?}")));
			}
			Ok(config.resolve(format!("{name}.txt")))
		})
		.collect()
}

/// Reads a numeric setting from the environment, falling back to `default`.
fn setting(key: &str, default: usize) -> usize {
	match env::var(key).ok().map(|value| value.parse::<usize>()) {
		Some(Ok(value)) => value,
		Some(Err(_)) => {
			warn!("{key} is not a number, using {default}");
			default
		}
		None => default,
	}
}

fn error_response(err: StreamError) -> HttpResponse {
	match err {
		StreamError::EndOfData => HttpResponse::NoContent().finish(),
		StreamError::InvalidRequest(e) | StreamError::Configuration(e) => HttpResponse::BadRequest().body(e),
		e => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

/// HTTP GET endpoint `/v1/batch`
///
/// Returns the next batch of n-grams as JSON, or `204` at the end of the epoch.
#[get("/v1/batch")]
async fn get_batch(data: web::Data<Mutex<SharedData>>, query: web::Query<BatchParams>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Feed lock failed"),
	};
	let size = query.size.unwrap_or(shared_data.settings.default_request);

	let feed = match shared_data.feed.as_mut() {
		Some(feed) => feed,
		None => return HttpResponse::Conflict().body("No corpus loaded"),
	};

	match feed.get_data(size) {
		Ok(batch) => HttpResponse::Ok().json(batch),
		Err(e) => error_response(e),
	}
}

#[get("/v1/sources")]
async fn get_sources(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Feed lock failed"),
	};
	match &shared_data.feed {
		Some(feed) => HttpResponse::Ok().body(feed.sources().join("\n")),
		None => HttpResponse::Conflict().body("No corpus loaded"),
	}
}

#[get("/v1/corpora")]
async fn get_corpora(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let data_path = match data.lock() {
		Ok(m) => m.config.data_path.clone(),
		Err(_) => return HttpResponse::InternalServerError().body("Feed lock failed"),
	};
	match corpus_names(&data_path) {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list corpora"),
	}
}

#[put("/v1/reset")]
async fn put_reset(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Feed lock failed"),
	};
	match shared_data.feed.as_mut().map(|feed| feed.reset()) {
		Some(Ok(())) => HttpResponse::Ok().body("Epoch restarted"),
		Some(Err(e)) => error_response(e),
		None => HttpResponse::Conflict().body("No corpus loaded"),
	}
}

#[put("/v1/load")]
async fn put_load(data: web::Data<Mutex<SharedData>>, query: web::Query<LoadParams>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Feed lock failed"),
	};

	let query_names = match &query.files {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty corpus name"),
	};

	let names: Vec<&str> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.collect();

	let level = match query.level.as_deref().map(str::parse::<Level>).transpose() {
		Ok(level) => level.unwrap_or_default(),
		Err(e) => return error_response(e),
	};
	let order = query.order.unwrap_or(shared_data.settings.ngram_order);

	match shared_data.load(&names, order, level) {
		Ok(()) => HttpResponse::Ok().body("Corpora loaded successfully"),
		Err(e) => error_response(e),
	}
}

/// Main entry point for the server.
///
/// Loads the dictionary from the data root, wraps the shared state in a
/// `Mutex` and starts an Actix-web HTTP server.
///
/// # Environment
/// - `FUEL_DATA_PATH`: data root, `./data` by default
/// - `FUEL_BIND`: listen address, `127.0.0.1:5000` by default
/// - `FUEL_NGRAM_ORDER`, `FUEL_BATCH_SIZE`, `FUEL_REQUEST`: feed defaults
#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();

	let config = Config::new(normalize_folder(Config::from_env().data_path));
	let dictionary = Arc::new(Dictionary::load(config.resolve(DICTIONARY_FILE))?);
	info!("dictionary of {} tokens loaded from {}", dictionary.len(), config.data_path.display());

	let shared_data = SharedData {
		config,
		dictionary,
		settings: Settings {
			ngram_order: setting("FUEL_NGRAM_ORDER", 3),
			batch_size: setting("FUEL_BATCH_SIZE", 256),
			default_request: setting("FUEL_REQUEST", 128),
		},
		feed: None,
	};
	let shared_data = web::Data::new(Mutex::new(shared_data));
	let bind = env::var("FUEL_BIND").unwrap_or_else(|_| "127.0.0.1:5000".to_owned());

	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_data.clone())
			.service(get_batch)
			.service(get_sources)
			.service(get_corpora)
			.service(put_reset)
			.service(put_load)
	})
		.bind(bind)?
		.run()
		.await?;

	Ok(())
}
