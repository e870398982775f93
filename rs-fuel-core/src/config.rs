use std::env;
use std::path::{Path, PathBuf};

/// Environment variable holding the data root.
pub const DATA_PATH_VAR: &str = "FUEL_DATA_PATH";

/// Data root used when nothing is configured.
pub const DEFAULT_DATA_PATH: &str = "./data";

/// Runtime configuration shared by named corpora.
///
/// Named datasets (e.g. [`crate::datasets::one_billion_word::OneBillionWord`])
/// resolve their files relative to `data_path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
	pub data_path: PathBuf,
}

impl Config {
	/// Creates a configuration rooted at `data_path`.
	pub fn new<P: AsRef<Path>>(data_path: P) -> Self {
		Self { data_path: data_path.as_ref().to_path_buf() }
	}

	/// Reads the configuration from the process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Builds the configuration from an arbitrary variable lookup.
	///
	/// Empty values are treated as unset.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let data_path = lookup(DATA_PATH_VAR)
			.filter(|value| !value.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_DATA_PATH.to_owned());
		Self::new(data_path)
	}

	/// Joins `relative` onto the data root.
	pub fn resolve<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
		self.data_path.join(relative)
	}
}

impl Default for Config {
	fn default() -> Self {
		Self::new(DEFAULT_DATA_PATH)
	}
}
