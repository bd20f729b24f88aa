// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for watchmark.
//!
//! Configuration lives in `.config/watchmark.toml`, found by walking up from the
//! tracked file. Every key is optional.

use crate::errors::{ConfigError, ConfigParseError, ConfigReadError};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{collections::BTreeSet, io};
use swrite::{SWrite, swrite};
use tracing::{debug, warn};
use watchmark_metadata::REPORT_MARKER;

/// The location of the config file, relative to a directory.
pub const CONFIG_FILE_PATH: &str = ".config/watchmark.toml";

/// Specifies where to load configuration from.
#[derive(Clone, Copy, Debug)]
pub enum ConfigLocation<'a> {
    /// Search for [`CONFIG_FILE_PATH`] in the directories containing the
    /// tracked file. Built-in defaults are used if none is found.
    Discover,

    /// Skip loading configuration, using only built-in defaults.
    Isolated,

    /// Load configuration from an explicit path. The file must exist.
    Explicit(&'a Utf8Path),
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct WatchmarkConfig {
    /// How to run the watch process.
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration for the watch process.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct WatchConfig {
    /// The command to run. The tracked file's path is appended to it.
    pub command: Vec<String>,

    /// Files whose presence marks a project root.
    pub root_markers: Vec<String>,

    /// Written to the process' stdin to request a re-run after a save.
    pub rerun_input: Option<String>,

    /// Recognizes the start of a run report in the process' output.
    pub report_marker: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            command: ["npx", "jest", "--watch", "--json", "--testLocationInResults"]
                .into_iter()
                .map(String::from)
                .collect(),
            root_markers: vec!["package.json".to_owned()],
            rerun_input: None,
            report_marker: REPORT_MARKER.to_owned(),
        }
    }
}

impl WatchConfig {
    /// Walks up from `file`'s directory to the first directory containing one of
    /// the root markers.
    pub fn find_project_root(&self, file: &Utf8Path) -> Option<Utf8PathBuf> {
        file.parent()?
            .ancestors()
            .find(|dir| {
                self.root_markers
                    .iter()
                    .any(|marker| dir.join(marker).exists())
            })
            .map(Utf8Path::to_path_buf)
    }
}

impl WatchmarkConfig {
    /// Loads configuration for the tracked `file`.
    pub fn load(file: &Utf8Path, location: ConfigLocation<'_>) -> Result<Self, ConfigError> {
        Self::load_with_warnings(file, location, &mut DefaultConfigWarnings)
    }

    fn load_with_warnings(
        file: &Utf8Path,
        location: ConfigLocation<'_>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigError> {
        match location {
            ConfigLocation::Isolated => {
                debug!("config: skipping config loading");
                Ok(Self::default())
            }
            ConfigLocation::Explicit(path) => {
                // Missing explicit files are an error, unlike discovered ones.
                let contents = std::fs::read_to_string(path)
                    .map_err(|error| ConfigReadError::new(path, error))?;
                Self::from_contents(path, &contents, warnings)
            }
            ConfigLocation::Discover => {
                let Some(dir) = file.parent() else {
                    return Ok(Self::default());
                };
                for dir in dir.ancestors() {
                    let path = dir.join(CONFIG_FILE_PATH);
                    if let Some(config) = Self::from_path_with_warnings(&path, warnings)? {
                        return Ok(config);
                    }
                }
                debug!("config: no config file found for {file}, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Returns `Ok(None)` if the file does not exist.
    fn from_path_with_warnings(
        path: &Utf8Path,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Option<Self>, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(ConfigReadError::new(path, error).into()),
        };
        Self::from_contents(path, &contents, warnings).map(Some)
    }

    fn from_contents(
        path: &Utf8Path,
        contents: &str,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigError> {
        let (config, unknown) =
            Self::deserialize_toml(contents).map_err(|error| ConfigParseError::new(path, error))?;
        if !unknown.is_empty() {
            warnings.unknown_config_keys(path, &unknown);
        }
        debug!("config: loaded from {path}");
        Ok(config)
    }

    fn deserialize_toml(contents: &str) -> Result<(Self, BTreeSet<String>), toml::de::Error> {
        let deserializer = toml::Deserializer::parse(contents)?;
        let mut unknown = BTreeSet::new();
        let config: WatchmarkConfig = serde_ignored::deserialize(deserializer, |path| {
            unknown.insert(path.to_string());
        })?;
        Ok((config, unknown))
    }
}

trait ConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if let [key] = unknown.iter().collect::<Vec<_>>().as_slice() {
            swrite!(unknown_str, "key: {key}");
        } else {
            unknown_str.push_str("keys:\n");
            for key in unknown {
                swrite!(unknown_str, "\n  - {key}");
            }
        }

        warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}
