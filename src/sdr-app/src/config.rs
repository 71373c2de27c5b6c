// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in every search directory.
pub const CONFIG_FILE_NAME: &str = "sdr-rs.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Default search paths for `sdr-rs.toml`: current directory, then the
/// XDG config dir, then /etc.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("sdr-rs").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/sdr-rs").join(CONFIG_FILE_NAME));
    paths
}

/// Extract and deserialize a named section from a TOML file.
///
/// `Ok(None)` means the file parsed but has no such section.
fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

    let table: toml::Table = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    // Round-trip through a string so serde defaults apply to missing fields.
    let section_toml = toml::to_string(section)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
    let cfg = toml::from_str::<T>(&section_toml)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
    Ok(Some(cfg))
}

/// A configuration struct stored as one section of `sdr-rs.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key, e.g. `"sdr-engine"`.
    fn section_key() -> &'static str;

    /// Load the section from a specific file. A file without the section
    /// is an error here.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// First file in `paths` that exists and carries the section wins.
    fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in paths {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(path, Self::section_key())? {
                    tracing::debug!("Loaded [{}] from {}", Self::section_key(), path.display());
                    return Ok((cfg, Some(path.clone())));
                }
            }
        }
        Ok((Self::default(), None))
    }

    /// Search the default paths; defaults when nothing is found.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_from_paths(&config_search_paths())
    }

    /// Explicit path if given, otherwise the default search.
    fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match path {
            Some(p) => Ok((Self::load_from_file(p)?, Some(p.to_path_buf()))),
            None => Self::load_from_default_paths(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        rate: u32,
        enabled: bool,
    }

    impl ConfigFile for Sample {
        fn section_key() -> &'static str {
            "sample"
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).expect("create");
        f.write_all(body.as_bytes()).expect("write");
        path
    }

    #[test]
    fn loads_section_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "a.toml", "[sample]\nrate = 48000\n\n[other]\nx = 1\n");
        let cfg = Sample::load_from_file(&path).expect("load");
        assert_eq!(
            cfg,
            Sample {
                name: String::new(),
                rate: 48000,
                enabled: false
            }
        );
    }

    #[test]
    fn missing_section_is_error_for_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "a.toml", "[other]\nx = 1\n");
        let err = Sample::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing [sample] section"), "{err}");
    }

    #[test]
    fn bad_toml_and_missing_file_report_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(&dir, "bad.toml", "[sample\nrate = ");
        assert!(matches!(
            Sample::load_from_file(&path),
            Err(ConfigError::ParseError(p, _)) if p == path
        ));
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Sample::load_from_file(&missing),
            Err(ConfigError::ReadError(_, _))
        ));
    }

    #[test]
    fn search_skips_files_without_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = write_file(&dir, "first.toml", "[other]\nx = 1\n");
        let second = write_file(&dir, "second.toml", "[sample]\nname = \"rx\"\n");
        let absent = dir.path().join("absent.toml");
        let (cfg, found) =
            Sample::load_from_paths(&[absent, first, second.clone()]).expect("search");
        assert_eq!(cfg.name, "rx");
        assert_eq!(found, Some(second));
    }

    #[test]
    fn search_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (cfg, found) =
            Sample::load_from_paths(&[dir.path().join("none.toml")]).expect("search");
        assert_eq!(cfg, Sample::default());
        assert!(found.is_none());
    }

    #[test]
    fn default_search_order() {
        let paths = config_search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from("sdr-rs.toml")));
        assert_eq!(
            paths.last(),
            Some(&PathBuf::from("/etc/sdr-rs/sdr-rs.toml"))
        );
    }
}
