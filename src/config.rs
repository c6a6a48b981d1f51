use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::files::TraversalOptions;

pub const DEFAULT_SETTINGS_FILE: &str = "layerfix.yaml";
pub const DEFAULT_MARKER_EXTENSION: &str = ".fraytools";

/// Optional per-project settings. Every field may be omitted.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SettingsFile {
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub include_hidden: Option<bool>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub marker_extension: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub no_backup: Option<bool>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

/// Values given on the command line. `None` and `false` defer to the
/// settings file.
#[derive(Debug, Clone, Default)]
pub struct CliSettings {
    pub max_depth: Option<usize>,
    pub skip_hidden: bool,
    pub exclude: Vec<String>,
    pub marker_extension: Option<String>,
    pub encoding: Option<String>,
    pub no_backup: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub traversal: TraversalOptions,
    pub marker_extension: String,
    pub encoding: Option<String>,
    pub no_backup: bool,
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            traversal: TraversalOptions::default(),
            marker_extension: DEFAULT_MARKER_EXTENSION.to_string(),
            encoding: None,
            no_backup: false,
            dry_run: false,
        }
    }
}

impl Settings {
    /// Command-line values win; anything left unset falls back to the file,
    /// then to the defaults. Exclude globs from both sources are combined.
    pub fn merge(cli: &CliSettings, file: &SettingsFile) -> Self {
        let defaults = Settings::default();
        let mut exclude = file.exclude.clone().unwrap_or_default();
        exclude.extend(cli.exclude.iter().cloned());

        Settings {
            traversal: TraversalOptions {
                max_depth: cli
                    .max_depth
                    .or(file.max_depth)
                    .unwrap_or(defaults.traversal.max_depth),
                include_hidden: !cli.skip_hidden && file.include_hidden.unwrap_or(true),
                exclude,
            },
            marker_extension: cli
                .marker_extension
                .clone()
                .or_else(|| file.marker_extension.clone())
                .unwrap_or(defaults.marker_extension),
            encoding: cli.encoding.clone().or_else(|| file.encoding.clone()),
            no_backup: cli.no_backup || file.no_backup.unwrap_or(false),
            dry_run: cli.dry_run || file.dry_run.unwrap_or(false),
        }
    }
}

pub fn load_settings(path: &Path) -> Result<SettingsFile> {
    let data = fs::read(path).with_context(|| format!("reading settings {}", path.display()))?;
    if path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    } else {
        serde_yaml::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Loads the explicit settings file, or `layerfix.yaml` in the project root
/// when it exists.
pub fn resolve_settings(root: &Path, explicit: Option<&Path>, cli: &CliSettings) -> Result<Settings> {
    let candidate: Option<PathBuf> = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default_path = root.join(DEFAULT_SETTINGS_FILE);
            default_path.is_file().then_some(default_path)
        }
    };
    let file = match candidate {
        Some(path) => load_settings(&path)?,
        None => SettingsFile::default(),
    };
    Ok(Settings::merge(cli, &file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_file() {
        let temp = tempdir().expect("temp dir");
        let settings =
            resolve_settings(temp.path(), None, &CliSettings::default()).expect("settings");
        assert_eq!(settings.traversal.max_depth, 32);
        assert_eq!(settings.marker_extension, ".fraytools");
        assert!(settings.traversal.include_hidden);
        assert!(!settings.dry_run);
    }

    #[test]
    fn project_yaml_is_picked_up() {
        let temp = tempdir().expect("temp dir");
        fs::write(
            temp.path().join(DEFAULT_SETTINGS_FILE),
            "max_depth: 3\nexclude:\n  - \"library/**\"\nno_backup: true\n",
        )
        .expect("write settings");
        let settings =
            resolve_settings(temp.path(), None, &CliSettings::default()).expect("settings");
        assert_eq!(settings.traversal.max_depth, 3);
        assert_eq!(settings.traversal.exclude, vec!["library/**".to_string()]);
        assert!(settings.no_backup);
    }

    #[test]
    fn cli_values_win_over_file() {
        let file = SettingsFile {
            max_depth: Some(3),
            marker_extension: Some(".proj".into()),
            exclude: Some(vec!["a/**".into()]),
            ..SettingsFile::default()
        };
        let cli = CliSettings {
            max_depth: Some(1),
            exclude: vec!["b/**".into()],
            dry_run: true,
            ..CliSettings::default()
        };
        let settings = Settings::merge(&cli, &file);
        assert_eq!(settings.traversal.max_depth, 1);
        assert_eq!(settings.marker_extension, ".proj");
        assert_eq!(
            settings.traversal.exclude,
            vec!["a/**".to_string(), "b/**".to_string()]
        );
        assert!(settings.dry_run);
    }

    #[test]
    fn hidden_folders_can_be_skipped_from_either_side() {
        let file = SettingsFile {
            include_hidden: Some(false),
            ..SettingsFile::default()
        };
        assert!(!Settings::merge(&CliSettings::default(), &file).traversal.include_hidden);

        let cli = CliSettings {
            skip_hidden: true,
            ..CliSettings::default()
        };
        assert!(!Settings::merge(&cli, &SettingsFile::default()).traversal.include_hidden);
    }

    #[test]
    fn json_settings_by_extension() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{"include_hidden": true, "encoding": "utf-8"}"#).expect("write");
        let file = load_settings(&path).expect("load");
        assert_eq!(file.include_hidden, Some(true));
        assert_eq!(file.encoding.as_deref(), Some("utf-8"));
    }

    #[test]
    fn malformed_settings_are_an_error() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("bad.yaml");
        fs::write(&path, "max_depth: [").expect("write");
        assert!(load_settings(&path).is_err());
    }
}
