use crate::cli::Cli;
use crate::error::{CliError, Result};
use drudepp::workflows::polarize::PolarizeRequest;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_ALPHA: &str = "alpha.ff";
const DEFAULT_FIELD_IN: &str = "field.xml";
const DEFAULT_FIELD_OUT: &str = "field-p.xml";
const DEFAULT_TOPOLOGY_IN: &str = "config.pdb";
const DEFAULT_TOPOLOGY_OUT: &str = "config-p.pdb";
const DEFAULT_JITTER: f64 = 0.02;

/// Optional TOML file carrying the same settings as the command line.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub alpha: Option<PathBuf>,
    pub jitter: Option<f64>,
    pub field: Option<PathBuf>,
    pub out_field: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub script: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Fully resolved settings: command-line flags override the config file,
/// which overrides the built-in defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub request: PolarizeRequest,
    pub script: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
        let pick_path = |flag: &Option<PathBuf>, file_value: Option<PathBuf>, default: &str| {
            flag.clone()
                .or(file_value)
                .unwrap_or_else(|| PathBuf::from(default))
        };
        Self {
            request: PolarizeRequest {
                alpha_path: pick_path(&cli.alpha, file.alpha, DEFAULT_ALPHA),
                forcefield_in: pick_path(&cli.field_in, file.field, DEFAULT_FIELD_IN),
                forcefield_out: pick_path(&cli.field_out, file.out_field, DEFAULT_FIELD_OUT),
                topology_in: pick_path(&cli.topology_in, file.input, DEFAULT_TOPOLOGY_IN),
                topology_out: pick_path(&cli.topology_out, file.output, DEFAULT_TOPOLOGY_OUT),
                jitter: cli.jitter.or(file.jitter).unwrap_or(DEFAULT_JITTER),
            },
            script: cli.script.clone().or(file.script),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_when_nothing_is_given() {
        let cli = Cli::parse_from(["drude"]);
        let settings = Settings::resolve(&cli, FileConfig::default());

        assert_eq!(settings.request.alpha_path, PathBuf::from("alpha.ff"));
        assert_eq!(settings.request.forcefield_in, PathBuf::from("field.xml"));
        assert_eq!(settings.request.forcefield_out, PathBuf::from("field-p.xml"));
        assert_eq!(settings.request.topology_in, PathBuf::from("config.pdb"));
        assert_eq!(settings.request.topology_out, PathBuf::from("config-p.pdb"));
        assert_eq!(settings.request.jitter, 0.02);
        assert!(settings.script.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let cli = Cli::parse_from(["drude"]);
        let file = FileConfig {
            alpha: Some(PathBuf::from("table.ff")),
            jitter: Some(0.01),
            ..FileConfig::default()
        };
        let settings = Settings::resolve(&cli, file);
        assert_eq!(settings.request.alpha_path, PathBuf::from("table.ff"));
        assert_eq!(settings.request.jitter, 0.01);
        assert_eq!(settings.request.topology_in, PathBuf::from("config.pdb"));
    }

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::parse_from(["drude", "-a", "flag.ff", "-d", "0.05"]);
        let file = FileConfig {
            alpha: Some(PathBuf::from("file.ff")),
            jitter: Some(0.01),
            ..FileConfig::default()
        };
        let settings = Settings::resolve(&cli, file);
        assert_eq!(settings.request.alpha_path, PathBuf::from("flag.ff"));
        assert_eq!(settings.request.jitter, 0.05);
    }

    #[test]
    fn load_reads_kebab_case_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drude.toml");
        fs::write(
            &path,
            "alpha = \"table.ff\"\nout-field = \"out.xml\"\njitter = 0.03\n",
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.alpha, Some(PathBuf::from("table.ff")));
        assert_eq!(file.out_field, Some(PathBuf::from("out.xml")));
        assert_eq!(file.jitter, Some(0.03));
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drude.toml");
        fs::write(&path, "unknown-key = 1\n").unwrap();
        assert!(matches!(
            FileConfig::load(&path),
            Err(CliError::Config { .. })
        ));
    }
}
