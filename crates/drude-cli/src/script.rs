//! Driver-script templating: an opaque line-substitution filter.
//!
//! Given an external simulation driver script, produces a derivative that
//! points at the polarized outputs instead of the original inputs. The filter
//! knows nothing about the script language: marker lines are replaced or
//! removed, everything else passes through untouched.

use crate::config::Settings;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Lines carrying this marker are dropped from the derived script.
const REMOVE_MARKER: &str = "#drude:remove";

/// One line-oriented substitution rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Replace every occurrence of `from` within matching lines.
    Substitute { from: String, to: String },
    /// Drop any line containing the marker.
    Remove { marker: String },
}

/// Applies the rules to the script text, line by line, first match wins.
pub fn apply(text: &str, rules: &[Rule]) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut line = line.to_string();
        let mut removed = false;
        for rule in rules {
            match rule {
                Rule::Remove { marker } if line.contains(marker.as_str()) => {
                    removed = true;
                    break;
                }
                Rule::Substitute { from, to } if line.contains(from.as_str()) => {
                    line = line.replace(from.as_str(), to);
                    break;
                }
                _ => {}
            }
        }
        if !removed {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Rules retargeting a driver script from the original inputs to the
/// polarized outputs.
pub fn retarget_rules(settings: &Settings) -> Vec<Rule> {
    vec![
        Rule::Remove {
            marker: REMOVE_MARKER.to_string(),
        },
        Rule::Substitute {
            from: file_name(&settings.request.forcefield_in),
            to: file_name(&settings.request.forcefield_out),
        },
        Rule::Substitute {
            from: file_name(&settings.request.topology_in),
            to: file_name(&settings.request.topology_out),
        },
    ]
}

/// Path of the derived script: the input name with a `-p` suffix before the
/// extension.
pub fn derived_path(script: &Path) -> PathBuf {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match script.extension() {
        Some(ext) => format!("{}-p.{}", stem, ext.to_string_lossy()),
        None => format!("{stem}-p"),
    };
    script.with_file_name(name)
}

/// Reads the driver script, applies the retargeting rules, and writes the
/// derivative next to the original.
pub fn derive(script: &Path, settings: &Settings) -> Result<PathBuf> {
    let text = std::fs::read_to_string(script)?;
    let derived = apply(&text, &retarget_rules(settings));
    let out_path = derived_path(script);
    std::fs::write(&out_path, derived)?;
    info!("wrote driver script {}", out_path.display());
    Ok(out_path)
}
