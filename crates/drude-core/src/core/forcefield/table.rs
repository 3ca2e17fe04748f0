use crate::core::error::{FormatError, Result};
use crate::core::models::topology::AnnotatedTopology;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// 4π·ε0 in the model's kJ/mol, nm, elementary-charge unit system
/// (the reciprocal of the Coulomb constant, 138.935456 kJ·mol⁻¹·nm·e⁻²).
pub const FOUR_PI_EPS0: f64 = 1.0 / 138.935_456;

/// Polarizabilities are tabulated in Å³; the force field uses nm.
pub(crate) const ALPHA_A3_TO_NM3: f64 = 1e-3;

/// Displaced charge for a harmonic force constant `k` (kJ/mol/nm²) and an
/// effective polarizability in Å³. Negative by convention: the auxiliary
/// particle carries the negative share of the split.
pub fn displaced_charge(k: f64, alpha_a3: f64) -> f64 {
    -(FOUR_PI_EPS0 * k * alpha_a3 * ALPHA_A3_TO_NM3).sqrt()
}

/// Polarization parameters derived for one non-hydrogen atom type.
#[derive(Debug, Clone, PartialEq)]
pub struct DrudeTypeSpec {
    pub type_name: String,
    /// Mass transferred from the core to the auxiliary particle at
    /// simulation setup.
    pub dmass: f64,
    /// Core-auxiliary harmonic force constant (kJ/mol/nm²).
    pub k: f64,
    /// Effective polarizability (Å³): the tabulated base value plus the
    /// merged contribution of the bonded hydrogens.
    pub alpha: f64,
    /// Thole damping parameter.
    pub thole: f64,
    /// Displaced charge (e), always negative.
    pub dq: f64,
}

/// The parsed polarizability table, resolved against an annotated topology.
///
/// Building it requires an [`AnnotatedTopology`]: the per-type hydrogen
/// counts that feed the hydrogen-merging correction only exist after the
/// annotation passes have run, and taking the annotated type enforces that
/// ordering instead of documenting it.
#[derive(Debug, Clone, Default)]
pub struct PolarizationTable {
    specs: Vec<DrudeTypeSpec>,
    hydrogen_alpha: f64,
}

struct RawEntry {
    type_name: String,
    dmass: f64,
    k: f64,
    alpha: f64,
    thole: f64,
}

fn is_hydrogen_type(name: &str) -> bool {
    matches!(name.as_bytes().first(), Some(b'H') | Some(b'h'))
}

fn parse_number(value: &str, line: usize) -> Result<f64> {
    value.parse().map_err(|_| {
        FormatError::Parse {
            line,
            message: format!("invalid number '{value}'"),
        }
        .into()
    })
}

impl PolarizationTable {
    pub fn build<P: AsRef<Path>>(path: P, topology: &AnnotatedTopology) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::build_from(&mut reader, topology)
    }

    pub fn build_from(reader: &mut impl BufRead, topology: &AnnotatedTopology) -> Result<Self> {
        let mut entries: Vec<RawEntry> = Vec::new();
        let mut hydrogen_alpha: Option<f64> = None;

        for (index, line_res) in reader.lines().enumerate() {
            let line_num = index + 1;
            let line = line_res?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return Err(FormatError::Parse {
                    line: line_num,
                    message: format!(
                        "expected 6 columns (type, mass, charge, k, alpha, thole), found {}",
                        fields.len()
                    ),
                }
                .into());
            }
            let type_name = fields[0].to_string();
            let dmass = parse_number(fields[1], line_num)?;
            // The nominal charge column is carried by the file format but
            // unused downstream.
            let _charge = parse_number(fields[2], line_num)?;
            let k = parse_number(fields[3], line_num)?;
            let alpha = parse_number(fields[4], line_num)?;
            let thole = parse_number(fields[5], line_num)?;

            if is_hydrogen_type(&type_name) {
                match hydrogen_alpha {
                    None => hydrogen_alpha = Some(alpha),
                    Some(first) if (first - alpha).abs() > 1.0e-12 => warn!(
                        "hydrogen type '{}' declares polarizability {} but {} is already in use",
                        type_name, alpha, first
                    ),
                    Some(_) => {}
                }
            } else {
                entries.push(RawEntry {
                    type_name,
                    dmass,
                    k,
                    alpha,
                    thole,
                });
            }
        }

        let hydrogen_alpha = hydrogen_alpha.unwrap_or(0.0);
        let hydrogen_counts = topology.hydrogen_counts_by_type();

        let mut specs = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(&nh) = hydrogen_counts.get(entry.type_name.as_str()) else {
                warn!(
                    "polarizable type '{}' does not occur in the topology; skipping",
                    entry.type_name
                );
                continue;
            };
            let alpha = entry.alpha + f64::from(nh) * hydrogen_alpha;
            let dq = displaced_charge(entry.k, alpha);
            specs.push(DrudeTypeSpec {
                type_name: entry.type_name,
                dmass: entry.dmass,
                k: entry.k,
                alpha,
                thole: entry.thole,
                dq,
            });
        }

        Ok(Self {
            specs,
            hydrogen_alpha,
        })
    }

    pub fn specs(&self) -> &[DrudeTypeSpec] {
        &self.specs
    }

    pub fn hydrogen_alpha(&self) -> f64 {
        self.hydrogen_alpha
    }

    pub fn get(&self, type_name: &str) -> Option<&DrudeTypeSpec> {
        self.specs.iter().find(|s| s.type_name == type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
