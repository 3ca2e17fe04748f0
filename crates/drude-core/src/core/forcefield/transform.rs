//! The polarization transform on the force-field document.
//!
//! Produces a new document from the parsed source: synthetic zero-mass
//! particle types, per-template auxiliary atoms with the charge split
//! between core and particle, the wildcard core-auxiliary spring, inert
//! non-bonded placeholders, and the per-type polarization records.

use super::document::{Element, ForcefieldDocument};
use super::table::{ALPHA_A3_TO_NM3, PolarizationTable};
use crate::core::error::{Result, SchemaError};
use crate::core::io::pdb::ATOM_NAME_WIDTH;
use tracing::{info, warn};

/// Bonded class shared by all auxiliary particles.
pub const DRUDE_CLASS: &str = "DRUD";
/// Joins the synthetic class marker to the original type name.
const DRUDE_TYPE_PREFIX: &str = "DRUD-";
/// Name prefix marking an auxiliary atom within a residue template.
const DRUDE_NAME_PREFIX: &str = "D";
/// Alphabet for compact per-residue counters when prefixed names would not
/// fit the fixed-column name field.
const COUNTER_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUV";

fn synthetic_type_name(type_name: &str) -> String {
    format!("{DRUDE_TYPE_PREFIX}{type_name}")
}

/// A type name produced by a previous polarization run: the synthetic class
/// marker followed by at least one further `class-type` segment.
fn is_synthetic_type(name: &str) -> bool {
    name.strip_prefix(DRUDE_TYPE_PREFIX)
        .is_some_and(|rest| rest.contains('-'))
}

fn encode_counter(mut value: usize) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(COUNTER_ALPHABET[value % COUNTER_ALPHABET.len()] as char);
        value /= COUNTER_ALPHABET.len();
        if value == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}

/// Whether every template atom name leaves room for the auxiliary prefix
/// within the fixed-column name field.
fn prefixed_names_fit(root: &Element) -> bool {
    root.child("Residues")
        .into_iter()
        .flat_map(|residues| residues.children_tagged("Residue"))
        .flat_map(|residue| residue.children_tagged("Atom"))
        .filter_map(|atom| atom.attr("name"))
        .all(|name| name.len() + DRUDE_NAME_PREFIX.len() <= ATOM_NAME_WIDTH)
}

fn require_section<'a>(root: &'a mut Element, tag: &str) -> Result<&'a mut Element> {
    root.child_mut(tag)
        .ok_or_else(|| SchemaError::MissingSection(tag.to_string()).into())
}

impl ForcefieldDocument {
    /// Builds the polarized force-field document.
    ///
    /// The source document is left untouched; the result carries the
    /// insertion-time `core` annotations that the topology insertion pass
    /// consumes, and [`ForcefieldDocument::write_to`] strips them again.
    pub fn polarize(&self, table: &PolarizationTable) -> Result<ForcefieldDocument> {
        if table.is_empty() {
            warn!("polarization table is empty; force field is returned unchanged");
            return ForcefieldDocument::from_root(self.root().clone());
        }

        let mut root = self.root().clone();

        // Zero-mass synthetic particle types, one per polarizable type.
        let atom_types = require_section(&mut root, "AtomTypes")?;
        for spec in table.specs() {
            if is_synthetic_type(&spec.type_name) {
                warn!(
                    "type '{}' is already a synthetic particle type; skipping",
                    spec.type_name
                );
                continue;
            }
            let mut entry = Element::new("Type");
            entry.set_attr("name", synthetic_type_name(&spec.type_name));
            entry.set_attr("class", DRUDE_CLASS);
            entry.set_attr("mass", "0.0");
            atom_types.children.push(entry);
        }

        // Split template charges and insert the auxiliary atoms.
        let use_prefixed_names = prefixed_names_fit(&root);
        let residues = require_section(&mut root, "Residues")?;
        let mut inserted = 0usize;
        for residue in residues.children_tagged_mut("Residue") {
            let mut counter = 0usize;
            let mut i = 0;
            while i < residue.children.len() {
                if residue.children[i].tag != "Atom" {
                    i += 1;
                    continue;
                }
                let Some(type_name) = residue.children[i].attr("type").map(str::to_string) else {
                    i += 1;
                    continue;
                };
                if is_synthetic_type(&type_name) {
                    i += 1;
                    continue;
                }
                let Some(spec) = table.get(&type_name) else {
                    i += 1;
                    continue;
                };

                let atom = &mut residue.children[i];
                let name = atom
                    .attr("name")
                    .ok_or_else(|| SchemaError::MissingAttribute {
                        tag: "Atom".to_string(),
                        attr: "name".to_string(),
                    })?
                    .to_string();
                let charge: f64 = atom
                    .attr("charge")
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(0.0);
                atom.set_attr("charge", format!("{}", charge - spec.dq));

                let drude_name = if use_prefixed_names {
                    format!("{DRUDE_NAME_PREFIX}{name}")
                } else {
                    format!("{DRUDE_NAME_PREFIX}{}", encode_counter(counter))
                };
                counter += 1;

                let mut drude = Element::new("Atom");
                drude.set_attr("name", drude_name);
                drude.set_attr("type", synthetic_type_name(&type_name));
                drude.set_attr("charge", format!("{}", spec.dq));
                drude.set_attr("core", name);
                residue.children.insert(i + 1, drude);
                inserted += 1;
                // Skip over the fresh particle: it is never a candidate core.
                i += 2;
            }
        }

        // One stiff wildcard spring binds every auxiliary particle to its core.
        let spring_k = 100.0 * table.specs()[0].k;
        let bonds = require_section(&mut root, "HarmonicBondForce")?;
        let mut bond = Element::new("Bond");
        bond.set_attr("class1", "X");
        bond.set_attr("class2", DRUDE_CLASS);
        bond.set_attr("length", "0.0");
        bond.set_attr("k", format!("{}", spring_k));
        bonds.children.push(bond);

        let nonbonded = require_section(&mut root, "NonbondedForce")?;
        let mut placeholder = Element::new("Atom");
        placeholder.set_attr("class", DRUDE_CLASS);
        placeholder.set_attr("charge", "0.0");
        placeholder.set_attr("sigma", "0.0");
        placeholder.set_attr("epsilon", "0.0");
        nonbonded.children.push(placeholder);

        if let Some(lennard_jones) = root.child_mut("LennardJonesForce") {
            let mut placeholder = Element::new("Atom");
            placeholder.set_attr("class", DRUDE_CLASS);
            placeholder.set_attr("sigma", "0.0");
            placeholder.set_attr("epsilon", "0.0");
            lennard_jones.children.push(placeholder);
        }

        // Per-type polarization records, in table order.
        let mut drude_force = Element::new("DrudeForce");
        for spec in table.specs() {
            if is_synthetic_type(&spec.type_name) {
                continue;
            }
            let mut particle = Element::new("Particle");
            particle.set_attr("type1", synthetic_type_name(&spec.type_name));
            particle.set_attr("type2", spec.type_name.clone());
            particle.set_attr("charge", format!("{}", spec.dq));
            particle.set_attr("polarizability", format!("{}", spec.alpha * ALPHA_A3_TO_NM3));
            particle.set_attr("thole", format!("{}", spec.thole / 2.0));
            drude_force.children.push(particle);
        }
        root.children.push(drude_force);

        info!(
            "polarized force field: {} particle types, {} template atoms",
            table.specs().len(),
            inserted
        );
        ForcefieldDocument::from_root(root)
    }
}
