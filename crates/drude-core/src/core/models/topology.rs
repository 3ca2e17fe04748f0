use super::atom::{Atom, DRUDE_ELEMENT};
use crate::core::error::{ConsistencyError, Result};
use crate::core::forcefield::document::{DrudeSite, ForcefieldDocument};
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

// Fixed seed keeps repeated runs on identical inputs bit-identical.
const JITTER_SEED: u64 = 1234;

/// An ordered pair of zero-based indices into the topology's atom sequence.
///
/// Bond identity is positional, not by stable id: any atom insertion before
/// an index requires shifting every endpoint at or beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize) -> Self {
        Self { atom1, atom2 }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.atom1 == index || self.atom2 == index
    }
}

/// A molecular topology: cell parameters plus the ordered atom and bond
/// sequences, transient and scoped to one invocation.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Title carried over from the input file header.
    pub title: String,
    /// Box parameters: a, b, c lengths and the three cell angles.
    pub cell: [f64; 6],
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    /// Number of auxiliary particles present in the atom sequence.
    pub ndrude: usize,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn natoms(&self) -> usize {
        self.atoms.len()
    }

    /// Runs the annotation passes in the only valid order: bonded-hydrogen
    /// counting, then type assignment, then the per-type consistency check.
    ///
    /// The polarization table and the insertion pass require all three to
    /// have run; they therefore take the returned [`AnnotatedTopology`]
    /// instead of a bare `Topology`, which makes the ordering a property of
    /// the types rather than of call-site discipline.
    pub fn annotate(mut self, forcefield: &ForcefieldDocument) -> Result<AnnotatedTopology> {
        self.count_bonded_hydrogens();
        self.assign_types(forcefield)?;
        self.check_bonded_hydrogens()?;
        Ok(AnnotatedTopology { topology: self })
    }

    fn count_bonded_hydrogens(&mut self) {
        for i in 0..self.bonds.len() {
            let Bond { atom1, atom2 } = self.bonds[i];
            if self.atoms[atom2].is_hydrogen() {
                self.atoms[atom1].nh += 1;
            }
            if self.atoms[atom1].is_hydrogen() {
                self.atoms[atom2].nh += 1;
            }
        }
    }

    fn assign_types(&mut self, forcefield: &ForcefieldDocument) -> Result<()> {
        for atom in &mut self.atoms {
            let (type_name, class_name) = forcefield.atom_type_for(&atom.res_name, &atom.name)?;
            atom.type_name = type_name;
            atom.class_name = class_name;
        }
        Ok(())
    }

    /// A type must represent a single chemical environment: every atom of a
    /// type has to agree on its bonded-hydrogen count.
    fn check_bonded_hydrogens(&self) -> Result<()> {
        let mut first_of_type: HashMap<&str, &Atom> = HashMap::new();
        for atom in &self.atoms {
            match first_of_type.get(atom.type_name.as_str()) {
                Some(first) if first.nh != atom.nh => {
                    return Err(ConsistencyError::BondedHydrogenMismatch {
                        type_name: atom.type_name.clone(),
                        name1: first.name.clone(),
                        name2: atom.name.clone(),
                        nh1: first.nh,
                        nh2: atom.nh,
                    }
                    .into());
                }
                Some(_) => {}
                None => {
                    first_of_type.insert(&atom.type_name, atom);
                }
            }
        }
        Ok(())
    }
}

/// A topology whose bonded-hydrogen counts and force-field types have been
/// filled in and verified.
#[derive(Debug, Clone)]
pub struct AnnotatedTopology {
    topology: Topology,
}

impl AnnotatedTopology {
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Bonded-hydrogen count of a representative atom of each assigned type.
    ///
    /// The consistency check has already guaranteed that all atoms of a type
    /// agree, so the first occurrence stands for the type.
    pub fn hydrogen_counts_by_type(&self) -> HashMap<&str, u32> {
        let mut counts = HashMap::new();
        for atom in &self.topology.atoms {
            counts.entry(atom.type_name.as_str()).or_insert(atom.nh);
        }
        counts
    }

    /// Materializes one auxiliary particle immediately after every core atom
    /// named by the force field's `core`-bearing residue templates.
    ///
    /// Two passes over the original atom order: first collect the insertion
    /// points, then build the final sequence once and remap every bond
    /// endpoint through a precomputed offset table. Freshly inserted
    /// particles are never candidate cores, and no core-auxiliary bond is
    /// added to the bond list: the relationship stays implicit in the force
    /// field's `core` reference.
    pub fn polarize(&self, forcefield: &ForcefieldDocument, jitter: f64) -> Result<Topology> {
        let sites = forcefield.drude_sites();
        let mut site_by_core: HashMap<(&str, &str), &DrudeSite> = HashMap::new();
        for site in &sites {
            site_by_core.insert((site.residue.as_str(), site.core.as_str()), site);
        }

        let source = &self.topology;
        let matches: Vec<Option<&DrudeSite>> = source
            .atoms
            .iter()
            .map(|atom| {
                if atom.is_drude() {
                    return None;
                }
                let residue =
                    crate::core::forcefield::document::normalize_residue_label(&atom.res_name);
                site_by_core.get(&(residue, atom.name.as_str())).copied()
            })
            .collect();

        let mut offsets = vec![0usize; source.atoms.len()];
        let mut inserted = 0usize;
        for (index, site) in matches.iter().enumerate() {
            offsets[index] = inserted;
            if site.is_some() {
                inserted += 1;
            }
        }

        let mut rng = StdRng::seed_from_u64(JITTER_SEED);
        let mut atoms = Vec::with_capacity(source.atoms.len() + inserted);
        for (atom, site) in source.atoms.iter().zip(&matches) {
            atoms.push(atom.clone());
            if let Some(site) = site {
                let position = Point3::new(
                    atom.position.x + rng.gen_range(-jitter..=jitter),
                    atom.position.y + rng.gen_range(-jitter..=jitter),
                    atom.position.z + rng.gen_range(-jitter..=jitter),
                );
                let mut drude = Atom::new(0, &site.name, &atom.res_name, atom.res_seq, position);
                drude.chain_id = atom.chain_id.clone();
                drude.element = DRUDE_ELEMENT.to_string();
                atoms.push(drude);
            }
        }
        for (index, atom) in atoms.iter_mut().enumerate() {
            atom.serial = index + 1;
        }

        let bonds = source
            .bonds
            .iter()
            .map(|b| Bond::new(b.atom1 + offsets[b.atom1], b.atom2 + offsets[b.atom2]))
            .collect();

        Ok(Topology {
            title: source.title.clone(),
            cell: source.cell,
            atoms,
            bonds,
            ndrude: source.ndrude + inserted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::forcefield::document::ForcefieldDocument;

    const FIELD_XML: &str = r#"<ForceField>
 <AtomTypes>
  <Type name="CT-c1" class="CT" mass="12.011"/>
  <Type name="HA-h1" class="HA" mass="1.008"/>
  <Type name="OW-ow" class="OW" mass="15.999"/>
 </AtomTypes>
 <Residues>
  <Residue name="MET">
   <Atom name="C1" type="CT-c1" charge="-0.2"/>
   <Atom name="H11" type="HA-h1" charge="0.05"/>
   <Atom name="H12" type="HA-h1" charge="0.05"/>
   <Atom name="O1" type="OW-ow" charge="-0.4"/>
  </Residue>
 </Residues>
 <HarmonicBondForce/>
 <NonbondedForce/>
</ForceField>
"#;

    fn forcefield() -> ForcefieldDocument {
        ForcefieldDocument::read_from(&mut FIELD_XML.as_bytes()).unwrap()
    }

    fn methanol_like() -> Topology {
        let mut topology = Topology::new();
        topology.cell = [30.0, 30.0, 30.0, 90.0, 90.0, 90.0];
        for (i, name) in ["C1", "H11", "H12", "O1"].into_iter().enumerate() {
            let mut atom = Atom::new(
                i + 1,
                name,
                "MET",
                1,
                Point3::new(i as f64, 0.0, 0.0),
            );
            atom.element = name[..1].to_string();
            topology.atoms.push(atom);
        }
        topology.bonds.push(Bond::new(0, 1));
        topology.bonds.push(Bond::new(0, 2));
        topology.bonds.push(Bond::new(0, 3));
        topology
    }

    #[test]
    fn annotate_counts_hydrogens_and_assigns_types() {
        let annotated = methanol_like().annotate(&forcefield()).unwrap();
        let atoms = &annotated.topology().atoms;

        assert_eq!(atoms[0].nh, 2);
        assert_eq!(atoms[0].type_name, "CT-c1");
        assert_eq!(atoms[0].class_name, "CT");
        assert_eq!(atoms[1].nh, 0);
        assert_eq!(atoms[3].nh, 0);
        assert_eq!(atoms[3].type_name, "OW-ow");

        let counts = annotated.hydrogen_counts_by_type();
        assert_eq!(counts.get("CT-c1"), Some(&2));
        assert_eq!(counts.get("OW-ow"), Some(&0));
    }

    #[test]
    fn annotate_rejects_types_with_divergent_hydrogen_counts() {
        let mut topology = methanol_like();
        // A second carbon of the same type, but without any bonded hydrogen.
        let mut stray = Atom::new(5, "C1", "MET", 2, Point3::new(9.0, 0.0, 0.0));
        stray.element = "C".to_string();
        topology.atoms.push(stray);

        let result = topology.annotate(&forcefield());
        assert!(matches!(
            result,
            Err(Error::Consistency(
                ConsistencyError::BondedHydrogenMismatch { .. }
            ))
        ));
    }

    #[test]
    fn annotate_accepts_agreeing_duplicate_types() {
        let mut topology = methanol_like();
        let base = topology.atoms.len();
        let mut carbon = Atom::new(5, "C1", "MET", 2, Point3::new(9.0, 0.0, 0.0));
        carbon.element = "C".to_string();
        let mut h1 = Atom::new(6, "H11", "MET", 2, Point3::new(10.0, 0.0, 0.0));
        h1.element = "H".to_string();
        let mut h2 = Atom::new(7, "H12", "MET", 2, Point3::new(11.0, 0.0, 0.0));
        h2.element = "H".to_string();
        let mut oxygen = Atom::new(8, "O1", "MET", 2, Point3::new(12.0, 0.0, 0.0));
        oxygen.element = "O".to_string();
        topology.atoms.extend([carbon, h1, h2, oxygen]);
        topology.bonds.push(Bond::new(base, base + 1));
        topology.bonds.push(Bond::new(base, base + 2));
        topology.bonds.push(Bond::new(base, base + 3));

        assert!(topology.annotate(&forcefield()).is_ok());
    }

    #[test]
    fn annotate_fails_for_unknown_residue() {
        let mut topology = methanol_like();
        topology.atoms[0].res_name = "XXX".to_string();
        assert!(topology.annotate(&forcefield()).is_err());
    }

    const POLARIZED_FIELD_XML: &str = r#"<ForceField>
 <AtomTypes>
  <Type name="CT-c1" class="CT" mass="12.011"/>
  <Type name="HA-h1" class="HA" mass="1.008"/>
  <Type name="OW-ow" class="OW" mass="15.999"/>
  <Type name="DRUD-CT-c1" class="DRUD" mass="0.0"/>
  <Type name="DRUD-OW-ow" class="DRUD" mass="0.0"/>
 </AtomTypes>
 <Residues>
  <Residue name="MET">
   <Atom name="C1" type="CT-c1" charge="0.1"/>
   <Atom name="DC1" type="DRUD-CT-c1" charge="-0.3" core="C1"/>
   <Atom name="H11" type="HA-h1" charge="0.05"/>
   <Atom name="H12" type="HA-h1" charge="0.05"/>
   <Atom name="O1" type="OW-ow" charge="-0.1"/>
   <Atom name="DO1" type="DRUD-OW-ow" charge="-0.3" core="O1"/>
  </Residue>
 </Residues>
 <HarmonicBondForce/>
 <NonbondedForce/>
</ForceField>
"#;

    fn polarized_forcefield() -> ForcefieldDocument {
        ForcefieldDocument::read_from(&mut POLARIZED_FIELD_XML.as_bytes()).unwrap()
    }

    #[test]
    fn polarize_inserts_one_particle_after_each_core() {
        let annotated = methanol_like().annotate(&forcefield()).unwrap();
        let polarized = annotated.polarize(&polarized_forcefield(), 0.02).unwrap();

        assert_eq!(polarized.natoms(), 6);
        assert_eq!(polarized.ndrude, 2);

        let names: Vec<&str> = polarized.atoms.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["C1", "DC1", "H11", "H12", "O1", "DO1"]);

        let drude = &polarized.atoms[1];
        assert!(drude.is_drude());
        assert_eq!(drude.res_name, "MET");
        assert_eq!(drude.res_seq, 1);

        for (index, atom) in polarized.atoms.iter().enumerate() {
            assert_eq!(atom.serial, index + 1);
        }
    }

    #[test]
    fn polarize_keeps_bond_endpoints_resolving_to_the_same_atoms() {
        let annotated = methanol_like().annotate(&forcefield()).unwrap();
        let source = annotated.topology().clone();
        let polarized = annotated.polarize(&polarized_forcefield(), 0.02).unwrap();

        assert_eq!(polarized.bonds.len(), source.bonds.len());
        for (old, new) in source.bonds.iter().zip(&polarized.bonds) {
            let before = (
                (
                    source.atoms[old.atom1].name.as_str(),
                    source.atoms[old.atom1].res_seq,
                ),
                (
                    source.atoms[old.atom2].name.as_str(),
                    source.atoms[old.atom2].res_seq,
                ),
            );
            let after = (
                (
                    polarized.atoms[new.atom1].name.as_str(),
                    polarized.atoms[new.atom1].res_seq,
                ),
                (
                    polarized.atoms[new.atom2].name.as_str(),
                    polarized.atoms[new.atom2].res_seq,
                ),
            );
            assert_eq!(before, after);
        }
    }

    #[test]
    fn polarize_jitter_stays_within_the_radius_and_is_reproducible() {
        let annotated = methanol_like().annotate(&forcefield()).unwrap();
        let jitter = 0.02;
        let first = annotated.polarize(&polarized_forcefield(), jitter).unwrap();
        let second = annotated.polarize(&polarized_forcefield(), jitter).unwrap();

        for (core_index, drude_index) in [(0usize, 1usize), (4, 5)] {
            let core = &first.atoms[core_index];
            let drude = &first.atoms[drude_index];
            assert!((drude.position.x - core.position.x).abs() <= jitter);
            assert!((drude.position.y - core.position.y).abs() <= jitter);
            assert!((drude.position.z - core.position.z).abs() <= jitter);
        }
        for (a, b) in first.atoms.iter().zip(&second.atoms) {
            assert_eq!(a.position, b.position);
        }
    }

    #[test]
    fn polarize_never_revisits_inserted_particles() {
        let mut topology = methanol_like();
        // An already-present auxiliary particle whose name collides with a
        // core name must not receive another particle.
        let mut present = Atom::new(5, "O1", "MET", 1, Point3::new(5.0, 0.0, 0.0));
        present.element = DRUDE_ELEMENT.to_string();
        topology.atoms.push(present);
        // The EP atom has no template entry, so annotate against the already
        // polarized field where every name resolves.
        let mut renamed = topology.clone();
        renamed.atoms[4].name = "DO1".to_string();
        renamed.ndrude = 1;
        let annotated = renamed.annotate(&polarized_forcefield()).unwrap();

        let polarized = annotated.polarize(&polarized_forcefield(), 0.02).unwrap();
        // C1 and O1 gain one particle each; the EP atom gains none.
        assert_eq!(polarized.ndrude, 2 + 1);
        assert_eq!(polarized.natoms(), 5 + 2);
    }
}
