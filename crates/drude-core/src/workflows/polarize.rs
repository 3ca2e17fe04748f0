use crate::core::error::Result;
use crate::core::forcefield::document::ForcefieldDocument;
use crate::core::forcefield::table::PolarizationTable;
use crate::core::io::cif::CifFile;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::TopologyFile;
use crate::core::models::topology::Topology;
use std::path::{Path, PathBuf};
use tracing::info;

/// Input and output locations plus the single tunable of a polarization run.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarizeRequest {
    /// Polarizability parameter file.
    pub alpha_path: PathBuf,
    /// Input force-field document.
    pub forcefield_in: PathBuf,
    /// Output force-field document.
    pub forcefield_out: PathBuf,
    /// Input topology (fixed-column or tag-based, by extension).
    pub topology_in: PathBuf,
    /// Output topology.
    pub topology_out: PathBuf,
    /// Radius of the random displacement applied to each fresh auxiliary
    /// particle, in the topology's length units.
    pub jitter: f64,
}

/// What a run did, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolarizeSummary {
    pub atoms_in: usize,
    pub atoms_out: usize,
    pub ndrude: usize,
    pub ntypes: usize,
}

fn is_tag_based(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("cif") || ext.eq_ignore_ascii_case("mmcif")
    )
}

fn read_topology(path: &Path) -> Result<Topology> {
    if is_tag_based(path) {
        CifFile::read_from_path(path)
    } else {
        PdbFile::read_from_path(path)
    }
}

fn write_topology(topology: &Topology, path: &Path) -> Result<()> {
    if is_tag_based(path) {
        CifFile::write_to_path(topology, path)
    } else {
        PdbFile::write_to_path(topology, path)
    }
}

/// Runs the whole polarization pipeline, in the only valid stage order:
/// load both inputs, annotate the topology against the force field, derive
/// the polarization table, transform the force field, insert the auxiliary
/// particles, and write both outputs.
pub fn run(request: &PolarizeRequest) -> Result<PolarizeSummary> {
    info!("reading topology from {}", request.topology_in.display());
    let topology = read_topology(&request.topology_in)?;
    let atoms_in = topology.natoms();
    info!(
        "{} atoms, {} bonds",
        atoms_in,
        topology.bonds.len()
    );

    info!(
        "reading force field from {}",
        request.forcefield_in.display()
    );
    let forcefield = ForcefieldDocument::read_from_path(&request.forcefield_in)?;

    let annotated = topology.annotate(&forcefield)?;
    let table = PolarizationTable::build(&request.alpha_path, &annotated)?;
    info!("{} polarizable types", table.specs().len());

    let polarized_field = forcefield.polarize(&table)?;
    let polarized_topology = annotated.polarize(&polarized_field, request.jitter)?;

    write_topology(&polarized_topology, &request.topology_out)?;
    polarized_field.write_to_path(&request.forcefield_out)?;
    info!(
        "wrote {} and {}",
        request.topology_out.display(),
        request.forcefield_out.display()
    );

    Ok(PolarizeSummary {
        atoms_in,
        atoms_out: polarized_topology.natoms(),
        ndrude: polarized_topology.ndrude,
        ntypes: table.specs().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::pdb::PdbFile;
    use std::fs;
    use tempfile::tempdir;

    const FIELD_XML: &str = r#"<ForceField>
 <AtomTypes>
  <Type name="CT-c1" class="CT" mass="12.011"/>
  <Type name="HA-h1" class="HA" mass="1.008"/>
 </AtomTypes>
 <Residues>
  <Residue name="MTH">
   <Atom name="C1" type="CT-c1" charge="-0.3"/>
   <Atom name="H11" type="HA-h1" charge="0.1"/>
   <Atom name="H12" type="HA-h1" charge="0.1"/>
   <Atom name="H13" type="HA-h1" charge="0.1"/>
  </Residue>
 </Residues>
 <HarmonicBondForce>
  <Bond class1="CT" class2="HA" length="0.109" k="282252.0"/>
 </HarmonicBondForce>
 <NonbondedForce coulomb14scale="0.5" lj14scale="0.5">
  <Atom type="CT-c1" charge="-0.3" sigma="0.35" epsilon="0.276"/>
  <Atom type="HA-h1" charge="0.1" sigma="0.25" epsilon="0.125"/>
 </NonbondedForce>
</ForceField>
"#;

    const TOPOLOGY_PDB: &str = "\
TITLE     one methane-ish molecule
CRYST1   30.000   30.000   30.000  90.00  90.00  90.00
ATOM      1 C1   MTH     1       0.000   0.000   0.000  1.00  0.00           C
ATOM      2 H11  MTH     1       1.090   0.000   0.000  1.00  0.00           H
ATOM      3 H12  MTH     1      -0.360   1.030   0.000  1.00  0.00           H
ATOM      4 H13  MTH     1      -0.360  -0.510   0.890  1.00  0.00           H
CONECT    1    2
CONECT    1    3
CONECT    1    4
END
";

    const ALPHA_TABLE: &str = "\
HA-h1 0.4 0.0 4184.0 0.323 2.6
CT-c1 0.4 0.0 4184.0 1.2 2.6
";

    #[test]
    fn pipeline_produces_consistent_outputs() {
        let dir = tempdir().unwrap();
        let request = PolarizeRequest {
            alpha_path: dir.path().join("alpha.ff"),
            forcefield_in: dir.path().join("field.xml"),
            forcefield_out: dir.path().join("field-p.xml"),
            topology_in: dir.path().join("config.pdb"),
            topology_out: dir.path().join("config-p.pdb"),
            jitter: 0.02,
        };
        fs::write(&request.alpha_path, ALPHA_TABLE).unwrap();
        fs::write(&request.forcefield_in, FIELD_XML).unwrap();
        fs::write(&request.topology_in, TOPOLOGY_PDB).unwrap();

        let summary = run(&request).unwrap();
        assert_eq!(
            summary,
            PolarizeSummary {
                atoms_in: 4,
                atoms_out: 5,
                ndrude: 1,
                ntypes: 1,
            }
        );

        let topology = PdbFile::read_from_path(&request.topology_out).unwrap();
        assert_eq!(topology.natoms(), 5);
        assert_eq!(topology.atoms[1].name, "DC1");
        assert!(topology.atoms[1].is_drude());
        // Original bonds still resolve to the same atoms after insertion.
        assert_eq!(topology.bonds.len(), 3);
        for bond in &topology.bonds {
            assert_eq!(topology.atoms[bond.atom1].name, "C1");
        }

        let field_text = fs::read_to_string(&request.forcefield_out).unwrap();
        assert!(field_text.contains("DrudeForce"));
        assert!(field_text.contains("DRUD-CT-c1"));
        assert!(!field_text.contains("core="));
    }

    #[test]
    fn pipeline_writes_the_tag_based_format_when_asked() {
        let dir = tempdir().unwrap();
        let request = PolarizeRequest {
            alpha_path: dir.path().join("alpha.ff"),
            forcefield_in: dir.path().join("field.xml"),
            forcefield_out: dir.path().join("field-p.xml"),
            topology_in: dir.path().join("config.pdb"),
            topology_out: dir.path().join("config-p.cif"),
            jitter: 0.02,
        };
        fs::write(&request.alpha_path, ALPHA_TABLE).unwrap();
        fs::write(&request.forcefield_in, FIELD_XML).unwrap();
        fs::write(&request.topology_in, TOPOLOGY_PDB).unwrap();

        run(&request).unwrap();
        let text = fs::read_to_string(&request.topology_out).unwrap();
        assert!(text.starts_with("data_"));
        assert!(text.contains("_atom_site.label_atom_id"));
        assert!(text.contains("EP"));
    }

    #[test]
    fn missing_input_surfaces_as_a_fatal_error() {
        let dir = tempdir().unwrap();
        let request = PolarizeRequest {
            alpha_path: dir.path().join("alpha.ff"),
            forcefield_in: dir.path().join("field.xml"),
            forcefield_out: dir.path().join("field-p.xml"),
            topology_in: dir.path().join("missing.pdb"),
            topology_out: dir.path().join("config-p.pdb"),
            jitter: 0.02,
        };
        assert!(run(&request).is_err());
    }
}
