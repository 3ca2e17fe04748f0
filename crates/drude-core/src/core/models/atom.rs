use nalgebra::Point3;
use phf::phf_set;

/// Element tag marking an auxiliary (Drude) particle in the topology.
///
/// Auxiliary particles are not chemical atoms; simulation engines recognize
/// them as extra particles by this symbol.
pub const DRUDE_ELEMENT: &str = "EP";

/// Chemical element symbols accepted without a warning, plus the
/// extra-particle tag. Anything else is carried through verbatim but logged.
static ELEMENT_SYMBOLS: phf::Set<&'static str> = phf_set! {
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "EP",
};

/// Reports whether `symbol` is a recognized element symbol (or the
/// extra-particle tag).
pub fn is_known_element(symbol: &str) -> bool {
    ELEMENT_SYMBOLS.contains(symbol)
}

/// Represents one atom of the topology being polarized.
///
/// Atoms are created at parse time and mutated in place during the annotation
/// pass (`type_name`, `class_name`, `nh`). The chain identifier and formal
/// charge only carry information for the tag-based columnar format; the
/// fixed-column reader leaves them at their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number as read from the input file (1-based, file order).
    pub serial: usize,
    /// Atom name (e.g. "C1", "H11").
    pub name: String,
    /// Residue (molecule) name this atom belongs to.
    pub res_name: String,
    /// Residue sequence number.
    pub res_seq: usize,
    /// Chain / asym identifier (tag-based format only).
    pub chain_id: String,
    /// Cartesian coordinates in the input file's length units.
    pub position: Point3<f64>,
    /// Element symbol, or [`DRUDE_ELEMENT`] for auxiliary particles.
    pub element: String,
    /// Formal charge (tag-based format only).
    pub formal_charge: isize,
    /// Number of bonded hydrogens, filled in by the annotation pass.
    pub nh: u32,
    /// Non-bonded force-field type, filled in by the annotation pass.
    pub type_name: String,
    /// Bonded force-field class, filled in by the annotation pass.
    pub class_name: String,
}

impl Atom {
    /// Creates a new `Atom` with default values for the annotation fields.
    pub fn new(
        serial: usize,
        name: &str,
        res_name: &str,
        res_seq: usize,
        position: Point3<f64>,
    ) -> Self {
        Self {
            serial,
            name: name.to_string(),
            res_name: res_name.to_string(),
            res_seq,
            chain_id: String::new(),
            position,
            element: String::new(),
            formal_charge: 0,
            nh: 0,
            type_name: String::new(),
            class_name: String::new(),
        }
    }

    /// Whether this atom is an auxiliary (Drude) particle.
    pub fn is_drude(&self) -> bool {
        self.element == DRUDE_ELEMENT
    }

    /// Whether this atom's name marks it as a hydrogen.
    ///
    /// Hydrogens are identified by name, not element, because connectivity
    /// counting runs before any element bookkeeping and input files may omit
    /// the element column. Hydrogens never receive auxiliary particles.
    pub fn is_hydrogen(&self) -> bool {
        matches!(self.name.as_bytes().first(), Some(b'H') | Some(b'h'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_has_expected_default_fields() {
        let atom = Atom::new(1, "C1", "EMI", 1, Point3::new(1.0, 2.0, 3.0));

        assert_eq!(atom.serial, 1);
        assert_eq!(atom.name, "C1");
        assert_eq!(atom.res_name, "EMI");
        assert_eq!(atom.res_seq, 1);
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.element, "");
        assert_eq!(atom.nh, 0);
        assert_eq!(atom.type_name, "");
        assert_eq!(atom.class_name, "");
        assert_eq!(atom.formal_charge, 0);
    }

    #[test]
    fn drude_particles_are_detected_by_element_tag() {
        let mut atom = Atom::new(2, "DC1", "EMI", 1, Point3::origin());
        assert!(!atom.is_drude());
        atom.element = DRUDE_ELEMENT.to_string();
        assert!(atom.is_drude());
    }

    #[test]
    fn hydrogen_detection_is_case_insensitive_on_the_first_letter() {
        assert!(Atom::new(1, "H11", "EMI", 1, Point3::origin()).is_hydrogen());
        assert!(Atom::new(1, "h2", "EMI", 1, Point3::origin()).is_hydrogen());
        assert!(!Atom::new(1, "C1", "EMI", 1, Point3::origin()).is_hydrogen());
        assert!(!Atom::new(1, "", "EMI", 1, Point3::origin()).is_hydrogen());
    }

    #[test]
    fn known_elements_include_the_extra_particle_tag() {
        assert!(is_known_element("C"));
        assert!(is_known_element("Cl"));
        assert!(is_known_element("EP"));
        assert!(!is_known_element("Xx"));
        assert!(!is_known_element(""));
    }
}
