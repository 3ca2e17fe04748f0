use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error raised anywhere in the polarization pipeline.
///
/// Every structural inconsistency aborts the entire run; there is no
/// partial-result or retry semantics. Non-fatal conditions (unknown element
/// symbols, over-wide atom names, divergent hydrogen polarizabilities) are
/// logged as warnings instead and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Malformed or missing required fields in an input file.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

/// Structurally inconsistent input that no amount of reformatting can fix.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error(
        "Bond between atoms {serial1} and {serial2} crosses residues {res1} and {res2}; \
         bonds must stay within one residue"
    )]
    CrossResidueBond {
        serial1: usize,
        serial2: usize,
        res1: usize,
        res2: usize,
    },

    #[error(
        "Atoms '{name1}' and '{name2}' share type '{type_name}' but are bonded to \
         {nh1} and {nh2} hydrogens; a type must represent a single chemical environment"
    )]
    BondedHydrogenMismatch {
        type_name: String,
        name1: String,
        name2: String,
        nh1: u32,
        nh2: u32,
    },

    #[error(
        "System size {value} exceeds the fixed-column format's maximum of {max}; \
         write the tag-based columnar format instead"
    )]
    SystemTooLarge { value: usize, max: usize },
}

/// The force-field document (or a tag-based structural file) does not match
/// the expected schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Duplicate atom type name '{0}' in force field")]
    DuplicateAtomType(String),

    #[error("Missing required section <{0}> in force field")]
    MissingSection(String),

    #[error("No residue template matches residue '{0}'")]
    UnknownResidue(String),

    #[error("Residue template '{residue}' has no atom named '{name}'")]
    UnknownTemplateAtom { residue: String, name: String },

    #[error("Atom type '{0}' is not declared in <AtomTypes>")]
    UnknownAtomType(String),

    #[error("Required attribute '{attr}' missing on <{tag}>")]
    MissingAttribute { tag: String, attr: String },

    #[error("Missing required column '{0}' in atom-site or connectivity category")]
    MissingColumn(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Format(FormatError::Io(e))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Format(FormatError::Xml(e))
    }
}
