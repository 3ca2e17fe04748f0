use crate::core::error::{Result, SchemaError};
use crate::core::io::pdb::RES_NAME_WIDTH;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One node of the hierarchical force-field document.
///
/// The document is treated as an opaque attribute tree; the schema-aware
/// accessors live on [`ForcefieldDocument`]. Attribute order is preserved so
/// serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the attribute if present, appends it otherwise.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn children_tagged_mut<'a>(
        &'a mut self,
        tag: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> {
        self.children.iter_mut().filter(move |c| c.tag == tag)
    }

    /// Parses a document from XML text.
    pub fn parse(reader: &mut impl BufRead) -> Result<Element> {
        let mut xml = Reader::from_reader(reader);
        xml.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::new();
        loop {
            match xml.read_event_into(&mut buf)? {
                Event::Start(ref e) => stack.push(element_from_event(e.name().as_ref(), e)),
                Event::Empty(ref e) => {
                    let element = element_from_event(e.name().as_ref(), e);
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        root.ok_or_else(|| SchemaError::MissingSection("ForceField".to_string()).into())
    }

    /// Serializes the tree as indented XML.
    pub fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.write_into(writer, 0)
    }

    fn write_into(&self, writer: &mut impl Write, depth: usize) -> io::Result<()> {
        let indent = "  ".repeat(depth);
        write!(writer, "{}<{}", indent, self.tag)?;
        for (name, value) in &self.attrs {
            write!(writer, " {}=\"{}\"", name, escape_attr(value))?;
        }
        if self.children.is_empty() {
            writeln!(writer, "/>")?;
        } else {
            writeln!(writer, ">")?;
            for child in &self.children {
                child.write_into(writer, depth + 1)?;
            }
            writeln!(writer, "{}</{}>", indent, self.tag)?;
        }
        Ok(())
    }
}

fn element_from_event(name: &[u8], e: &quick_xml::events::BytesStart) -> Element {
    let mut element = Element::new(&String::from_utf8_lossy(name));
    for attr in e.attributes().flatten() {
        element.attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).to_string(),
            String::from_utf8_lossy(&attr.value).to_string(),
        ));
    }
    element
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Canonical form of a residue label for template lookups: trailing charge
/// markers stripped, then truncated to the fixed-column residue-name width.
pub(crate) fn normalize_residue_label(label: &str) -> &str {
    let stripped = label.trim_end_matches(['+', '-']);
    stripped.get(..RES_NAME_WIDTH).unwrap_or(stripped)
}

/// A core-bearing residue-template atom: where the topology insertion pass
/// must materialize an auxiliary particle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrudeSite {
    /// Normalized name of the residue template the site belongs to.
    pub residue: String,
    /// Name of the core atom within the template.
    pub core: String,
    /// Name of the auxiliary atom to place next to the core.
    pub name: String,
}

/// A loaded force-field document plus the atom-type registry derived from it.
///
/// The registry maps every `<Type name=...>` to its bonded class and is the
/// second stage of the chained type lookup; a duplicate type name makes the
/// whole document unusable.
#[derive(Debug, Clone)]
pub struct ForcefieldDocument {
    root: Element,
    classes: HashMap<String, String>,
}

impl ForcefieldDocument {
    pub fn read_from(reader: &mut impl BufRead) -> Result<Self> {
        Self::from_root(Element::parse(reader)?)
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    pub(crate) fn from_root(root: Element) -> Result<Self> {
        if root.tag != "ForceField" {
            return Err(SchemaError::MissingSection("ForceField".to_string()).into());
        }
        let types = root
            .child("AtomTypes")
            .ok_or_else(|| SchemaError::MissingSection("AtomTypes".to_string()))?;

        let mut classes = HashMap::new();
        for entry in types.children_tagged("Type") {
            let name = require_attr(entry, "name")?;
            let class = require_attr(entry, "class")?;
            if classes.insert(name.to_string(), class.to_string()).is_some() {
                return Err(SchemaError::DuplicateAtomType(name.to_string()).into());
            }
        }
        Ok(Self { root, classes })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Bonded class of a non-bonded type name.
    pub fn atom_class(&self, type_name: &str) -> Result<&str> {
        self.classes
            .get(type_name)
            .map(|c| c.as_str())
            .ok_or_else(|| SchemaError::UnknownAtomType(type_name.to_string()).into())
    }

    /// Residue template matching a (possibly charged, possibly over-wide)
    /// residue label from the topology.
    pub fn residue_template(&self, label: &str) -> Result<&Element> {
        let residues = self
            .root
            .child("Residues")
            .ok_or_else(|| SchemaError::MissingSection("Residues".to_string()))?;
        let wanted = normalize_residue_label(label);
        residues
            .children_tagged("Residue")
            .find(|r| r.attr("name").map(normalize_residue_label) == Some(wanted))
            .ok_or_else(|| SchemaError::UnknownResidue(label.to_string()).into())
    }

    /// Resolves a topology atom to its `(type, class)` pair by the chained
    /// lookup: residue label → template → atom name → type string → class.
    pub fn atom_type_for(&self, res_label: &str, atom_name: &str) -> Result<(String, String)> {
        let template = self.residue_template(res_label)?;
        let atom = template
            .children_tagged("Atom")
            .find(|a| a.attr("name") == Some(atom_name))
            .ok_or_else(|| SchemaError::UnknownTemplateAtom {
                residue: template.attr("name").unwrap_or_default().to_string(),
                name: atom_name.to_string(),
            })?;
        let type_name = require_attr(atom, "type")?;
        let class = self.atom_class(type_name)?;
        Ok((type_name.to_string(), class.to_string()))
    }

    /// All `(residue, core, auxiliary-name)` sites declared by core-bearing
    /// template atoms, in document order.
    pub fn drude_sites(&self) -> Vec<DrudeSite> {
        let mut sites = Vec::new();
        let Some(residues) = self.root.child("Residues") else {
            return sites;
        };
        for residue in residues.children_tagged("Residue") {
            let Some(res_name) = residue.attr("name") else {
                continue;
            };
            for atom in residue.children_tagged("Atom") {
                if let (Some(core), Some(name)) = (atom.attr("core"), atom.attr("name")) {
                    sites.push(DrudeSite {
                        residue: normalize_residue_label(res_name).to_string(),
                        core: core.to_string(),
                        name: name.to_string(),
                    });
                }
            }
        }
        sites
    }

    /// Serializes the document.
    ///
    /// `core` attributes are an insertion-time annotation only and are
    /// stripped from every residue template; the topology insertion pass must
    /// have consumed them before this is called.
    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        let mut clean = self.root.clone();
        if let Some(residues) = clean.child_mut("Residues") {
            for residue in residues.children_tagged_mut("Residue") {
                for atom in residue.children_tagged_mut("Atom") {
                    atom.remove_attr("core");
                }
            }
        }
        clean
            .write(writer)
            .map_err(crate::core::error::FormatError::Io)?;
        Ok(())
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)
    }
}

fn require_attr<'a>(element: &'a Element, attr: &str) -> Result<&'a str> {
    element.attr(attr).ok_or_else(|| {
        SchemaError::MissingAttribute {
            tag: element.tag.clone(),
            attr: attr.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;

    const FIELD_XML: &str = r#"<ForceField>
 <AtomTypes>
  <Type name="CT-c1" class="CT" mass="12.011"/>
  <Type name="HA-h1" class="HA" mass="1.008"/>
 </AtomTypes>
 <Residues>
  <Residue name="EMI">
   <Atom name="C1" type="CT-c1" charge="-0.17"/>
   <Atom name="H11" type="HA-h1" charge="0.13"/>
   <Bond atomName1="C1" atomName2="H11"/>
  </Residue>
 </Residues>
 <HarmonicBondForce>
  <Bond class1="CT" class2="HA" length="0.109" k="282252.0"/>
 </HarmonicBondForce>
 <NonbondedForce coulomb14scale="0.5" lj14scale="0.5">
  <Atom type="CT-c1" charge="-0.17" sigma="0.35" epsilon="0.276"/>
 </NonbondedForce>
</ForceField>
"#;

    fn load(xml: &str) -> Result<ForcefieldDocument> {
        ForcefieldDocument::read_from(&mut xml.as_bytes())
    }

    #[test]
    fn parse_builds_the_expected_tree() {
        let doc = load(FIELD_XML).unwrap();
        let root = doc.root();
        assert_eq!(root.tag, "ForceField");
        assert_eq!(root.children.len(), 4);

        let types = root.child("AtomTypes").unwrap();
        assert_eq!(types.children_tagged("Type").count(), 2);
        let first = types.children_tagged("Type").next().unwrap();
        assert_eq!(first.attr("name"), Some("CT-c1"));
        assert_eq!(first.attr("mass"), Some("12.011"));
    }

    #[test]
    fn atom_class_resolves_through_the_registry() {
        let doc = load(FIELD_XML).unwrap();
        assert_eq!(doc.atom_class("CT-c1").unwrap(), "CT");
        assert!(matches!(
            doc.atom_class("XX-x1"),
            Err(Error::Schema(SchemaError::UnknownAtomType(_)))
        ));
    }

    #[test]
    fn duplicate_type_names_are_rejected() {
        let xml = r#"<ForceField>
 <AtomTypes>
  <Type name="CT-c1" class="CT" mass="12.011"/>
  <Type name="CT-c1" class="CT" mass="12.011"/>
 </AtomTypes>
</ForceField>"#;
        assert!(matches!(
            load(xml),
            Err(Error::Schema(SchemaError::DuplicateAtomType(_)))
        ));
    }

    #[test]
    fn missing_atom_types_section_is_a_schema_error() {
        let xml = "<ForceField><Residues/></ForceField>";
        assert!(matches!(
            load(xml),
            Err(Error::Schema(SchemaError::MissingSection(_)))
        ));
    }

    #[test]
    fn residue_lookup_normalizes_charge_markers_and_width() {
        let doc = load(FIELD_XML).unwrap();
        assert!(doc.residue_template("EMI").is_ok());
        assert!(doc.residue_template("EMI+").is_ok());
        assert!(matches!(
            doc.residue_template("HOH"),
            Err(Error::Schema(SchemaError::UnknownResidue(_)))
        ));
    }

    #[test]
    fn atom_type_for_runs_the_chained_lookup() {
        let doc = load(FIELD_XML).unwrap();
        let (type_name, class) = doc.atom_type_for("EMI+", "C1").unwrap();
        assert_eq!(type_name, "CT-c1");
        assert_eq!(class, "CT");

        assert!(matches!(
            doc.atom_type_for("EMI", "ZZ"),
            Err(Error::Schema(SchemaError::UnknownTemplateAtom { .. }))
        ));
    }

    #[test]
    fn normalize_residue_label_strips_and_truncates() {
        assert_eq!(normalize_residue_label("EMI+"), "EMI");
        assert_eq!(normalize_residue_label("dca-"), "dca");
        assert_eq!(normalize_residue_label("C4MIM"), "C4MI");
        assert_eq!(normalize_residue_label("HOH"), "HOH");
    }

    #[test]
    fn drude_sites_collects_core_bearing_template_atoms() {
        let xml = r#"<ForceField>
 <AtomTypes>
  <Type name="CT-c1" class="CT" mass="12.011"/>
 </AtomTypes>
 <Residues>
  <Residue name="EMI">
   <Atom name="C1" type="CT-c1" charge="0.0"/>
   <Atom name="DC1" type="DRUD-CT-c1" charge="-0.5" core="C1"/>
  </Residue>
 </Residues>
</ForceField>"#;
        let doc = load(xml).unwrap();
        let sites = doc.drude_sites();
        assert_eq!(
            sites,
            vec![DrudeSite {
                residue: "EMI".to_string(),
                core: "C1".to_string(),
                name: "DC1".to_string(),
            }]
        );
    }

    #[test]
    fn write_round_trips_and_strips_core_attributes() {
        let xml = r#"<ForceField>
 <AtomTypes>
  <Type name="CT-c1" class="CT" mass="12.011"/>
 </AtomTypes>
 <Residues>
  <Residue name="EMI">
   <Atom name="C1" type="CT-c1" charge="0.3"/>
   <Atom name="DC1" type="DRUD-CT-c1" charge="-0.3" core="C1"/>
  </Residue>
 </Residues>
</ForceField>"#;
        let doc = load(xml).unwrap();
        let mut out = Vec::new();
        doc.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("core="));
        assert!(text.contains("name=\"DC1\""));

        let reparsed = ForcefieldDocument::read_from(&mut text.as_bytes()).unwrap();
        assert!(reparsed.drude_sites().is_empty());
        assert_eq!(reparsed.atom_class("CT-c1").unwrap(), "CT");
    }

    #[test]
    fn attribute_values_are_escaped_on_write() {
        let mut element = Element::new("Type");
        element.set_attr("name", "a<b>&\"c\"");
        let mut out = Vec::new();
        element.write(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<Type name=\"a&lt;b&gt;&amp;&quot;c&quot;\"/>\n"
        );
    }
}
