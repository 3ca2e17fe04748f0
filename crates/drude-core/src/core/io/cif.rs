//! Tag-based columnar topology format.
//!
//! Atoms come from an `_atom_site` loop and connectivity from a
//! `_struct_conn` loop; both categories declare their column sets explicitly
//! and any missing required column is fatal. Cell parameters are read from
//! the `_cell` category. Unlike the fixed-column format there is no ceiling
//! on the number of atoms, so identifiers are plain decimal.

use super::traits::TopologyFile;
use crate::core::error::{ConsistencyError, FormatError, Result, SchemaError};
use crate::core::models::atom::{Atom, is_known_element};
use crate::core::models::topology::{Bond, Topology};
use nalgebra::Point3;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};
use tracing::warn;

const ATOM_SITE: &str = "_atom_site";
const STRUCT_CONN: &str = "_struct_conn";

const REQUIRED_ATOM_SITE: [&str; 10] = [
    "id",
    "type_symbol",
    "label_atom_id",
    "label_comp_id",
    "label_seq_id",
    "label_asym_id",
    "Cartn_x",
    "Cartn_y",
    "Cartn_z",
    "pdbx_formal_charge",
];

const REQUIRED_STRUCT_CONN: [&str; 4] = [
    "ptnr1_label_seq_id",
    "ptnr1_label_atom_id",
    "ptnr2_label_seq_id",
    "ptnr2_label_atom_id",
];

/// A parsed `loop_` block: column names (without the category prefix) and
/// whitespace-tokenized data rows.
struct Loop {
    category: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    first_line: usize,
}

impl Loop {
    fn column_indices(&self, required: &[&str]) -> Result<Vec<usize>> {
        required
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| {
                        SchemaError::MissingColumn(format!("{}.{}", self.category, name)).into()
                    })
            })
            .collect()
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn is_null(value: &str) -> bool {
    value == "." || value == "?"
}

fn parse_error(line: usize, message: String) -> crate::core::error::Error {
    FormatError::Parse { line, message }.into()
}

pub struct CifFile;

impl TopologyFile for CifFile {
    fn read_from(reader: &mut impl BufRead) -> Result<Topology> {
        let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;

        let mut topology = Topology::new();
        let mut single_items: HashMap<String, String> = HashMap::new();
        let mut loops: Vec<Loop> = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();
            if line.is_empty() || line.starts_with('#') {
                i += 1;
            } else if let Some(name) = line.strip_prefix("data_") {
                topology.title = name.to_string();
                i += 1;
            } else if line == "loop_" {
                let (block, next) = parse_loop(&lines, i + 1)?;
                loops.push(block);
                i = next;
            } else if line.starts_with('_') {
                // Single key-value item, e.g. `_cell.length_a 30.0`.
                let mut parts = line.splitn(2, char::is_whitespace);
                let key = parts.next().unwrap_or_default();
                if let Some(value) = parts.next() {
                    single_items.insert(key.to_string(), unquote(value.trim()).to_string());
                }
                i += 1;
            } else {
                i += 1;
            }
        }

        for (slot, key) in [
            "length_a", "length_b", "length_c", "angle_alpha", "angle_beta", "angle_gamma",
        ]
        .iter()
        .enumerate()
        {
            if let Some(value) = single_items.get(&format!("_cell.{key}")) {
                topology.cell[slot] = value
                    .parse()
                    .map_err(|_| parse_error(0, format!("invalid _cell.{key} value '{value}'")))?;
            }
        }

        let atom_site = loops
            .iter()
            .find(|l| l.category == ATOM_SITE)
            .ok_or_else(|| FormatError::MissingRecord(format!("{ATOM_SITE} loop")))?;
        read_atoms(atom_site, &mut topology)?;

        if let Some(conn) = loops.iter().find(|l| l.category == STRUCT_CONN) {
            read_bonds(conn, &mut topology)?;
        }

        Ok(topology)
    }

    fn write_to(topology: &Topology, writer: &mut impl Write) -> Result<()> {
        let block_name = if topology.title.is_empty() {
            "drudepp".to_string()
        } else {
            topology.title.replace(char::is_whitespace, "_")
        };
        writeln!(writer, "data_{block_name}")?;
        writeln!(writer, "#")?;

        let c = &topology.cell;
        writeln!(writer, "_cell.length_a    {:.3}", c[0])?;
        writeln!(writer, "_cell.length_b    {:.3}", c[1])?;
        writeln!(writer, "_cell.length_c    {:.3}", c[2])?;
        writeln!(writer, "_cell.angle_alpha {:.2}", c[3])?;
        writeln!(writer, "_cell.angle_beta  {:.2}", c[4])?;
        writeln!(writer, "_cell.angle_gamma {:.2}", c[5])?;
        writeln!(writer, "#")?;

        writeln!(writer, "loop_")?;
        writeln!(writer, "{ATOM_SITE}.group_PDB")?;
        for column in REQUIRED_ATOM_SITE {
            writeln!(writer, "{ATOM_SITE}.{column}")?;
        }
        for (index, atom) in topology.atoms.iter().enumerate() {
            let element = if atom.element.is_empty() {
                "."
            } else {
                &atom.element
            };
            let chain = if atom.chain_id.is_empty() {
                "."
            } else {
                &atom.chain_id
            };
            writeln!(
                writer,
                "ATOM {} {} {} {} {} {} {:.3} {:.3} {:.3} {}",
                index + 1,
                element,
                atom.name,
                atom.res_name,
                atom.res_seq,
                chain,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                atom.formal_charge
            )?;
        }
        writeln!(writer, "#")?;

        if !topology.bonds.is_empty() {
            writeln!(writer, "loop_")?;
            writeln!(writer, "{STRUCT_CONN}.id")?;
            writeln!(writer, "{STRUCT_CONN}.conn_type_id")?;
            for column in REQUIRED_STRUCT_CONN {
                writeln!(writer, "{STRUCT_CONN}.{column}")?;
            }
            for (index, bond) in topology.bonds.iter().enumerate() {
                let a = &topology.atoms[bond.atom1];
                let b = &topology.atoms[bond.atom2];
                writeln!(
                    writer,
                    "covale{} covale {} {} {} {}",
                    index + 1,
                    a.res_seq,
                    a.name,
                    b.res_seq,
                    b.name
                )?;
            }
            writeln!(writer, "#")?;
        }
        Ok(())
    }
}

fn parse_loop(lines: &[String], mut i: usize) -> Result<(Loop, usize)> {
    let first_line = i + 1;
    let mut category = String::new();
    let mut columns = Vec::new();

    while i < lines.len() {
        let line = lines[i].trim();
        if let Some((cat, column)) = line.split_once('.') {
            if !line.starts_with('_') {
                break;
            }
            if category.is_empty() {
                category = cat.to_string();
            } else if cat != category {
                return Err(parse_error(
                    i + 1,
                    format!("loop mixes categories '{category}' and '{cat}'"),
                ));
            }
            columns.push(column.to_string());
            i += 1;
        } else {
            break;
        }
    }
    if columns.is_empty() {
        return Err(parse_error(first_line, "loop_ declares no columns".to_string()));
    }

    let mut rows = Vec::new();
    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with('_')
            || line == "loop_"
            || line.starts_with("data_")
        {
            break;
        }
        let row: Vec<String> = line
            .split_whitespace()
            .map(|v| unquote(v).to_string())
            .collect();
        if row.len() != columns.len() {
            return Err(parse_error(
                i + 1,
                format!(
                    "row has {} values but the {} loop declares {} columns",
                    row.len(),
                    category,
                    columns.len()
                ),
            ));
        }
        rows.push(row);
        i += 1;
    }

    Ok((
        Loop {
            category,
            columns,
            rows,
            first_line,
        },
        i,
    ))
}

fn read_atoms(block: &Loop, topology: &mut Topology) -> Result<()> {
    let idx = block.column_indices(&REQUIRED_ATOM_SITE)?;
    let [id, type_symbol, atom_id, comp_id, seq_id, asym_id, x, y, z, formal_charge] =
        [idx[0], idx[1], idx[2], idx[3], idx[4], idx[5], idx[6], idx[7], idx[8], idx[9]];

    for (offset, row) in block.rows.iter().enumerate() {
        let line = block.first_line + block.columns.len() + offset;
        let serial: usize = row[id]
            .parse()
            .map_err(|_| parse_error(line, format!("invalid atom id '{}'", row[id])))?;
        let seq: usize = if is_null(&row[seq_id]) {
            0
        } else {
            row[seq_id].parse().map_err(|_| {
                parse_error(line, format!("invalid label_seq_id '{}'", row[seq_id]))
            })?
        };
        let parse_coord = |value: &str| -> Result<f64> {
            value
                .parse()
                .map_err(|_| parse_error(line, format!("invalid coordinate '{value}'")))
        };
        let position = Point3::new(
            parse_coord(&row[x])?,
            parse_coord(&row[y])?,
            parse_coord(&row[z])?,
        );

        let mut atom = Atom::new(serial, &row[atom_id], &row[comp_id], seq, position);
        if !is_null(&row[type_symbol]) {
            atom.element = row[type_symbol].clone();
            if !is_known_element(&atom.element) {
                warn!(
                    "unrecognized element symbol '{}' for atom '{}' (line {})",
                    atom.element, atom.name, line
                );
            }
        }
        if !is_null(&row[asym_id]) {
            atom.chain_id = row[asym_id].clone();
        }
        if !is_null(&row[formal_charge]) {
            atom.formal_charge = row[formal_charge].parse().map_err(|_| {
                parse_error(
                    line,
                    format!("invalid formal charge '{}'", row[formal_charge]),
                )
            })?;
        }
        if atom.is_drude() {
            topology.ndrude += 1;
        }
        topology.atoms.push(atom);
    }
    Ok(())
}

fn read_bonds(block: &Loop, topology: &mut Topology) -> Result<()> {
    let idx = block.column_indices(&REQUIRED_STRUCT_CONN)?;
    let [seq1, name1, seq2, name2] = [idx[0], idx[1], idx[2], idx[3]];

    let mut by_seq_and_name: HashMap<(usize, &str), usize> = HashMap::new();
    for (index, atom) in topology.atoms.iter().enumerate() {
        by_seq_and_name
            .entry((atom.res_seq, atom.name.as_str()))
            .or_insert(index);
    }

    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for (offset, row) in block.rows.iter().enumerate() {
        let line = block.first_line + block.columns.len() + offset;
        let parse_seq = |value: &str| -> Result<usize> {
            value
                .parse()
                .map_err(|_| parse_error(line, format!("invalid sequence id '{value}'")))
        };
        let s1 = parse_seq(&row[seq1])?;
        let s2 = parse_seq(&row[seq2])?;
        let resolve = |seq: usize, name: &str| -> Result<usize> {
            by_seq_and_name.get(&(seq, name)).copied().ok_or_else(|| {
                parse_error(
                    line,
                    format!("connectivity references unknown atom '{name}' in residue {seq}"),
                )
            })
        };
        let i = resolve(s1, &row[name1])?;
        let j = resolve(s2, &row[name2])?;
        if s1 != s2 {
            return Err(ConsistencyError::CrossResidueBond {
                serial1: topology.atoms[i].serial,
                serial2: topology.atoms[j].serial,
                res1: s1,
                res2: s2,
            }
            .into());
        }
        let key = (i.min(j), i.max(j));
        if seen.insert(key) {
            topology.bonds.push(Bond::new(key.0, key.1));
        }
    }
    Ok(())
}
