use super::traits::TopologyFile;
use crate::core::codec::{self, RESSEQ_DIGITS, SERIAL_DIGITS};
use crate::core::error::{ConsistencyError, FormatError, Result};
use crate::core::models::atom::{Atom, is_known_element};
use crate::core::models::topology::{Bond, Topology};
use nalgebra::Point3;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};
use tracing::warn;

/// Width of the atom-name field in ATOM records.
pub const ATOM_NAME_WIDTH: usize = 4;
/// Width of the residue-name field in ATOM records.
pub const RES_NAME_WIDTH: usize = 4;

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64> {
    let field = slice_and_trim(line, start, end);
    field.parse().map_err(|_| {
        FormatError::Parse {
            line: line_num,
            message: format!(
                "invalid float in columns {}-{} (value: '{}')",
                start + 1,
                end,
                field
            ),
        }
        .into()
    })
}

fn decode_serial(line: &str, line_num: usize, start: usize, end: usize, ndigits: u32) -> Result<usize> {
    codec::decode(slice_and_trim(line, start, end), ndigits).map_err(|e| {
        FormatError::Parse {
            line: line_num,
            message: e.to_string(),
        }
        .into()
    })
}

/// Derives an element symbol from an atom name when the element columns are
/// blank: the first alphabetic character, uppercased.
fn element_from_name(name: &str) -> String {
    name.chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

pub struct PdbFile;

impl TopologyFile for PdbFile {
    fn read_from(reader: &mut impl BufRead) -> Result<Topology> {
        let mut topology = Topology::new();
        let mut seen_cell = false;
        let mut serial_to_index: HashMap<usize, usize> = HashMap::new();
        let mut seen_bonds: HashSet<(usize, usize)> = HashSet::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match slice_and_trim(&line, 0, 6) {
                "CRYST1" => {
                    topology.cell = [
                        parse_float(&line, line_num, 6, 15)?,
                        parse_float(&line, line_num, 15, 24)?,
                        parse_float(&line, line_num, 24, 33)?,
                        parse_float(&line, line_num, 33, 40)?,
                        parse_float(&line, line_num, 40, 47)?,
                        parse_float(&line, line_num, 47, 54)?,
                    ];
                    seen_cell = true;
                }
                "ATOM" | "HETATM" => {
                    let serial = decode_serial(&line, line_num, 6, 11, SERIAL_DIGITS)?;
                    let name = slice_and_trim(&line, 12, 16);
                    if name.is_empty() {
                        return Err(FormatError::Parse {
                            line: line_num,
                            message: "atom name field (columns 13-16) is empty".to_string(),
                        }
                        .into());
                    }
                    let res_name = slice_and_trim(&line, 17, 21);
                    if res_name.is_empty() {
                        return Err(FormatError::Parse {
                            line: line_num,
                            message: "residue name field (columns 18-21) is empty".to_string(),
                        }
                        .into());
                    }
                    let res_seq = decode_serial(&line, line_num, 22, 26, RESSEQ_DIGITS)?;
                    let position = Point3::new(
                        parse_float(&line, line_num, 30, 38)?,
                        parse_float(&line, line_num, 38, 46)?,
                        parse_float(&line, line_num, 46, 54)?,
                    );

                    let mut atom = Atom::new(serial, name, res_name, res_seq, position);
                    let element = slice_and_trim(&line, 76, 78);
                    atom.element = if element.is_empty() {
                        element_from_name(name)
                    } else {
                        element.to_string()
                    };
                    if !is_known_element(&atom.element) {
                        warn!(
                            "unrecognized element symbol '{}' for atom '{}' (line {})",
                            atom.element, atom.name, line_num
                        );
                    }

                    serial_to_index.insert(serial, topology.atoms.len());
                    if atom.is_drude() {
                        topology.ndrude += 1;
                    }
                    topology.atoms.push(atom);
                }
                "CONECT" => {
                    let origin = decode_serial(&line, line_num, 6, 11, SERIAL_DIGITS)?;
                    let &i = serial_to_index.get(&origin).ok_or_else(|| FormatError::Parse {
                        line: line_num,
                        message: format!("CONECT references unknown serial {origin}"),
                    })?;
                    for (start, end) in [(11, 16), (16, 21), (21, 26), (26, 31)] {
                        if slice_and_trim(&line, start, end).is_empty() {
                            continue;
                        }
                        let partner = decode_serial(&line, line_num, start, end, SERIAL_DIGITS)?;
                        let &j = serial_to_index.get(&partner).ok_or_else(|| {
                            FormatError::Parse {
                                line: line_num,
                                message: format!("CONECT references unknown serial {partner}"),
                            }
                        })?;
                        if topology.atoms[i].res_seq != topology.atoms[j].res_seq {
                            return Err(ConsistencyError::CrossResidueBond {
                                serial1: origin,
                                serial2: partner,
                                res1: topology.atoms[i].res_seq,
                                res2: topology.atoms[j].res_seq,
                            }
                            .into());
                        }
                        let key = (i.min(j), i.max(j));
                        if seen_bonds.insert(key) {
                            topology.bonds.push(Bond::new(key.0, key.1));
                        }
                    }
                }
                "END" => break,
                "TITLE" => {
                    topology.title = slice_and_trim(&line, 10, line.len()).to_string();
                }
                _ => {}
            }
        }

        if !seen_cell {
            return Err(FormatError::MissingRecord("CRYST1".to_string()).into());
        }
        if topology.atoms.is_empty() {
            return Err(FormatError::MissingRecord("ATOM/HETATM records".to_string()).into());
        }
        Ok(topology)
    }

    fn write_to(topology: &Topology, writer: &mut impl Write) -> Result<()> {
        let max_serial = codec::max_value(SERIAL_DIGITS);
        if topology.atoms.len() > max_serial {
            return Err(ConsistencyError::SystemTooLarge {
                value: topology.atoms.len(),
                max: max_serial,
            }
            .into());
        }
        let max_resseq = codec::max_value(RESSEQ_DIGITS);
        if let Some(highest) = topology.atoms.iter().map(|a| a.res_seq).max() {
            if highest > max_resseq {
                return Err(ConsistencyError::SystemTooLarge {
                    value: highest,
                    max: max_resseq,
                }
                .into());
            }
        }

        if !topology.title.is_empty() {
            writeln!(writer, "TITLE     {}", topology.title)?;
        }
        let c = &topology.cell;
        writeln!(
            writer,
            "CRYST1{:>9.3}{:>9.3}{:>9.3}{:>7.2}{:>7.2}{:>7.2}",
            c[0], c[1], c[2], c[3], c[4], c[5]
        )?;

        for (index, atom) in topology.atoms.iter().enumerate() {
            // The size checks above guarantee both fields encode.
            let serial = codec::encode(index + 1, SERIAL_DIGITS).unwrap();
            let res_seq = codec::encode(atom.res_seq, RESSEQ_DIGITS).unwrap();
            let mut name = atom.name.clone();
            if name.len() > ATOM_NAME_WIDTH {
                warn!(
                    "atom name '{}' exceeds the {}-character field; truncating",
                    name, ATOM_NAME_WIDTH
                );
                name.truncate(ATOM_NAME_WIDTH);
            }
            let mut res_name = atom.res_name.clone();
            res_name.truncate(RES_NAME_WIDTH);

            writeln!(
                writer,
                "{:<6}{:>5} {:<4} {:<4} {:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6}{:>6}          {:>2}",
                "ATOM",
                serial,
                name,
                res_name,
                res_seq,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                "1.00",
                "0.00",
                atom.element
            )?;
        }

        for bond in &topology.bonds {
            writeln!(
                writer,
                "CONECT{:>5}{:>5}",
                codec::encode(bond.atom1 + 1, SERIAL_DIGITS).unwrap(),
                codec::encode(bond.atom2 + 1, SERIAL_DIGITS).unwrap()
            )?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}
