//! JSON netlist reader and writer.
//!
//! The format mirrors the conventional JSON netlist interchange shape:
//! modules carry `ports`, `cells`, and `netnames` tables; signal bits are
//! either net numbers or the constant strings `"0"`, `"1"`, `"x"`, `"z"`.
use std::collections::{BTreeMap, HashMap};
use std::io;

use bract_utils::{BractResult, Error, Id, NameGenerator};
use serde::{Deserialize, Serialize};

use crate::{
    Cell, CellType, Design, Module, Param, SigBit, SigSpec, State, WireId,
};

#[derive(Serialize, Deserialize)]
struct DesignJson {
    #[serde(default)]
    creator: String,
    modules: BTreeMap<String, ModuleJson>,
}

#[derive(Serialize, Deserialize, Default)]
struct ModuleJson {
    #[serde(default)]
    ports: BTreeMap<String, PortJson>,
    #[serde(default)]
    cells: BTreeMap<String, CellJson>,
    #[serde(default)]
    netnames: BTreeMap<String, NetJson>,
}

#[derive(Serialize, Deserialize)]
struct PortJson {
    direction: String,
    bits: Vec<NetBit>,
}

#[derive(Serialize, Deserialize)]
struct CellJson {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    parameters: BTreeMap<String, ParamJson>,
    #[serde(default)]
    connections: BTreeMap<String, Vec<NetBit>>,
}

#[derive(Serialize, Deserialize)]
struct NetJson {
    bits: Vec<NetBit>,
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(untagged)]
enum NetBit {
    Net(u64),
    Const(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ParamJson {
    Bool(bool),
    Int(i64),
    Str(String),
}

// ----------------------------------------------------------------
// Reading
// ----------------------------------------------------------------

/// Read a design from a JSON netlist.
pub fn read_design<R: io::Read>(reader: R) -> BractResult<Design> {
    let parsed: DesignJson = serde_json::from_reader(reader)?;
    let mut design = Design::new();
    for (name, mj) in &parsed.modules {
        design.add_module(read_module(name, mj)?);
    }
    Ok(design)
}

fn read_module(name: &str, mj: &ModuleJson) -> BractResult<Module> {
    let mut module = Module::new(name);
    // Net number -> first binding site.
    let mut nets: HashMap<u64, SigBit> = HashMap::new();

    let mut declare_wire = |module: &mut Module,
                            nets: &mut HashMap<u64, SigBit>,
                            name: &str,
                            bits: &[NetBit]|
     -> BractResult<()> {
        if module.get_wire(Id::from(name)).is_some() {
            return Ok(());
        }
        let id = module.add_wire(name, bits.len())?;
        let lhs = module.wire_sig(id);
        let mut rhs = SigSpec::with_capacity(bits.len());
        for (offset, nb) in bits.iter().enumerate() {
            match nb {
                NetBit::Const(c) => rhs.push(parse_const(c)?),
                NetBit::Net(n) => {
                    let bit = *nets
                        .entry(*n)
                        .or_insert(SigBit::Wire(id, offset));
                    rhs.push(bit);
                }
            }
        }
        // A wire whose bits resolve elsewhere is an alias of that driver.
        if rhs != lhs {
            module.connections.push((lhs, rhs));
        }
        Ok(())
    };

    for (pname, pj) in &mj.ports {
        declare_wire(&mut module, &mut nets, pname, &pj.bits)?;
        let id = module.get_wire(Id::from(pname.as_str())).unwrap();
        match pj.direction.as_str() {
            "input" => module.wire_mut(id).port_input = true,
            "output" => module.wire_mut(id).port_output = true,
            "inout" => {
                module.wire_mut(id).port_input = true;
                module.wire_mut(id).port_output = true;
            }
            other => {
                return Err(Error::parse_error(format!(
                    "unknown port direction `{}' on `{}'",
                    other, pname
                )))
            }
        }
    }
    for (nname, nj) in &mj.netnames {
        declare_wire(&mut module, &mut nets, nname, &nj.bits)?;
    }

    for (cname, cj) in &mj.cells {
        let ty = CellType::parse(&cj.ty);
        if matches!(ty, CellType::Extern(_)) {
            log::debug!(
                "cell `{}' has unknown type `{}'; treating as extern",
                cname,
                cj.ty
            );
        }
        let mut cell = Cell::new(Id::from(cname.as_str()), ty);
        for (param, value) in &cj.parameters {
            let value = match value {
                ParamJson::Bool(b) => Param::Bool(*b),
                ParamJson::Int(v) => Param::Int(*v),
                ParamJson::Str(s) => Param::Str(s.clone()),
            };
            cell.set_param(param.as_str(), value);
        }
        for (port, bits) in &cj.connections {
            let mut sig = SigSpec::with_capacity(bits.len());
            for nb in bits {
                match nb {
                    NetBit::Const(c) => sig.push(parse_const(c)?),
                    NetBit::Net(n) => {
                        sig.push(*nets.get(n).ok_or_else(|| {
                            Error::parse_error(format!(
                                "cell `{}' references undeclared net {}",
                                cname, n
                            ))
                        })?)
                    }
                }
            }
            cell.set_connection(port.as_str(), sig);
        }
        module.add_cell(cell)?;
    }

    module.seed_names(seed_generator(
        mj.netnames.keys().chain(mj.cells.keys()),
    ));
    Ok(module)
}

fn parse_const(c: &str) -> BractResult<SigBit> {
    match c {
        "0" => Ok(SigBit::Const(State::S0)),
        "1" => Ok(SigBit::Const(State::S1)),
        "x" => Ok(SigBit::Const(State::Sx)),
        "z" => Ok(SigBit::Const(State::Sz)),
        other => Err(Error::parse_error(format!(
            "invalid constant bit `{}'",
            other
        ))),
    }
}

/// Seed the fresh-name generator past any `$prefix$<n>` names already in
/// the input, so synthesized names never collide.
fn seed_generator<'a>(
    names: impl Iterator<Item = &'a String>,
) -> NameGenerator {
    let mut seen: HashMap<String, u64> = HashMap::new();
    for name in names {
        let Some(rest) = name.strip_prefix('$') else {
            continue;
        };
        let Some((prefix, num)) = rest.rsplit_once('$') else {
            continue;
        };
        let Ok(num) = num.parse::<u64>() else {
            continue;
        };
        let entry = seen.entry(prefix.to_string()).or_insert(0);
        *entry = (*entry).max(num);
    }
    NameGenerator::with_prev_generated_names(seen)
}

// ----------------------------------------------------------------
// Writing
// ----------------------------------------------------------------

/// Write a design as a JSON netlist.
pub fn write_design<W: io::Write>(
    writer: W,
    design: &Design,
) -> BractResult<()> {
    let mut modules = BTreeMap::new();
    for module in &design.modules {
        modules.insert(module.name.to_string(), write_module(module));
    }
    let out = DesignJson {
        creator: format!("bract {}", env!("CARGO_PKG_VERSION")),
        modules,
    };
    serde_json::to_writer_pretty(writer, &out)
        .map_err(|e| Error::write_error(e.to_string()))
}

fn write_module(module: &Module) -> ModuleJson {
    let sigmap = crate::SigMap::from_module(module);
    let mut nets: HashMap<SigBit, u64> = HashMap::new();
    // Net numbers 0 and 1 are reserved so constants are never shadowed.
    let mut next_net = 2u64;
    let mut number = |nets: &mut HashMap<SigBit, u64>, bit: SigBit| -> NetBit {
        match bit {
            SigBit::Const(s) => NetBit::Const(s.to_string()),
            SigBit::Wire(..) => {
                let n = *nets.entry(bit).or_insert_with(|| {
                    let n = next_net;
                    next_net += 1;
                    n
                });
                NetBit::Net(n)
            }
        }
    };

    let mut mj = ModuleJson::default();
    let wire_bits: Vec<(WireId, Vec<NetBit>)> = module
        .wires()
        .map(|(id, _)| {
            let bits = module
                .wire_sig(id)
                .iter()
                .map(|b| number(&mut nets, sigmap.bit(b)))
                .collect();
            (id, bits)
        })
        .collect();

    for (id, bits) in wire_bits {
        let wire = module.wire(id);
        let name = wire.name.to_string();
        if wire.port_input || wire.port_output {
            let direction = match (wire.port_input, wire.port_output) {
                (true, true) => "inout",
                (true, false) => "input",
                (false, true) => "output",
                (false, false) => unreachable!(),
            };
            mj.ports.insert(
                name.clone(),
                PortJson {
                    direction: direction.to_string(),
                    bits: bits.clone(),
                },
            );
        }
        mj.netnames.insert(name, NetJson { bits });
    }

    for (_, cell) in module.cells() {
        let mut cj = CellJson {
            ty: cell.ty.as_str().to_string(),
            parameters: BTreeMap::new(),
            connections: BTreeMap::new(),
        };
        for (pname, value) in cell.parameters() {
            let value = match value {
                Param::Bool(b) => ParamJson::Bool(*b),
                Param::Int(v) => ParamJson::Int(*v),
                Param::Str(s) => ParamJson::Str(s.clone()),
            };
            cj.parameters.insert(pname.to_string(), value);
        }
        for (port, sig) in cell.connections() {
            cj.connections.insert(
                port.to_string(),
                sig.iter()
                    .map(|b| number(&mut nets, sigmap.bit(b)))
                    .collect(),
            );
        }
        mj.cells.insert(cell.name().to_string(), cj);
    }
    mj
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"{
        "modules": {
            "top": {
                "ports": {
                    "clk": { "direction": "input", "bits": [2] },
                    "out": { "direction": "output", "bits": [3, 4] }
                },
                "cells": {
                    "g": {
                        "type": "$and",
                        "connections": {
                            "A": [3, 4],
                            "B": ["1", "0"],
                            "Y": [5, 6]
                        }
                    }
                },
                "netnames": {
                    "clk": { "bits": [2] },
                    "out": { "bits": [3, 4] },
                    "y": { "bits": [5, 6] }
                }
            }
        }
    }"#;

    #[test]
    fn read_ports_cells_and_constants() {
        let design = read_design(INPUT.as_bytes()).unwrap();
        let m = design.get_module(Id::from("top")).unwrap();
        let clk = m.get_wire(Id::from("clk")).unwrap();
        assert!(m.wire(clk).port_input);
        assert_eq!(m.wire(clk).width, 1);

        let (_, cell) = m.cells().next().unwrap();
        assert_eq!(cell.ty, CellType::And);
        let b = cell.connection("B").unwrap();
        assert_eq!(b.bit(0), SigBit::ONE);
        assert_eq!(b.bit(1), SigBit::ZERO);
        let a = cell.connection("A").unwrap();
        let out = m.get_wire(Id::from("out")).unwrap();
        assert_eq!(a.bit(0), SigBit::Wire(out, 0));
    }

    #[test]
    fn shared_nets_become_aliases() {
        let input = r#"{
            "modules": {
                "top": {
                    "netnames": {
                        "a": { "bits": [2, 3] },
                        "b": { "bits": [2, 3] }
                    }
                }
            }
        }"#;
        let design = read_design(input.as_bytes()).unwrap();
        let m = design.get_module(Id::from("top")).unwrap();
        assert_eq!(m.connections.len(), 1);
        let map = crate::SigMap::from_module(m);
        let a = m.wire_sig(m.get_wire(Id::from("a")).unwrap());
        let b = m.wire_sig(m.get_wire(Id::from("b")).unwrap());
        assert_eq!(map.map(&a), map.map(&b));
    }

    #[test]
    fn write_then_read_preserves_structure() {
        let design = read_design(INPUT.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_design(&mut buf, &design).unwrap();
        let again = read_design(buf.as_slice()).unwrap();
        let m = again.get_module(Id::from("top")).unwrap();
        assert_eq!(m.cell_count(), 1);
        assert!(m
            .wire(m.get_wire(Id::from("out")).unwrap())
            .port_output);
    }
}
