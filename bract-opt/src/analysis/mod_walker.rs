//! Driver and fan-in indexing for a module.
use std::collections::{HashMap, HashSet};

use bract_ir::{CellId, Id, Module, SigBit, SigMap, SigSpec};

/// One bit of one cell connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortBit {
    pub cell: CellId,
    pub port: Id,
    pub offset: usize,
}

/// Indexes which cell output drives each signal bit and which canonical
/// bits each cell consumes. Built once from a module snapshot; any netlist
/// mutation invalidates it.
pub struct ModWalker {
    pub sigmap: SigMap,
    drivers: HashMap<SigBit, Vec<PortBit>>,
    cell_inputs: HashMap<CellId, HashSet<SigBit>>,
}

impl ModWalker {
    pub fn new(module: &Module) -> Self {
        let sigmap = SigMap::from_module(module);
        let mut drivers: HashMap<SigBit, Vec<PortBit>> = HashMap::new();
        let mut cell_inputs: HashMap<CellId, HashSet<SigBit>> = HashMap::new();

        for (id, cell) in module.cells() {
            for (port, sig) in cell.connections() {
                let is_output = cell.ty.is_output_port(port.as_ref());
                for (offset, bit) in sig.iter().enumerate() {
                    let bit = sigmap.bit(bit);
                    if !bit.is_wire() {
                        continue;
                    }
                    if is_output {
                        drivers.entry(bit).or_default().push(PortBit {
                            cell: id,
                            port,
                            offset,
                        });
                    } else {
                        cell_inputs.entry(id).or_default().insert(bit);
                    }
                }
            }
        }

        ModWalker {
            sigmap,
            drivers,
            cell_inputs,
        }
    }

    /// True if at least one bit of the signal is driven by a cell output.
    pub fn has_drivers(&self, sig: &SigSpec) -> bool {
        sig.iter()
            .any(|b| self.drivers.contains_key(&self.sigmap.bit(b)))
    }

    /// All cell output bits driving any of the given bits.
    pub fn get_drivers(
        &self,
        bits: impl IntoIterator<Item = SigBit>,
    ) -> HashSet<PortBit> {
        let mut found = HashSet::new();
        for bit in bits {
            if let Some(pbs) = self.drivers.get(&self.sigmap.bit(bit)) {
                found.extend(pbs.iter().copied());
            }
        }
        found
    }

    /// The canonical input bits of a cell.
    pub fn cell_inputs(
        &self,
        cell: CellId,
    ) -> impl Iterator<Item = SigBit> + '_ {
        self.cell_inputs
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_gate_drivers() {
        let mut m = Module::new("top");
        let a = m.fresh_wire(2);
        let b = m.fresh_wire(2);
        let y = m.add_and(a.clone(), b.clone());

        let walker = ModWalker::new(&m);
        assert!(walker.has_drivers(&y));
        assert!(!walker.has_drivers(&a));

        let drivers = walker.get_drivers(y.iter());
        assert_eq!(drivers.len(), 2);
        let pb = drivers.iter().next().unwrap();
        assert_eq!(pb.port, Id::from("Y"));

        let inputs: HashSet<SigBit> = walker.cell_inputs(pb.cell).collect();
        assert!(inputs.contains(&a.bit(0)));
        assert!(inputs.contains(&b.bit(1)));
        assert!(!inputs.contains(&y.bit(0)));
    }
}
