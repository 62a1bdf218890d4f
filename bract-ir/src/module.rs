//! Modules: netlists of cells connected by multi-bit signals.
use std::collections::HashMap;

use bract_utils::{BractResult, Error, Id, NameGenerator};
use itertools::Itertools;

use crate::idx::{CellId, IndexedMap, WireId};
use crate::{Cell, CellType, Param, SigBit, SigSpec};

/// A named multi-bit wire.
#[derive(Debug, Clone)]
pub struct Wire {
    pub name: Id,
    pub width: usize,
    pub port_input: bool,
    pub port_output: bool,
}

/// A module: wire and cell arenas plus module-level alias connections.
///
/// Cells are owned by the module and referred to by [CellId]. Removing a
/// cell leaves a tombstone in the arena so outstanding ids of other cells
/// stay valid.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: Id,
    wires: IndexedMap<WireId, Wire>,
    cells: IndexedMap<CellId, Option<Cell>>,
    wire_index: HashMap<Id, WireId>,
    cell_index: HashMap<Id, CellId>,
    /// Net aliases: each entry connects the left-hand signal to the
    /// right-hand driver, bit for bit.
    pub connections: Vec<(SigSpec, SigSpec)>,
    names: NameGenerator,
}

impl Module {
    pub fn new<I: Into<Id>>(name: I) -> Self {
        Module {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Seed the fresh-name generator, used when loading a netlist that
    /// already contains generated names.
    pub fn seed_names(&mut self, names: NameGenerator) {
        self.names = names;
    }

    // ----------------------------------------------------------------
    // Wires
    // ----------------------------------------------------------------

    pub fn add_wire<I: Into<Id>>(
        &mut self,
        name: I,
        width: usize,
    ) -> BractResult<WireId> {
        let name = name.into();
        if self.wire_index.contains_key(&name) {
            return Err(Error::already_bound(name, "wire"));
        }
        let id = self.wires.push(Wire {
            name,
            width,
            port_input: false,
            port_output: false,
        });
        self.wire_index.insert(name, id);
        Ok(id)
    }

    /// Create an anonymous wire and return it as a signal.
    pub fn fresh_wire(&mut self, width: usize) -> SigSpec {
        let name = self.names.gen_name("wire");
        let id = self.wires.push(Wire {
            name,
            width,
            port_input: false,
            port_output: false,
        });
        self.wire_index.insert(name, id);
        self.wire_sig(id)
    }

    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id]
    }

    pub fn wire_mut(&mut self, id: WireId) -> &mut Wire {
        &mut self.wires[id]
    }

    pub fn get_wire(&self, name: Id) -> Option<WireId> {
        self.wire_index.get(&name).copied()
    }

    pub fn wires(&self) -> impl Iterator<Item = (WireId, &Wire)> {
        self.wires.iter()
    }

    /// All bits of a wire as a signal, LSB first.
    pub fn wire_sig(&self, id: WireId) -> SigSpec {
        (0..self.wires[id].width)
            .map(|i| SigBit::Wire(id, i))
            .collect()
    }

    // ----------------------------------------------------------------
    // Cells
    // ----------------------------------------------------------------

    pub fn add_cell(&mut self, cell: Cell) -> BractResult<CellId> {
        let name = cell.name();
        if self.cell_index.contains_key(&name) {
            return Err(Error::already_bound(name, "cell"));
        }
        let id = self.cells.push(Some(cell));
        self.cell_index.insert(name, id);
        Ok(id)
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        match &self.cells[id] {
            Some(cell) => cell,
            None => unreachable!("cell id refers to a removed cell"),
        }
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        match &mut self.cells[id] {
            Some(cell) => cell,
            None => unreachable!("cell id refers to a removed cell"),
        }
    }

    pub fn get_cell(&self, name: Id) -> Option<CellId> {
        self.cell_index.get(&name).copied()
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells
            .iter()
            .filter_map(|(id, slot)| slot.as_ref().map(|c| (id, c)))
    }

    pub fn cell_count(&self) -> usize {
        self.cells().count()
    }

    /// Detach and free a cell. The arena slot becomes a tombstone.
    pub fn remove_cell(&mut self, id: CellId) {
        if let Some(cell) = self.cells[id].take() {
            self.cell_index.remove(&cell.name());
        }
    }

    // ----------------------------------------------------------------
    // Gate constructors
    //
    // Each constructor creates the cell plus a fresh output wire and
    // returns the output signal.
    // ----------------------------------------------------------------

    fn insert_gate(&mut self, cell: Cell) {
        let name = cell.name();
        debug_assert!(!self.cell_index.contains_key(&name));
        let id = self.cells.push(Some(cell));
        self.cell_index.insert(name, id);
    }

    fn unary_gate(&mut self, ty: CellType, op: &str, a: SigSpec) -> SigSpec {
        let y = self.fresh_wire(a.width());
        let mut cell = Cell::new(self.names.gen_name(op), ty);
        cell.set_connection("A", a);
        cell.set_connection("Y", y.clone());
        self.insert_gate(cell);
        y
    }

    fn binary_gate(
        &mut self,
        ty: CellType,
        op: &str,
        a: SigSpec,
        b: SigSpec,
    ) -> SigSpec {
        debug_assert_eq!(a.width(), b.width());
        let y = self.fresh_wire(a.width());
        let mut cell = Cell::new(self.names.gen_name(op), ty);
        cell.set_connection("A", a);
        cell.set_connection("B", b);
        cell.set_connection("Y", y.clone());
        self.insert_gate(cell);
        y
    }

    fn reduce_gate(&mut self, ty: CellType, op: &str, a: SigSpec) -> SigSpec {
        let y = self.fresh_wire(1);
        let mut cell = Cell::new(self.names.gen_name(op), ty);
        cell.set_connection("A", a);
        cell.set_connection("Y", y.clone());
        self.insert_gate(cell);
        y
    }

    /// Bitwise negation.
    pub fn add_not(&mut self, a: SigSpec) -> SigSpec {
        self.unary_gate(CellType::Not, "not", a)
    }

    /// Bitwise conjunction. Operand widths must match.
    pub fn add_and(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        self.binary_gate(CellType::And, "and", a, b)
    }

    /// Bitwise disjunction. Operand widths must match.
    pub fn add_or(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        self.binary_gate(CellType::Or, "or", a, b)
    }

    /// Bitwise exclusive or. Operand widths must match.
    pub fn add_xor(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        self.binary_gate(CellType::Xor, "xor", a, b)
    }

    /// Single-bit equality of two equal-width signals.
    pub fn add_eq(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        self.binary_gate(CellType::Eq, "eq", a, b)
    }

    /// Single-bit inequality of two equal-width signals.
    pub fn add_ne(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        self.binary_gate(CellType::Ne, "ne", a, b)
    }

    pub fn add_reduce_and(&mut self, a: SigSpec) -> SigSpec {
        self.reduce_gate(CellType::ReduceAnd, "reduce_and", a)
    }

    pub fn add_reduce_or(&mut self, a: SigSpec) -> SigSpec {
        self.reduce_gate(CellType::ReduceOr, "reduce_or", a)
    }

    /// `y = s ? b : a` into a fresh output wire.
    pub fn add_mux(&mut self, a: SigSpec, b: SigSpec, s: SigSpec) -> SigSpec {
        let y = self.fresh_wire(a.width());
        self.add_mux_into(a, b, s, y.clone());
        y
    }

    /// `y = s ? b : a` into an existing signal.
    pub fn add_mux_into(
        &mut self,
        a: SigSpec,
        b: SigSpec,
        s: SigSpec,
        y: SigSpec,
    ) {
        debug_assert_eq!(a.width(), b.width());
        debug_assert_eq!(a.width(), y.width());
        debug_assert_eq!(s.width(), 1);
        let mut cell = Cell::new(self.names.gen_name("mux"), CellType::Mux);
        cell.set_connection("A", a);
        cell.set_connection("B", b);
        cell.set_connection("S", s);
        cell.set_connection("Y", y);
        self.insert_gate(cell);
    }

    // ----------------------------------------------------------------
    // Memory ports
    // ----------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn add_memrd<I: Into<Id>>(
        &mut self,
        name: I,
        memid: &str,
        clk_enable: bool,
        clk_polarity: bool,
        clk: SigSpec,
        addr: SigSpec,
        data: SigSpec,
    ) -> BractResult<CellId> {
        let mut cell = Cell::new(name.into(), CellType::Memrd);
        cell.set_param("MEMID", Param::Str(memid.to_string()));
        cell.set_param("CLK_ENABLE", Param::Bool(clk_enable));
        cell.set_param("CLK_POLARITY", Param::Bool(clk_polarity));
        cell.set_connection("CLK", clk);
        cell.set_connection("ADDR", addr);
        cell.set_connection("DATA", data);
        cell.set_connection("EN", SigSpec::from(SigBit::ONE));
        self.add_cell(cell)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_memwr<I: Into<Id>>(
        &mut self,
        name: I,
        memid: &str,
        clk_enable: bool,
        clk_polarity: bool,
        priority: i64,
        clk: SigSpec,
        addr: SigSpec,
        data: SigSpec,
        en: SigSpec,
    ) -> BractResult<CellId> {
        let mut cell = Cell::new(name.into(), CellType::Memwr);
        cell.set_param("MEMID", Param::Str(memid.to_string()));
        cell.set_param("CLK_ENABLE", Param::Bool(clk_enable));
        cell.set_param("CLK_POLARITY", Param::Bool(clk_polarity));
        cell.set_param("PRIORITY", Param::Int(priority));
        cell.set_connection("CLK", clk);
        cell.set_connection("ADDR", addr);
        cell.set_connection("DATA", data);
        cell.set_connection("EN", en);
        self.add_cell(cell)
    }

    // ----------------------------------------------------------------
    // Pretty printing for logs
    // ----------------------------------------------------------------

    /// Render a signal for human-readable log output, MSB first.
    pub fn signal_string(&self, sig: &SigSpec) -> String {
        if sig.is_empty() {
            return "{}".to_string();
        }
        let mut chunks: Vec<String> = Vec::new();
        let bits = sig.bits();
        let mut hi = bits.len();
        while hi > 0 {
            let k = hi - 1;
            match bits[k] {
                SigBit::Const(_) => {
                    // Collect a run of constants into one binary literal.
                    let mut lo = k;
                    while lo > 0 && bits[lo - 1].is_const() {
                        lo -= 1;
                    }
                    let lit: String = (lo..=k)
                        .rev()
                        .map(|i| match bits[i] {
                            SigBit::Const(s) => s.to_string(),
                            SigBit::Wire(..) => unreachable!(),
                        })
                        .collect();
                    chunks.push(format!("{}'b{}", k - lo + 1, lit));
                    hi = lo;
                }
                SigBit::Wire(w, off) => {
                    // Collect a run of consecutive bits of the same wire.
                    let mut lo = k;
                    let mut lo_off = off;
                    while lo > 0 {
                        match bits[lo - 1] {
                            SigBit::Wire(w2, off2)
                                if w2 == w && off2 + 1 == lo_off =>
                            {
                                lo -= 1;
                                lo_off = off2;
                            }
                            _ => break,
                        }
                    }
                    let wire = self.wire(w);
                    let name = wire.name;
                    if lo_off == 0 && off == wire.width - 1 {
                        chunks.push(name.to_string());
                    } else if lo_off == off {
                        chunks.push(format!("{}[{}]", name, off));
                    } else {
                        chunks.push(format!("{}[{}:{}]", name, off, lo_off));
                    }
                    hi = lo;
                }
            }
        }
        if chunks.len() == 1 {
            chunks.pop().unwrap()
        } else {
            format!("{{ {} }}", chunks.iter().join(", "))
        }
    }
}

/// A design: an ordered list of modules plus an optional module selection.
#[derive(Debug, Clone, Default)]
pub struct Design {
    pub modules: Vec<Module>,
    selection: Vec<Id>,
}

impl Design {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: Module) {
        self.modules.push(module);
    }

    pub fn get_module(&self, name: Id) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Restrict passes to the named modules. An empty selection selects
    /// every module.
    pub fn select(&mut self, names: Vec<Id>) {
        self.selection = names;
    }

    pub fn selected(&self, name: Id) -> bool {
        self.selection.is_empty() || self.selection.contains(&name)
    }

    pub fn iter_selected_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        let selection = &self.selection;
        self.modules.iter_mut().filter(move |m| {
            selection.is_empty() || selection.contains(&m.name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::State;

    #[test]
    fn gate_constructors_return_fresh_outputs() {
        let mut m = Module::new("top");
        let a = m.fresh_wire(4);
        let b = m.fresh_wire(4);
        let y = m.add_and(a.clone(), b.clone());
        assert_eq!(y.width(), 4);
        assert_ne!(y, a);
        let (_, cell) = m.cells().next().unwrap();
        assert_eq!(cell.ty, CellType::And);
        assert_eq!(cell.connection("A").unwrap(), &a);
        assert_eq!(cell.connection("Y").unwrap(), &y);
    }

    #[test]
    fn remove_cell_leaves_other_ids_valid() {
        let mut m = Module::new("top");
        let a = m.fresh_wire(1);
        let b = m.fresh_wire(1);
        let y1 = m.add_or(a.clone(), b.clone());
        let _y2 = m.add_and(a, b);
        let ids: Vec<CellId> = m.cells().map(|(id, _)| id).collect();
        assert_eq!(ids.len(), 2);
        m.remove_cell(ids[0]);
        assert_eq!(m.cell_count(), 1);
        assert_eq!(m.cell(ids[1]).ty, CellType::And);
        // The or gate's output wire still exists even though the cell is
        // gone.
        assert_eq!(y1.width(), 1);
    }

    #[test]
    fn signal_string_groups_runs() {
        let mut m = Module::new("top");
        let w = m.add_wire("data", 4).unwrap();
        let full = m.wire_sig(w);
        assert_eq!(m.signal_string(&full), "data");
        let slice = full.extract(1, 2);
        assert_eq!(m.signal_string(&slice), "data[2:1]");
        let mut mixed = SigSpec::repeat(State::S1, 1);
        mixed.push(SigBit::Wire(w, 3));
        assert_eq!(m.signal_string(&mixed), "{ data[3], 1'b1 }");
    }
}
