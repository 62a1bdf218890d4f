//! Encoding of netlist cells into a SAT problem.
use std::collections::HashMap;

use bract_ir::{Cell, CellType, SigBit, SigMap, SigSpec};
use bract_sat::{Lit, Solver};
use bract_utils::{BractResult, Error};

/// Imports signals and the bit-level Boolean semantics of cells into an
/// owned [Solver]. Signal bits are canonicalized through the given
/// [SigMap] so aliased nets share literals. Undefined constant bits
/// become fresh unconstrained variables.
pub struct SatGen<'a> {
    solver: Solver,
    sigmap: &'a SigMap,
    lits: HashMap<SigBit, Lit>,
}

impl<'a> SatGen<'a> {
    pub fn new(sigmap: &'a SigMap) -> Self {
        SatGen {
            solver: Solver::new(),
            sigmap,
            lits: HashMap::new(),
        }
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    pub fn import_bit(&mut self, bit: SigBit) -> Lit {
        let bit = self.sigmap.bit(bit);
        match bit {
            SigBit::Const(state) => match state.as_bool() {
                Some(true) => self.solver.true_lit(),
                Some(false) => self.solver.false_lit(),
                // Each undefined bit is an independent free variable.
                None => self.solver.new_var(),
            },
            SigBit::Wire(..) => {
                if let Some(&lit) = self.lits.get(&bit) {
                    return lit;
                }
                let lit = self.solver.new_var();
                self.lits.insert(bit, lit);
                lit
            }
        }
    }

    pub fn import_sig(&mut self, sig: &SigSpec) -> Vec<Lit> {
        sig.iter().map(|b| self.import_bit(b)).collect()
    }

    /// Import a signal zero-extended to `width` bits.
    fn import_ext(&mut self, sig: &SigSpec, width: usize) -> Vec<Lit> {
        let mut lits = self.import_sig(sig);
        while lits.len() < width {
            lits.push(self.solver.false_lit());
        }
        lits
    }

    /// Encode the Boolean function of a cell. Only cell types that a SAT
    /// cone may contain are supported; anything else is a contract
    /// violation by the caller.
    pub fn import_cell(&mut self, cell: &Cell) -> BractResult<()> {
        let width = cell.connection("Y")?.width();
        let y = self.import_sig(cell.connection("Y")?);
        match cell.ty {
            CellType::Not => {
                let a = self.import_ext(cell.connection("A")?, width);
                for (yk, ak) in y.iter().zip(a) {
                    self.solver.assert_equal(*yk, !ak);
                }
            }
            CellType::And | CellType::Or | CellType::Xor => {
                let a = self.import_ext(cell.connection("A")?, width);
                let b = self.import_ext(cell.connection("B")?, width);
                for k in 0..width {
                    let g = match cell.ty {
                        CellType::And => self.solver.and_gate(&[a[k], b[k]]),
                        CellType::Or => self.solver.or_gate(&[a[k], b[k]]),
                        CellType::Xor => self.solver.xor_gate(a[k], b[k]),
                        _ => unreachable!(),
                    };
                    self.solver.assert_equal(y[k], g);
                }
            }
            CellType::Mux => {
                let a = self.import_ext(cell.connection("A")?, width);
                let b = self.import_ext(cell.connection("B")?, width);
                let s = self.import_sig(cell.connection("S")?);
                for k in 0..width {
                    let g = self.solver.mux_gate(a[k], b[k], s[0]);
                    self.solver.assert_equal(y[k], g);
                }
            }
            CellType::Pmux => {
                let a = self.import_ext(cell.connection("A")?, width);
                let b = self.import_sig(cell.connection("B")?);
                let s = self.import_sig(cell.connection("S")?);
                for k in 0..width {
                    let mut val = a[k];
                    for (j, &sj) in s.iter().enumerate() {
                        val = self.solver.mux_gate(val, b[j * width + k], sj);
                    }
                    self.solver.assert_equal(y[k], val);
                }
            }
            CellType::Eq | CellType::Ne => {
                let w = cell
                    .connection("A")?
                    .width()
                    .max(cell.connection("B")?.width());
                let a = self.import_ext(cell.connection("A")?, w);
                let b = self.import_ext(cell.connection("B")?, w);
                let diffs: Vec<Lit> = (0..w)
                    .map(|k| self.solver.xor_gate(a[k], b[k]))
                    .collect();
                let any = self.solver.or_gate(&diffs);
                let out = if cell.ty == CellType::Ne { any } else { !any };
                self.solver.assert_equal(y[0], out);
                for &yk in &y[1..] {
                    let f = self.solver.false_lit();
                    self.solver.assert_equal(yk, f);
                }
            }
            CellType::Add | CellType::Sub => {
                let a = self.import_ext(cell.connection("A")?, width);
                let b = self.import_ext(cell.connection("B")?, width);
                // Ripple-carry; subtraction adds the complement with a
                // carry-in of one.
                let invert = cell.ty == CellType::Sub;
                let mut carry = if invert {
                    self.solver.true_lit()
                } else {
                    self.solver.false_lit()
                };
                for k in 0..width {
                    let bk = if invert { !b[k] } else { b[k] };
                    let half = self.solver.xor_gate(a[k], bk);
                    let sum = self.solver.xor_gate(half, carry);
                    self.solver.assert_equal(y[k], sum);
                    let c1 = self.solver.and_gate(&[a[k], bk]);
                    let c2 = self.solver.and_gate(&[half, carry]);
                    carry = self.solver.or_gate(&[c1, c2]);
                }
            }
            CellType::ReduceAnd | CellType::ReduceOr => {
                let a = self.import_sig(cell.connection("A")?);
                let g = if cell.ty == CellType::ReduceAnd {
                    self.solver.and_gate(&a)
                } else {
                    self.solver.or_gate(&a)
                };
                self.solver.assert_equal(y[0], g);
                for &yk in &y[1..] {
                    let f = self.solver.false_lit();
                    self.solver.assert_equal(yk, f);
                }
            }
            _ => {
                return Err(Error::pass_assumption(
                    "sat-gen",
                    format!(
                        "cannot encode cell `{}' of type {}",
                        cell.name(),
                        cell.ty
                    ),
                ))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bract_ir::Module;

    #[test]
    fn imported_and_gate_constrains_output() {
        let mut m = Module::new("top");
        let a = m.fresh_wire(1);
        let b = m.fresh_wire(1);
        let y = m.add_and(a.clone(), b.clone());

        let sigmap = SigMap::from_module(&m);
        let mut satgen = SatGen::new(&sigmap);
        let (_, cell) = m.cells().next().unwrap();
        satgen.import_cell(cell).unwrap();

        let la = satgen.import_bit(a.bit(0));
        let lb = satgen.import_bit(b.bit(0));
        let ly = satgen.import_bit(y.bit(0));
        assert!(satgen.solver_mut().solve(&[la, lb, ly]));
        assert!(!satgen.solver_mut().solve(&[la, lb, !ly]));
        assert!(!satgen.solver_mut().solve(&[!la, ly]));
    }

    #[test]
    fn complementary_enables_are_exclusive() {
        let mut m = Module::new("top");
        let s = m.fresh_wire(1);
        let ns = m.add_not(s.clone());

        let sigmap = SigMap::from_module(&m);
        let mut satgen = SatGen::new(&sigmap);
        for (_, cell) in m.cells() {
            satgen.import_cell(cell).unwrap();
        }
        let ls = satgen.import_bit(s.bit(0));
        let lns = satgen.import_bit(ns.bit(0));
        assert!(!satgen.solver_mut().solve(&[ls, lns]));
        assert!(satgen.solver_mut().solve(&[ls]));
    }

    #[test]
    fn arithmetic_is_rejected() {
        let mut m = Module::new("top");
        let a = m.fresh_wire(2);
        let b = m.fresh_wire(2);
        let mut cell = Cell::new(bract_ir::Id::from("m0"), CellType::Mul);
        cell.set_connection("A", a);
        cell.set_connection("B", b);
        cell.set_connection("Y", m.fresh_wire(2));
        let id = m.add_cell(cell).unwrap();

        let sigmap = SigMap::from_module(&m);
        let mut satgen = SatGen::new(&sigmap);
        assert!(satgen.import_cell(m.cell(id)).is_err());
    }
}
