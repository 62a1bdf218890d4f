//! A thin incremental CNF interface over a MiniSat backend.
//!
//! Consumers build a problem out of fresh literals, raw clauses, and
//! Tseitin-encoded gate helpers, then query satisfiability under a set of
//! assumptions. Clauses and gates may be added between queries; solving
//! never consumes the problem. The actual solving is done by
//! `rustsat-minisat`; this crate only adds the gate encodings and the
//! problem-size accounting the netlist passes report.

use rustsat::solvers::{Solve, SolveIncremental, SolverResult};
use rustsat::types::Clause;
use rustsat_minisat::core::Minisat;

pub use rustsat::types::Lit;

/// An incremental CNF problem backed by a MiniSat instance.
pub struct Solver {
    minisat: Minisat,
    num_vars: u32,
    num_clauses: usize,
    const_true: Lit,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        let mut solver = Solver {
            minisat: Minisat::default(),
            num_vars: 0,
            num_clauses: 0,
            const_true: Lit::positive(0),
        };
        // The first variable is pinned true so constants have literals.
        let t = solver.new_var();
        solver.add_clause(&[t]);
        solver.const_true = t;
        solver
    }

    /// A fresh variable, as its positive literal.
    pub fn new_var(&mut self) -> Lit {
        let lit = Lit::positive(self.num_vars);
        self.num_vars += 1;
        lit
    }

    /// The literal that is true in every model.
    pub fn true_lit(&self) -> Lit {
        self.const_true
    }

    /// The literal that is false in every model.
    pub fn false_lit(&self) -> Lit {
        !self.const_true
    }

    pub fn add_clause(&mut self, lits: &[Lit]) {
        let clause: Clause = lits.iter().copied().collect();
        // The backend only fails on resource exhaustion.
        self.minisat.add_clause(clause).unwrap();
        self.num_clauses += 1;
    }

    /// Constrain two literals to be equal.
    pub fn assert_equal(&mut self, a: Lit, b: Lit) {
        self.add_clause(&[!a, b]);
        self.add_clause(&[a, !b]);
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars as usize
    }

    pub fn num_clauses(&self) -> usize {
        self.num_clauses
    }

    // ----------------------------------------------------------------
    // Gate helpers. Each returns the literal defined to equal the gate
    // function of the inputs.
    // ----------------------------------------------------------------

    pub fn or_gate(&mut self, inputs: &[Lit]) -> Lit {
        match inputs {
            [] => self.false_lit(),
            [single] => *single,
            _ => {
                let y = self.new_var();
                // y -> a1 | ... | an
                let mut clause: Vec<Lit> = vec![!y];
                clause.extend_from_slice(inputs);
                self.add_clause(&clause);
                // ai -> y
                for &a in inputs {
                    self.add_clause(&[!a, y]);
                }
                y
            }
        }
    }

    pub fn and_gate(&mut self, inputs: &[Lit]) -> Lit {
        match inputs {
            [] => self.true_lit(),
            [single] => *single,
            _ => {
                let y = self.new_var();
                // a1 & ... & an -> y
                let mut clause: Vec<Lit> = vec![y];
                clause.extend(inputs.iter().map(|&a| !a));
                self.add_clause(&clause);
                // y -> ai
                for &a in inputs {
                    self.add_clause(&[!y, a]);
                }
                y
            }
        }
    }

    pub fn xor_gate(&mut self, a: Lit, b: Lit) -> Lit {
        let y = self.new_var();
        self.add_clause(&[!y, a, b]);
        self.add_clause(&[!y, !a, !b]);
        self.add_clause(&[y, !a, b]);
        self.add_clause(&[y, a, !b]);
        y
    }

    /// `s ? b : a`.
    pub fn mux_gate(&mut self, a: Lit, b: Lit, s: Lit) -> Lit {
        let y = self.new_var();
        self.add_clause(&[!s, !b, y]);
        self.add_clause(&[!s, b, !y]);
        self.add_clause(&[s, !a, y]);
        self.add_clause(&[s, a, !y]);
        y
    }

    pub fn equiv_gate(&mut self, a: Lit, b: Lit) -> Lit {
        let x = self.xor_gate(a, b);
        !x
    }

    // ----------------------------------------------------------------
    // Solving
    // ----------------------------------------------------------------

    /// Decide satisfiability of the problem under the given assumptions.
    /// Anything the backend cannot decide (an interrupt, a backend
    /// failure) counts as satisfiable, which is the conservative answer
    /// for the exclusivity proofs built on top of this interface.
    pub fn solve(&mut self, assumptions: &[Lit]) -> bool {
        match self.minisat.solve_assumps(assumptions) {
            Ok(SolverResult::Sat) => true,
            Ok(SolverResult::Unsat) => false,
            Ok(SolverResult::Interrupted) | Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_problem_is_sat() {
        let mut solver = Solver::new();
        assert!(solver.solve(&[]));
    }

    #[test]
    fn unit_conflict_is_unsat() {
        let mut solver = Solver::new();
        let a = solver.new_var();
        solver.add_clause(&[a]);
        assert!(!solver.solve(&[!a]));
        assert!(solver.solve(&[a]));
    }

    #[test]
    fn complementary_assumptions_are_unsat() {
        let mut solver = Solver::new();
        let s = solver.new_var();
        let not_s = solver.new_var();
        solver.assert_equal(not_s, !s);
        assert!(!solver.solve(&[s, not_s]));
        assert!(solver.solve(&[s]));
        assert!(solver.solve(&[not_s]));
    }

    #[test]
    fn or_gate_semantics() {
        let mut solver = Solver::new();
        let a = solver.new_var();
        let b = solver.new_var();
        let y = solver.or_gate(&[a, b]);
        assert!(solver.solve(&[y, a]));
        assert!(solver.solve(&[y, !a, b]));
        assert!(!solver.solve(&[y, !a, !b]));
        assert!(!solver.solve(&[!y, a]));
    }

    #[test]
    fn and_gate_semantics() {
        let mut solver = Solver::new();
        let a = solver.new_var();
        let b = solver.new_var();
        let y = solver.and_gate(&[a, b]);
        assert!(solver.solve(&[y]));
        assert!(!solver.solve(&[y, !b]));
        assert!(!solver.solve(&[!y, a, b]));
    }

    #[test]
    fn mux_gate_semantics() {
        let mut solver = Solver::new();
        let a = solver.new_var();
        let b = solver.new_var();
        let s = solver.new_var();
        let y = solver.mux_gate(a, b, s);
        // s selects b.
        assert!(!solver.solve(&[s, b, !y]));
        assert!(!solver.solve(&[s, !b, y]));
        // !s selects a.
        assert!(!solver.solve(&[!s, a, !y]));
        assert!(!solver.solve(&[!s, !a, y]));
    }

    #[test]
    fn constants_are_fixed() {
        let mut solver = Solver::new();
        let t = solver.true_lit();
        let f = solver.false_lit();
        assert!(solver.solve(&[t]));
        assert!(!solver.solve(&[f]));
        let y = solver.or_gate(&[]);
        assert!(!solver.solve(&[y]));
    }

    #[test]
    fn incremental_additions_between_queries() {
        let mut solver = Solver::new();
        let a = solver.new_var();
        let b = solver.new_var();
        assert!(solver.solve(&[a, b]));
        let both = solver.and_gate(&[a, b]);
        solver.add_clause(&[!both]);
        assert!(!solver.solve(&[a, b]));
        assert!(solver.solve(&[a, !b]));
    }
}
