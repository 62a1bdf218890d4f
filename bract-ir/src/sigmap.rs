//! Canonicalization of signal bits by net equivalence.
use std::collections::HashMap;

use crate::{Module, SigBit, SigSpec};

/// A union-find over signal bits that canonicalizes wire aliases.
///
/// Built from a module's alias connections; additional equivalences may be
/// added afterwards (used by the don't-care-mux-skipping variant of the
/// map). Constants always win representative election; between wires the
/// lowest (wire, offset) pair wins, so representatives are deterministic.
#[derive(Debug, Clone, Default)]
pub struct SigMap {
    parent: HashMap<SigBit, SigBit>,
}

impl SigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from a module's alias connections.
    pub fn from_module(module: &Module) -> Self {
        let mut map = SigMap::new();
        for (lhs, rhs) in &module.connections {
            map.add(lhs, rhs);
        }
        map
    }

    fn root(&self, mut bit: SigBit) -> SigBit {
        while let Some(&next) = self.parent.get(&bit) {
            bit = next;
        }
        bit
    }

    /// Add the equivalence `from[k] == to[k]` for every bit position.
    /// Signals of unequal width are aliased up to the shorter one.
    pub fn add(&mut self, from: &SigSpec, to: &SigSpec) {
        for (f, t) in from.iter().zip(to.iter()) {
            self.add_bit(f, t);
        }
    }

    pub fn add_bit(&mut self, from: SigBit, to: SigBit) {
        let rf = self.root(from);
        let rt = self.root(to);
        if rf == rt {
            return;
        }
        // A constant must stay canonical; two conflicting constants
        // indicate a short in the input and the first one wins.
        let (rep, other) = match (rf.is_const(), rt.is_const()) {
            (true, false) => (rf, rt),
            (false, true) => (rt, rf),
            (true, true) => return,
            (false, false) => {
                if rf < rt {
                    (rf, rt)
                } else {
                    (rt, rf)
                }
            }
        };
        self.parent.insert(other, rep);
    }

    /// The canonical representative of a bit.
    pub fn bit(&self, bit: SigBit) -> SigBit {
        self.root(bit)
    }

    /// Map every bit of a signal to its canonical representative.
    pub fn map(&self, sig: &SigSpec) -> SigSpec {
        sig.iter().map(|b| self.root(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::State;

    #[test]
    fn aliases_canonicalize() {
        let mut m = Module::new("top");
        let a = m.add_wire("a", 2).unwrap();
        let b = m.add_wire("b", 2).unwrap();
        let a_sig = m.wire_sig(a);
        let b_sig = m.wire_sig(b);
        m.connections.push((b_sig.clone(), a_sig.clone()));

        let map = SigMap::from_module(&m);
        assert_eq!(map.map(&b_sig), map.map(&a_sig));
    }

    #[test]
    fn constants_win() {
        let mut map = SigMap::new();
        let mut m = Module::new("top");
        let w = m.add_wire("w", 1).unwrap();
        let bit = m.wire_sig(w).bit(0);
        map.add_bit(bit, SigBit::Const(State::S1));
        assert_eq!(map.bit(bit), SigBit::Const(State::S1));
    }

    #[test]
    fn chains_resolve_to_one_representative() {
        let mut m = Module::new("top");
        let ids: Vec<_> = (0..4)
            .map(|i| m.add_wire(format!("w{}", i), 1).unwrap())
            .collect();
        let bits: Vec<SigBit> =
            ids.iter().map(|&w| m.wire_sig(w).bit(0)).collect();

        let mut map = SigMap::new();
        map.add_bit(bits[1], bits[0]);
        map.add_bit(bits[2], bits[1]);
        map.add_bit(bits[3], bits[2]);
        for &b in &bits {
            assert_eq!(map.bit(b), bits[0]);
        }
    }
}
