//! Cells: named instances of primitive netlist operators.
use bract_utils::{BractResult, Error, Id};
use linked_hash_map::LinkedHashMap;

use crate::SigSpec;

/// The closed set of primitive cell types, plus an escape hatch for
/// primitives this crate does not interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    Not,
    And,
    Or,
    Xor,
    Mux,
    Pmux,
    Eq,
    Ne,
    ReduceAnd,
    ReduceOr,
    Shl,
    Shr,
    Sshl,
    Sshr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Dff,
    Memrd,
    Memwr,
    Extern(Id),
}

impl CellType {
    /// The `$`-prefixed type name used in the JSON netlist format.
    pub fn as_str(&self) -> &str {
        match self {
            CellType::Not => "$not",
            CellType::And => "$and",
            CellType::Or => "$or",
            CellType::Xor => "$xor",
            CellType::Mux => "$mux",
            CellType::Pmux => "$pmux",
            CellType::Eq => "$eq",
            CellType::Ne => "$ne",
            CellType::ReduceAnd => "$reduce_and",
            CellType::ReduceOr => "$reduce_or",
            CellType::Shl => "$shl",
            CellType::Shr => "$shr",
            CellType::Sshl => "$sshl",
            CellType::Sshr => "$sshr",
            CellType::Add => "$add",
            CellType::Sub => "$sub",
            CellType::Mul => "$mul",
            CellType::Div => "$div",
            CellType::Mod => "$mod",
            CellType::Pow => "$pow",
            CellType::Dff => "$dff",
            CellType::Memrd => "$memrd",
            CellType::Memwr => "$memwr",
            CellType::Extern(id) => id.as_ref(),
        }
    }

    /// Parse a type name. Unknown names become [CellType::Extern].
    pub fn parse(name: &str) -> Self {
        match name {
            "$not" => CellType::Not,
            "$and" => CellType::And,
            "$or" => CellType::Or,
            "$xor" => CellType::Xor,
            "$mux" => CellType::Mux,
            "$pmux" => CellType::Pmux,
            "$eq" => CellType::Eq,
            "$ne" => CellType::Ne,
            "$reduce_and" => CellType::ReduceAnd,
            "$reduce_or" => CellType::ReduceOr,
            "$shl" => CellType::Shl,
            "$shr" => CellType::Shr,
            "$sshl" => CellType::Sshl,
            "$sshr" => CellType::Sshr,
            "$add" => CellType::Add,
            "$sub" => CellType::Sub,
            "$mul" => CellType::Mul,
            "$div" => CellType::Div,
            "$mod" => CellType::Mod,
            "$pow" => CellType::Pow,
            "$dff" => CellType::Dff,
            "$memrd" => CellType::Memrd,
            "$memwr" => CellType::Memwr,
            other => CellType::Extern(Id::new(other)),
        }
    }

    /// True for the two multiplexer types.
    pub fn is_mux_like(&self) -> bool {
        matches!(self, CellType::Mux | CellType::Pmux)
    }

    /// True for primitives whose bit-level semantics may be encoded into a
    /// SAT problem: the combinational cells minus hard arithmetic
    /// (multiplication, division, modulo, power) and variable shifts.
    /// Registers, memory ports, and extern cells never qualify; an input
    /// cone stops at them and their outputs stay free variables.
    pub fn sat_importable(&self) -> bool {
        matches!(
            self,
            CellType::Not
                | CellType::And
                | CellType::Or
                | CellType::Xor
                | CellType::Mux
                | CellType::Pmux
                | CellType::Eq
                | CellType::Ne
                | CellType::ReduceAnd
                | CellType::ReduceOr
                | CellType::Add
                | CellType::Sub
        )
    }

    /// True if the named connection drives out of the cell.
    pub fn is_output_port(&self, port: &str) -> bool {
        match self {
            CellType::Memrd => port == "DATA",
            CellType::Memwr => false,
            CellType::Dff => port == "Q",
            CellType::Extern(_) => false,
            _ => port == "Y",
        }
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed constant attached to a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Param {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Param::Int(v) => Some(*v),
            Param::Bool(b) => Some(*b as i64),
            Param::Str(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Param::Int(v) => Some(*v != 0),
            Param::Bool(b) => Some(*b),
            Param::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// A named instance of a primitive type: a mapping from port names to
/// signals plus a mapping from parameter names to typed constants.
#[derive(Debug, Clone)]
pub struct Cell {
    name: Id,
    pub ty: CellType,
    connections: LinkedHashMap<Id, SigSpec>,
    parameters: LinkedHashMap<Id, Param>,
}

impl Cell {
    pub fn new(name: Id, ty: CellType) -> Self {
        Self {
            name,
            ty,
            connections: LinkedHashMap::new(),
            parameters: LinkedHashMap::new(),
        }
    }

    pub fn name(&self) -> Id {
        self.name
    }

    pub fn set_connection<I: Into<Id>>(&mut self, port: I, sig: SigSpec) {
        self.connections.insert(port.into(), sig);
    }

    pub fn set_param<I: Into<Id>>(&mut self, name: I, value: Param) {
        self.parameters.insert(name.into(), value);
    }

    pub fn get_connection(&self, port: &str) -> Option<&SigSpec> {
        self.connections.get(&Id::from(port))
    }

    /// The signal connected to `port`. Missing connections indicate IR
    /// corruption and abort the caller.
    pub fn connection(&self, port: &str) -> BractResult<&SigSpec> {
        self.get_connection(port).ok_or_else(|| {
            Error::malformed_structure(format!(
                "cell `{}' ({}) has no connection `{}'",
                self.name, self.ty, port
            ))
        })
    }

    pub fn connection_mut(&mut self, port: &str) -> BractResult<&mut SigSpec> {
        let name = self.name;
        let ty = self.ty;
        self.connections.get_mut(&Id::from(port)).ok_or_else(|| {
            Error::malformed_structure(format!(
                "cell `{}' ({}) has no connection `{}'",
                name, ty, port
            ))
        })
    }

    pub fn connections(&self) -> impl Iterator<Item = (Id, &SigSpec)> {
        self.connections.iter().map(|(k, v)| (*k, v))
    }

    pub fn get_param(&self, name: &str) -> Option<&Param> {
        self.parameters.get(&Id::from(name))
    }

    pub fn parameters(&self) -> impl Iterator<Item = (Id, &Param)> {
        self.parameters.iter().map(|(k, v)| (*k, v))
    }

    fn param(&self, name: &str) -> BractResult<&Param> {
        self.get_param(name).ok_or_else(|| {
            Error::malformed_structure(format!(
                "cell `{}' ({}) has no parameter `{}'",
                self.name, self.ty, name
            ))
        })
    }

    pub fn param_bool(&self, name: &str) -> BractResult<bool> {
        self.param(name)?.as_bool().ok_or_else(|| {
            Error::malformed_structure(format!(
                "parameter `{}' of cell `{}' is not a boolean",
                name, self.name
            ))
        })
    }

    pub fn param_int(&self, name: &str) -> BractResult<i64> {
        self.param(name)?.as_int().ok_or_else(|| {
            Error::malformed_structure(format!(
                "parameter `{}' of cell `{}' is not an integer",
                name, self.name
            ))
        })
    }

    pub fn param_str(&self, name: &str) -> BractResult<&str> {
        self.param(name)?.as_str().ok_or_else(|| {
            Error::malformed_structure(format!(
                "parameter `{}' of cell `{}' is not a string",
                name, self.name
            ))
        })
    }

    /// The memory this port cell belongs to. Only meaningful for `$memrd`
    /// and `$memwr` cells.
    pub fn memid(&self) -> BractResult<&str> {
        self.param_str("MEMID")
    }
}
