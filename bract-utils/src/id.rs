//! Interned names for netlist objects.
use symbol_table::GlobalSymbol;

/// The name of a module, wire, cell, port, or parameter.
///
/// Netlist names are short strings that get hashed and compared on every
/// port lookup, so they are interned in the process-wide symbol table and
/// compared as one word. The interner allocates symbols in first-seen
/// order, which is not stable across runs; passes that need a
/// deterministic order sort through [Id::as_str] instead, so `Id`
/// deliberately does not implement `Ord`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Id(GlobalSymbol);

impl Id {
    pub fn new(name: impl AsRef<str>) -> Self {
        Id(GlobalSymbol::from(name.as_ref()))
    }

    /// The interned string. Lives for the rest of the process.
    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::new("")
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Id::new(name)
    }
}

impl From<String> for Id {
    fn from(name: String) -> Self {
        Id::new(name)
    }
}

/// Port and parameter lookups compare against literals, e.g.
/// `port == "DATA"`.
impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_names_compare_as_strings() {
        let addr = Id::new("ADDR");
        assert_eq!(addr, Id::from("ADDR"));
        assert_eq!(addr, "ADDR");
        assert_ne!(addr, "DATA");
        assert_eq!(addr.to_string(), "ADDR");
        assert_eq!(Id::from("clk".to_string()).as_str(), "clk");
    }
}
