use std::collections::HashMap;

use crate::Id;

/// Generates fresh `$`-prefixed names for synthesized wires and cells.
/// Names generated for distinct prefixes never collide with each other or
/// with user-visible names, which never start with `$`.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    generated_names: HashMap<String, u64>,
}

impl NameGenerator {
    pub fn with_prev_generated_names(names: HashMap<String, u64>) -> Self {
        Self {
            generated_names: names,
        }
    }

    /// Return a fresh name of the form `$<prefix>$<n>`.
    pub fn gen_name<S: ToString>(&mut self, prefix: S) -> Id {
        let prefix = prefix.to_string();
        let count = self
            .generated_names
            .entry(prefix.clone())
            .and_modify(|v| *v += 1)
            .or_insert(0);
        Id::new(format!("${}${}", prefix, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_names_are_distinct() {
        let mut gen = NameGenerator::default();
        let a = gen.gen_name("memshare");
        let b = gen.gen_name("memshare");
        let c = gen.gen_name("wire");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_ref(), "$memshare$0");
        assert_eq!(b.as_ref(), "$memshare$1");
    }
}
