//! Define the PassManager structure that is used to construct and run
//! pass pipelines.
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Instant;

use bract_ir as ir;
use bract_utils::{BractResult, Error, Id};
use itertools::Itertools;

/// Trait that describes named things. Required to register a pass.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
}

/// A transformation over a design. Passes are constructed fresh for each
/// pipeline execution via [Default].
pub trait Pass {
    fn run(&mut self, design: &mut ir::Design) -> BractResult<()>;
}

/// Top-level type for all registered passes.
pub type PassClosure = Box<dyn Fn(&mut ir::Design) -> BractResult<()>>;

/// Structure that tracks all registered passes for the driver.
#[derive(Default)]
pub struct PassManager {
    /// All registered passes.
    passes: HashMap<String, PassClosure>,
    /// Track the help information for passes.
    help: HashMap<String, String>,
}

impl PassManager {
    /// Register a new pass and return an error if another pass with the
    /// same name has already been registered.
    pub fn register_pass<P>(&mut self) -> BractResult<()>
    where
        P: Pass + Named + Default + 'static,
    {
        let name = P::name().to_string();
        if self.passes.contains_key(&name) {
            return Err(Error::misc(format!(
                "Pass with name '{}' is already registered.",
                name
            )));
        }
        let pass_closure: PassClosure =
            Box::new(|design| P::default().run(design));
        self.passes.insert(name.clone(), pass_closure);
        let help = format!("- {}: {}", name, P::description());
        self.help.insert(name, help);
        Ok(())
    }

    /// Run the named passes over the design, in order.
    pub fn execute_plan(
        &self,
        design: &mut ir::Design,
        plan: &[String],
    ) -> BractResult<()> {
        for name in plan {
            let pass = self.passes.get(name).ok_or_else(|| {
                Error::undefined(Id::new(name), "pass")
            })?;
            let start = Instant::now();
            pass(design)?;
            log::info!("{}: {}ms", name, start.elapsed().as_millis());
        }
        Ok(())
    }

    /// Return a string representation of all available passes.
    /// Appropriate for help text.
    pub fn complete_help(&self) -> String {
        let mut ret = String::with_capacity(1000);
        ret.push_str("Passes:\n");
        self.passes.keys().sorted().for_each(|pass| {
            writeln!(ret, "{}", self.help[pass]).unwrap();
        });
        ret
    }
}
