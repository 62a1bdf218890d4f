//! The bract netlist optimization driver.
//!
//! Reads a JSON netlist, runs a pass pipeline over the selected modules,
//! and writes the transformed netlist back out.
use std::fs::File;
use std::io;
use std::path::PathBuf;

use argh::FromArgs;
use bract_ir as ir;
use bract_opt::pass_manager::{Named, PassManager};
use bract_opt::passes::MemoryShare;
use bract_utils::BractResult;
use itertools::Itertools;

#[derive(FromArgs)]
/// Optimize a JSON netlist.
struct Opts {
    /// input netlist file; `-` or omitted reads stdin
    #[argh(positional)]
    input: Option<PathBuf>,

    /// output file; defaults to stdout
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// pass to run, repeatable and in order; defaults to `memory-share`
    #[argh(option, short = 'p', long = "pass")]
    passes: Vec<String>,

    /// restrict passes to the named modules; repeatable
    #[argh(option, short = 'm', long = "module")]
    modules: Vec<String>,

    /// list the available passes and exit
    #[argh(switch)]
    list_passes: bool,

    /// logging level (off, error, warn, info, debug, trace)
    #[argh(
        option,
        long = "log",
        default = "log::LevelFilter::Warn",
        from_str_fn(parse_level)
    )]
    log_level: log::LevelFilter,
}

fn parse_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse().map_err(|_| format!("invalid log level `{}'", s))
}

/// All passes are registered here, once, at program start.
fn register_passes(pm: &mut PassManager) -> BractResult<()> {
    pm.register_pass::<MemoryShare>()?;
    Ok(())
}

fn run(opts: &Opts) -> BractResult<()> {
    let mut pm = PassManager::default();
    register_passes(&mut pm)?;

    if opts.list_passes {
        print!("{}", pm.complete_help());
        return Ok(());
    }

    let mut design = match &opts.input {
        Some(path) if path.as_os_str() != "-" => {
            ir::json::read_design(File::open(path)?)?
        }
        _ => ir::json::read_design(io::stdin().lock())?,
    };
    design.select(
        opts.modules
            .iter()
            .map(|name| ir::Id::from(name.as_str()))
            .collect(),
    );

    let plan: Vec<String> = if opts.passes.is_empty() {
        vec![MemoryShare::name().to_string()]
    } else {
        opts.passes.clone()
    };
    log::info!("Running passes: {}", plan.iter().join(", "));
    pm.execute_plan(&mut design, &plan)?;

    match &opts.output {
        Some(path) => ir::json::write_design(File::create(path)?, &design)?,
        None => ir::json::write_design(io::stdout().lock(), &design)?,
    }
    Ok(())
}

fn main() {
    let opts: Opts = argh::from_env();
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(err) = run(&opts) {
        eprintln!("error: {:?}", err);
        std::process::exit(1);
    }
}
