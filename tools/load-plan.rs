//! Print the fetch plan for a set of packages
//!
//! Loads one or more dependency manifests, imports the requested packages
//! with immediate fetches, and prints each wave's files and the order in
//! which packages become available. Can also rewrite a (legacy) manifest in
//! the current format.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;

use script_loader::utils::init_logging_from_config;
use script_loader::{
    FetchOutcome, FetchRequest, LoadError, LoadHooks, LoaderConfig, Manifest, ManifestLoader,
    Registry, Resolver,
};

#[derive(Debug, Parser)]
#[command(name = "load-plan", about = "Show the order in which script files would be fetched")]
struct Args {
    /// Dependency manifests to load, in order
    #[arg(required = true)]
    manifests: Vec<PathBuf>,

    /// Package (or `@file`) to import; may be repeated
    #[arg(short, long = "import")]
    imports: Vec<String>,

    /// Import every known package
    #[arg(long)]
    all: bool,

    /// Import every package whose name starts with this prefix
    #[arg(long = "match")]
    prefix: Option<String>,

    /// Treat unknown Hard dependencies as satisfied
    #[arg(long)]
    tolerate_unknown: bool,

    /// Loader configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the first manifest, normalized to the current format, here
    #[arg(long)]
    normalize: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Default, Serialize)]
struct Plan {
    fetches: Vec<FetchRequest>,
    provided: Vec<String>,
    errors: Vec<String>,
}

/// Records hook invocations into a shared plan
struct PlanHooks {
    plan: std::rc::Rc<std::cell::RefCell<Plan>>,
}

impl LoadHooks for PlanHooks {
    fn fetch_file(&mut self, request: &FetchRequest) -> FetchOutcome {
        self.plan.borrow_mut().fetches.push(request.clone());
        FetchOutcome::Complete
    }

    fn on_provide(&mut self, package: &str) {
        self.plan.borrow_mut().provided.push(package.to_string());
    }

    fn on_error(&mut self, error: LoadError) {
        self.plan.borrow_mut().errors.push(error.to_string());
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    config.apply_env_overrides();
    if args.tolerate_unknown {
        config.tolerate_unknown = true;
    }
    config.validate()?;
    init_logging_from_config(config.logging.as_ref());

    let registry = Registry::shared();
    let loader = ManifestLoader::new(registry.clone());
    let mut first: Option<Manifest> = None;
    for path in &args.manifests {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| std::path::Path::new(""));
        let manifest = loader
            .load_str(&text, base)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?;
        tracing::info!("Loaded {} entries from {}", manifest.packages.len(), path.display());
        if first.is_none() {
            first = Some(Manifest::parse(&text)?);
        }
    }

    if let (Some(out), Some(manifest)) = (&args.normalize, &first) {
        std::fs::write(out, manifest.to_json(args.pretty)?)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        eprintln!("Wrote {}", out.display());
    }

    if !args.all && args.prefix.is_none() && args.imports.is_empty() {
        if args.normalize.is_some() {
            return Ok(());
        }
        bail!("nothing to import; pass --import, --match or --all");
    }

    let plan = std::rc::Rc::new(std::cell::RefCell::new(Plan::default()));
    let hooks = PlanHooks { plan: plan.clone() };
    let mut session = Resolver::new(registry, &config, Box::new(hooks));

    if args.all {
        session.import_all();
    }
    if let Some(prefix) = &args.prefix {
        session.import_match(|name| name.starts_with(prefix.as_str()));
    }
    for request in &args.imports {
        session.import_package(request, None);
    }

    let plan = plan.borrow();
    if args.json {
        let text = if args.pretty {
            serde_json::to_string_pretty(&*plan)?
        } else {
            serde_json::to_string(&*plan)?
        };
        println!("{}", text);
    } else {
        println!("{} files in {} waves", plan.fetches.len(), session.waves());
        let mut wave = 0;
        for fetch in &plan.fetches {
            if fetch.wave != wave {
                wave = fetch.wave;
                println!("wave {}:", wave);
            }
            println!(
                "    {}{}  [{}]",
                fetch.path,
                if fetch.remote { " (remote)" } else { "" },
                fetch.packages.join(", ")
            );
        }
        println!("provide order: {}", plan.provided.join(" -> "));
        for error in &plan.errors {
            println!("error: {}", error);
        }
    }

    if plan.errors.is_empty() {
        Ok(())
    } else {
        bail!("{} resolution errors", plan.errors.len())
    }
}
