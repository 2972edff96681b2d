use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use console::{style, Term};
use serde_json::Value;
use stratus_core::{App, Assembly};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod spec;

/// stratus - Declarative cloud template synthesizer
#[derive(Parser)]
#[command(name = "stratus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize templates and a manifest from a declaration file
    Synth {
        /// Path to the declaration file (default: stratus.yaml)
        #[arg(default_value = "stratus.yaml")]
        spec: PathBuf,

        /// Directory to write the artifact bundle into
        #[arg(short, long, default_value = "stratus.out")]
        out: PathBuf,

        /// Context override as key=value (wins over declared context)
        #[arg(short, long = "context")]
        context: Vec<String>,
    },

    /// List the stacks a declaration file would synthesize
    List {
        /// Path to the declaration file (default: stratus.yaml)
        #[arg(default_value = "stratus.yaml")]
        spec: PathBuf,

        /// Context override as key=value (wins over declared context)
        #[arg(short, long = "context")]
        context: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth { spec, out, context } => cmd_synth(&spec, &out, &context, cli.verbose),
        Commands::List { spec, context } => cmd_list(&spec, &context),
    }
}

fn parse_overrides(pairs: &[String]) -> Result<BTreeMap<String, Value>> {
    let mut overrides = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid context override '{pair}', expected key=value");
        };
        overrides.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(overrides)
}

fn load_app(term: &Term, spec: &Path, context: &[String]) -> Result<App> {
    if !spec.exists() {
        term.write_line(&format!(
            "{} Declaration file not found: {}",
            style("error:").red().bold(),
            spec.display()
        ))?;
        process::exit(1);
    }

    let decl = spec::load(spec)?;
    spec::build_app(&decl, parse_overrides(context)?)
}

fn synthesize(term: &Term, app: &App) -> Result<Assembly> {
    match app.synth() {
        Ok(assembly) => Ok(assembly),
        Err(e) => {
            term.write_line(&format!("{} {}", style("error:").red().bold(), e))?;
            process::exit(1);
        }
    }
}

fn cmd_synth(spec: &Path, out: &Path, context: &[String], verbose: bool) -> Result<()> {
    let term = Term::stderr();

    term.write_line(&format!(
        "{} Synthesizing {}",
        style("::").cyan().bold(),
        spec.display()
    ))?;

    let app = load_app(&term, spec, context)?;
    let assembly = synthesize(&term, &app)?;
    debug!(stacks = assembly.manifest.stacks.len(), "synthesis finished");

    assembly.write_to_dir(out)?;

    for stack in &assembly.manifest.stacks {
        term.write_line(&format!(
            "  {} {} {}",
            style("+").green().bold(),
            stack.name,
            style(format!("({})", stack.environment.name)).dim()
        ))?;

        if verbose {
            for logical_id in assembly.templates[&stack.name].resources.keys() {
                term.write_line(&format!("      {}", style(logical_id).dim()))?;
            }
        }
    }

    if !assembly.manifest.missing.is_empty() {
        term.write_line(&format!(
            "{} {} missing context value(s); supply them with --context and synthesize again",
            style("::").yellow().bold(),
            assembly.manifest.missing.len()
        ))?;
    }

    term.write_line(&format!(
        "{} Wrote {} template(s) to {}",
        style("::").green().bold(),
        assembly.manifest.stacks.len(),
        out.display()
    ))?;

    Ok(())
}

fn cmd_list(spec: &Path, context: &[String]) -> Result<()> {
    let term = Term::stderr();

    let app = load_app(&term, spec, context)?;
    let assembly = synthesize(&term, &app)?;

    for stack in &assembly.manifest.stacks {
        println!("{}", stack.name);
    }

    Ok(())
}
