// CLI module - command-line argument parsing and handlers
//
// Every command except `config` works on one catalog, taken from --catalog
// or from the configured catalog path.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lattice::config::{Config, VERSION};
use lattice::events::{CatalogEvent, FnSink};
use lattice::{Project, TagQuery};
use std::path::PathBuf;

/// Lattice - tag catalog with composable traits
#[derive(Parser)]
#[command(name = "lattice")]
#[command(version = VERSION)]
#[command(about = "Tag catalog with composable traits", long_about = None)]
pub struct Cli {
    /// Catalog to work on (LATTICE_CATALOG or config when omitted)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create (or re-initialize) the catalog
    Create {
        /// Plugin locations to store in the new catalog
        #[arg(long = "plugins")]
        plugin_locations: Vec<String>,
    },

    /// Scan locations (stored scan locations when none given)
    Scan {
        /// Only discover identifiers; skip tagging and pruning
        #[arg(long)]
        shallow: bool,

        /// List roots instead of walking below them
        #[arg(long)]
        no_recurse: bool,

        locations: Vec<String>,
    },

    /// Find identifiers by tag (all identifiers when no tag given)
    Find {
        tags: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the composed view of an identifier
    Get { identifier: String },

    /// Add tags to an identifier
    Tag {
        identifier: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Remove tags from an identifier
    Untag {
        identifier: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Manage stored scan locations
    #[command(subcommand)]
    Location(ListCommand),

    /// Manage stored skip regexes
    #[command(subcommand)]
    Skip(ListCommand),

    /// Manage stored plugin locations
    #[command(subcommand)]
    Plugins(ListCommand),

    /// Show locations above and below a location
    Explore { location: String },

    /// Print the catalog's settings blob
    Settings,

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Subcommand)]
pub enum ListCommand {
    /// Show stored values
    List,
    Add { value: String },
    Remove { value: String },
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Show effective configuration
    #[arg(long)]
    pub show: bool,

    /// Show config file path
    #[arg(long)]
    pub path: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

/// Run one command against the configured catalog
pub fn run(cli: Cli, config: &Config) -> Result<()> {
    let catalog = cli.catalog.clone().or_else(|| config.catalog_path.clone());

    match cli.command {
        Commands::Config(args) => handle_config(&args, config),
        Commands::Create { plugin_locations } => {
            let path = require_catalog(catalog)?;
            let project = Project::create(&path, plugin_locations.as_slice())
                .with_context(|| format!("creating catalog {}", path.display()))?;
            println!("Created {}", project.path().display());
            Ok(())
        }
        command => {
            let path = require_catalog(catalog)?;
            let mut project = Project::open(&path)
                .with_context(|| format!("opening catalog {}", path.display()))?;
            project.set_extra_plugin_locations(config.plugin_locations.clone());
            project.set_batch_size(config.scan.batch_size);
            handle_catalog_command(command, &mut project, config)
        }
    }
}

fn require_catalog(catalog: Option<PathBuf>) -> Result<PathBuf> {
    match catalog {
        Some(path) => Ok(path),
        None => bail!("no catalog given: pass --catalog or set LATTICE_CATALOG"),
    }
}

fn handle_catalog_command(command: Commands, project: &mut Project, config: &Config) -> Result<()> {
    match command {
        Commands::Scan {
            shallow,
            no_recurse,
            locations,
        } => handle_scan(project, config, &locations, !no_recurse, !shallow),
        Commands::Find { tags, limit } => {
            let limit = limit.unwrap_or(config.default_limit);
            for identifier in project.find(TagQuery::from_tags(tags), Some(limit)) {
                println!("{}", identifier);
            }
            Ok(())
        }
        Commands::Get { identifier } => handle_get(project, &identifier),
        Commands::Tag { identifier, tags } => {
            project.tag(&identifier, tags);
            print_list(&project.tags(&identifier));
            Ok(())
        }
        Commands::Untag { identifier, tags } => {
            project.untag(&identifier, tags);
            print_list(&project.tags(&identifier));
            Ok(())
        }
        Commands::Location(list) => {
            match list {
                ListCommand::Add { value } => project.add_scan_location(&value),
                ListCommand::Remove { value } => project.remove_scan_location(&value),
                ListCommand::List => {}
            }
            print_list(&project.scan_locations());
            Ok(())
        }
        Commands::Skip(list) => {
            match list {
                ListCommand::Add { value } => {
                    if let Err(e) = regex::Regex::new(&value) {
                        bail!("invalid skip regex {:?}: {}", value, e);
                    }
                    project.add_skip_regex(&value)
                }
                ListCommand::Remove { value } => project.remove_skip_regex(&value),
                ListCommand::List => {}
            }
            print_list(&project.skip_regexes());
            Ok(())
        }
        Commands::Plugins(list) => {
            match list {
                ListCommand::Add { value } => project.add_plugin_location(&value),
                ListCommand::Remove { value } => project.remove_plugin_location(&value),
                ListCommand::List => {}
            }
            print_list(&project.plugin_locations());
            Ok(())
        }
        Commands::Explore { location } => {
            let (above, below) = project.explore(&location);
            println!("above:");
            for item in above {
                println!("  {}", item);
            }
            println!("below:");
            for item in below {
                println!("  {}", item);
            }
            Ok(())
        }
        Commands::Settings => {
            let settings = serde_json::Value::Object(project.settings());
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        // handled in run
        Commands::Config(_) | Commands::Create { .. } => Ok(()),
    }
}

fn handle_scan(
    project: &mut Project,
    config: &Config,
    locations: &[String],
    recursive: bool,
    full: bool,
) -> Result<()> {
    project.subscribe(FnSink(|event: &CatalogEvent| -> anyhow::Result<()> {
        if let CatalogEvent::ItemDiscovered { identifier } = event {
            println!("+ {}", identifier);
        }
        Ok(())
    }));

    let recursive = recursive && config.scan.recursive;
    let report = project.scan(locations, recursive, full);

    eprintln!(
        "Scan {}: {} discovered, {} link(s) written, {} pruned, {} failure(s){}",
        report.scan_id,
        report.touched.len(),
        report.links_written,
        report.pruned.len(),
        report.failures,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for identifier in &report.pruned {
        println!("- {}", identifier);
    }
    Ok(())
}

fn handle_get(project: &Project, identifier: &str) -> Result<()> {
    let Some(view) = project.get(identifier) else {
        bail!("no trait represents {}", identifier);
    };

    println!("{}", view);
    if let Some(label) = view.label() {
        println!("label: {}", label);
    }
    if let Some(icon) = view.icon() {
        println!("icon: {}", icon);
    }
    println!("mandatory tags: {}", view.mandatory_tags().join(", "));
    println!("tags: {}", view.tags(project.catalog()).join(", "));

    let functions = view.functionality();
    if !functions.is_empty() {
        println!("functionality:");
        for (name, action) in &functions {
            println!("  {}: {}", name, action.description());
        }
    }
    Ok(())
}

fn print_list(values: &[String]) {
    for value in values {
        println!("{}", value);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

fn handle_config(args: &ConfigArgs, config: &Config) -> Result<()> {
    if args.path {
        match Config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => bail!("could not determine config path"),
        }
    } else if args.show {
        println!("# Effective configuration (env > file > defaults)");
        println!();
        print!("{}", config.to_toml());
    } else {
        println!("Usage: lattice config [--show|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --path    Show config file path");
    }
    Ok(())
}
