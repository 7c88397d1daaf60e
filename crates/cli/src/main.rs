mod config;
mod error;

use std::path::{Path, PathBuf};

use catalog::{CapabilityType, CatalogSource, FunctionKind, JsonFileSource, MemorySource};
use chrono::Local;
use clap::{Parser, Subcommand};
use config::Config;
use engine::{Authorizer, MenuForest, Resolution};
use storage::AclStore;
use tracing_subscriber::EnvFilter;

use error::{Error, Result};

const CONFIG_FILE: &str = "aclctl.toml";

#[derive(Parser)]
#[command(name = "aclctl")]
#[command(about = "Inspect and query a role-based permission catalog", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./aclctl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read the catalog from a JSON file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Read the catalog from a SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report every violation in a catalog file
    Validate {
        file: PathBuf,
    },
    /// Upsert a catalog file into the database
    Seed {
        file: PathBuf,
        /// Delete every stored document first
        #[arg(long)]
        reset: bool,
    },
    /// List the functions granted to a set of roles
    Resolve {
        #[arg(short, long = "role", required = true, num_args = 1.., value_delimiter = ',')]
        roles: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Check whether a set of roles may call an operation
    Check {
        #[arg(short, long = "role", required = true, num_args = 1.., value_delimiter = ',')]
        roles: Vec<String>,
        operation: String,
    },
    /// Check whether a set of roles holds a capability
    Capability {
        #[arg(short, long = "role", required = true, num_args = 1.., value_delimiter = ',')]
        roles: Vec<String>,
        /// client or server
        capability: String,
        #[arg(long)]
        app: Option<String>,
    },
    /// Print the menu for a set of roles
    Menu {
        #[arg(short, long = "role", required = true, num_args = 1.., value_delimiter = ',')]
        roles: Vec<String>,
        #[arg(long)]
        app: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Seed { file, reset } => {
            let db = cli.db.or(config.catalog.database).ok_or(Error::NoDatabase)?;
            cmd_seed(&file, &db, reset)
        }
        Commands::Resolve { roles, json } => {
            let authorizer = load_authorizer(cli.catalog.as_deref(), cli.db.as_deref(), &config)?;
            cmd_resolve(&authorizer, &roles, json)
        }
        Commands::Check { roles, operation } => {
            let authorizer = load_authorizer(cli.catalog.as_deref(), cli.db.as_deref(), &config)?;
            cmd_check(&authorizer, &roles, &operation)
        }
        Commands::Capability {
            roles,
            capability,
            app,
        } => {
            let authorizer = load_authorizer(cli.catalog.as_deref(), cli.db.as_deref(), &config)?;
            cmd_capability(&authorizer, &roles, &capability, app)
        }
        Commands::Menu { roles, app, json } => {
            let authorizer = load_authorizer(cli.catalog.as_deref(), cli.db.as_deref(), &config)?;
            cmd_menu(&authorizer, &roles, app.as_deref(), json)
        }
    }
}

fn cmd_validate(file: &Path) -> Result<()> {
    let records = match JsonFileSource::new(file).load_all() {
        Ok(records) => records,
        Err(catalog::Error::Rejected(violations)) => return report_violations(&violations),
        Err(e) => return Err(e.into()),
    };

    let violations = records.validate();
    if !violations.is_empty() {
        return report_violations(&violations);
    }

    println!(
        "{}: ok ({} functions, {} function groups, {} roles)",
        file.display(),
        records.functions.len(),
        records.function_groups.len(),
        records.roles.len()
    );
    Ok(())
}

fn report_violations(violations: &[catalog::Violation]) -> Result<()> {
    for violation in violations {
        println!("{violation}");
    }
    Err(Error::Invalid {
        count: violations.len(),
    })
}

fn cmd_seed(file: &Path, db: &Path, reset: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let documents = catalog::parse_documents(&content)?;

    let mut store = AclStore::open(db)?;
    if reset {
        let removed = store.reset()?;
        println!("Removed {removed} document(s)");
    }
    let written = store.upsert_all(&documents)?;
    println!("Seeded {written} document(s) into {}", db.display());
    Ok(())
}

fn cmd_resolve(authorizer: &Authorizer, roles: &[String], json: bool) -> Result<()> {
    let resolution = authorizer.resolve(roles);

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution_json(&resolution))?);
        return Ok(());
    }

    let snapshot = authorizer.snapshot();
    println!(
        "Catalog v{} loaded {}",
        snapshot.version(),
        snapshot.loaded_at().with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!("Roles: {}\n", resolution.set.roles().join(", "));

    if resolution.set.is_empty() {
        println!("No functions granted.");
    } else {
        println!("{:<24}  {:<10}  DETAIL", "FUNCTION", "KIND");
        println!("{}", "-".repeat(60));
        for function in resolution.set.functions() {
            let detail = match function.kind() {
                FunctionKind::Endpoint(endpoint) => endpoint.operation_id.clone(),
                FunctionKind::Menu(menu) => menu.endpoint_path.clone().unwrap_or_default(),
                FunctionKind::Capability(capability) => match &capability.app_id {
                    Some(app) => format!("{} @ {app}", capability.capability_type),
                    None => capability.capability_type.to_string(),
                },
            };
            println!(
                "{:<24}  {:<10}  {detail}",
                function.id(),
                function.kind().name()
            );
        }
    }

    for reference in &resolution.unresolved {
        eprintln!("warning: {reference}");
    }
    Ok(())
}

fn resolution_json(resolution: &Resolution) -> serde_json::Value {
    serde_json::json!({
        "version": resolution.set.version(),
        "roles": resolution.set.roles(),
        "functions": resolution.set.functions().collect::<Vec<_>>(),
        "unresolved": resolution.unresolved,
    })
}

fn cmd_check(authorizer: &Authorizer, roles: &[String], operation: &str) -> Result<()> {
    authorizer
        .resolve(roles)
        .set
        .require_operation(operation)?;
    println!("allow");
    Ok(())
}

fn cmd_capability(
    authorizer: &Authorizer,
    roles: &[String],
    capability: &str,
    app: Option<String>,
) -> Result<()> {
    let capability_type: CapabilityType = capability.parse()?;
    if authorizer.has_capability(roles, capability_type, app.as_deref()) {
        println!("granted");
        Ok(())
    } else {
        Err(Error::CapabilityNotGranted {
            capability: capability_type.to_string(),
            app,
        })
    }
}

fn cmd_menu(authorizer: &Authorizer, roles: &[String], app: Option<&str>, json: bool) -> Result<()> {
    let forest = authorizer.menu(roles, app);

    if json {
        println!("{}", serde_json::to_string_pretty(&forest)?);
    } else {
        print_menu(&forest);
    }
    Ok(())
}

fn print_menu(forest: &MenuForest) {
    if forest.is_empty() {
        println!("No menu entries.");
    }
    for (depth, node) in forest.iter() {
        let label = if node.description.is_empty() {
            node.id.as_str()
        } else {
            node.description.as_str()
        };
        let path = node.menu.endpoint_path.as_deref().unwrap_or("");
        println!(
            "{}{label} [{}] {path}",
            "  ".repeat(depth),
            node.id
        );
    }
    for diagnostic in &forest.diagnostics {
        match serde_json::to_string(diagnostic) {
            Ok(text) => eprintln!("warning: {text}"),
            Err(_) => eprintln!("warning: {diagnostic:?}"),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(CONFIG_FILE).exists() => Ok(Config::load(CONFIG_FILE)?),
        None => Ok(Config::default()),
    }
}

/// Pick the catalog source: command-line flags first, then the config
/// file, then the built-in seed catalog.
fn open_source(
    file: Option<&Path>,
    db: Option<&Path>,
    config: &Config,
) -> Result<Box<dyn CatalogSource>> {
    let (file, db) = match (file, db) {
        (Some(_), Some(_)) => return Err(Error::ConflictingSources),
        (None, None) => (
            config.catalog.file.as_deref(),
            config.catalog.database.as_deref(),
        ),
        flags => flags,
    };

    match (file, db) {
        (Some(file), _) => Ok(Box::new(JsonFileSource::new(file))),
        (None, Some(db)) => {
            if !db.exists() {
                return Err(Error::DatabaseNotFound {
                    path: db.to_path_buf(),
                });
            }
            Ok(Box::new(AclStore::open(db)?))
        }
        (None, None) => {
            tracing::info!("No catalog configured, using the built-in seed catalog");
            Ok(Box::new(MemorySource::new(catalog::sample::records()?)))
        }
    }
}

fn load_authorizer(
    file: Option<&Path>,
    db: Option<&Path>,
    config: &Config,
) -> Result<Authorizer> {
    let source = open_source(file, db, config)?;
    let authorizer = Authorizer::new(config.authorizer_options());
    authorizer.reload(source.as_ref())?;
    Ok(authorizer)
}
