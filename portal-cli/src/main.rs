//! Portal CLI - inspect menus, route decisions and configuration
//!
//! Runs the access layer offline against the configured catalog and route
//! table, which makes it handy for checking permission setups.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use portal_access::{
    load_menu_catalog, load_route_table, AccessError, Grant, MemoryTabStorage, MenuNode,
    NavigationService,
};
use portal_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, LoggingConfig,
    PermissionSet, PortalConfig, PortalError, Role,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Inspect portal menus, route access and configuration")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the menu a role sees with the given permissions
    Menu {
        /// Role name (admin, user, moderator, guest)
        #[arg(short, long)]
        role: Role,

        /// Granted permission; repeat for more
        #[arg(short, long = "grant")]
        grants: Vec<String>,

        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },

    /// Check whether a role may open a path
    Route {
        /// Role name (admin, user, moderator, guest)
        #[arg(short, long)]
        role: Role,

        /// Path to check, e.g. /admin/users/42
        path: String,
    },

    /// Configuration management
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Print the current configuration
        #[arg(long)]
        show: bool,

        /// Validate the current configuration
        #[arg(long)]
        validate: bool,

        /// Print the configuration file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging_config = LoggingConfig::default();
    if cli.verbose {
        logging_config.level = "debug".to_string();
        logging_config.filter_directives = vec![
            "portal_core=debug".to_string(),
            "portal_access=debug".to_string(),
        ];
    }
    init_logging(&logging_config).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    debug!("Starting portal CLI v{}", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let result = match cli.command {
        Commands::Menu { role, grants, json } => {
            let config = load_config(&config_path)?;
            handle_menu(&config, role, grants, json)
        }
        Commands::Route { role, path } => {
            let config = load_config(&config_path)?;
            handle_route(&config, role, &path)
        }
        Commands::Config {
            init,
            show,
            validate,
            path,
        } => handle_config(&config_path, init, show, validate, path).await,
    };

    if let Err(e) = &result {
        report_error(e);
    }
    result
}

/// Log structured portal errors with their error id before exiting
fn report_error(error: &anyhow::Error) {
    if let Some(portal) = error.downcast_ref::<PortalError>() {
        portal.log();
    } else if let Some(AccessError::Core(portal)) = error.downcast_ref::<AccessError>() {
        portal.log();
    }
}

fn handle_menu(config: &PortalConfig, role: Role, grants: Vec<String>, json: bool) -> Result<()> {
    log_operation_start!("build_menu", role = %role);

    let catalog = load_menu_catalog(&config.navigation)?;
    let granted: PermissionSet = grants.into_iter().collect();
    let menu = catalog.build_menu(role, &Grant::new(role, &granted));

    log_operation_success!("build_menu", items = menu.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&menu)?);
    } else if menu.is_empty() {
        println!("No menu items for role '{}'", role);
    } else {
        print_tree(&menu, 0);
    }
    Ok(())
}

fn print_tree(nodes: &[MenuNode], depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match node.path() {
            Some(path) => println!("{}{} ({}) -> {}", indent, node.label, node.key, path),
            None => println!("{}{} ({})", indent, node.label, node.key),
        }
        print_tree(node.children(), depth + 1);
    }
}

fn handle_route(config: &PortalConfig, role: Role, path: &str) -> Result<()> {
    let catalog = load_menu_catalog(&config.navigation)?;
    let routes = load_route_table(&config.navigation)?;
    let service = NavigationService::new(
        Arc::new(catalog),
        routes,
        Arc::new(MemoryTabStorage::new()),
    );

    let allowed = service.can_access_route(path, role);
    let decision = service.guard(path, role);
    info!(path, role = %role, allowed, "Route evaluated");

    println!("path:     {}", path);
    println!("role:     {}", role);
    println!("access:   {}", if allowed { "allowed" } else { "denied" });
    println!("decision: {}", serde_json::to_string(&decision)?);
    Ok(())
}

async fn handle_config(
    config_path: &Path,
    init: bool,
    show: bool,
    validate: bool,
    path: bool,
) -> Result<()> {
    if path {
        println!("{}", config_path.display());
    }

    if init {
        if let Some(dir) = config_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        PortalConfig::default().save_to_file(config_path)?;
        println!("Configuration initialized at: {}", config_path.display());
    }

    if show {
        let config = load_config(config_path)?;
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if validate {
        let config = load_config(config_path)?;
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                log_operation_error!("validate_config", e);
                println!("Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Load the configuration file, falling back to defaults when it is absent
fn load_config(path: &Path) -> Result<PortalConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "No configuration file, using defaults");
        return Ok(PortalConfig::default());
    }

    let config = PortalConfig::from_file(path)?;
    debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portal")
        .join("config.toml")
}
