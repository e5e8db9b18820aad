// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use workhub::config::{default_config_path, load_config_from, Config};
use workhub::error::{credential_error_message, ErrorBuilder};
use workhub::navigation::{sections_for, sections_for_tag, NavigationSection, SidebarView};
use workhub::security::credential;
use workhub::store::{FileStore, SessionStore, TOKEN_KEY};
use workhub::{Identity, LayoutPreferences, Role, SessionManager, SystemClock};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// General error - credential rejected, no session
    pub const ERROR: i32 = 1;
    /// Data error - invalid input data format
    pub const DATA_ERR: i32 = 65;
}

use exit_codes::*;

/// WorkHub session tool - inspect and manage the stored dashboard session.
#[derive(Parser)]
#[command(name = "workhub")]
#[command(version = VERSION)]
#[command(about = "Inspect and manage the stored WorkHub session.")]
#[command(long_about = "WorkHub session tool\n\n\
    Show session:        workhub status\n\
    Start session:       workhub login --token <T> --name <N> --email <E> --role ROLE_ADMIN\n\
    Check a token:       workhub check <TOKEN>\n\
    Sidebar for a role:  workhub nav --role ROLE_EMPLOYEE\n\
    End session:         workhub logout")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the session store (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    store_dir: Option<PathBuf>,

    /// Path to the config file (defaults to ~/.workhub/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Quiet mode: only errors are logged
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Verbose mode: debug logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session, credential expiry and sidebar
    #[command(alias = "s")]
    Status,

    /// Record a session issued by the backend
    Login {
        /// Signed credential returned by the backend
        #[arg(long)]
        token: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Email address
        #[arg(long)]
        email: String,
        /// Role tag, e.g. ROLE_ADMIN or ADMIN
        #[arg(long)]
        role: String,
        /// Avatar URL
        #[arg(long)]
        avatar_url: Option<String>,
    },

    /// Clear the stored session
    Logout,

    /// Check whether a credential is still usable (defaults to the stored one)
    Check {
        /// Credential to check
        token: Option<String>,
        /// Reject credentials without an expiry
        #[arg(long)]
        strict: bool,
    },

    /// Show the sidebar a role would see (defaults to the stored session's role)
    Nav {
        /// Role tag to evaluate instead of the stored session
        #[arg(long)]
        role: Option<String>,
        /// Current path, to mark the active section
        #[arg(long)]
        path: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sidebar layout preference
    Sidebar {
        #[command(subcommand)]
        command: Option<SidebarCommands>,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum SidebarCommands {
    /// Show whether the sidebar is collapsed
    Show,
    /// Collapse or expand the sidebar
    Toggle,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

fn init_logging(cli: &Cli, config: &Config) {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        config.log_level.parse().unwrap_or(tracing::Level::WARN)
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(cli: &Cli, config: &Config) -> Result<Arc<FileStore>> {
    let dir = match &cli.store_dir {
        Some(dir) => dir.clone(),
        None => config.resolved_store_dir()?,
    };
    let store = FileStore::open(&dir)
        .with_context(|| format!("Failed to open session store in {}", dir.display()))?;
    Ok(Arc::new(store))
}

fn restore_session(store: Arc<FileStore>, config: &Config) -> SessionManager {
    SessionManager::restore(store, Arc::new(SystemClock), config.expiry_policy())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = load_config_from(&config_path)?;
    init_logging(&cli, &config);

    let code = match &cli.command {
        Commands::Status => show_status(&cli, &config)?,
        Commands::Login { token, name, email, role, avatar_url } => {
            handle_login(&cli, &config, token, name, email, role, avatar_url.as_deref())?
        }
        Commands::Logout => handle_logout(&cli, &config)?,
        Commands::Check { token, strict } => handle_check(&cli, &config, token.as_deref(), *strict)?,
        Commands::Nav { role, path, json } => {
            handle_nav(&cli, &config, role.as_deref(), path.as_deref(), *json)?
        }
        Commands::Sidebar { command } => {
            handle_sidebar(&cli, &config, command.as_ref().unwrap_or(&SidebarCommands::Show))?
        }
        Commands::Config { command } => handle_config(&config, &config_path, command)?,
    };

    if code != SUCCESS {
        std::process::exit(code);
    }
    Ok(())
}

fn show_status(cli: &Cli, config: &Config) -> Result<i32> {
    let manager = restore_session(open_store(cli, config)?, config);

    println!();
    let Some(identity) = manager.identity() else {
        println!("  Session:  {}", manager.state().to_string().yellow());
        println!();
        print_sidebar(&manager.sections(), None);
        return Ok(ERROR);
    };

    println!("  Session:  {}", manager.state().to_string().green());
    println!("  User:     {} <{}>", identity.name.bold(), identity.email);
    match identity.role() {
        Some(role) => println!("  Role:     {}", role),
        None => println!("  Role:     {} {}", identity.role, "(unrecognized)".yellow()),
    }
    if let Some(id) = manager.session_id() {
        println!("  Id:       {}", id.dimmed());
    }
    if let Some(credential) = manager.credential() {
        println!("  Token:    {}", workhub::mask_credential(&credential).dimmed());
    }

    match manager.claims() {
        Some(claims) => match (claims.expires_at(), claims.time_remaining(manager.now())) {
            (Some(at), Some(left)) => println!(
                "  Expires:  {} ({} remaining)",
                at.format("%Y-%m-%d %H:%M:%S UTC"),
                format_remaining(left)
            ),
            _ => println!("  Expires:  {}", "never (no exp claim)".yellow()),
        },
        None => println!("  Expires:  {}", "unknown".yellow()),
    }

    println!();
    print_sidebar(&manager.sections(), None);
    Ok(SUCCESS)
}

fn format_remaining(left: chrono::Duration) -> String {
    let secs = left.num_seconds();
    if secs >= 86_400 {
        format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600)
    } else if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

fn handle_login(
    cli: &Cli,
    config: &Config,
    token: &str,
    name: &str,
    email: &str,
    role: &str,
    avatar_url: Option<&str>,
) -> Result<i32> {
    let manager = restore_session(open_store(cli, config)?, config);

    let mut identity = match Role::parse(role) {
        Some(parsed) => Identity::new(name, email, parsed),
        None => {
            eprintln!(
                "{} Unrecognized role '{}'. The session will see Settings only.",
                "[!]".yellow(),
                role
            );
            Identity {
                role: role.to_string(),
                ..Identity::new(name, email, Role::Client)
            }
        }
    };
    if let Some(url) = avatar_url {
        identity = identity.with_avatar_url(url);
    }

    if let Err(err) = credential::check(Some(token), manager.now(), config.expiry_policy()) {
        eprintln!("{} Recording session, but: {}", "[!]".yellow(), err);
    }

    let session_id = manager.login(token, identity);
    println!("{} Logged in as {} ({})", "[OK]".green(), email, session_id.dimmed());
    Ok(SUCCESS)
}

fn handle_logout(cli: &Cli, config: &Config) -> Result<i32> {
    let manager = restore_session(open_store(cli, config)?, config);
    if manager.logout() {
        println!("{} Logged out.", "[OK]".green());
    } else {
        println!("  No session to log out of.");
    }
    Ok(SUCCESS)
}

fn handle_check(cli: &Cli, config: &Config, token: Option<&str>, strict: bool) -> Result<i32> {
    let policy = if strict {
        workhub::ExpiryPolicy::Strict
    } else {
        config.expiry_policy()
    };

    // Read the stored credential directly; restoring a session would clear it.
    let stored;
    let token = match token {
        Some(token) => Some(token),
        None => {
            stored = open_store(cli, config)?
                .get(TOKEN_KEY)
                .context("Failed to read stored credential")?;
            stored.as_deref()
        }
    };

    match credential::check(token, chrono::Utc::now(), policy) {
        Ok(claims) => {
            println!("{} Credential is valid.", "[OK]".green());
            if let Some(sub) = &claims.sub {
                println!("  Subject:  {}", sub);
            }
            match claims.expires_at() {
                Some(at) => println!("  Expires:  {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("  Expires:  {}", "never (no exp claim)".yellow()),
            }
            Ok(SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", credential_error_message(&err));
            Ok(ERROR)
        }
    }
}

fn handle_nav(
    cli: &Cli,
    config: &Config,
    role: Option<&str>,
    path: Option<&str>,
    json: bool,
) -> Result<i32> {
    let view = match role {
        Some(tag) => {
            if Role::parse(tag).is_none() && !json {
                eprintln!("{} Unrecognized role '{}', showing the unauthenticated view.", "[!]".yellow(), tag);
            }
            sections_for_tag(Some(tag))
        }
        None => {
            let manager = restore_session(open_store(cli, config)?, config);
            sections_for(manager.role())
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_sidebar(&view, path);
    }
    Ok(SUCCESS)
}

fn print_sidebar(view: &SidebarView, path: Option<&str>) {
    let active = path.and_then(|p| view.active_section(p));
    let line = |section: &NavigationSection| {
        let marker = if Some(*section) == active { ">" } else { " " };
        let label = format!("{:<20}", section.label());
        let label = if Some(*section) == active { label.bold().to_string() } else { label };
        println!("  {} {} {}", marker.cyan(), label, section.route().dimmed());
    };

    if !view.primary.is_empty() {
        println!("  {}", "OVERVIEW".dimmed());
        view.primary.iter().for_each(&line);
        println!();
    }
    if !view.analytics.is_empty() {
        println!("  {}", "ANALYTICS".dimmed());
        view.analytics.iter().for_each(&line);
        println!();
    }
    view.footer.iter().for_each(&line);
}

fn handle_sidebar(cli: &Cli, config: &Config, command: &SidebarCommands) -> Result<i32> {
    let mut prefs = LayoutPreferences::load(open_store(cli, config)?);

    if let SidebarCommands::Toggle = command {
        prefs.toggle_sidebar().map_err(|e| {
            anyhow::anyhow!(ErrorBuilder::new("Could not save sidebar preference")
                .cause(e.to_string())
                .fix("Check that the store directory is writable")
                .build())
        })?;
    }

    let state = if prefs.is_sidebar_collapsed() { "collapsed" } else { "expanded" };
    println!("  Sidebar: {}", state);
    Ok(SUCCESS)
}

fn handle_config(config: &Config, path: &std::path::Path, command: &ConfigCommands) -> Result<i32> {
    match command {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
            Ok(SUCCESS)
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
            if !path.exists() {
                eprintln!("  (file does not exist; defaults are in effect)");
                return Ok(DATA_ERR);
            }
            Ok(SUCCESS)
        }
    }
}
