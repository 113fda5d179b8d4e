// stterm - terminal console for the SmartThings API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod catalog;
mod client;
mod config;
mod controller;
mod editor;
mod error;
mod import;
mod logging;
mod platform;
mod report;
mod resource;
mod rules;
mod schedules;
mod tui;

use crate::client::ApiClient;
use crate::config::{EffectiveConfig, Overrides, Scope, resolve, save};
use crate::controller::{Controller, ControllerOptions};
use crate::error::ConsoleError;
use crate::platform::PlatformClient;
use crate::report::Severity;
use crate::resource::{CopyNaming, Remote, ResourceKind};
use crate::rules::Rules;
use crate::schedules::Schedules;
use crate::tui::{ScreenChoice, ScreenOptions};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{env, fs};

#[derive(Parser)]
#[command(
    name = "stterm",
    version,
    about = "Terminal console for SmartThings rules and schedules"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "API token override for this invocation (otherwise read from config)"
    )]
    token: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Base URL for the API (defaults to https://api.smartthings.com)"
    )]
    base_url: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        help = "Per-request timeout (defaults to 30)"
    )]
    timeout: Option<u64>,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format (propagates to subcommands)"
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist the token given with --token (and --base-url/--timeout) to the chosen scope
    Configure {
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
        #[arg(
            long,
            value_name = "LOCATION",
            help = "Location id or name that imports go to"
        )]
        default_location: Option<String>,
        #[arg(long, value_name = "DIR", help = "Directory the import browser lists")]
        import_dir: Option<PathBuf>,
    },
    /// Open the interactive console
    Ui {
        #[arg(long, value_enum, help = "Open this screen instead of the menu")]
        screen: Option<ScreenChoice>,
        #[arg(long, value_name = "DIR", help = "Directory the import browser lists")]
        import_dir: Option<PathBuf>,
    },
    /// Automation rules
    #[command(subcommand)]
    Rules(ResourceCommand),
    /// Installed-app schedules
    #[command(subcommand)]
    Schedules(ResourceCommand),
    /// List the locations rules can live in
    Locations,
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum ResourceCommand {
    /// List all, sorted by name
    List,
    /// Print one as editable JSON
    Show {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Save an edited JSON document (update, or create a copy with --copy)
    Save {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, help = "Create a renamed copy instead of updating")]
        copy: bool,
    },
    /// Create a renamed copy of an existing one
    Copy {
        #[arg(value_name = "KEY")]
        key: String,
    },
    Delete {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Create a new one from a local JSON file
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let cwd = env::current_dir().context("reading current directory")?;

    match &cli.command {
        Commands::Ui { .. } => logging::init_tui(&config::log_path()?)?,
        _ => logging::init_cli(),
    }

    let mut overrides = Overrides {
        token: cli.token.clone(),
        base_url: cli.base_url.clone(),
        timeout_secs: cli.timeout,
        import_dir: None,
    };

    match cli.command {
        Commands::Configure {
            scope,
            default_location,
            import_dir,
        } => {
            let mut existing = config::load_scope(scope.into(), &cwd)?;
            let token = overrides
                .token
                .ok_or(config::ConfigError::MissingToken)?;
            existing.token = Some(token.trim().to_string());
            if let Some(url) = overrides.base_url {
                existing.base_url = Some(url);
            }
            if let Some(secs) = overrides.timeout_secs {
                existing.timeout_secs = Some(secs);
            }
            if let Some(location) = default_location {
                existing.default_location = Some(location);
            }
            if let Some(dir) = import_dir {
                existing.import_dir = Some(dir);
            }

            let path = save(scope.into(), &existing, &cwd)?;
            println!("Saved configuration to {}", path.display());
        }
        Commands::ConfigShow => {
            let mut masked = config::load(&cwd)?;
            if masked.token.is_some() {
                masked.token = Some("*****".into());
            }
            println!("{}", serde_json::to_string_pretty(&masked)?);
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
        }
        Commands::Ui { screen, import_dir } => {
            overrides.import_dir = import_dir;
            let effective = resolve(&cwd, overrides)?;
            let platform = connect(&effective)?;
            tui::run(platform, screen_options(&effective), screen)?;
        }
        Commands::Locations => {
            let effective = resolve(&cwd, overrides)?;
            let platform = connect(&effective)?;
            let mut locations = platform.locations()?;
            locations.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.location_id.cmp(&b.location_id)));
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string(&locations)?),
                OutputFormat::Pretty => print_table(
                    &["name", "locationId"],
                    locations
                        .into_iter()
                        .map(|location| vec![location.name, location.location_id])
                        .collect(),
                ),
            }
        }
        Commands::Rules(command) => {
            let effective = resolve(&cwd, overrides)?;
            let options = screen_options(&effective).rules;
            let mut controller = Controller::<Rules, _>::new(connect(&effective)?, options);
            return run_resource(&mut controller, command, cli.output);
        }
        Commands::Schedules(command) => {
            let effective = resolve(&cwd, overrides)?;
            let options = screen_options(&effective).schedules;
            let mut controller = Controller::<Schedules, _>::new(connect(&effective)?, options);
            return run_resource(&mut controller, command, cli.output);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn connect(effective: &EffectiveConfig) -> Result<PlatformClient> {
    let api = ApiClient::new(&effective.base_url, &effective.token, effective.timeout)?;
    Ok(PlatformClient::new(api))
}

fn screen_options(effective: &EffectiveConfig) -> ScreenOptions {
    let mut rules = kind_options::<Rules>(effective, effective.rules_copy.clone());
    rules.default_container = effective.default_location.clone();
    ScreenOptions {
        rules,
        schedules: kind_options::<Schedules>(effective, effective.schedules_copy.clone()),
    }
}

fn kind_options<K: ResourceKind>(
    effective: &EffectiveConfig,
    naming: Option<CopyNaming>,
) -> ControllerOptions {
    let mut options = ControllerOptions::for_kind::<K>();
    if let Some(naming) = naming {
        options.copy_naming = naming;
    }
    options.import_root = effective.import_dir.clone();
    options
}

/// Drives one controller operation without a screen. Messages the
/// controller reported are printed afterwards; any reported error makes
/// the exit code non-zero.
fn run_resource<K: ResourceKind, R: Remote<K>>(
    controller: &mut Controller<K, R>,
    command: ResourceCommand,
    output: OutputFormat,
) -> Result<ExitCode> {
    if controller.setup() {
        match command {
            ResourceCommand::List => print_catalog(controller, output)?,
            ResourceCommand::Show { key } => {
                if select_or_report(controller, &key) {
                    match output {
                        OutputFormat::Pretty => println!("{}", controller.editor().text()),
                        OutputFormat::Json => {
                            if let Some(resource) = controller.selected_resource() {
                                println!("{}", serde_json::to_string(resource)?);
                            }
                        }
                    }
                }
            }
            ResourceCommand::Save { file, copy } => {
                let text = read_document(&file)?;
                controller.save_text(&text, copy);
            }
            ResourceCommand::Copy { key } => {
                if select_or_report(controller, &key) {
                    controller.save(true);
                }
            }
            ResourceCommand::Delete { key } => {
                if select_or_report(controller, &key) {
                    controller.delete();
                }
            }
            ResourceCommand::Import { file } => {
                controller.import_file(&file);
            }
        }
    }

    let failed = controller.status().last_error().is_some();
    for message in controller.status_mut().drain() {
        match message.severity {
            Severity::Info => println!("{}", message.text),
            Severity::Warning => eprintln!("Warning: {}", message.text),
            Severity::Error => eprintln!("{}", message.text),
        }
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn select_or_report<K: ResourceKind, R: Remote<K>>(
    controller: &mut Controller<K, R>,
    key: &str,
) -> bool {
    if controller.select(key) {
        return true;
    }
    controller
        .status_mut()
        .error(&ConsoleError::other(format!("{} {key} not found", K::SINGULAR)));
    false
}

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_catalog<K: ResourceKind, R: Remote<K>>(
    controller: &Controller<K, R>,
    output: OutputFormat,
) -> Result<()> {
    let catalog = controller.catalog();
    match output {
        OutputFormat::Json => {
            let resources: Vec<_> = catalog.entries().iter().map(|entry| &entry.resource).collect();
            println!("{}", serde_json::to_string(&resources)?);
        }
        OutputFormat::Pretty => print_table(
            &["name", "key"],
            catalog
                .labels()
                .map(|(key, label)| vec![label.to_string(), key.to_string()])
                .collect(),
        ),
    }
    Ok(())
}

fn print_table(columns: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        println!("No resources found.");
        return;
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    print_row(columns.iter().copied(), &widths);
    // Separator
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            print!("  ");
        }
        print!("{:-<width$}", "", width = *width);
    }
    println!();
    for row in &rows {
        print_row(row.iter().map(String::as_str), &widths);
    }
}

fn print_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:width$}", cell, width = *width))
        .collect();
    println!("{}", line.join("  ").trim_end());
}
