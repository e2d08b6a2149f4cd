//! depgen — incremental `.d` fragment generator for C/C++ projects.
//!
//! `run` drives the scan loop (see [`depgen::scan`]) until interrupted.
//! `init`/`doctor` scaffold and check a project's config/template files.
//! The `config` subcommands inspect and edit `dependency_config.json`
//! without starting the loop. A richer interactive shell, welcome/outro
//! text, and config validation against an installation's `data/`
//! fixtures are intentionally not part of this crate.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use depgen::config::Config;
use depgen::pathutil::{self, normalize};
use depgen::relocate;
use depgen::scan::{CycleReport, ScanController, SourceOutcome};

const CONFIG_FILE: &str = "dependency_config.json";
const TEMPLATE_FILE: &str = "dependency_template.txt";
const DEFAULT_TEMPLATE: &str = "|!src_file_name!|.o: |!src_file_basename!| |!dependents!|\n";

#[derive(Parser)]
#[command(name = "depgen", version, about = "Incremental dependency-file (.d) generator for C/C++ projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root to operate on (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scan loop until interrupted (Ctrl-C)
    Run,
    /// Write a default dependency_config.json and starter template if absent
    Init,
    /// Check that the config and template exist and count source files
    Doctor,
    /// Inspect or edit dependency_config.json
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set a single key, validating it before saving
    Set { key: String, value: String },
    /// Write the effective configuration to dependency_config.json
    Save,
    /// Reload configuration from dependency_config.json
    Load,
    /// Reset to compiled-in defaults and save
    Default,
}

fn resolve_root(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| std::env::current_dir().expect("could not determine current directory"))
}

fn config_path(root: &std::path::Path) -> String {
    normalize(&root.join(CONFIG_FILE).to_string_lossy())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let root = resolve_root(cli.root);

    match cli.command {
        Commands::Run => run_loop(&root),
        Commands::Init => run_init(&root),
        Commands::Doctor => run_doctor(&root),
        Commands::Config { action } => run_config(&root, action),
    }
}

/// Writes a default `dependency_config.json` and starter template if
/// either is absent. Supplements the original's implicit first-run
/// behavior (§1 scopes the interactive shell's welcome flow out of this
/// crate, but a fresh project still needs these two files to exist
/// before `run` can do anything).
fn run_init(root: &std::path::Path) {
    let cfg_path = config_path(root);
    if pathutil::is_file(&cfg_path) {
        info!("{cfg_path} already exists");
    } else {
        match Config::default().save(&cfg_path) {
            Ok(()) => info!("wrote {cfg_path}"),
            Err(e) => {
                error!("failed to write {cfg_path}: {e}");
                std::process::exit(1);
            }
        }
    }

    let tmpl_path = normalize(&root.join(TEMPLATE_FILE).to_string_lossy());
    if pathutil::is_file(&tmpl_path) {
        info!("{tmpl_path} already exists");
    } else if pathutil::write_text(&tmpl_path, DEFAULT_TEMPLATE) {
        info!("wrote {tmpl_path}");
    } else {
        error!("failed to write {tmpl_path}");
        std::process::exit(1);
    }
}

/// Checks that the config and template files exist and are valid, and
/// reports how many source files the project currently has.
fn run_doctor(root: &std::path::Path) {
    let root_str = normalize(&root.to_string_lossy());
    let cfg_path = config_path(root);
    let tmpl_path = normalize(&root.join(TEMPLATE_FILE).to_string_lossy());

    let mut ok = true;

    match Config::load_or_default(&cfg_path, &root_str) {
        Ok(_) if pathutil::is_file(&cfg_path) => info!("{cfg_path}: OK"),
        Ok(_) => warn!("{cfg_path}: not found, defaults would be used"),
        Err(e) => {
            ok = false;
            error!("{cfg_path}: {e}");
        }
    }

    if pathutil::is_file(&tmpl_path) {
        info!("{tmpl_path}: OK");
    } else {
        ok = false;
        error!("{tmpl_path}: not found");
    }

    let found = pathutil::find_files(&["*.c".to_string(), "*.cpp".to_string()], &root_str);
    info!("found {} source file(s) under {root_str}", found.len());

    if !ok {
        std::process::exit(1);
    }
}

fn run_loop(root: &std::path::Path) {
    let root_str = normalize(&root.to_string_lossy());
    let cfg_path = config_path(root);
    let config = match Config::load_or_default(&cfg_path, &root_str) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load {cfg_path}: {e}");
            std::process::exit(1);
        }
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("could not install interrupt handler: {e}");
    }

    let mut controller = ScanController::new(&root_str, &config);

    info!("watching {root_str}");
    while !interrupted.load(Ordering::SeqCst) {
        match controller.run_cycle(&root_str, &config) {
            CycleReport::MissingTemplate => {
                error!("dependency_template.txt not found under {root_str}; stopping");
                break;
            }
            CycleReport::NoSources => {
                info!("no source files found; sleeping");
            }
            CycleReport::Ran { removed_fragments, outcomes } => {
                if removed_fragments > 0 {
                    info!("removed {removed_fragments} orphaned fragment(s)");
                }
                for outcome in outcomes {
                    report_outcome(outcome);
                }
            }
        }

        for _ in 0..config.sleep_timer.max(1) {
            if interrupted.load(Ordering::SeqCst) {
                break;
            }
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    info!("scan loop stopped");
}

fn report_outcome(outcome: SourceOutcome) {
    match outcome {
        SourceOutcome::Emitted { source, fragment } => info!("{source}: wrote {fragment}"),
        SourceOutcome::Unchanged { .. } => {}
        SourceOutcome::WriteFailed { source, fragment } => error!("{source}: failed to write {fragment}"),
        SourceOutcome::SkippedIncomplete { source, missing } => {
            warn!("{source}: unresolved include(s) {}, skipping emit", missing.join(", "))
        }
    }
}

fn run_config(root: &std::path::Path, action: ConfigAction) {
    let root_str = normalize(&root.to_string_lossy());
    let cfg_path = config_path(root);

    match action {
        ConfigAction::Show => match Config::load_or_default(&cfg_path, &root_str) {
            Ok(c) => println!("{}", serde_json::to_string_pretty(&c).expect("Config always serializes")),
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        ConfigAction::Set { key, value } => {
            let mut c = match Config::load_or_default(&cfg_path, &root_str) {
                Ok(c) => c,
                Err(e) => {
                    error!("{e}");
                    std::process::exit(1);
                }
            };
            let old_dependency_dir = c.dependency_dir.clone();
            if let Err(e) = c.set(&key, &value, &root_str) {
                error!("{e}");
                std::process::exit(1);
            }

            // dependency_dir moved: relocate existing fragments and the
            // project config file before persisting the new value, so
            // nothing is left stranded in the old location. `c.dependency_dir`
            // is already resolved to an absolute path (or empty) by `set`.
            if key == "dependency_dir" && c.dependency_dir != old_dependency_dir {
                let moved = relocate::relocate_fragments(&root_str, &c.dependency_dir);
                if !moved.is_empty() {
                    info!("relocated {} fragment(s) to {}", moved.len(), c.dependency_dir);
                }
                if relocate::relocate_config(&cfg_path, &root_str, &c.dependency_dir) {
                    let new_cfg_path = relocate::config_target_path(&root_str, &c.dependency_dir);
                    info!("relocated configuration file to {new_cfg_path}");
                    if let Err(e) = c.save(&new_cfg_path) {
                        error!("failed to save {new_cfg_path}: {e}");
                        std::process::exit(1);
                    }
                    info!("{key} = {value}");
                    return;
                }
            }

            if let Err(e) = c.save(&cfg_path) {
                error!("failed to save {cfg_path}: {e}");
                std::process::exit(1);
            }
            info!("{key} = {value}");
        }
        ConfigAction::Save => match Config::load_or_default(&cfg_path, &root_str) {
            Ok(c) => {
                if let Err(e) = c.save(&cfg_path) {
                    error!("failed to save {cfg_path}: {e}");
                    std::process::exit(1);
                }
            }
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        ConfigAction::Load => match Config::load(&cfg_path, &root_str) {
            Ok(c) => println!("{}", serde_json::to_string_pretty(&c).expect("Config always serializes")),
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        ConfigAction::Default => {
            let c = Config::default();
            if let Err(e) = c.save(&cfg_path) {
                error!("failed to save {cfg_path}: {e}");
                std::process::exit(1);
            }
            info!("wrote defaults to {cfg_path}");
        }
    }
}
