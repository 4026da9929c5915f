mod cli;

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error};
use tplug_core::kernel::config::HostConfig;
use tplug_core::kernel::error::{Error, Result};
use tplug_core::plugin_system::dependency;
use tplug_core::plugin_system::{get_installed_plugin, PluginInfo, PluginRegistry};
use tplug_core::PluginHost;

use cli::{CliArgs, Commands, DirArgs};

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

/// Settings from `--config` (or defaults), with `--dir` replacing the search path
fn host_config(config_path: Option<&Path>, dirs: &DirArgs) -> Result<HostConfig> {
    let mut config = match config_path {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if !dirs.dirs.is_empty() {
        config.plugin_dirs = dirs.dirs.clone();
        config.use_default_dirs = false;
    }
    debug!("Host configuration: {:?}", config);
    Ok(config)
}

fn describe(info: &PluginInfo) -> String {
    if info.category.is_empty() {
        info.to_string()
    } else {
        format!("{} ({})", info, info.category)
    }
}

fn names(list: &[String]) -> String {
    if list.is_empty() {
        "(none)".to_string()
    } else {
        list.join(", ")
    }
}

async fn discover(config: HostConfig) -> Result<Vec<PluginInfo>> {
    let host = PluginHost::with_registry(PluginRegistry::new(), config)?;
    let registry = host.registry();
    let registry = registry.lock().await;
    Ok(registry.discover()?)
}

async fn list(config: HostConfig) -> Result<ExitCode> {
    let plugins = discover(config).await?;
    if plugins.is_empty() {
        println!("No plugins found.");
    }
    for info in &plugins {
        println!("{}", describe(info));
    }
    Ok(ExitCode::SUCCESS)
}

fn info(file: &Path) -> Result<ExitCode> {
    let info = get_installed_plugin(file)?;
    let field = |label: &str, value: &str| {
        if !value.is_empty() {
            println!("{:<16}{}", format!("{}:", label), value);
        }
    };

    field("Name", &info.name);
    field("Display name", &info.display_name);
    field("Description", &info.description);
    field("Version", &info.version);
    field("Release", &info.release);
    field("Engine", &info.engine);
    field("Host version", &info.host_version);
    field("Category", &info.category);
    field("License", &info.license_description);
    field("License URL", &info.license_url);
    field("Site", &info.site);
    field("Provider", &info.provider.name);
    field("Requires", &info.required_plugins.join(", "));
    field("Categories", &info.required_plugin_categories.join(", "));
    field("Modules", &info.required_modules.join(", "));
    for (name, value) in &info.resources {
        field(&format!("Resource {}", name), value);
    }
    for (name, value) in &info.parameters {
        field(&format!("Parameter {}", name), value);
    }
    field("Folder", &info.folder.display().to_string());
    Ok(ExitCode::SUCCESS)
}

async fn order(config: HostConfig) -> Result<ExitCode> {
    let plugins = discover(config).await?;
    match dependency::sort(plugins) {
        Ok(sorted) => {
            for (position, info) in sorted.iter().enumerate() {
                println!("{:>3}. {}", position + 1, info.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn load(mut config: HostConfig, no_start: bool, save_state: bool) -> Result<ExitCode> {
    config.auto_start = !no_start;
    if save_state && config.state_file.is_none() {
        let base = env::current_dir().map_err(|e| Error::Other(format!("no working directory: {}", e)))?;
        config.state_file = Some(config.state_file_or(&base));
    }

    let host = PluginHost::new(config)?;
    let loaded = host.load_all().await;
    if let Err(e) = &loaded {
        error!("{}", e);
    }

    let state = host.snapshot().await;
    println!("Loaded:   {}", names(&state.enabled));
    println!("Unloaded: {}", names(&state.unloaded));
    println!("Broken:   {}", names(&state.broken));

    if save_state {
        host.persist_state().await?;
        if let Some(path) = &host.config().state_file {
            println!("State saved to {}", path.display());
        }
    }
    host.shutdown().await?;

    if loaded.is_err() || !state.broken.is_empty() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn run(args: CliArgs) -> Result<ExitCode> {
    let config_path: Option<PathBuf> = args.config;
    match args.command {
        Commands::Ping => {
            println!("pong");
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { dirs } => list(host_config(config_path.as_deref(), &dirs)?).await,
        Commands::Info { file } => info(&file),
        Commands::Order { dirs } => order(host_config(config_path.as_deref(), &dirs)?).await,
        Commands::Load {
            dirs,
            no_start,
            save_state,
        } => load(host_config(config_path.as_deref(), &dirs)?, no_start, save_state).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
