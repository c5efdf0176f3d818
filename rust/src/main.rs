//! Small CLI over the binconf library: write containers, read them back, and
//! inspect stored files. Set `BINCONF_CONFIG` to a config file to enable sealing.

use std::env;
use std::fs;
use std::process::ExitCode;

use binconf::config::{load_config, RuntimeConfig};
use binconf::crypto::integrity::sha256_hex;
use binconf::{Container, Named, PersistenceHandler, SingleValueContainer};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_ENV: &str = "BINCONF_CONFIG";

fn print_usage() -> ExitCode {
    eprintln!("Commands:\n  write <name> <value>...\n  write-single <name> <value>\n  read <path>\n  read-single <path>\n  project <path>\n  digest <path>\n\nSet {CONFIG_ENV} to a JSON config file to seal stored containers.");
    ExitCode::from(2)
}

fn init_tracing(debug_level: Option<&str>) {
    let fallback = debug_level.unwrap_or("info").to_string();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).without_time())
        .init();
}

fn runtime_config() -> Result<RuntimeConfig, String> {
    match env::var(CONFIG_ENV) {
        Ok(path) => load_config(&path).map_err(|e| format!("config load failed: {e}")),
        Err(_) => Ok(RuntimeConfig {
            handler: PersistenceHandler::new(),
            debug_level: None,
        }),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("json output failed: {e}"))?;
    println!("{text}");
    Ok(())
}

fn run(args: &[String], handler: &PersistenceHandler) -> Result<(), String> {
    match args[1].as_str() {
        "write" => {
            let container = Container::with_values(args[2].as_str(), &args[3..])
                .map_err(|e| format!("cannot build container: {e}"))?;
            let path = handler.write(&container).map_err(|e| format!("write failed: {e}"))?;
            println!("wrote {} value(s) to {}", container.len(), path.display());
        }
        "write-single" => {
            let single = SingleValueContainer::with_value(args[2].as_str(), args[3].as_str());
            let path = handler.write(&single).map_err(|e| format!("write failed: {e}"))?;
            println!("wrote {} to {}", single.name(), path.display());
        }
        "read" => {
            let container = handler.read(&args[2]).map_err(|e| format!("read failed: {e}"))?;
            print_json(&container)?;
        }
        "read-single" => {
            let single = handler.read_single(&args[2]).map_err(|e| format!("read failed: {e}"))?;
            print_json(&single)?;
        }
        "project" => {
            let container = handler.read(&args[2]).map_err(|e| format!("read failed: {e}"))?;
            print_json(&container.to_projection())?;
        }
        "digest" => {
            let bytes = fs::read(&args[2]).map_err(|e| format!("cannot read {}: {e}", args[2]))?;
            println!("{}", sha256_hex(&bytes));
        }
        other => return Err(format!("unknown command: {other}")),
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let arity_ok = match args.get(1).map(String::as_str) {
        Some("write") => args.len() >= 4,
        Some("write-single") => args.len() == 4,
        Some("read" | "read-single" | "project" | "digest") => args.len() == 3,
        _ => false,
    };
    if !arity_ok {
        return print_usage();
    }

    let config = match runtime_config() {
        Ok(config) => config,
        Err(err) => {
            init_tracing(None);
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.debug_level.as_deref());

    match run(&args, &config.handler) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
