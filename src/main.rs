use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use wiretap::{
    AuditFileLogger, Forwarder, UpstreamClientAdapter,
    config::{ProxyConfigValidator, load_config, write_default_config},
    tracing_setup,
};

/// Directory the per-day audit files live in, relative to the working
/// directory the proxy was started from.
const LOG_DIR: &str = "logs";

const BANNER: &str = r#"
          _          _
__      _(_)_ __ ___| |_ __ _ _ __
\ \ /\ / / | '__/ _ \ __/ _` | '_ \
 \ V  V /| | | |  __/ || (_| | |_) |
  \_/\_/ |_|_|  \___|\__\__,_| .__/
                             |_|
"#;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.json")]
    config: String,

    /// Emit the proxy's own diagnostics as JSON lines instead of console output
    #[clap(long, global = true)]
    log_json: bool,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.json")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.json")]
        config: String,
    },
    /// Start the debug proxy (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.json")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Determine the command to run
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config), // Default to serve with config from args
    };

    match command {
        "validate" => {
            return validate_config_command(&config_path).await;
        }
        "init" => {
            return init_config_command(&config_path).await;
        }
        "serve" => {
            // Continue with normal proxy startup
        }
        _ => unreachable!(),
    }

    if args.log_json {
        tracing_setup::init_tracing()?;
    } else {
        tracing_setup::init_console_tracing()?;
    }

    println!("{BANNER}");
    println!("version {}\n", env!("CARGO_PKG_VERSION"));

    // First run: write a default config and stop so the operator can point it
    // at the right upstream before any traffic flows.
    if !Path::new(&config_path).exists() {
        let defaults = write_default_config(&config_path)
            .await
            .with_context(|| format!("Failed to create {config_path}"))?;
        println!(
            "Created {config_path} with default settings (forwarding to {}).",
            defaults.target_url
        );
        println!("Edit it and start the proxy again.");
        return Ok(());
    }

    let config = load_config(&config_path).await.with_context(|| {
        format!(
            "Failed to parse {config_path}; fix it or delete it and let the proxy regenerate a default"
        )
    })?;

    if let Err(e) = ProxyConfigValidator::validate(&config) {
        return Err(eyre!("Configuration {config_path} failed validation:\n{e}"));
    }

    let audit = Arc::new(
        AuditFileLogger::new(LOG_DIR).context("Failed to prepare the audit log directory")?,
    );
    let client = Arc::new(
        UpstreamClientAdapter::new(config.connect_timeout(), config.read_timeout())
            .context("Failed to build the upstream HTTP client")?,
    );

    let bind_addr = config.bind_addr();
    let target = config.target_base().to_string();
    let forwarder = Arc::new(Forwarder::new(config, client, audit.clone()));
    let app = wiretap::router(forwarder);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;
    let addr = listener
        .local_addr()
        .context("Failed to read the bound address")?;

    println!("Wiretap listening on http://{addr}, forwarding to {target}");
    println!(
        "Audit trail: {} and {}",
        audit.success_path().display(),
        audit.error_path().display()
    );

    tracing::info!(listen = %addr, target = %target, "Debug proxy started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain whatever the writer tasks still hold before the process ends.
    audit.flush().await;
    tracing::info!("Audit records flushed; shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for the shutdown signal: {e}");
        // With no working signal handler, run until killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    // First check if file exists and is readable
    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    // Try to parse the configuration
    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    // Validate the configuration
    match ProxyConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Bind Address: {}", config.bind_addr());
            println!("   • Target: {}", config.target_url);
            println!("   • Connect Timeout: {}s", config.connect_timeout_secs);
            println!("   • Read Timeout: {}s", config.read_timeout_secs);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure target_url starts with http:// or https://");
            println!("   • Timeouts must be positive numbers of seconds");
            println!("   • Verify the host and port resolve (e.g., '0.0.0.0' and 8888)");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    write_default_config(config_path)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'wiretap serve --config {config_path}' to start the proxy");
    Ok(())
}
