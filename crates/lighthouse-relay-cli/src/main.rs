use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use lighthouse_relay::config::ConfigOverrides;
use lighthouse_relay::RelayConfig;
use lighthouse_relay_cli::{doctor, logging, run_cmd};

#[derive(Parser)]
#[command(
    name = "lighthouse-relay",
    about = "Lighthouse Relay — audit a page, keep the report, forward a summary to a webhook",
    version,
    after_help = "Run 'lighthouse-relay <command> --help' for details on each command."
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Webhook receiving the payload [env: LIGHTHOUSE_RELAY_WEBHOOK_URL]
    #[arg(long, global = true)]
    webhook_url: Option<String>,

    /// Directory holding per-run report folders [env: LIGHTHOUSE_RELAY_REPORTS_DIR]
    #[arg(long, global = true)]
    reports_dir: Option<PathBuf>,

    /// Score (0-100) at or above which a category passes [env: LIGHTHOUSE_RELAY_THRESHOLD]
    #[arg(long, global = true)]
    threshold: Option<u32>,

    /// Chromium binary [env: LIGHTHOUSE_RELAY_CHROME_PATH]
    #[arg(long, global = true)]
    chrome_path: Option<PathBuf>,

    /// Lighthouse CLI binary [env: LIGHTHOUSE_RELAY_LIGHTHOUSE_BIN]
    #[arg(long, global = true)]
    lighthouse_bin: Option<PathBuf>,

    /// Webhook request timeout [env: LIGHTHOUSE_RELAY_DELIVERY_TIMEOUT_SECS]
    #[arg(long, global = true)]
    delivery_timeout_secs: Option<u64>,
}

impl From<ConfigArgs> for ConfigOverrides {
    fn from(args: ConfigArgs) -> Self {
        Self {
            webhook_url: args.webhook_url,
            reports_root: args.reports_dir,
            optimal_threshold: args.threshold,
            chrome_path: args.chrome_path,
            lighthouse_bin: args.lighthouse_bin,
            delivery_timeout_secs: args.delivery_timeout_secs,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one URL, save the report and post the summary
    Run {
        /// Page to audit (defaults to http://google.com)
        url: Option<String>,
    },
    /// Start the HTTP trigger server
    #[cfg(feature = "server")]
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: std::net::IpAddr,
        /// Port to listen on
        #[arg(long, default_value = "5000")]
        port: u16,
        /// Serve extra static files from this directory
        #[arg(long)]
        public_dir: Option<PathBuf>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    let overrides = ConfigOverrides::from(cli.config);
    let json = cli.json;

    let result = match cli.command {
        Commands::Run { url } => match RelayConfig::resolve(overrides) {
            Ok(config) => run_cmd::run(&config, url, json).await,
            Err(e) => Err(e.into()),
        },
        #[cfg(feature = "server")]
        Commands::Serve {
            host,
            port,
            public_dir,
        } => serve(overrides, host, port, public_dir).await,
        Commands::Doctor => match doctor::run(&overrides, json) {
            Ok(true) => Ok(()),
            Ok(false) => std::process::exit(1),
            Err(e) => Err(e),
        },
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lighthouse-relay", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": true, "message": format!("{e:#}") })
            );
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

#[cfg(feature = "server")]
async fn serve(
    overrides: ConfigOverrides,
    host: std::net::IpAddr,
    port: u16,
    public_dir: Option<PathBuf>,
) -> Result<()> {
    use anyhow::Context;
    use lighthouse_relay_cli::server::{self, TriggerState};
    use std::sync::Arc;

    let config = RelayConfig::resolve(overrides)?;
    let exe = std::env::current_exe().context("cannot locate the lighthouse-relay executable")?;
    let state = Arc::new(TriggerState {
        exe,
        env: config.to_env(),
    });
    server::start(std::net::SocketAddr::new(host, port), state, public_dir).await
}
