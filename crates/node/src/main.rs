mod application;
mod config;
mod metrics;
mod pattern;
mod registry;

use clap::Parser;

use application::Application;
use config::NodeCfg;
use registry::StaticRegistry;
use skein_net::PatternSpec;

#[derive(Parser, Debug)]
#[command(name = "skein-node", about = "skein ledger node")]
struct Cli {
    /// This node's id in the registry.
    #[arg(long)]
    node_id: Option<u32>,
    /// Address to accept peer connections on.
    #[arg(long)]
    listen: Option<String>,
    /// Address for /healthz and /metrics.
    #[arg(long)]
    metrics_listen: Option<String>,
    /// Path to the node registry file.
    #[arg(long)]
    registry: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
    #[arg(long)]
    config_file: Option<String>,
    /// Start generating transactions right away with a uniform pattern,
    /// waiting at least this long between sends.
    #[arg(long)]
    pattern_min_ms: Option<u64>,
    /// Upper bound for the uniform pattern's wait.
    #[arg(long)]
    pattern_max_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Defaults < config file < environment < CLI.
    let config_path = args
        .config_file
        .clone()
        .or_else(|| std::env::var("SKEIN_CONFIG_FILE").ok());
    let mut cfg = match &config_path {
        Some(path) => NodeCfg::from_file(path)?,
        None => NodeCfg::default(),
    };
    cfg.apply_env();
    if let Some(node_id) = args.node_id {
        cfg.node_id = node_id;
    }
    if let Some(listen) = args.listen {
        cfg.listen = listen;
    }
    if let Some(metrics_listen) = args.metrics_listen {
        cfg.metrics_listen = metrics_listen;
    }
    if let Some(registry) = args.registry {
        cfg.registry = registry;
    }
    if let Some(log_level) = args.log_level {
        cfg.log_level = log_level;
    }

    std::env::set_var("RUST_LOG", &cfg.log_level);
    env_logger::init();

    let registry = StaticRegistry::load(&cfg.registry)?;
    let initial_pattern = match (args.pattern_min_ms, args.pattern_max_ms) {
        (Some(min_wait_ms), Some(max_wait_ms)) => Some(PatternSpec::Uniform {
            min_wait_ms,
            max_wait_ms,
        }),
        _ => None,
    };

    Application::run(cfg, registry, initial_pattern).await
}
