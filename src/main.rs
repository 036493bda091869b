use anyhow::{Context, Result};
use clap::Parser;
use gp_predictor::config::{Config, Endpoint};
use gp_predictor::controller::Controller;
use gp_predictor::engine::features::{FeatureDeriver, RawInputs};
use gp_predictor::predictor::{PredictionBackend, PredictionClient};
use gp_predictor::tui::{self, form::FormState, state::AppState, TuiCommand, View};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "gp-predictor.log";

#[derive(Parser, Debug)]
#[command(name = "gp-predictor")]
#[command(version, about = "F1 Grand Prix winner prediction dashboard")]
struct Args {
    /// Config file location
    #[arg(long = "config", default_value = "config.toml")]
    config_path: PathBuf,
    /// Run the health check once, print the result and exit
    #[arg(long = "health")]
    health_only: bool,
    /// Start with the visualization panel off
    #[arg(long)]
    no_charts: bool,
}

/// Decorative only: any failure just means no banner.
fn load_banner(path: Option<&str>) -> Option<String> {
    let path = path?;
    match std::fs::read_to_string(Path::new(path)) {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path, error = %e, "banner not loaded, using plain header");
            None
        }
    }
}

async fn run_health_once(client: &PredictionClient, endpoint: &Endpoint) -> Result<()> {
    println!("  Testing {}", endpoint.health_url());
    match client.health().await {
        Ok(report) => {
            println!("  API is online ({})", report.status);
            println!("{}", report.body);
            Ok(())
        }
        Err(e) => {
            println!("  {}", e.user_message());
            if let Some(body) = e.diagnostic() {
                println!("{}", body);
            }
            anyhow::bail!("health check failed: {}", e)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = std::fs::File::create(LOG_FILE)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gp_predictor=info")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    // Saved secrets from .env (real env vars take precedence)
    Config::load_env_file();
    let config = Config::load_or_default(&args.config_path)?;
    let endpoint = config.endpoint();

    let client = PredictionClient::new(endpoint.clone(), &config.api)
        .context("failed to set up prediction client")?;

    if args.health_only {
        return run_health_once(&client, &endpoint).await;
    }

    let time_diff = config.features.time_diff_mode();
    let mut app_state = AppState::new(&endpoint);
    app_state.banner = load_banner(config.display.banner_path.as_deref());
    app_state.push_log(
        "INFO",
        format!("backend {} ({})", endpoint.url, endpoint.source.describe()),
    );

    let (state_tx, state_rx) = watch::channel(app_state);
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<TuiCommand>(16);

    let backend: Arc<dyn PredictionBackend> = Arc::new(client);
    let controller = Controller::new(backend, FeatureDeriver::new(time_diff), state_tx);

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                TuiCommand::Predict(raw) => {
                    let _ = controller.submit(raw);
                }
                TuiCommand::HealthCheck => {
                    let _ = controller.check_health();
                }
                TuiCommand::Quit => return,
            }
        }
    });

    let view = View {
        form: FormState::new(RawInputs::default(), time_diff),
        charts: config.display.charts && !args.no_charts,
        payload: false,
    };
    tui::run_tui(state_rx, cmd_tx, view).await?;

    tracing::debug!("shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["gp-predictor"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("config.toml"));
        assert!(!args.health_only);
        assert!(!args.no_charts);
    }

    #[test]
    fn test_args_flags_and_config_path() {
        let args = Args::try_parse_from([
            "gp-predictor",
            "--health",
            "--no-charts",
            "--config",
            "/etc/gp/config.toml",
        ])
        .unwrap();
        assert!(args.health_only);
        assert!(args.no_charts);
        assert_eq!(args.config_path, PathBuf::from("/etc/gp/config.toml"));
    }

    #[test]
    fn test_args_reject_unknown_and_missing_value() {
        assert!(Args::try_parse_from(["gp-predictor", "--bogus"]).is_err());
        assert!(Args::try_parse_from(["gp-predictor", "--config"]).is_err());
    }
}
