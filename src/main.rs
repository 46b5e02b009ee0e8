mod api;
mod config;
mod controls;
mod player;
mod sync;
mod utils;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{ControlAction, HttpApi, PlayerApi};
use config::Config;
use player::Estimator;
use sync::{Command, Scheduler, StatusSink};
use utils::StatusPrinter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the status lines, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nowsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::parse();
    let api = HttpApi::new(&config.url, config.request_timeout())
        .with_context(|| format!("invalid player URL {:?}", config.url))?
        .with_previous_action(&config.previous_action)?;
    let mut printer = StatusPrinter::stdout(config.render_options());
    let mut estimator = Estimator::new(config.track_change);

    if let Some(action) = &config.control {
        let action: ControlAction = action.parse()?;
        let snapshot = sync::control_and_resync(&api, &action)
            .await
            .with_context(|| format!("control action {action} failed"))?;
        estimator.apply_snapshot(snapshot);
        printer.render(estimator.now_playing());
        return Ok(());
    }

    if config.once {
        let snapshot = api
            .fetch_current_state()
            .await
            .context("failed to fetch current song")?;
        estimator.apply_snapshot(snapshot);
        printer.render(estimator.now_playing());
        return Ok(());
    }

    info!(url = %config.url, "following player");

    let (command_tx, command_rx) = mpsc::channel::<Command>(16);

    if config.stdin_controls {
        let stdin_tx = command_tx.clone();
        tokio::spawn(async move {
            controls::forward_lines(BufReader::new(tokio::io::stdin()), stdin_tx).await;
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
        }
        let _ = command_tx.send(Command::Quit).await;
    });

    Scheduler::new(api, estimator, printer, config.timing)
        .run(command_rx)
        .await;
    Ok(())
}
