//! Fintrack main entry point

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;

use fintrack_api::{start_server, AppState};
use fintrack_config::Config;
use fintrack_store::{DbPool, StoreError};

#[derive(Parser, Debug)]
#[command(name = "fintrack")]
#[command(version = "0.1.0")]
#[command(about = "A personal finance tracking backend", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = if args.config.exists() {
        Config::load(args.config.clone())?
    } else {
        Config::default()
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    if !args.config.exists() {
        log::warn!(
            "config file {} not found, using defaults",
            args.config.display()
        );
    }
    log::info!(
        "config loaded: database={}, listen={}:{}",
        config.database.path.display(),
        config.server.host,
        config.server.port
    );

    let rt = Runtime::new()?;
    rt.block_on(async {
        let pool = fintrack_store::open_pool(&config.database.path)?;
        let state = AppState::new(pool.clone(), config.clone());

        if config.scheduler.sweep_enable {
            spawn_recurring_sweeper(pool, config.scheduler.sweep_interval_minutes);
        } else {
            log::warn!("recurring sweep disabled by configuration");
        }

        start_server(state).await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}

/// Periodic recurring-transaction sweep.
///
/// The first tick fires immediately, so a restarted server catches up
/// missed occurrences right away instead of waiting a full interval.
fn spawn_recurring_sweeper(pool: DbPool, interval_minutes: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
        loop {
            ticker.tick().await;

            let pool = pool.clone();
            let result = tokio::task::spawn_blocking(move || {
                let conn = pool.get().map_err(StoreError::from)?;
                let as_of = chrono::Utc::now().date_naive();
                Ok::<_, StoreError>(fintrack_core::recurring::run_sweep(&conn, as_of))
            })
            .await;

            match result {
                Ok(Ok(outcome)) => {
                    if outcome.processed > 0 || outcome.failed > 0 {
                        log::info!(
                            "recurring sweep: {} rule(s) processed, {} entr(y/ies) created, {} failed",
                            outcome.processed,
                            outcome.created,
                            outcome.failed
                        );
                    }
                }
                Ok(Err(e)) => log::error!("recurring sweep skipped: {e}"),
                Err(e) => log::error!("recurring sweep task failed: {e}"),
            }
        }
    });
}
