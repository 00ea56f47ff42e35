//! Long-running refresh daemon

use std::sync::Arc;

use colored::Colorize;
use log::{debug, info};

use crate::cache::CacheTtl;
use crate::cli::{CommandContext, OutputFormat};
use crate::config::SettingsProvider;
use crate::error::Result;
use crate::orchestrator::events::{self, Triggers};
use crate::orchestrator::{DebugReporter, Scheduler};

/// Keep the background photo fresh until Ctrl-C.
///
/// The first photo is retried every thirty seconds until one is on the surface;
/// from then on the scheduler decides once a minute.
pub async fn run(ctx: &CommandContext, debug_report: bool) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    if ctx.format == OutputFormat::Pretty {
        println!(
            "{} Keeping the background fresh (state file in {})",
            "●".green(),
            ctx.cache_dir.display().to_string().cyan()
        );
        println!("  Press Ctrl-C to stop.");
    }

    let bootstrap = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let outcome = orchestrator.bootstrap(CacheTtl::BOOTSTRAP_RETRY).await;
            info!("Initial photo ready ({})", outcome.as_str());
        })
    };

    let mut scheduler = Scheduler::new(CacheTtl::SCHEDULER_TICK);
    scheduler.start(Arc::clone(&orchestrator));

    let (triggers, listener) = events::channel();
    let settings: Arc<dyn SettingsProvider> = ctx.settings.clone();
    let subscription = listener.subscribe(Arc::clone(&orchestrator), settings);

    let mut reporter = debug_report.then(|| {
        let mut reporter = DebugReporter::new(
            Arc::clone(&orchestrator),
            ctx.debug_info(),
            orchestrator.presenter().surface(),
        );
        reporter.start();
        reporter
    });

    wait_for_shutdown(&triggers).await?;
    info!("Shutting down");

    if let Some(reporter) = reporter.as_mut() {
        reporter.stop();
    }
    subscription.close();
    scheduler.stop();
    bootstrap.abort();
    orchestrator.finish_background_work().await;
    orchestrator.presenter().shutdown();

    Ok(())
}

/// Forward signals to the trigger channels until Ctrl-C
#[cfg(unix)]
async fn wait_for_shutdown(triggers: &Triggers) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut user1 = signal(SignalKind::user_defined1())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => return result.map_err(Into::into),
            Some(()) = hangup.recv() => {
                if !triggers.settings_changed() {
                    debug!("Settings change already pending");
                }
            }
            Some(()) = user1.recv() => {
                if !triggers.force_refresh() {
                    debug!("Force refresh already pending");
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_triggers: &Triggers) -> Result<()> {
    tokio::signal::ctrl_c().await.map_err(Into::into)
}
