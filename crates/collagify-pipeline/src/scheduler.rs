use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::pipeline::Pipeline;

/// Parse a cron expression. Five-field expressions get a leading `0`
/// seconds field.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        bail!("cron expression is empty");
    }

    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| anyhow!("invalid cron expression {:?}: {}", expr, e))
}

/// Next fire time strictly after `now`, evaluated in `tz`.
pub fn next_fire(schedule: &Schedule, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&now.with_timezone(&tz))
        .next()
        .map(|next| next.with_timezone(&Utc))
}

/// Fire the pipeline on every tick of `schedule` until `shutdown` flips.
///
/// Each run is awaited before the next tick is computed, so runs never overlap.
pub async fn run_schedule_loop(
    pipeline: Arc<Pipeline>,
    schedule: Schedule,
    tz: Tz,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let Some(next) = next_fire(&schedule, tz, now) else {
            warn!("Schedule has no upcoming fire time, scheduler stopping");
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!("Next collage run at {} ({}s)", next.with_timezone(&tz), wait.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(wait) => run_once(&pipeline).await,
            _ = shutdown.changed() => {
                info!("Scheduler shutting down");
                return;
            }
        }
    }
}

/// One run with its outcome logged; the scheduler callback.
pub async fn run_once(pipeline: &Pipeline) {
    match pipeline.run().await {
        Ok(summary) => info!(
            "Collage run ok: {} collages, {} messages cleared",
            summary.collages, summary.messages_cleared
        ),
        Err(e) => {
            error!("Collage run failed: {}", e);
            for failure in e.failures() {
                warn!("  {}", failure);
            }
        }
    }
}
