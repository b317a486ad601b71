use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use cron::Schedule;

use collagify_pipeline::PipelineConfig;
use collagify_pipeline::scheduler::parse_schedule;
use collagify_telegram::client::DEFAULT_SERVER;

const DEFAULT_DB_PATH: &str = "collagify.db";
const DEFAULT_TIMEZONE: &str = "Europe/Moscow";
const DEFAULT_SCHEDULE: &str = "0 0 23 * * *";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

pub struct Config {
    pub bot_token: String,
    pub api_server: String,
    pub db_path: PathBuf,
    /// Zone post timestamps are localised to before day grouping; also the
    /// zone the schedule is evaluated in.
    pub timezone: Tz,
    pub schedule: Schedule,
    pub pipeline: PipelineConfig,
    pub run_on_start: bool,
    pub poll_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = var("COLLAGIFY_BOT_TOKEN")
            .ok_or_else(|| anyhow!("COLLAGIFY_BOT_TOKEN is unset"))?;

        let api_server = var("COLLAGIFY_API_SERVER").unwrap_or_else(|| DEFAULT_SERVER.into());
        let db_path: PathBuf = var("COLLAGIFY_DB_PATH")
            .unwrap_or_else(|| DEFAULT_DB_PATH.into())
            .into();

        let tz_name = var("COLLAGIFY_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.into());
        let timezone = Tz::from_str(tz_name.trim())
            .map_err(|e| anyhow!("COLLAGIFY_TIMEZONE {:?}: {}", tz_name, e))?;

        let schedule_expr = var("COLLAGIFY_SCHEDULE").unwrap_or_else(|| DEFAULT_SCHEDULE.into());
        let schedule = parse_schedule(&schedule_expr).context("COLLAGIFY_SCHEDULE")?;

        let defaults = PipelineConfig::default();
        let partial_collage = match var("COLLAGIFY_PARTIAL_COLLAGE") {
            Some(v) => parse_bool(&v).context("COLLAGIFY_PARTIAL_COLLAGE")?,
            None => defaults.partial_collage,
        };
        let concurrency: usize = match var("COLLAGIFY_CONCURRENCY") {
            Some(v) => v.trim().parse().context("COLLAGIFY_CONCURRENCY")?,
            None => defaults.concurrency,
        };
        if concurrency == 0 {
            bail!("COLLAGIFY_CONCURRENCY must be at least 1");
        }

        let run_on_start = match var("COLLAGIFY_RUN_ON_START") {
            Some(v) => parse_bool(&v).context("COLLAGIFY_RUN_ON_START")?,
            None => false,
        };

        Ok(Self {
            bot_token,
            api_server,
            db_path,
            timezone,
            schedule,
            pipeline: PipelineConfig {
                partial_collage,
                concurrency,
                ..defaults
            },
            run_on_start,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {:?}", other),
    }
}
