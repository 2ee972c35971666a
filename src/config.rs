use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use jiff::civil::Time;

use crate::{legacy::LegacyDirs, retry::RetryPolicy};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PersistenceMode {
    Database,
    Files,
}

#[derive(Clone, Debug)]
pub struct JobTimes {
    pub films: Time,
    pub celebrities: Time,
    pub trending: Time,
    pub countries: Time,
    pub legacy_import: Time,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub tmdb_access_token: String,
    pub tmdb_base_url: String,
    pub tmdb_image_base_url: String,
    pub tmdb_rps: u32,
    pub retry: RetryPolicy,
    pub job_times: JobTimes,
    pub persistence: PersistenceMode,
    pub legacy_dirs: LegacyDirs,
    pub legacy_batch_size: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://cinesync.db?mode=rwc".to_string());

        let tmdb_access_token =
            std::env::var("TMDB_ACCESS_TOKEN").context("TMDB_ACCESS_TOKEN must be set")?;
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_image_base_url = std::env::var("TMDB_IMAGE_BASE_URL")
            .unwrap_or_else(|_| "https://image.tmdb.org/t/p/original".to_string());
        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let retry_attempts: u32 =
            std::env::var("RETRY_ATTEMPTS").ok().and_then(|s| s.parse().ok()).unwrap_or(3);
        let retry_base_delay_ms: u64 =
            std::env::var("RETRY_BASE_DELAY_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(1000);

        let job_times = JobTimes {
            films: time_var("FILM_SYNC_AT", "01:00")?,
            celebrities: time_var("CELEBRITY_SYNC_AT", "02:00")?,
            trending: time_var("TRENDING_SYNC_AT", "03:00")?,
            countries: time_var("COUNTRY_SYNC_AT", "04:00")?,
            legacy_import: time_var("LEGACY_IMPORT_AT", "05:00")?,
        };

        let persistence = match std::env::var("PERSISTENCE_MODE").as_deref() {
            Ok("files") => PersistenceMode::Files,
            Ok("database") | Err(_) => PersistenceMode::Database,
            Ok(other) => {
                anyhow::bail!("PERSISTENCE_MODE must be `database` or `files`, got `{other}`")
            },
        };

        let dir = |key: &str, default: &str| {
            PathBuf::from(std::env::var(key).unwrap_or_else(|_| default.to_string()))
        };
        let legacy_dirs = LegacyDirs {
            films: dir("LEGACY_FILM_DIR", "data/films"),
            celebrities: dir("LEGACY_CELEBRITY_DIR", "data/celebrities"),
            credits: dir("LEGACY_CREDIT_DIR", "data/credits"),
        };
        let legacy_batch_size: usize =
            std::env::var("LEGACY_BATCH_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(100);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            tmdb_access_token,
            tmdb_base_url,
            tmdb_image_base_url,
            tmdb_rps,
            retry: RetryPolicy::new(retry_attempts, Duration::from_millis(retry_base_delay_ms)),
            job_times,
            persistence,
            legacy_dirs,
            legacy_batch_size,
        })
    }
}

fn time_var(key: &str, default: &str) -> anyhow::Result<Time> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    parse_time_of_day(&raw).with_context(|| format!("{key}: expected HH:MM, got `{raw}`"))
}

pub fn parse_time_of_day(raw: &str) -> anyhow::Result<Time> {
    let (hour, minute) = raw.trim().split_once(':').context("missing `:`")?;
    let hour: i8 = hour.parse().context("hour")?;
    let minute: i8 = minute.parse().context("minute")?;
    Ok(Time::new(hour, minute, 0, 0)?)
}
