//! Configuration management for cbe-ocr

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::dispatch::MAX_UNITS;
use crate::ocr::OcrEngine;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dispatch: DispatchConfig,
    pub platform: PlatformConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Runtime unit limit; never exceeds [`MAX_UNITS`]
    pub max_units: usize,
    /// Bound on a unit's wait for its identity
    pub handshake_timeout: Duration,
    /// Bound on one context run
    pub run_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Usable units reported by the simulated platform
    pub units: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub engine: OcrEngine,
    /// Engine executable override
    pub program: Option<PathBuf>,
    pub language: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

impl DispatchConfig {
    /// Effective cap on contexts per dispatch
    pub fn unit_cap(&self) -> usize {
        self.max_units.min(MAX_UNITS)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_units: MAX_UNITS,
            handshake_timeout: Duration::from_secs(10),
            run_timeout: Duration::from_secs(300),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            units: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngine::Gocr,
            program: None,
            language: "eng".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dispatch: DispatchConfig::default(),
            platform: PlatformConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source, defaults for unset names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            dispatch: DispatchConfig {
                max_units: parse_var(&lookup, "DISPATCH_MAX_UNITS")?
                    .unwrap_or(defaults.dispatch.max_units),
                handshake_timeout: parse_var(&lookup, "DISPATCH_HANDSHAKE_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.dispatch.handshake_timeout),
                run_timeout: parse_var(&lookup, "DISPATCH_RUN_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.dispatch.run_timeout),
            },
            platform: PlatformConfig {
                units: parse_var(&lookup, "SIM_UNITS")?.unwrap_or(defaults.platform.units),
            },
            ocr: OcrConfig {
                engine: parse_var(&lookup, "OCR_ENGINE")?.unwrap_or(defaults.ocr.engine),
                program: lookup("OCR_PROGRAM").map(PathBuf::from),
                language: lookup("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
