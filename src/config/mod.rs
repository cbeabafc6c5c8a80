//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::stream::{DeliveryMode, FrameFormat};

/// Largest frame edge the JPEG encoder accepts
pub const MAX_FRAME_DIMENSION: u32 = 65_535;
/// Render buffer budget (8K UHD)
pub const MAX_FRAME_PIXELS: u64 = 7680 * 4320;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// A state snapshot is pushed every this many ticks
    pub snapshot_every_ticks: u32,
    /// Sleep after a failed tick before trying the next one
    pub tick_error_backoff: Duration,

    /// Render target width in pixels
    pub frame_width: u32,
    /// Render target height in pixels
    pub frame_height: u32,
    /// Compressed image format for frames
    pub frame_format: FrameFormat,
    /// Compression quality (1-100, JPEG only)
    pub frame_quality: u8,

    /// Push every frame, or answer `frame_request` only
    pub delivery_mode: DeliveryMode,
    /// Request a clock stop once the last session disconnects
    pub stop_when_empty: bool,
    /// Outbound messages buffered per session before the oldest is dropped
    pub session_queue_capacity: usize,
    /// Max inbound messages per second per session
    pub input_rate_limit: u32,

    /// Seed for the bundled arena simulation
    pub sim_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 5001)),
            log_level: "info".to_string(),
            tick_rate: 30,
            snapshot_every_ticks: 60,
            tick_error_backoff: Duration::from_millis(100),
            frame_width: 1280,
            frame_height: 720,
            frame_format: FrameFormat::Jpeg,
            frame_quality: 85,
            delivery_mode: DeliveryMode::Push,
            stop_when_empty: false,
            session_queue_capacity: 8,
            input_rate_limit: 60,
            sim_seed: 0x5EED,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // PORT wins over SERVER_ADDR, as on most PaaS hosts
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| defaults.server_addr.to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),

            tick_rate: parse_var("TICK_RATE", defaults.tick_rate)?,
            snapshot_every_ticks: parse_var("SNAPSHOT_EVERY_TICKS", defaults.snapshot_every_ticks)?,
            tick_error_backoff: Duration::from_millis(parse_var(
                "TICK_ERROR_BACKOFF_MS",
                defaults.tick_error_backoff.as_millis() as u64,
            )?),

            frame_width: parse_var("FRAME_WIDTH", defaults.frame_width)?,
            frame_height: parse_var("FRAME_HEIGHT", defaults.frame_height)?,
            frame_format: parse_var("FRAME_FORMAT", defaults.frame_format)?,
            frame_quality: parse_var("FRAME_QUALITY", defaults.frame_quality)?,

            delivery_mode: parse_var("DELIVERY_MODE", defaults.delivery_mode)?,
            stop_when_empty: parse_var("STOP_WHEN_EMPTY", defaults.stop_when_empty)?,
            session_queue_capacity: parse_var(
                "SESSION_QUEUE_CAPACITY",
                defaults.session_queue_capacity,
            )?,
            input_rate_limit: parse_var("INPUT_RATE_LIMIT", defaults.input_rate_limit)?,

            sim_seed: parse_var("SIM_SEED", defaults.sim_seed)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the clock and encoder cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > 240 {
            return Err(ConfigError::OutOfRange("TICK_RATE"));
        }
        if self.snapshot_every_ticks == 0 {
            return Err(ConfigError::OutOfRange("SNAPSHOT_EVERY_TICKS"));
        }
        if self.frame_width == 0
            || self.frame_height == 0
            || self.frame_width > MAX_FRAME_DIMENSION
            || self.frame_height > MAX_FRAME_DIMENSION
            || u64::from(self.frame_width) * u64::from(self.frame_height) > MAX_FRAME_PIXELS
        {
            return Err(ConfigError::OutOfRange("FRAME_WIDTH/FRAME_HEIGHT"));
        }
        if !(1..=100).contains(&self.frame_quality) {
            return Err(ConfigError::OutOfRange("FRAME_QUALITY"));
        }
        if self.session_queue_capacity == 0 {
            return Err(ConfigError::OutOfRange("SESSION_QUEUE_CAPACITY"));
        }
        Ok(())
    }

    /// Nominal duration of one tick
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Value out of range: {0}")]
    OutOfRange(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_period(), Duration::from_micros(33_333));
    }

    #[test]
    fn rejects_zero_quality() {
        let config = Config {
            frame_quality: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange("FRAME_QUALITY"))
        ));
    }

    #[test]
    fn rejects_oversized_frames() {
        let too_wide = Config {
            frame_width: MAX_FRAME_DIMENSION + 1,
            frame_height: 1,
            ..Config::default()
        };
        assert!(matches!(
            too_wide.validate(),
            Err(ConfigError::OutOfRange("FRAME_WIDTH/FRAME_HEIGHT"))
        ));

        let too_many_pixels = Config {
            frame_width: 60_000,
            frame_height: 60_000,
            ..Config::default()
        };
        assert!(too_many_pixels.validate().is_err());

        let uhd = Config {
            frame_width: 7680,
            frame_height: 4320,
            ..Config::default()
        };
        assert!(uhd.validate().is_ok());
    }

    #[test]
    fn rejects_zero_snapshot_interval() {
        let config = Config {
            snapshot_every_ticks: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
