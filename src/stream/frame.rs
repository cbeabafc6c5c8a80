//! Frame and state snapshot payloads produced by the clock

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Compressed raster format of a frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    Jpeg,
    Png,
}

impl FrameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "jpeg",
            FrameFormat::Png => "png",
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(FrameFormat::Jpeg),
            "png" => Ok(FrameFormat::Png),
            other => Err(format!("unsupported frame format: {other}")),
        }
    }
}

/// One encoded render of a tick. Immutable once produced.
#[derive(Debug, Clone)]
pub struct Frame {
    pub tick: u64,
    /// Unix millis at encode time
    pub timestamp_ms: u64,
    pub format: FrameFormat,
    pub width: u32,
    pub height: u32,
    pub payload: Bytes,
}

impl Frame {
    /// Payload as the base64 string carried by the `frame` event
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.payload)
    }
}

/// Low-frequency summary of simulation-observable values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub tick: u64,
    pub health: f32,
    pub score: u32,
    pub position: Option<(f32, f32)>,
}
