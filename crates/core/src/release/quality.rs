//! Ranked video quality enumerations: rip type and resolution.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Source the video was ripped from.
///
/// Ordering follows [`RipType::priority`]: a higher priority is a better rip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RipType {
    /// Camera recording in a theater.
    Cam,
    /// Telesync (camera with direct audio feed).
    Telesync,
    /// DVD rip.
    Dvd,
    /// Broadcast capture.
    Hdtv,
    /// Streaming service download or rip.
    Web,
    /// Blu-ray encode or remux.
    Br,
}

/// (variant, key, priority, low quality)
const RIP_TYPES: [(RipType, &str, u8, bool); 6] = [
    (RipType::Cam, "CAM", 1, true),
    (RipType::Telesync, "TELESYNC", 2, true),
    (RipType::Dvd, "DVD", 3, false),
    (RipType::Hdtv, "HDTV", 4, false),
    (RipType::Web, "WEB", 5, false),
    (RipType::Br, "BR", 6, false),
];

impl RipType {
    /// All rip types, worst first.
    pub const ALL: [RipType; 6] = [
        RipType::Cam,
        RipType::Telesync,
        RipType::Dvd,
        RipType::Hdtv,
        RipType::Web,
        RipType::Br,
    ];

    fn entry(self) -> &'static (RipType, &'static str, u8, bool) {
        // Table is indexed in declaration order.
        &RIP_TYPES[self as usize]
    }

    /// Stable string key used in storage and APIs.
    pub fn key(self) -> &'static str {
        self.entry().1
    }

    /// Numeric priority (higher is better).
    pub fn priority(self) -> u8 {
        self.entry().2
    }

    /// Cam and telesync rips. These never rank above a proper rip and cap the
    /// resolutions a release is transcoded to.
    pub fn is_low_quality(self) -> bool {
        self.entry().3
    }

    /// Look up a rip type by its key (case-insensitive).
    pub fn from_key(key: &str) -> Option<Self> {
        RIP_TYPES
            .iter()
            .find(|(_, k, _, _)| k.eq_ignore_ascii_case(key.trim()))
            .map(|(rip, _, _, _)| *rip)
    }

    /// Resolve a rip type from a free-text quality name such as
    /// `Bluray-1080p`, `WEBRip-720p` or `TELESYNC`.
    pub fn from_quality_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("bluray")
            || lower.contains("blu-ray")
            || lower.contains("remux")
            || lower.contains("bdrip")
        {
            Some(RipType::Br)
        } else if lower.contains("web") {
            Some(RipType::Web)
        } else if lower.contains("telesync") {
            Some(RipType::Telesync)
        } else if lower.contains("cam") {
            Some(RipType::Cam)
        } else if lower.contains("hdtv") {
            Some(RipType::Hdtv)
        } else if lower.contains("dvd") {
            Some(RipType::Dvd)
        } else {
            None
        }
    }
}

impl PartialOrd for RipType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RipType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl fmt::Display for RipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Vertical video resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// Anything below 720 lines.
    Sd,
    /// 720p.
    Hd,
    /// 1080p.
    Fhd,
    /// 2160p.
    Uhd,
}

/// (variant, key, priority, nominal lines)
const RESOLUTIONS: [(Resolution, &str, u8, u32); 4] = [
    (Resolution::Sd, "SD", 1, 480),
    (Resolution::Hd, "HD", 2, 720),
    (Resolution::Fhd, "FHD", 3, 1080),
    (Resolution::Uhd, "UHD", 4, 2160),
];

impl Resolution {
    /// All resolutions, lowest first.
    pub const ALL: [Resolution; 4] = [
        Resolution::Sd,
        Resolution::Hd,
        Resolution::Fhd,
        Resolution::Uhd,
    ];

    fn entry(self) -> &'static (Resolution, &'static str, u8, u32) {
        &RESOLUTIONS[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.entry().1
    }

    pub fn priority(self) -> u8 {
        self.entry().2
    }

    /// Nominal line count (480, 720, 1080, 2160).
    pub fn lines(self) -> u32 {
        self.entry().3
    }

    pub fn from_key(key: &str) -> Option<Self> {
        RESOLUTIONS
            .iter()
            .find(|(_, k, _, _)| k.eq_ignore_ascii_case(key.trim()))
            .map(|(res, _, _, _)| *res)
    }

    /// Map a declared pixel height to a resolution tier.
    ///
    /// Returns `None` for a zero or missing height.
    pub fn from_pixels(height: u32) -> Option<Self> {
        match height {
            0 => None,
            h if h >= 2160 => Some(Resolution::Uhd),
            h if h >= 1080 => Some(Resolution::Fhd),
            h if h >= 720 => Some(Resolution::Hd),
            _ => Some(Resolution::Sd),
        }
    }
}

impl PartialOrd for Resolution {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Resolution {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
