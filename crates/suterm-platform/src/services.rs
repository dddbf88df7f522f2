//! Platform service traits and desktop/Android implementation.

use std::path::Path;
use std::process::Command;

use suterm_types::error::{Result, SutermError};

// ---------------------------------------------------------------------------
// Time service
// ---------------------------------------------------------------------------

/// A simple wall-clock timestamp (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second,
        )
    }
}

impl Timestamp {
    /// Build a timestamp from seconds since the Unix epoch.
    pub fn from_unix_secs(secs: u64) -> Self {
        let days = secs / 86400;
        let time_of_day = secs % 86400;
        let (year, month, day) = days_to_ymd(days);
        Self {
            year,
            month,
            day,
            hour: (time_of_day / 3600) as u8,
            minute: ((time_of_day % 3600) / 60) as u8,
            second: (time_of_day % 60) as u8,
        }
    }

    /// `YYYYMMDD_HHMMSS`, safe for file names.
    pub fn compact(&self) -> String {
        format!(
            "{:04}{:02}{:02}_{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second,
        )
    }

    /// Parse the `YYYY-MM-DD HH:MM:SS` form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let (date, time) = s.trim().split_once(' ')?;
        let mut d = date.splitn(3, '-');
        let mut t = time.splitn(3, ':');
        let ts = Self {
            year: d.next()?.parse().ok()?,
            month: d.next()?.parse().ok()?,
            day: d.next()?.parse().ok()?,
            hour: t.next()?.parse().ok()?,
            minute: t.next()?.parse().ok()?,
            second: t.next()?.parse().ok()?,
        };
        let valid = (1..=12).contains(&ts.month)
            && (1..=31).contains(&ts.day)
            && ts.hour < 24
            && ts.minute < 60
            && ts.second < 60;
        valid.then_some(ts)
    }
}

/// Abstraction over platform time services.
pub trait TimeService {
    /// Current wall-clock time.
    fn now(&self) -> Result<Timestamp>;
}

// ---------------------------------------------------------------------------
// System info service
// ---------------------------------------------------------------------------

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MemoryInfo {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    /// Used share of total, 0-100.
    pub fn used_percent(&self) -> u64 {
        if self.total_bytes == 0 {
            0
        } else {
            self.used_bytes() * 100 / self.total_bytes
        }
    }
}

/// Static device identifiers.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub os_release: String,
    pub model: String,
    pub brand: String,
    pub arch: String,
}

/// Abstraction over device and OS introspection.
pub trait SystemInfoService {
    /// Live memory figures.
    fn memory(&self) -> Result<MemoryInfo>;

    /// Device identifiers. Unknown fields read `"unknown"`.
    fn device(&self) -> DeviceInfo;

    /// Number of CPUs available to this process.
    fn processors(&self) -> usize;

    /// Build tags (`ro.build.tags` on Android), if the platform has them.
    fn build_tags(&self) -> Option<String> {
        None
    }
}

// ---------------------------------------------------------------------------
// Root capability
// ---------------------------------------------------------------------------

/// Whether the device grants superuser access.
///
/// Implementations may be expensive (spawning `su`); callers are expected
/// to hold one memoized instance per session.
pub trait RootService {
    fn is_rooted(&self) -> bool;

    /// Forget any cached answer so the next query re-probes.
    fn invalidate(&self) {}
}

// ---------------------------------------------------------------------------
// Desktop / Android implementation
// ---------------------------------------------------------------------------

/// Default platform implementation using `std`, `/proc`, and `getprop`.
pub struct DesktopPlatform {
    getprop: Option<&'static str>,
}

const GETPROP_PATHS: &[&str] = &["/system/bin/getprop", "/usr/bin/getprop"];

impl DesktopPlatform {
    pub fn new() -> Self {
        Self {
            getprop: GETPROP_PATHS.iter().copied().find(|p| Path::new(p).exists()),
        }
    }

    fn prop(&self, key: &str) -> Option<String> {
        let getprop = self.getprop?;
        let out = Command::new(getprop).arg(key).output().ok()?;
        let value = String::from_utf8_lossy(&out.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    }
}

impl Default for DesktopPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeService for DesktopPlatform {
    fn now(&self) -> Result<Timestamp> {
        use std::time::SystemTime as StdTime;
        let dur = StdTime::now()
            .duration_since(StdTime::UNIX_EPOCH)
            .map_err(|e| SutermError::Platform(format!("clock before epoch: {e}")))?;
        Ok(Timestamp::from_unix_secs(dur.as_secs()))
    }
}

impl SystemInfoService for DesktopPlatform {
    fn memory(&self) -> Result<MemoryInfo> {
        let text = std::fs::read_to_string("/proc/meminfo")
            .map_err(|e| SutermError::Platform(format!("/proc/meminfo: {e}")))?;
        parse_meminfo(&text)
            .ok_or_else(|| SutermError::Platform("/proc/meminfo: missing MemTotal".into()))
    }

    fn device(&self) -> DeviceInfo {
        let os_release = self
            .prop("ro.build.version.release")
            .map(|r| format!("Android {r}"))
            .or_else(|| read_trimmed("/proc/sys/kernel/osrelease"))
            .unwrap_or_else(|| "unknown".to_string());
        let model = self
            .prop("ro.product.model")
            .or_else(|| read_trimmed("/sys/devices/virtual/dmi/id/product_name"))
            .unwrap_or_else(|| "unknown".to_string());
        let brand = self
            .prop("ro.product.brand")
            .or_else(|| read_trimmed("/sys/devices/virtual/dmi/id/sys_vendor"))
            .unwrap_or_else(|| "unknown".to_string());
        DeviceInfo {
            os_release,
            model,
            brand,
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    fn processors(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    fn build_tags(&self) -> Option<String> {
        self.prop("ro.build.tags")
    }
}

fn read_trimmed(path: &str) -> Option<String> {
    let s = std::fs::read_to_string(path).ok()?;
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Extract `MemTotal` and `MemAvailable` (falling back to `MemFree`).
pub(crate) fn parse_meminfo(text: &str) -> Option<MemoryInfo> {
    let mut total = None;
    let mut available = None;
    let mut free = None;
    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let kb: Option<u64> = rest.split_whitespace().next().and_then(|v| v.parse().ok());
        match key.trim() {
            "MemTotal" => total = kb,
            "MemAvailable" => available = kb,
            "MemFree" => free = kb,
            _ => {},
        }
    }
    Some(MemoryInfo {
        total_bytes: total? * 1024,
        available_bytes: available.or(free).unwrap_or(0) * 1024,
    })
}

// ---------------------------------------------------------------------------
// Date helper
// ---------------------------------------------------------------------------

/// Convert days since Unix epoch to (year, month, day).
pub(crate) fn days_to_ymd(mut days: u64) -> (u16, u8, u8) {
    let mut year = 1970u16;
    loop {
        let year_days = if is_leap(year) { 366 } else { 365 };
        if days < year_days {
            break;
        }
        days -= year_days;
        year += 1;
    }
    let leap = is_leap(year);
    let month_days: [u64; 12] = [
        31,
        if leap { 29 } else { 28 },
        31,
        30,
        31,
        30,
        31,
        31,
        30,
        31,
        30,
        31,
    ];
    let mut month = 0u8;
    for (i, &md) in month_days.iter().enumerate() {
        if days < md {
            month = (i + 1) as u8;
            break;
        }
        days -= md;
    }
    if month == 0 {
        month = 12;
    }
    (year, month, (days + 1) as u8)
}

pub(crate) fn is_leap(y: u16) -> bool {
    (y.is_multiple_of(4) && !y.is_multiple_of(100)) || y.is_multiple_of(400)
}

// ---------------------------------------------------------------------------
// In-module tests
// ---------------------------------------------------------------------------
