//! Generator configuration.
//!
//! [`GeneratorConfig`] is a plain struct assembled by the CLI from its
//! arguments. Everything that can be wrong with it is caught by
//! [`GeneratorConfig::validate`] before any watcher or task starts.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::KindSelection;

// ---------------------------------------------------------------------------
// TemplateSource
// ---------------------------------------------------------------------------

/// Where the template text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Template text held in memory (e.g. read once from stdin).
    Inline(String),
    /// A template file, re-read on every cycle.
    File(PathBuf),
}

impl TemplateSource {
    /// Name used in logs and as the Tera template name.
    pub fn name(&self) -> String {
        match self {
            TemplateSource::Inline(_) => "<inline>".to_string(),
            TemplateSource::File(path) => path.display().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// WaitBounds
// ---------------------------------------------------------------------------

/// Debounce bounds parsed from `<min>[:<max>]`.
///
/// A zero `min` disables debouncing. A zero `max` means bursts are only
/// flushed by the min deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitBounds {
    pub min: Duration,
    pub max: Duration,
}

impl WaitBounds {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        let bounds = Self { min, max };
        bounds.check()?;
        Ok(bounds)
    }

    /// Parse `500ms`, `500ms:5s`, `1m30s:` and the like. The empty string
    /// means no debouncing.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(Self::default());
        }
        if spec.starts_with(':') {
            return Err(ConfigError::MissingMinWait {
                spec: spec.to_string(),
            });
        }

        let (min, max) = spec.split_once(':').unwrap_or((spec, ""));
        let min = parse_duration(min)?;
        if max.is_empty() {
            return Ok(Self {
                min,
                max: Duration::ZERO,
            });
        }
        let max = parse_duration(max)?;
        if max < min {
            return Err(ConfigError::MaxBelowMin {
                spec: spec.to_string(),
            });
        }
        Ok(Self { min, max })
    }

    /// True when events should be forwarded without debouncing.
    pub fn is_bypassed(&self) -> bool {
        self.min.is_zero()
    }

    /// The max deadline, if one applies.
    pub fn max_deadline(&self) -> Option<Duration> {
        (!self.max.is_zero()).then_some(self.max)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if !self.max.is_zero() && self.max < self.min {
            return Err(ConfigError::MaxBelowMin {
                spec: self.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for WaitBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{:?}", self.min, self.max)
    }
}

/// Parse a duration such as `300ms`, `1.5s` or `1h15m30s`.
///
/// Accepted units are `ns`, `us` (`µs`), `ms`, `s`, `m` and `h`; a bare `0`
/// needs no unit. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let err = |reason: &'static str| ConfigError::Duration {
        input: input.to_string(),
        reason,
    };

    let s = input.trim();
    if s.is_empty() {
        return Err(err("empty duration"));
    }
    if s.starts_with('-') {
        return Err(err("negative durations are not allowed"));
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(err("expected a number"));
        }
        if unit.is_empty() {
            return Err(err("missing unit"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| err("unknown unit"))?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err("duration out of range"))?
        };
        let mut frac_value: u128 = 0;
        let mut divisor: u128 = 1;
        for digit in frac.bytes().take(18) {
            frac_value = frac_value * 10 + u128::from(digit - b'0');
            divisor *= 10;
        }

        total = whole
            .checked_mul(scale)
            .and_then(|n| n.checked_add(frac_value * scale / divisor))
            .and_then(|n| total.checked_add(n))
            .ok_or_else(|| err("duration out of range"))?;
        rest = tail;
    }

    let nanos = u64::try_from(total).map_err(|_| err("duration out of range"))?;
    Ok(Duration::from_nanos(nanos))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60_000_000_000,
        "h" => 3_600_000_000_000,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// GeneratorConfig
// ---------------------------------------------------------------------------

/// Everything a generator needs besides its resource source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub template: TemplateSource,
    /// Target file; `None` writes to stdout.
    pub output: Option<PathBuf>,
    /// Where temp files are staged; defaults to the target's directory.
    pub scratch_dir: Option<PathBuf>,
    /// Replace an existing target. Ignored in watch mode, which always
    /// replaces.
    pub overwrite: bool,
    pub watch: bool,
    pub pre_cmd: Option<String>,
    pub post_cmd: Option<String>,
    pub log_cmd_output: bool,
    /// Periodic re-render in watch mode.
    pub interval: Option<Duration>,
    pub wait: WaitBounds,
    pub kinds: KindSelection,
}

impl GeneratorConfig {
    pub fn new(template: TemplateSource) -> Self {
        Self {
            template,
            output: None,
            scratch_dir: None,
            overwrite: true,
            watch: false,
            pre_cmd: None,
            post_cmd: None,
            log_cmd_output: true,
            interval: None,
            wait: WaitBounds::default(),
            kinds: KindSelection::all(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let TemplateSource::File(path) = &self.template {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyTemplatePath);
            }
        }
        self.wait.check()
    }

    /// Refusing to replace an existing target only applies to one-shot runs.
    pub fn refuses_overwrite(&self) -> bool {
        !self.overwrite && !self.watch
    }
}
