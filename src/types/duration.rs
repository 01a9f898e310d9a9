use std::fmt;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;
const MS_PER_YEAR: i64 = 365 * MS_PER_DAY;

/// A signed duration with millisecond precision, as used by range
/// selectors, subqueries and `offset` modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    millis: i64,
}

impl Duration {
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self {
            millis: secs * MS_PER_SECOND,
        }
    }

    #[must_use]
    pub const fn from_mins(mins: i64) -> Self {
        Self {
            millis: mins * MS_PER_MINUTE,
        }
    }

    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.millis
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.millis < 0
    }

    /// Milliseconds per unit suffix, or `None` for an unknown suffix.
    pub(crate) fn unit_millis(unit: &str) -> Option<i64> {
        match unit {
            "ms" => Some(1),
            "s" => Some(MS_PER_SECOND),
            "m" => Some(MS_PER_MINUTE),
            "h" => Some(MS_PER_HOUR),
            "d" => Some(MS_PER_DAY),
            "w" => Some(MS_PER_WEEK),
            "y" => Some(MS_PER_YEAR),
            _ => None,
        }
    }
}

impl std::ops::Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration {
            millis: -self.millis,
        }
    }
}

/// Compact form: largest units first, zero components omitted (`1h30m`, `0s`).
impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis == 0 {
            return write!(f, "0s");
        }
        if self.millis < 0 {
            write!(f, "-")?;
        }
        let mut rest = self.millis.unsigned_abs();
        let units: [(&str, i64); 7] = [
            ("y", MS_PER_YEAR),
            ("w", MS_PER_WEEK),
            ("d", MS_PER_DAY),
            ("h", MS_PER_HOUR),
            ("m", MS_PER_MINUTE),
            ("s", MS_PER_SECOND),
            ("ms", 1),
        ];
        for (suffix, size) in units {
            let size = size.unsigned_abs();
            let count = rest / size;
            if count > 0 {
                write!(f, "{count}{suffix}")?;
                rest %= size;
            }
        }
        Ok(())
    }
}
