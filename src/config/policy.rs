//! Rate-limit policy parsing
//!
//! A policy is a semicolon-separated list of `<count> per <window>` clauses,
//! e.g. `1000 per day;100 per hour`. Each clause is enforced independently
//! with fixed-window semantics.

use std::fmt;
use std::str::FromStr;

/// A parsed rate-limit policy: one or more clauses, all of which must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub clauses: Vec<RateLimitClause>,
}

/// A single `<count> per <window>` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitClause {
    pub count: u32,
    pub window: RateWindow,
}

/// The fixed window a clause counts requests over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Second,
    Minute,
    Hour,
    Day,
}

impl RateWindow {
    pub fn as_secs(self) -> u64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    fn parse(word: &str) -> Option<Self> {
        // Accept singular and plural forms.
        let word = word.strip_suffix('s').unwrap_or(word);
        match word {
            "second" => Some(Self::Second),
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            _ => None,
        }
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Second => write!(f, "second"),
            Self::Minute => write!(f, "minute"),
            Self::Hour => write!(f, "hour"),
            Self::Day => write!(f, "day"),
        }
    }
}

impl fmt::Display for RateLimitClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}", self.count, self.window)
    }
}

impl fmt::Display for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.clauses.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(";"))
    }
}

impl FromStr for RateLimitClause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [count, per, window] = parts.as_slice() else {
            return Err(format!("`{s}` is not a `<count> per <window>` clause"));
        };
        if !per.eq_ignore_ascii_case("per") {
            return Err(format!("`{s}` is not a `<count> per <window>` clause"));
        }

        let count: u32 = count
            .parse()
            .map_err(|_| format!("`{count}` is not a valid request count"))?;
        if count == 0 {
            return Err("request count must be positive".to_string());
        }

        let window = RateWindow::parse(&window.to_ascii_lowercase())
            .ok_or_else(|| format!("`{window}` is not a valid window (second/minute/hour/day)"))?;

        Ok(Self { count, window })
    }
}

impl FromStr for RateLimitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clauses = s
            .split(';')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(RateLimitClause::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        if clauses.is_empty() {
            return Err("policy must contain at least one `<count> per <window>` clause".to_string());
        }

        Ok(Self { clauses })
    }
}

impl Default for RateLimitPolicy {
    /// `1000 per day;100 per hour`
    fn default() -> Self {
        Self {
            clauses: vec![
                RateLimitClause {
                    count: 1000,
                    window: RateWindow::Day,
                },
                RateLimitClause {
                    count: 100,
                    window: RateWindow::Hour,
                },
            ],
        }
    }
}
