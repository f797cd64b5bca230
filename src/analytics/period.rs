use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucketing granularity for period breakdowns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            "yearly" | "year" => Ok(Self::Yearly),
            other => Err(eyre::eyre!("Unknown period '{}'", other)),
        }
    }
}

/// Calendar bucket a date falls in. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    period: Period,
    year: i32,
    index: u32,
}

impl PeriodKey {
    pub fn of(date: NaiveDate, period: Period) -> Self {
        let (year, index) = match period {
            Period::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Period::Monthly => (date.year(), date.month()),
            Period::Quarterly => (date.year(), (date.month() - 1) / 3 + 1),
            Period::Yearly => (date.year(), 0),
        };
        Self { period, year, index }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period {
            Period::Weekly => write!(f, "{}-W{:02}", self.year, self.index),
            Period::Monthly => write!(f, "{}-{:02}", self.year, self.index),
            Period::Quarterly => write!(f, "{}-Q{}", self.year, self.index),
            Period::Yearly => write!(f, "{}", self.year),
        }
    }
}
