//! Default date ranges for pipeline runs.
//!
//! Everything here is a pure function of the reference date; callers decide
//! what "today" is.

use chrono::format::{Fixed, Item, Numeric, StrftimeItems};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display pattern that marks a daily pipeline when no explicit cadence is set.
pub const DAILY_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Monthly,
}

impl Cadence {
    /// Cadence of a schedule that only declares a display pattern.
    pub fn infer_from_format(pattern: &str) -> Self {
        if pattern == DAILY_DATE_FORMAT {
            Cadence::Daily
        } else {
            Cadence::Monthly
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Cadence::Daily),
            "monthly" => Some(Cadence::Monthly),
            _ => None,
        }
    }
}

/// Which day a daily run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OffsetPolicy {
    Today,
    #[default]
    Yesterday,
    YesterdayToday,
}

impl OffsetPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TODAY" => Some(OffsetPolicy::Today),
            "YESTERDAY" => Some(OffsetPolicy::Yesterday),
            "YESTERDAY_TODAY" => Some(OffsetPolicy::YesterdayToday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }
}

/// Computes the default range of a run.
///
/// Daily runs cover the reference date for [`OffsetPolicy::Today`] and the
/// day before it otherwise. Monthly runs ignore the policy and cover the
/// whole calendar month preceding the reference date's month.
pub fn resolve(cadence: Cadence, policy: OffsetPolicy, reference: NaiveDate) -> DateRange {
    match cadence {
        Cadence::Daily => match policy {
            OffsetPolicy::Today => DateRange::single(reference),
            OffsetPolicy::Yesterday | OffsetPolicy::YesterdayToday => {
                DateRange::single(reference - Duration::days(1))
            }
        },
        Cadence::Monthly => {
            let first_of_month = reference - Duration::days(reference.day0() as i64);
            let end = first_of_month - Duration::days(1);
            let start = end - Duration::days(end.day0() as i64);
            DateRange { start, end }
        }
    }
}

/// A validated strftime pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDateFormat(pub String);

impl fmt::Display for InvalidDateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid date format pattern: {:?}", self.0)
    }
}

impl std::error::Error for InvalidDateFormat {}

/// Whether a strftime item can be rendered from a bare calendar date.
///
/// Time of day, offsets and timestamps need more than a `NaiveDate` and make
/// formatting fail.
fn is_date_item(item: &Item<'_>) -> bool {
    match item {
        Item::Literal(_) | Item::OwnedLiteral(_) | Item::Space(_) | Item::OwnedSpace(_) => true,
        Item::Numeric(numeric, _) => matches!(
            numeric,
            Numeric::Year
                | Numeric::YearDiv100
                | Numeric::YearMod100
                | Numeric::IsoYear
                | Numeric::IsoYearDiv100
                | Numeric::IsoYearMod100
                | Numeric::Month
                | Numeric::Day
                | Numeric::WeekFromSun
                | Numeric::WeekFromMon
                | Numeric::IsoWeek
                | Numeric::NumDaysFromSun
                | Numeric::WeekdayFromMon
                | Numeric::Ordinal
        ),
        Item::Fixed(fixed) => matches!(
            fixed,
            Fixed::ShortMonthName
                | Fixed::LongMonthName
                | Fixed::ShortWeekdayName
                | Fixed::LongWeekdayName
        ),
        Item::Error => false,
    }
}

impl DateFormat {
    pub fn parse(pattern: &str) -> Result<Self, InvalidDateFormat> {
        if pattern.trim().is_empty() {
            return Err(InvalidDateFormat(pattern.to_string()));
        }
        if !StrftimeItems::new(pattern).all(|item| is_date_item(&item)) {
            return Err(InvalidDateFormat(pattern.to_string()));
        }
        Ok(Self(pattern.to_string()))
    }

    pub fn daily() -> Self {
        Self(DAILY_DATE_FORMAT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn format(&self, date: NaiveDate) -> String {
        date.format(&self.0).to_string()
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self::daily()
    }
}
