//! Week - Week Cells of a Life Grid
//!
//! Date arithmetic for one cell per week since birth. Week `i` starts
//! `7 * i` days after the date of birth.

use std::cmp::Ordering;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_LIFESPAN_YEARS, MIN_BIRTH_YEAR};
use crate::error::{Error, Result};

/// Special week markers, in detection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekKind {
    Normal,
    Birthday,
    YearStart,
    LeapDay,
}

/// Where a week lies relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStatus {
    Lived,
    Current,
    Future,
}

/// Calendar age: whole years, then whole months, then days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Age {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl Age {
    /// Age on `on` for someone born on `born`; zero before birth.
    ///
    /// Month steps clamp to the end of shorter months, so Jan 31 plus one
    /// month is the last day of February.
    pub fn between(born: NaiveDate, on: NaiveDate) -> Self {
        if on <= born {
            return Self::default();
        }
        let mut months = (on.year() - born.year()) * 12 + on.month() as i32 - born.month() as i32;
        if on.day() < born.day() {
            months -= 1;
        }
        let months = months.max(0) as u32;
        let anchor = born
            .checked_add_months(Months::new(months))
            .unwrap_or(on)
            .min(on);
        Self {
            years: months / 12,
            months: months % 12,
            days: (on - anchor).num_days() as u32,
        }
    }
}

/// One cell of the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekCell {
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: WeekKind,
    pub status: WeekStatus,
    /// Age on the first day of the week
    pub age: Age,
}

impl WeekCell {
    pub fn is_current(&self) -> bool {
        self.status == WeekStatus::Current
    }
}

/// Summary of how much of a life span has passed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifeProgress {
    pub total_weeks: usize,
    pub current_week_index: usize,
    /// Includes the current week
    pub weeks_lived: usize,
    pub weeks_remaining: usize,
    /// `current_week_index / total_weeks`, capped at 100 and rounded to two
    /// decimals
    pub progress_percentage: f64,
    pub current_age: Age,
    pub days_lived: i64,
}

/// Date of birth plus expected lifespan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeSpan {
    pub date_of_birth: NaiveDate,
    pub lifespan_years: u32,
}

impl LifeSpan {
    /// Validate against `today`
    pub fn new(date_of_birth: NaiveDate, lifespan_years: u32, today: NaiveDate) -> Result<Self> {
        validate_date_of_birth(date_of_birth, today)?;
        if lifespan_years == 0 {
            return Err(Error::InvalidDate {
                message: "lifespan years must be positive".into(),
            });
        }
        if lifespan_years > MAX_LIFESPAN_YEARS {
            return Err(Error::InvalidDate {
                message: format!("lifespan years must be at most {MAX_LIFESPAN_YEARS}"),
            });
        }
        Ok(Self {
            date_of_birth,
            lifespan_years,
        })
    }

    /// Number of whole weeks between birth and the end of the lifespan
    pub fn total_weeks(&self) -> usize {
        let end = self
            .date_of_birth
            .checked_add_months(Months::new(self.lifespan_years * 12))
            .unwrap_or(NaiveDate::MAX);
        ((end - self.date_of_birth).num_days() / 7) as usize
    }

    /// Index of the week containing `today`
    pub fn current_week_index(&self, today: NaiveDate) -> usize {
        let days = (today - self.date_of_birth).num_days();
        if days < 0 { 0 } else { (days / 7) as usize }
    }

    /// Progress through the span as of `today`
    pub fn progress(&self, today: NaiveDate) -> LifeProgress {
        let total_weeks = self.total_weeks();
        let current = self.current_week_index(today);
        let percentage = if total_weeks == 0 {
            0.0
        } else {
            (current as f64 / total_weeks as f64 * 100.0).min(100.0)
        };
        LifeProgress {
            total_weeks,
            current_week_index: current,
            weeks_lived: (current + 1).min(total_weeks),
            weeks_remaining: total_weeks.saturating_sub(current),
            progress_percentage: (percentage * 100.0).round() / 100.0,
            current_age: Age::between(self.date_of_birth, today),
            days_lived: (today - self.date_of_birth).num_days().max(0),
        }
    }

    /// Build the cell for `index` as seen on `today`
    pub fn week(&self, index: usize, today: NaiveDate) -> Result<WeekCell> {
        let offset = (index as u64).checked_mul(7).ok_or_else(|| out_of_range(index))?;
        let start = self
            .date_of_birth
            .checked_add_days(Days::new(offset))
            .ok_or_else(|| out_of_range(index))?;
        let end = start
            .checked_add_days(Days::new(6))
            .ok_or_else(|| out_of_range(index))?;

        Ok(WeekCell {
            index,
            start,
            end,
            kind: self.kind_of(start, end),
            status: match index.cmp(&self.current_week_index(today)) {
                Ordering::Less => WeekStatus::Lived,
                Ordering::Equal => WeekStatus::Current,
                Ordering::Greater => WeekStatus::Future,
            },
            age: Age::between(self.date_of_birth, start),
        })
    }

    fn kind_of(&self, start: NaiveDate, end: NaiveDate) -> WeekKind {
        if self.contains_birthday(start, end) {
            WeekKind::Birthday
        } else if start.year() != end.year() || start.ordinal() == 1 {
            WeekKind::YearStart
        } else if contains_leap_day(start, end) {
            WeekKind::LeapDay
        } else {
            WeekKind::Normal
        }
    }

    fn contains_birthday(&self, start: NaiveDate, end: NaiveDate) -> bool {
        let (month, day) = (self.date_of_birth.month(), self.date_of_birth.day());
        [start.year(), end.year()].into_iter().any(|year| {
            // Feb 29 birthdays fall on Feb 28 in common years
            let anniversary = NaiveDate::from_ymd_opt(year, month, day)
                .or_else(|| NaiveDate::from_ymd_opt(year, month, day - 1));
            anniversary.is_some_and(|a| start <= a && a <= end)
        })
    }
}

fn contains_leap_day(start: NaiveDate, end: NaiveDate) -> bool {
    [start.year(), end.year()].into_iter().any(|year| {
        NaiveDate::from_ymd_opt(year, 2, 29).is_some_and(|d| start <= d && d <= end)
    })
}

fn out_of_range(index: usize) -> Error {
    Error::InvalidDate {
        message: format!("week {index} is outside the representable date range"),
    }
}

/// Birth dates must not be in the future nor before 1900
pub fn validate_date_of_birth(date_of_birth: NaiveDate, today: NaiveDate) -> Result<()> {
    if date_of_birth > today {
        return Err(Error::InvalidDate {
            message: "date of birth cannot be in the future".into(),
        });
    }
    if date_of_birth.year() < MIN_BIRTH_YEAR {
        return Err(Error::InvalidDate {
            message: format!("date of birth must be after year {MIN_BIRTH_YEAR}"),
        });
    }
    Ok(())
}
