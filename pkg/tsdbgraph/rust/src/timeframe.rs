// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Resolution of the dashboard time settings into API time strings and
//! concrete UTC instants, for the main window and the baseline window.
//!
//! All instants are UTC. Absolute endpoints are given as separate date
//! (`YYYY/MM/DD`) and time (`HH:mm[:ss]`) fields and recombined here.
//! Relative periods are `<N><unit>`, e.g. `2h` or `10m`; month and year
//! units shift the calendar rather than a fixed number of seconds.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::errors::{Error, Result};
use crate::model::{BaselineDatumStyle, GlobalTimeConfig};

#[allow(clippy::expect_used)] // constant patterns
static PERIOD_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+").expect("invalid regex"));
#[allow(clippy::expect_used)]
static PERIOD_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]+$").expect("invalid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl PeriodUnit {
    fn parse(unit: &str) -> Option<Self> {
        // `m` is minutes, `M` and `n` are months; everything else is case-insensitive
        match unit {
            "m" => return Some(PeriodUnit::Minutes),
            "M" | "n" => return Some(PeriodUnit::Months),
            _ => {}
        }
        let unit = match unit.to_ascii_lowercase().as_str() {
            "ms" | "millisecond" | "milliseconds" => PeriodUnit::Milliseconds,
            "s" | "second" | "seconds" => PeriodUnit::Seconds,
            "minute" | "minutes" => PeriodUnit::Minutes,
            "h" | "hour" | "hours" => PeriodUnit::Hours,
            "d" | "day" | "days" => PeriodUnit::Days,
            "w" | "week" | "weeks" => PeriodUnit::Weeks,
            "month" | "months" => PeriodUnit::Months,
            "y" | "year" | "years" => PeriodUnit::Years,
            _ => return None,
        };
        Some(unit)
    }
}

/// A relative period such as `2h` or `3n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub amount: i64,
    pub unit: PeriodUnit,
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let unresolvable = || Error::UnresolvablePeriod(s.to_string());
        let amount = PERIOD_AMOUNT
            .find(s)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(unresolvable)?;
        let unit = PERIOD_UNIT
            .find(s)
            .and_then(|m| PeriodUnit::parse(m.as_str()))
            .ok_or_else(unresolvable)?;
        Ok(Self { amount, unit })
    }
}

impl Period {
    fn fixed_duration(&self) -> Option<Duration> {
        let seconds_per_unit: i64 = match self.unit {
            PeriodUnit::Milliseconds => return Some(Duration::milliseconds(self.amount)),
            PeriodUnit::Seconds => 1,
            PeriodUnit::Minutes => 60,
            PeriodUnit::Hours => 3_600,
            PeriodUnit::Days => 86_400,
            PeriodUnit::Weeks => 604_800,
            PeriodUnit::Months | PeriodUnit::Years => return None,
        };
        self.amount
            .checked_mul(seconds_per_unit)
            .map(Duration::seconds)
    }

    fn shift(&self, t: OffsetDateTime, sign: i64) -> Option<OffsetDateTime> {
        let amount = self.amount.checked_mul(sign)?;
        match self.unit {
            PeriodUnit::Months => shift_months(t, amount),
            PeriodUnit::Years => shift_months(t, amount.checked_mul(12)?),
            _ => t.checked_add(self.fixed_duration()?.checked_mul(i32::try_from(sign).ok()?)?),
        }
    }
}

/// A displacement in time: either a calendar period or an exact duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Period(Period),
    Exact(Duration),
}

impl Shift {
    pub fn add_to(&self, t: OffsetDateTime) -> Result<OffsetDateTime> {
        self.apply(t, 1)
    }

    pub fn subtract_from(&self, t: OffsetDateTime) -> Result<OffsetDateTime> {
        self.apply(t, -1)
    }

    fn apply(&self, t: OffsetDateTime, sign: i64) -> Result<OffsetDateTime> {
        let shifted = match self {
            Shift::Period(period) => period.shift(t, sign),
            Shift::Exact(d) if sign < 0 => t.checked_sub(*d),
            Shift::Exact(d) => t.checked_add(*d),
        };
        shifted.ok_or_else(|| Error::UnresolvablePeriod(format!("{self:?}")))
    }
}

fn shift_months(t: OffsetDateTime, months: i64) -> Option<OffsetDateTime> {
    let total = i64::from(t.year())
        .checked_mul(12)?
        .checked_add(i64::from(u8::from(t.month())) - 1)?
        .checked_add(months)?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(total.rem_euclid(12) + 1).ok()?).ok()?;
    // clamp to the end of shorter months, e.g. 31 March - 1 month = 28 February
    let day = t.day().min(days_in_month(year, month));
    let date = Date::from_calendar_date(year, month, day).ok()?;
    Some(t.replace_date(date))
}

fn days_in_month(year: i32, month: Month) -> u8 {
    match month {
        Month::February if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        Month::February => 28,
        Month::April | Month::June | Month::September | Month::November => 30,
        _ => 31,
    }
}

fn is_blank(value: Option<&String>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn parse_date(field: &'static str, value: &str) -> Result<Date> {
    let invalid = || Error::InvalidDateTime {
        field,
        value: value.to_string(),
    };
    let mut parts = value.trim().split(['/', '-']);
    let mut next = || parts.next().and_then(|p| p.trim().parse::<i32>().ok());
    let (Some(year), Some(month), Some(day), None) = (next(), next(), next(), next()) else {
        return Err(invalid());
    };
    let month = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or_else(invalid)?;
    let day = u8::try_from(day).map_err(|_| invalid())?;
    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

fn parse_time(field: &'static str, value: Option<&String>) -> Result<Time> {
    let Some(value) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(Time::MIDNIGHT);
    };
    let invalid = || Error::InvalidDateTime {
        field,
        value: value.to_string(),
    };
    let mut parts = value.split(':');
    let mut next = || parts.next().map(|p| p.trim().parse::<u8>().ok());
    let (hour, minute, second, rest) = (next(), next(), next(), next());
    let (Some(Some(hour)), Some(Some(minute)), None) = (hour, minute, rest) else {
        return Err(invalid());
    };
    let second = match second {
        None => 0,
        Some(Some(s)) => s,
        Some(None) => return Err(invalid()),
    };
    Time::from_hms(hour, minute, second).map_err(|_| invalid())
}

/// Combines a date and a time field into a UTC instant. `None` when the
/// date is not set.
fn absolute_instant(
    date_field: &'static str,
    date: Option<&String>,
    time_field: &'static str,
    time: Option<&String>,
) -> Result<Option<OffsetDateTime>> {
    let Some(date) = date.filter(|d| !d.trim().is_empty()) else {
        return Ok(None);
    };
    let date = parse_date(date_field, date)?;
    let time = parse_time(time_field, time)?;
    Ok(Some(PrimitiveDateTime::new(date, time).assume_utc()))
}

/// Formats an instant the way the metrics API expects absolute times.
pub fn format_api_time(t: OffsetDateTime) -> Result<String> {
    Ok(t.format(format_description!(
        "[year]/[month]/[day] [hour]:[minute]:[second]"
    ))?)
}

fn main_from_literal(global: &GlobalTimeConfig) -> Result<Option<OffsetDateTime>> {
    absolute_instant(
        "fromDate",
        global.from_date.as_ref(),
        "fromTime",
        global.from_time.as_ref(),
    )
}

/// The main `to` endpoint only counts when both its fields are set.
fn main_to_literal(global: &GlobalTimeConfig) -> Result<Option<OffsetDateTime>> {
    if !global.absolute_time_specification
        || is_blank(global.to_date.as_ref())
        || is_blank(global.to_time.as_ref())
    {
        return Ok(None);
    }
    absolute_instant(
        "toDate",
        global.to_date.as_ref(),
        "toTime",
        global.to_time.as_ref(),
    )
}

fn baseline_from_literal(global: &GlobalTimeConfig) -> Result<Option<OffsetDateTime>> {
    absolute_instant(
        "baselineFromDate",
        global.baseline_from_date.as_ref(),
        "baselineFromTime",
        global.baseline_from_time.as_ref(),
    )
}

fn baseline_to_literal(global: &GlobalTimeConfig) -> Result<Option<OffsetDateTime>> {
    absolute_instant(
        "baselineToDate",
        global.baseline_to_date.as_ref(),
        "baselineToTime",
        global.baseline_to_time.as_ref(),
    )
}

/// Main window as API strings: `(start, end)`.
///
/// A relative window yields `"<period>-ago"` and no end. An empty start
/// string means no start could be determined; the query builder reports
/// it as a missing start date.
pub fn main_window_as_api_string(global: &GlobalTimeConfig) -> Result<(String, Option<String>)> {
    if global.absolute_time_specification {
        let from = match main_from_literal(global)? {
            Some(t) => format_api_time(t)?,
            None => String::new(),
        };
        let to = main_to_literal(global)?.map(format_api_time).transpose()?;
        return Ok((from, to));
    }
    let from = match global.relative_period.as_deref().map(str::trim) {
        None | Some("") => String::new(),
        Some(period) => format!("{period}-ago"),
    };
    Ok((from, None))
}

/// Main window as instants. `reference` stands in for "now" and defaults
/// to the current UTC time. An empty relative period starts at the
/// reference; one that does not parse is `UnresolvablePeriod`.
pub fn main_window_as_instant(
    global: &GlobalTimeConfig,
    reference: Option<OffsetDateTime>,
) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let now = reference.unwrap_or_else(OffsetDateTime::now_utc);
    let to = main_to_literal(global)?.unwrap_or(now);
    if global.absolute_time_specification {
        let from = main_from_literal(global)?.ok_or(Error::NoStartDate)?;
        return Ok((from, to));
    }
    let from = match global.relative_period.as_deref().map(str::trim) {
        None | Some("") => now,
        Some(period) => Shift::Period(period.parse::<Period>()?).subtract_from(now)?,
    };
    Ok((from, to))
}

/// Length of the main window, `None` when a relative period cannot be parsed.
fn main_duration(
    global: &GlobalTimeConfig,
    reference: Option<OffsetDateTime>,
) -> Result<Option<Shift>> {
    if global.absolute_time_specification {
        let (from, to) = main_window_as_instant(global, reference)?;
        return Ok(Some(Shift::Exact(to - from)));
    }
    Ok(global
        .relative_period
        .as_deref()
        .and_then(|p| p.trim().parse::<Period>().ok())
        .map(Shift::Period))
}

fn baseline_style(global: &GlobalTimeConfig) -> Result<BaselineDatumStyle> {
    global
        .baseline_datum_style
        .ok_or_else(|| Error::UnrecognizedBaselineStyle(String::new()))
}

fn baseline_period(global: &GlobalTimeConfig) -> Option<Shift> {
    global
        .baseline_relative_period
        .as_deref()
        .and_then(|p| p.trim().parse::<Period>().ok())
        .map(Shift::Period)
}

/// Baseline window as API strings. Either end is `None` when it cannot be
/// resolved, which the query builder reports as a missing start date.
///
/// - `from`: starts at the literal baseline start and lasts as long as the main window.
/// - `to`: ends at the literal baseline end and lasts as long as the main window.
/// - `relative`: main start and main end, each shifted back by the baseline period.
pub fn baseline_window_as_api_string(
    global: &GlobalTimeConfig,
    reference: Option<OffsetDateTime>,
) -> Result<(Option<String>, Option<String>)> {
    let (from, to) = match baseline_style(global)? {
        BaselineDatumStyle::From => {
            let from = baseline_from_literal(global)?;
            let to = match (from, main_duration(global, reference)?) {
                (Some(from), Some(length)) => Some(length.add_to(from)?),
                _ => None,
            };
            (from, to)
        }
        BaselineDatumStyle::To => {
            let to = baseline_to_literal(global)?;
            let from = match (to, main_duration(global, reference)?) {
                (Some(to), Some(length)) => Some(length.subtract_from(to)?),
                _ => None,
            };
            (from, to)
        }
        BaselineDatumStyle::Relative => match baseline_period(global) {
            Some(period) => {
                let (main_from, main_to) = main_window_as_instant(global, reference)?;
                (
                    Some(period.subtract_from(main_from)?),
                    Some(period.subtract_from(main_to)?),
                )
            }
            None => (None, None),
        },
    };
    Ok((
        from.map(format_api_time).transpose()?,
        to.map(format_api_time).transpose()?,
    ))
}

/// How far the baseline window sits behind the main window. Renderers add
/// it to baseline timestamps to overlay them on the main time axis.
pub fn baseline_offset(
    global: &GlobalTimeConfig,
    reference: Option<OffsetDateTime>,
) -> Result<Option<Shift>> {
    match baseline_style(global)? {
        BaselineDatumStyle::From => {
            let (main_from, _) = main_window_as_instant(global, reference)?;
            Ok(baseline_from_literal(global)?.map(|b| Shift::Exact(main_from - b)))
        }
        BaselineDatumStyle::To => {
            let (_, main_to) = main_window_as_instant(global, reference)?;
            Ok(baseline_to_literal(global)?.map(|b| Shift::Exact(main_to - b)))
        }
        BaselineDatumStyle::Relative => Ok(baseline_period(global)),
    }
}
