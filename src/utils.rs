use crate::prelude::*;

/// Current instant as naive UTC, the representation stored in the database.
pub fn now() -> DateTime {
  Utc::now().naive_utc()
}

/// Whole seconds between two instants, `to - from`.
pub fn seconds_between(from: DateTime, to: DateTime) -> i64 {
  (to - from).num_seconds()
}

/// Formats seconds as `HH:MM:SS`. Negative input renders as zero.
pub fn format_duration(secs: i64) -> String {
  let secs = secs.max(0);
  format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn format_date(date: DateTime) -> String {
  date.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parses a duration written as `HH:MM:SS`, a plain number of seconds, or
/// in units such as `1h30m45s` and `1h 5s`. Out of range input is `None`.
pub fn parse_duration(input: &str) -> Option<i64> {
  let s = input.trim().to_lowercase();
  if s.is_empty() {
    return None;
  }

  if s.contains(':') {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    let [h, m, sec] = parts.as_slice() else {
      return None;
    };
    let h = i64::from(h.parse::<u32>().ok()?);
    let m = i64::from(m.parse::<u32>().ok()?);
    let sec = i64::from(sec.parse::<u32>().ok()?);
    return h
      .checked_mul(3600)?
      .checked_add(m.checked_mul(60)?)?
      .checked_add(sec);
  }

  if s.chars().all(|c| c.is_ascii_digit()) {
    return s.parse::<i64>().ok();
  }

  let duration = humantime::parse_duration(&s).ok()?;
  i64::try_from(duration.as_secs()).ok()
}

/// Parses an absolute ISO 8601 UTC timestamp (`2025-03-01T12:00:00Z`) or a
/// time relative to now (`-1h30m`, `-01:30:00`).
pub fn parse_timestamp(input: &str) -> Option<DateTime> {
  let s = input.trim();
  if let Some(relative) = s.strip_prefix('-') {
    let delta = TimeDelta::try_seconds(parse_duration(relative)?)?;
    return now().checked_sub_signed(delta);
  }

  chrono::DateTime::parse_from_rfc3339(&s.to_uppercase())
    .ok()
    .map(|dt| dt.naive_utc())
}
