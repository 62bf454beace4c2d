use serde::*;

/// Modified Julian Date representation.
/// MJD 0 = 1858-11-17 00:00:00 UTC
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ModifiedJulianDate(qtty::Days);

impl ModifiedJulianDate {
    /// Create a new MJD value.
    pub fn new<V: Into<qtty::Days>>(v: V) -> Self {
        Self(v.into())
    }

    /// Raw MJD value as f64.
    pub fn value(&self) -> f64 {
        self.0.value()
    }

    /// Shift by a (possibly negative) number of days.
    pub fn offset_days(&self, days: f64) -> Self {
        Self::new(self.value() + days)
    }

    /// Convert to Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn to_unix_timestamp(&self) -> f64 {
        (self.value() - 40587.0) * 86400.0
    }

    /// Create from Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn from_unix_timestamp(timestamp: f64) -> Self {
        Self::new(timestamp / 86400.0 + 40587.0)
    }

    /// Create from chrono DateTime<Utc>.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self::from_unix_timestamp(dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
    }

    /// Parse an ISO-8601 timestamp such as the `DATE-OBS` header card.
    ///
    /// Accepts RFC 3339 strings and the zone-less `YYYY-MM-DDTHH:MM:SS[.fff]`
    /// form used in FITS headers, which is read as UTC.
    pub fn parse_iso(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
            return Some(Self::from_datetime(dt.with_timezone(&chrono::Utc)));
        }
        chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Self::from_datetime(naive.and_utc()))
    }
}

impl From<f64> for ModifiedJulianDate {
    fn from(v: f64) -> Self {
        ModifiedJulianDate::new(v)
    }
}

impl std::fmt::Display for ModifiedJulianDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MJD {:.5}", self.value())
    }
}

/// First-detection search window anchored on a trigger epoch.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: ModifiedJulianDate,
    pub end: ModifiedJulianDate,
}

impl TimeWindow {
    /// Build `[trigger + start_offset_days, trigger + end_offset_days]`.
    pub fn around(trigger: ModifiedJulianDate, start_offset_days: f64, end_offset_days: f64) -> Self {
        Self {
            start: trigger.offset_days(start_offset_days),
            end: trigger.offset_days(end_offset_days),
        }
    }

    pub fn contains(&self, mjd: f64) -> bool {
        mjd >= self.start.value() && mjd <= self.end.value()
    }

    pub fn duration_days(&self) -> f64 {
        self.end.value() - self.start.value()
    }
}
