/// Suggestion primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The in-memory stand-in for "no timestamp": `Timestamp::default()`, the Unix epoch.
pub fn zero_timestamp() -> Timestamp {
    Timestamp::default()
}

/// Map a nullable storage timestamp to its in-memory form.
pub fn from_nullable(ts: Option<Timestamp>) -> Timestamp {
    ts.unwrap_or_default()
}

/// Map an in-memory timestamp to its storage form (`None` for the zero value).
pub fn to_nullable(ts: Timestamp) -> Option<Timestamp> {
    (ts != zero_timestamp()).then_some(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn absent_timestamp_normalizes_to_zero() {
        assert_eq!(from_nullable(None), zero_timestamp());
        assert_eq!(to_nullable(zero_timestamp()), None);
    }

    #[test]
    fn present_timestamp_passes_through() {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(from_nullable(Some(ts)), ts);
        assert_eq!(to_nullable(ts), Some(ts));
    }
}
