//! Dates are stored as RFC 3339 UTC strings with millisecond precision, so
//! string order is chronological order inside the query layer.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde_json::Value;

pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn format(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Interpret a client-supplied date: RFC 3339, `YYYY-MM-DD`, a naive
/// `YYYY-MM-DDTHH:MM:SS` (taken as UTC), or epoch milliseconds.
pub fn parse_input(value: &Value) -> Option<DateTime<Utc>> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => parse_text(s.trim()),
        _ => None,
    };
    parsed.map(|timestamp| timestamp.trunc_subsecs(3))
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    text.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}

pub mod rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(timestamp))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn accepts_common_input_forms() {
        let noon = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        assert_eq!(parse_input(&json!("2024-05-01T12:00:00Z")), Some(noon));
        assert_eq!(parse_input(&json!("2024-05-01T14:00:00+02:00")), Some(noon));
        assert_eq!(parse_input(&json!("2024-05-01T12:00:00")), Some(noon));
        assert_eq!(parse_input(&json!("2024-05-01")), Some(midnight));
        assert_eq!(parse_input(&json!(noon.timestamp_millis())), Some(noon));
        assert_eq!(parse_input(&json!(noon.timestamp_millis().to_string())), Some(noon));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_input(&json!("next tuesday")), None);
        assert_eq!(parse_input(&json!(true)), None);
        assert_eq!(parse_input(&json!({"date": 1})), None);
    }

    #[test]
    fn input_and_clock_are_cut_to_millis() {
        let parsed = parse_input(&json!("2024-05-01T12:00:00.123456789Z")).unwrap();
        assert_eq!(parsed.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(now().timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn formats_with_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format(&ts), "2024-05-01T12:00:00.000Z");
    }
}
