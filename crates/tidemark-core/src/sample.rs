//! The `Sample` value type and its record codec.

use chrono::{DateTime, Utc};

use crate::engine::EngineError;

/// One observation for a device: a timestamp and one value per declared
/// channel, in channel declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Instant the observation was taken.
    pub timestamp: DateTime<Utc>,
    /// One value per channel; index `i` belongs to the `i`-th declared channel.
    pub values: Vec<f64>,
}

impl Sample {
    /// Create a sample from a timestamp and value vector.
    pub fn new(timestamp: DateTime<Utc>, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }

    /// Encode as one storage record line: `<rfc3339>,<v0>,<v1>,...`.
    pub fn to_record(&self) -> String {
        let mut record = self.timestamp.to_rfc3339();
        for value in &self.values {
            record.push(',');
            record.push_str(&value.to_string());
        }
        record
    }

    /// Parse a storage record line produced by [`Sample::to_record`].
    pub fn parse_record(line: &str) -> Result<Self, EngineError> {
        let mut fields = line.split(',');
        let raw_timestamp = fields
            .next()
            .ok_or_else(|| EngineError::Corrupt(format!("empty record: '{line}'")))?;

        let timestamp = DateTime::parse_from_rfc3339(raw_timestamp)
            .map_err(|err| EngineError::Corrupt(format!("bad timestamp '{raw_timestamp}': {err}")))?
            .with_timezone(&Utc);

        let values = fields
            .map(|field| {
                field
                    .parse::<f64>()
                    .map_err(|err| EngineError::Corrupt(format!("bad value '{field}': {err}")))
            })
            .collect::<Result<Vec<f64>, EngineError>>()?;

        Ok(Self { timestamp, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, secs).unwrap()
    }

    #[test]
    fn record_round_trip() {
        let sample = Sample::new(ts(30), vec![1.5, -2.0, 0.25]);
        let parsed = Sample::parse_record(&sample.to_record()).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn record_with_no_values() {
        let sample = Sample::new(ts(0), vec![]);
        let record = sample.to_record();
        assert!(!record.contains(','));
        assert_eq!(Sample::parse_record(&record).unwrap(), sample);
    }

    #[test]
    fn parse_rejects_bad_timestamp() {
        let err = Sample::parse_record("not-a-time,1.0").unwrap_err();
        assert!(matches!(err, EngineError::Corrupt(_)));
    }

    #[test]
    fn parse_rejects_bad_value() {
        let err = Sample::parse_record("2021-01-01T00:00:00+00:00,1.0,oops").unwrap_err();
        assert!(matches!(err, EngineError::Corrupt(_)));
    }
}
