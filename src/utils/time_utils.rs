use chrono::{DateTime, Utc};

/// Wall-clock seconds since the Unix epoch, with microsecond resolution.
pub fn epoch_secs() -> f64 {
    to_epoch_secs(Utc::now())
}

pub fn to_epoch_secs(t: DateTime<Utc>) -> f64 {
    t.timestamp_micros() as f64 / 1_000_000.0
}
