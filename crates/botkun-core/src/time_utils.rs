use chrono::{DateTime, Utc};

// Zero-padded to nine fractional digits so the string sorts the same way the
// instant does.
const SAID_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Formats `moment` as a UTC timestamp with nanosecond precision.
///
/// The output orders lexicographically in chronological order, which makes it
/// usable as the sole sort key for turns within a thread.
pub fn format_said_at(moment: DateTime<Utc>) -> String {
    moment.format(SAID_AT_FORMAT).to_string()
}

/// Returns the current instant formatted as a turn sort key.
pub fn said_at_now() -> String {
    format_said_at(Utc::now())
}
