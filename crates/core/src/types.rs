/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Client-supplied opaque job identifier.
pub type JobId = String;
