/// Identifier for one download job. Its string form doubles as the name of
/// the job's WebSocket notification room.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
