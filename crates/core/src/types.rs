/// Speaker and usage primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Job primary keys are UUIDs, generated at creation.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
