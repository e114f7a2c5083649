/// Backend timestamps are ISO-8601 without an offset (server local time).
pub type Timestamp = chrono::NaiveDateTime;
