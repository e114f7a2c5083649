//! Generation request submitted to the backend (`POST /api/generate`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Narration language of the generated video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Vi,
}

impl Language {
    /// Wire code, e.g. `"en"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Vi => "vi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "vi" => Ok(Language::Vi),
            other => Err(CoreError::Validation(format!(
                "Invalid language '{other}'. Must be one of: en, vi"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// TargetDuration
// ---------------------------------------------------------------------------

/// Target video length. Serialized as the whole number of minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TargetDuration {
    #[default]
    OneMinute,
    ThreeMinutes,
}

impl TargetDuration {
    pub fn minutes(self) -> u8 {
        match self {
            TargetDuration::OneMinute => 1,
            TargetDuration::ThreeMinutes => 3,
        }
    }
}

impl TryFrom<u8> for TargetDuration {
    type Error = CoreError;

    fn try_from(minutes: u8) -> Result<Self, Self::Error> {
        match minutes {
            1 => Ok(TargetDuration::OneMinute),
            3 => Ok(TargetDuration::ThreeMinutes),
            other => Err(CoreError::Validation(format!(
                "Unsupported duration {other} minute(s). Must be one of: 1, 3"
            ))),
        }
    }
}

impl From<TargetDuration> for u8 {
    fn from(duration: TargetDuration) -> Self {
        duration.minutes()
    }
}

impl fmt::Display for TargetDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.minutes())
    }
}

impl FromStr for TargetDuration {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let minutes: u8 = s.trim().parse().map_err(|_| {
            CoreError::Validation(format!("Duration '{s}' is not a whole number of minutes"))
        })?;
        TargetDuration::try_from(minutes)
    }
}

// ---------------------------------------------------------------------------
// JobRequest
// ---------------------------------------------------------------------------

/// A video generation request.
///
/// Construction never fails so that callers can hand over whatever the user
/// typed; [`validate`](Self::validate) is the gate applied before anything
/// goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub topic: String,
    pub language: Language,
    pub duration: TargetDuration,
}

impl JobRequest {
    pub fn new(topic: impl Into<String>, language: Language, duration: TargetDuration) -> Self {
        Self {
            topic: topic.into(),
            language,
            duration,
        }
    }

    /// Reject requests whose topic is empty or whitespace only.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_topic(&self.topic)
    }
}

/// Validate a free-text topic.
pub fn validate_topic(topic: &str) -> Result<(), CoreError> {
    if topic.trim().is_empty() {
        return Err(CoreError::Validation("Topic must not be blank".into()));
    }
    Ok(())
}
