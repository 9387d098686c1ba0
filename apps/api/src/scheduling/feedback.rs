use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// Recall quality on the 0–5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;
    /// Lowest quality that still counts as a correct answer.
    pub const PASSING: u8 = 3;

    pub fn new(value: u8) -> Result<Self, AppError> {
        if value > Self::MAX {
            return Err(AppError::Validation(format!(
                "quality must be between 0 and {}, got {value}",
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= Self::PASSING
    }
}

impl TryFrom<u8> for Quality {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

/// The ternary answer signal sent by study clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    TooEasy,
    Remembered,
    Forgotten,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::TooEasy => "too_easy",
            Feedback::Remembered => "remembered",
            Feedback::Forgotten => "forgotten",
        }
    }

    pub fn quality(&self) -> Quality {
        match self {
            Feedback::TooEasy => Quality(5),
            Feedback::Remembered => Quality(4),
            Feedback::Forgotten => Quality(2),
        }
    }
}

impl FromStr for Feedback {
    type Err = AppError;

    /// Accepts both vocabularies in use: `remembered`/`forgotten` from the
    /// study flows and `correct`/`incorrect` from practice mode.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "too_easy" => Ok(Feedback::TooEasy),
            "remembered" | "correct" => Ok(Feedback::Remembered),
            "forgotten" | "incorrect" => Ok(Feedback::Forgotten),
            other => Err(AppError::Validation(format!(
                "unknown feedback_type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
