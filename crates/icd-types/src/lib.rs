//! Validated primitive types shared across the ICD lookup crates.
//!
//! Values are checked once at construction so that downstream code (the token
//! broker, the lookup pipeline) never has to re-validate credentials, symptom
//! text or confidence thresholds.

/// Errors that can occur when creating validated types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    EmptyText,
    /// The threshold was not a finite number in `0.0..=1.0`
    #[error("match threshold must be between 0.0 and 1.0, got {0}")]
    ThresholdOutOfRange(f64),
    /// The threshold could not be parsed as a number
    #[error("match threshold is not a number: {0}")]
    ThresholdNotANumber(String),
}

/// A string type that guarantees non-empty content.
///
/// Used for credential values and free-text symptom descriptions. The input is
/// trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::EmptyText`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypeError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyText);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for NonEmptyText {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Confidence floor for autocode matches, always within `0.0..=1.0`.
///
/// Results scoring below the threshold are informational only.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct MatchThreshold(f64);

impl MatchThreshold {
    pub const DEFAULT: MatchThreshold = MatchThreshold(0.75);

    pub fn new(value: f64) -> Result<Self, TypeError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(TypeError::ThresholdOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether `score` reaches this threshold.
    pub fn accepts(self, score: f64) -> bool {
        score >= self.0
    }
}

impl Default for MatchThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for MatchThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MatchThreshold {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| TypeError::ThresholdNotANumber(s.to_owned()))?;
        Self::new(value)
    }
}
