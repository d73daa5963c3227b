//! # Word Timing
//!
//! Word-level timings drive the karaoke subtitles. They come either from a
//! precise alignment service or from [`estimate`], which spreads the words
//! over the speech duration by a pronunciation weight.

pub mod alignment;
pub mod estimator;

use serde::{Deserialize, Serialize};

pub use alignment::{resolve_word_timings, WordAligner};
pub use estimator::estimate;

/// A spoken word and its span inside the scene's audio, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedWord {
    pub word: String,
    #[serde(rename = "start")]
    pub start_time: f64,
    #[serde(rename = "end")]
    pub end_time: f64,
}

impl TimedWord {
    pub fn new<S: Into<String>>(word: S, start_time: f64, end_time: f64) -> Self {
        Self {
            word: word.into(),
            start_time,
            end_time,
        }
    }

    /// Length of the span in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether `time` falls inside `[start_time, end_time)`
    pub fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

/// Check that externally produced timings are usable for subtitles: every
/// span is finite with `start < end`, starts are non-decreasing and
/// neighbouring spans do not overlap (touching is fine).
pub fn validate_timings(timings: &[TimedWord]) -> Result<(), String> {
    for (i, word) in timings.iter().enumerate() {
        if !word.start_time.is_finite() || !word.end_time.is_finite() {
            return Err(format!("word {i} ('{}') has a non-finite time", word.word));
        }
        if word.start_time < 0.0 {
            return Err(format!("word {i} ('{}') starts before zero", word.word));
        }
        if word.start_time >= word.end_time {
            return Err(format!(
                "word {i} ('{}') has an empty span {:.3}-{:.3}",
                word.word, word.start_time, word.end_time
            ));
        }
        if word.word.trim().is_empty() {
            return Err(format!("word {i} is blank"));
        }
    }

    for (i, pair) in timings.windows(2).enumerate() {
        if pair[1].start_time < pair[0].end_time {
            return Err(format!(
                "word {} ('{}') overlaps the previous word",
                i + 1,
                pair[1].word
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let word = TimedWord::new("Hi", 0.0, 1.0);
        assert!(word.contains(0.0));
        assert!(word.contains(0.999));
        assert!(!word.contains(1.0));
    }

    #[test]
    fn test_touching_words_are_valid() {
        let timings = vec![TimedWord::new("Hi", 0.0, 1.0), TimedWord::new("there", 1.0, 2.0)];
        assert!(validate_timings(&timings).is_ok());
    }

    #[test]
    fn test_overlap_rejected() {
        let timings = vec![TimedWord::new("Hi", 0.0, 1.2), TimedWord::new("there", 1.0, 2.0)];
        assert!(validate_timings(&timings).is_err());
    }

    #[test]
    fn test_empty_span_rejected() {
        let timings = vec![TimedWord::new("Hi", 1.0, 1.0)];
        assert!(validate_timings(&timings).is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let timings = vec![TimedWord::new("Hi", f64::NAN, 1.0)];
        assert!(validate_timings(&timings).is_err());
    }
}
