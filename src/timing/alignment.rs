use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{estimate, validate_timings, TimedWord};
use crate::audio::AudioData;
use crate::error::AlignmentError;

/// Aligned timings may overrun the audio by this much before they are
/// considered malformed
const END_TOLERANCE_SECS: f64 = 0.25;

/// Precise word alignment provided by an external service
pub trait WordAligner: Send + Sync {
    /// Align `transcript` against the speech in `audio`
    fn align(
        &self,
        audio: &AudioData,
        transcript: &str,
    ) -> std::result::Result<Vec<TimedWord>, AlignmentError>;
}

/// Word timings for one scene.
///
/// Uses the aligner when one is given and it answers within `timeout` with
/// well-formed timings. Any failure is logged and replaced by estimated
/// timings over the audio duration; this never fails.
pub async fn resolve_word_timings(
    aligner: Option<Arc<dyn WordAligner>>,
    audio: &AudioData,
    transcript: &str,
    timeout: Duration,
) -> Vec<TimedWord> {
    let Some(aligner) = aligner else {
        return estimate(transcript, audio.duration);
    };

    match try_align(aligner, audio, transcript, timeout).await {
        Ok(timings) => {
            debug!("Using {} aligned word timings", timings.len());
            timings
        }
        Err(e) => {
            warn!("Precise alignment unavailable, estimating word timings: {}", e);
            estimate(transcript, audio.duration)
        }
    }
}

/// Run the aligner on the blocking pool under a timeout and check its output
pub async fn try_align(
    aligner: Arc<dyn WordAligner>,
    audio: &AudioData,
    transcript: &str,
    timeout: Duration,
) -> std::result::Result<Vec<TimedWord>, AlignmentError> {
    let owned_audio = audio.clone();
    let owned_transcript = transcript.to_string();
    let task = tokio::task::spawn_blocking(move || aligner.align(&owned_audio, &owned_transcript));

    let timings = match tokio::time::timeout(timeout, task).await {
        Err(_) => {
            return Err(AlignmentError::TimedOut {
                seconds: timeout.as_secs(),
            })
        }
        Ok(Err(join_error)) => {
            return Err(AlignmentError::ServiceFailed {
                reason: join_error.to_string(),
            })
        }
        Ok(Ok(result)) => result?,
    };

    check_aligned(&timings, transcript, audio.duration)?;
    Ok(timings)
}

fn check_aligned(
    timings: &[TimedWord],
    transcript: &str,
    audio_duration: f64,
) -> std::result::Result<(), AlignmentError> {
    if timings.is_empty() && !transcript.trim().is_empty() {
        return Err(AlignmentError::Malformed {
            reason: "no words returned for a non-empty transcript".to_string(),
        });
    }

    validate_timings(timings).map_err(|reason| AlignmentError::Malformed { reason })?;

    if let Some(last) = timings.last() {
        if last.end_time > audio_duration + END_TOLERANCE_SECS {
            return Err(AlignmentError::Malformed {
                reason: format!(
                    "last word ends at {:.2}s but the audio is {:.2}s long",
                    last.end_time, audio_duration
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAligner(Vec<TimedWord>);

    impl WordAligner for FixedAligner {
        fn align(&self, _: &AudioData, _: &str) -> std::result::Result<Vec<TimedWord>, AlignmentError> {
            Ok(self.0.clone())
        }
    }

    struct FailingAligner;

    impl WordAligner for FailingAligner {
        fn align(&self, _: &AudioData, _: &str) -> std::result::Result<Vec<TimedWord>, AlignmentError> {
            Err(AlignmentError::ServiceFailed {
                reason: "quota exceeded".to_string(),
            })
        }
    }

    struct SlowAligner;

    impl WordAligner for SlowAligner {
        fn align(&self, _: &AudioData, _: &str) -> std::result::Result<Vec<TimedWord>, AlignmentError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![TimedWord::new("late", 0.0, 1.0)])
        }
    }

    fn two_seconds() -> AudioData {
        AudioData::from_samples(vec![0.0; 48_000], 24_000, 1)
    }

    fn assert_estimated(timings: &[TimedWord], words: &[&str], total: f64) {
        let got: Vec<&str> = timings.iter().map(|t| t.word.as_str()).collect();
        assert_eq!(got, words);
        assert_eq!(timings[0].start_time, 0.0);
        assert!((timings.last().unwrap().end_time - total).abs() < 1e-9);
        for pair in timings.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[tokio::test]
    async fn test_aligned_timings_are_used() {
        let aligned = vec![TimedWord::new("Hi", 0.1, 0.6), TimedWord::new("there", 0.8, 1.9)];
        let aligner: Arc<dyn WordAligner> = Arc::new(FixedAligner(aligned.clone()));

        let timings =
            resolve_word_timings(Some(aligner), &two_seconds(), "Hi there", Duration::from_secs(5)).await;
        assert_eq!(timings, aligned);
    }

    #[tokio::test]
    async fn test_failing_aligner_falls_back_to_estimate() {
        let aligner: Arc<dyn WordAligner> = Arc::new(FailingAligner);

        let timings =
            resolve_word_timings(Some(aligner), &two_seconds(), "Hi there", Duration::from_secs(5)).await;
        assert_estimated(&timings, &["Hi", "there"], 2.0);
    }

    #[tokio::test]
    async fn test_overlapping_timings_fall_back() {
        let aligned = vec![TimedWord::new("Hi", 0.0, 1.5), TimedWord::new("there", 1.0, 2.0)];
        let aligner: Arc<dyn WordAligner> = Arc::new(FixedAligner(aligned));

        let timings =
            resolve_word_timings(Some(aligner), &two_seconds(), "Hi there", Duration::from_secs(5)).await;
        assert_estimated(&timings, &["Hi", "there"], 2.0);
    }

    #[tokio::test]
    async fn test_overrunning_timings_are_malformed() {
        let aligned = vec![TimedWord::new("Hi", 0.0, 5.0)];
        let aligner: Arc<dyn WordAligner> = Arc::new(FixedAligner(aligned));

        let result = try_align(aligner, &two_seconds(), "Hi", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(AlignmentError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_empty_result_is_malformed() {
        let aligner: Arc<dyn WordAligner> = Arc::new(FixedAligner(Vec::new()));

        let result = try_align(aligner, &two_seconds(), "Hi there", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(AlignmentError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_slow_aligner_times_out() {
        let aligner: Arc<dyn WordAligner> = Arc::new(SlowAligner);

        let result = try_align(aligner, &two_seconds(), "late", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(AlignmentError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn test_no_aligner_estimates() {
        let timings = resolve_word_timings(None, &two_seconds(), "one two three", Duration::from_secs(1)).await;
        assert_estimated(&timings, &["one", "two", "three"], 2.0);
    }
}
