use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives export progress as a percentage in [0, 100]
pub trait ProgressSink: Send {
    fn report(&mut self, percent: f64);
}

impl<F: FnMut(f64) + Send> ProgressSink for F {
    fn report(&mut self, percent: f64) {
        self(percent)
    }
}

/// Discards progress reports
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: f64) {}
}

/// Keeps reports monotonic and clamped, and reserves 100 for the end of a
/// successful export
pub struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    last: f64,
    finished: bool,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            last: 0.0,
            finished: false,
        }
    }

    /// Report `elapsed / total` as a percentage
    pub fn update(&mut self, elapsed_seconds: f64, total_seconds: f64) {
        if self.finished {
            return;
        }
        let percent = if total_seconds > 0.0 && elapsed_seconds.is_finite() {
            (elapsed_seconds / total_seconds * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let percent = percent.max(self.last);
        // 100 is only reported by `finish`
        if percent >= 100.0 {
            return;
        }
        self.last = percent;
        self.sink.report(percent);
    }

    /// Report completion; later calls are ignored
    pub fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.last = 100.0;
            self.sink.report(100.0);
        }
    }

    pub fn last(&self) -> f64 {
        self.last
    }
}

/// Cooperative cancellation flag, checked between scenes and at every
/// yield point of the frame loop
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_and_clamped() {
        let mut seen = Vec::new();
        let mut sink = |p: f64| seen.push(p);
        {
            let mut tracker = ProgressTracker::new(&mut sink);
            tracker.update(1.0, 4.0);
            tracker.update(0.5, 4.0);
            tracker.update(-3.0, 4.0);
            tracker.update(3.0, 4.0);
            tracker.update(9.0, 4.0);
            tracker.finish();
            tracker.finish();
            tracker.update(1.0, 4.0);
        }
        assert_eq!(seen, vec![25.0, 25.0, 25.0, 75.0, 100.0]);
    }

    #[test]
    fn test_zero_total_reports_zero() {
        let mut seen = Vec::new();
        let mut sink = |p: f64| seen.push(p);
        let mut tracker = ProgressTracker::new(&mut sink);
        tracker.update(1.0, 0.0);
        assert_eq!(tracker.last(), 0.0);
        drop(tracker);
        assert_eq!(seen, vec![0.0]);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
