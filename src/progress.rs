//! Progress-sink trait for conversion status events.
//!
//! The pipeline pushes a monotonically non-decreasing fraction in `[0, 1]`
//! plus a short status string into the sink as it renders slides and
//! recompresses pages. The sink is purely observational: a conversion
//! succeeds or fails identically whether or not anyone is listening.

/// Receives fractional progress from the conversion pipeline.
///
/// Implementations must be `Send + Sync`; the default method is a no-op so
/// callers only wire up what they care about.
pub trait ProgressSink: Send + Sync {
    /// `fraction` is in `[0, 1]` and never decreases over one conversion.
    /// `status` is a short human-readable phase description.
    fn progress(&self, fraction: f32, status: &str) {
        let _ = (fraction, status);
    }
}

/// Sink for callers that don't need progress events.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// Adapter that maps a component's local `[0, 1]` progress into a
/// sub-interval of the whole conversion. The driver hands each pipeline
/// stage a scaled view so the overall fraction stays monotonic across
/// stage boundaries.
pub(crate) struct ScaledProgress<'a> {
    sink: &'a dyn ProgressSink,
    lo: f32,
    hi: f32,
}

impl<'a> ScaledProgress<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, lo: f32, hi: f32) -> ScaledProgress<'a> {
        ScaledProgress { sink, lo, hi }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn progress(&self, fraction: f32, status: &str) {
        let clamped = fraction.clamp(0.0, 1.0);
        self.sink
            .progress(self.lo + (self.hi - self.lo) * clamped, status);
    }
}

/// Test sink that records every event it receives.
#[cfg(test)]
pub(crate) struct RecordingSink {
    pub(crate) events: std::sync::Mutex<Vec<(f32, String)>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn new() -> RecordingSink {
        RecordingSink {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl ProgressSink for RecordingSink {
    fn progress(&self, fraction: f32, status: &str) {
        self.events
            .lock()
            .unwrap()
            .push((fraction, status.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_progress_maps_into_sub_interval() {
        let sink = RecordingSink::new();
        let scaled = ScaledProgress::new(&sink, 0.5, 1.0);
        scaled.progress(0.0, "start");
        scaled.progress(0.5, "middle");
        scaled.progress(1.0, "end");
        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].0, 0.5);
        assert_eq!(events[1].0, 0.75);
        assert_eq!(events[2].0, 1.0);
    }

    #[test]
    fn out_of_range_fractions_are_clamped() {
        let sink = RecordingSink::new();
        let scaled = ScaledProgress::new(&sink, 0.0, 0.8);
        scaled.progress(-1.0, "under");
        scaled.progress(2.0, "over");
        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].0, 0.0);
        assert_eq!(events[1].0, 0.8);
    }
}
