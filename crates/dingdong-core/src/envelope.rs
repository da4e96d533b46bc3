use tracing::trace;

use crate::graph::AudioParam;

/// Lowest gain an envelope ever schedules. Exponential ramps cannot reach zero.
pub const GAIN_FLOOR: f64 = 0.0001;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeBuilder;

impl EnvelopeBuilder {
    /// Returns `false` and schedules nothing when the timing is degenerate.
    pub fn build(
        param: &mut AudioParam,
        start: f64,
        attack: f64,
        peak: f64,
        release_end: f64,
    ) -> bool {
        let peak_time = start + attack;
        let well_formed = [start, attack, peak, release_end]
            .iter()
            .all(|value| value.is_finite())
            && start < peak_time
            && peak_time < release_end;
        if !well_formed {
            trace!(start, attack, release_end, "skipping degenerate envelope");
            return false;
        }

        param
            .set_value_at_time(GAIN_FLOOR, start)
            .exponential_ramp_to_value_at_time(peak.max(GAIN_FLOOR), peak_time)
            .exponential_ramp_to_value_at_time(GAIN_FLOOR, release_end);
        true
    }
}
