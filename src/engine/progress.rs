// Animation progress: one scroll-derived scalar drives the whole sequence.
//
//   scroll region → scroll_progress() → ProgressScheduler (one pending value)
//                 → ProgressController::update() → PhaseState
//
// PhaseState is a pure function of p. The controller only remembers the last
// p (for optional smoothing) and the last phase (for transition logging).

use serde::{Deserialize, Serialize};

// ============================================================================
// PHASES
// ============================================================================

pub const DEPLOY_START:   f32 = 0.40;
pub const CONTACT_START:  f32 = 0.48;
pub const ASPIRATE_START: f32 = 0.50;
pub const CLEARED_START:  f32 = 0.75;

/// Exponent of the dissolve easing curve; below 1 front-loads visible change.
pub const DISSOLVE_EXPONENT: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Approach,
    Deploy,
    Contact,
    Aspirate,
    Cleared,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Approach, Phase::Deploy, Phase::Contact, Phase::Aspirate, Phase::Cleared,
    ];

    /// The single phase active at `p`. Intervals are half-open `[start, end)`;
    /// Cleared is closed at 1.
    pub fn at(p: f32) -> Phase {
        let p = clamp_progress(p);
        if p < DEPLOY_START {
            Phase::Approach
        } else if p < CONTACT_START {
            Phase::Deploy
        } else if p < ASPIRATE_START {
            Phase::Contact
        } else if p < CLEARED_START {
            Phase::Aspirate
        } else {
            Phase::Cleared
        }
    }

    pub fn range(self) -> (f32, f32) {
        match self {
            Phase::Approach => (0.0, DEPLOY_START),
            Phase::Deploy   => (DEPLOY_START, CONTACT_START),
            Phase::Contact  => (CONTACT_START, ASPIRATE_START),
            Phase::Aspirate => (ASPIRATE_START, CLEARED_START),
            Phase::Cleared  => (CLEARED_START, 1.0),
        }
    }

    /// Progress through this phase: 0 at or before its start, 1 at or after its end.
    pub fn local_progress(self, p: f32) -> f32 {
        let (start, end) = self.range();
        ((clamp_progress(p) - start) / (end - start)).clamp(0.0, 1.0)
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Approach => "approach",
            Phase::Deploy   => "deploy",
            Phase::Contact  => "contact",
            Phase::Aspirate => "aspirate",
            Phase::Cleared  => "cleared",
        }
    }
}

/// NaN maps to 0, everything else clamps into [0, 1].
#[inline]
pub fn clamp_progress(p: f32) -> f32 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Dissolve amount: 0 before aspiration, eased through it, 1 from cleared on.
pub fn dissolve_amount(p: f32) -> f32 {
    Phase::Aspirate.local_progress(p).powf(DISSOLVE_EXPONENT)
}

// ============================================================================
// PHASE STATE
// ============================================================================

/// Everything downstream needs to know about one progress value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseState {
    pub progress: f32,
    pub phase:    Phase,
    pub approach: f32,
    pub deploy:   f32,
    pub contact:  f32,
    pub aspirate: f32,
    pub cleared:  f32,
    /// Eased aspirate progress, 0..1.
    pub dissolve: f32,
}

impl PhaseState {
    pub fn at(p: f32) -> Self {
        let p = clamp_progress(p);
        Self {
            progress: p,
            phase:    Phase::at(p),
            approach: Phase::Approach.local_progress(p),
            deploy:   Phase::Deploy.local_progress(p),
            contact:  Phase::Contact.local_progress(p),
            aspirate: Phase::Aspirate.local_progress(p),
            cleared:  Phase::Cleared.local_progress(p),
            dissolve: dissolve_amount(p),
        }
    }

    pub fn local(&self, phase: Phase) -> f32 {
        match phase {
            Phase::Approach => self.approach,
            Phase::Deploy   => self.deploy,
            Phase::Contact  => self.contact,
            Phase::Aspirate => self.aspirate,
            Phase::Cleared  => self.cleared,
        }
    }

    pub fn clot_cleared(&self) -> bool { self.phase == Phase::Cleared }
}

// ============================================================================
// CONTROLLER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressParams {
    /// Fraction of the remaining distance covered per 60 Hz frame.
    /// 0 disables smoothing (progress snaps to its target).
    pub smoothing: f32,
}

impl Default for ProgressParams {
    fn default() -> Self {
        Self { smoothing: 0.0 }
    }
}

pub struct ProgressController {
    params:     ProgressParams,
    current:    f32,
    last_phase: Phase,
}

impl ProgressController {
    pub fn new(params: ProgressParams) -> Self {
        Self { params, current: 0.0, last_phase: Phase::Approach }
    }

    pub fn progress(&self) -> f32 { self.current }

    /// Move toward `target` and report the resulting state.
    /// Safe to call at irregular intervals and with non-monotonic targets.
    pub fn update(&mut self, target: f32, dt: f32) -> PhaseState {
        let target = clamp_progress(target);
        let s = self.params.smoothing.clamp(0.0, 1.0);
        self.current = if s <= 0.0 || s >= 1.0 {
            target
        } else {
            let alpha = 1.0 - (1.0 - s).powf(dt.max(0.0) * 60.0);
            let next = self.current + (target - self.current) * alpha;
            if (target - next).abs() < 1e-5 { target } else { next }
        };

        let state = PhaseState::at(self.current);
        if state.phase != self.last_phase {
            log::debug!(
                "phase {} → {} at p={:.3}",
                self.last_phase.name(), state.phase.name(), state.progress,
            );
            self.last_phase = state.phase;
        }
        state
    }
}

// ============================================================================
// SCROLL → PROGRESS
// ============================================================================

/// Progress of a scroll region, in the same terms as a browser layout:
/// `region_top` is the region's top edge relative to the viewport top.
///
/// Starts when the region's top enters the bottom of the viewport and reaches
/// 1 after scrolling its full height plus half a viewport.
pub fn scroll_progress(viewport_height: f32, region_top: f32, region_height: f32) -> f32 {
    let scrolled = viewport_height - region_top;
    let total = region_height + viewport_height * 0.5;
    if !(total > 0.0) {
        return 0.0;
    }
    clamp_progress(scrolled / total)
}

/// Single-flight coalescing of progress updates.
///
/// At most one value is pending; newer requests before the next frame
/// overwrite it instead of queueing.
#[derive(Debug, Default)]
pub struct ProgressScheduler {
    pending: Option<f32>,
}

impl ProgressScheduler {
    pub fn new() -> Self { Self::default() }

    /// Record a new progress value. Returns true if this request armed the
    /// scheduler (i.e. a frame should be requested), false if it only
    /// replaced an already pending value.
    pub fn request(&mut self, p: f32) -> bool {
        let armed = self.pending.is_none();
        self.pending = Some(clamp_progress(p));
        armed
    }

    /// Consume the pending value, once per frame.
    pub fn take(&mut self) -> Option<f32> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_progress_has_exactly_one_phase() {
        for i in 0..=10_000 {
            let p = i as f32 / 10_000.0;
            let active = Phase::ALL.iter()
                .filter(|ph| {
                    let (s, e) = ph.range();
                    (p >= s && p < e) || (**ph == Phase::Cleared && p == 1.0)
                })
                .count();
            assert_eq!(active, 1, "p={p}");
            let (s, e) = Phase::at(p).range();
            assert!(p >= s && (p < e || p == 1.0));
        }
    }

    #[test]
    fn phase_boundaries_are_half_open() {
        assert_eq!(Phase::at(0.0), Phase::Approach);
        assert_eq!(Phase::at(0.40), Phase::Deploy);
        assert_eq!(Phase::at(0.48), Phase::Contact);
        assert_eq!(Phase::at(0.50), Phase::Aspirate);
        assert_eq!(Phase::at(0.75), Phase::Cleared);
        assert_eq!(Phase::at(1.0), Phase::Cleared);
    }

    #[test]
    fn local_progress_is_continuous_at_thresholds() {
        for phase in Phase::ALL {
            let (s, e) = phase.range();
            assert_eq!(phase.local_progress(s), 0.0);
            assert!((phase.local_progress(e) - 1.0).abs() < 1e-6);
        }
        assert_eq!(Phase::Deploy.local_progress(0.40), 0.0);
        assert!((Phase::Deploy.local_progress(0.48) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn local_progress_is_a_level() {
        assert_eq!(Phase::Aspirate.local_progress(0.2), 0.0);
        assert_eq!(Phase::Deploy.local_progress(0.9), 1.0);
    }

    #[test]
    fn dissolve_is_monotonic_and_saturates() {
        let mut last = 0.0;
        for i in 0..=1000 {
            let p = i as f32 / 1000.0;
            let d = dissolve_amount(p);
            assert!(d >= last, "p={p}");
            last = d;
        }
        assert_eq!(dissolve_amount(0.5), 0.0);
        assert_eq!(dissolve_amount(0.75), 1.0);
        assert_eq!(dissolve_amount(0.9), 1.0);
    }

    #[test]
    fn out_of_range_progress_clamps() {
        assert_eq!(PhaseState::at(-1.0), PhaseState::at(0.0));
        assert_eq!(PhaseState::at(4.0), PhaseState::at(1.0));
        assert_eq!(PhaseState::at(f32::NAN).progress, 0.0);
    }

    #[test]
    fn controller_without_smoothing_snaps() {
        let mut c = ProgressController::new(ProgressParams::default());
        assert_eq!(c.update(0.6, 0.016).phase, Phase::Aspirate);
        assert_eq!(c.update(0.3, 0.016).phase, Phase::Approach);
        assert_eq!(c.progress(), 0.3);
    }

    #[test]
    fn controller_with_smoothing_converges() {
        let mut c = ProgressController::new(ProgressParams { smoothing: 0.2 });
        let first = c.update(1.0, 1.0 / 60.0).progress;
        assert!(first > 0.0 && first < 1.0);
        for _ in 0..600 {
            c.update(1.0, 1.0 / 60.0);
        }
        assert_eq!(c.progress(), 1.0);
    }

    #[test]
    fn scroll_progress_follows_region_position() {
        // Region top at the viewport bottom: nothing scrolled yet.
        assert_eq!(scroll_progress(800.0, 800.0, 2000.0), 0.0);
        // Halfway through height + vh/2 = 2400.
        assert!((scroll_progress(800.0, -400.0, 2000.0) - 0.5).abs() < 1e-6);
        assert_eq!(scroll_progress(800.0, -5000.0, 2000.0), 1.0);
        assert_eq!(scroll_progress(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn scheduler_keeps_only_newest_value() {
        let mut s = ProgressScheduler::new();
        assert!(s.request(0.1));
        assert!(!s.request(0.2));
        assert!(!s.request(0.3));
        assert_eq!(s.take(), Some(0.3));
        assert_eq!(s.take(), None);
        assert!(s.request(0.4));
    }
}
