//! Native CPU tier
//!
//! Same motion semantics as the GPU kernel, compiled straight into the
//! binary. Pairing is deliberately not offered here: callers that need pairs
//! detect `supports_pairing() == false` and run their own per-pair loop.

use glam::Vec2;

use super::{BackendError, BackendTier, BoxView, MotionEntry, PhysicsBackend};
use crate::consts::OFFSCREEN_MARGIN;

/// Whether a point is inside the screen grown by the culling margin
#[inline]
pub fn in_play_area(pos: Vec2, width: f32, height: f32) -> bool {
    !(pos.x < -OFFSCREEN_MARGIN
        || pos.x > width + OFFSCREEN_MARGIN
        || pos.y < -OFFSCREEN_MARGIN
        || pos.y > height + OFFSCREEN_MARGIN)
}

/// Reference motion kernel shared by every CPU path
pub fn advance_entries(entries: &mut [MotionEntry], dt: f32, width: f32, height: f32) -> Vec<usize> {
    let mut survivors = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter_mut().enumerate() {
        let next = entry.pos + entry.vel * dt;
        if in_play_area(next, width, height) {
            entry.pos = next;
            survivors.push(i);
        }
    }
    survivors
}

/// Reference first-overlap scan, used to answer a failed GPU dispatch
pub fn first_overlaps(sources: &[BoxView], targets: &[BoxView]) -> Vec<(usize, usize)> {
    sources
        .iter()
        .enumerate()
        .filter_map(|(i, src)| targets.iter().position(|t| src.overlaps(t)).map(|j| (i, j)))
        .collect()
}

/// Compiled CPU motion loop
#[derive(Debug, Default)]
pub struct NativeBackend {
    _private: (),
}

impl NativeBackend {
    /// Build the tier, checking the kernel against a known answer first
    pub fn new() -> Result<Self, BackendError> {
        let mut probe = [MotionEntry::new(Vec2::ZERO, Vec2::new(33.0, 33.0))];
        let survivors = advance_entries(&mut probe, 0.5, 100.0, 100.0);
        if survivors == [0] && probe[0].truncated() == (16, 16) {
            Ok(Self { _private: () })
        } else {
            Err(BackendError::ProbeFailed)
        }
    }
}

impl PhysicsBackend for NativeBackend {
    fn tier(&self) -> BackendTier {
        BackendTier::Native
    }

    fn supports_pairing(&self) -> bool {
        false
    }

    fn motion_update(
        &self,
        entries: &mut [MotionEntry],
        dt: f32,
        width: f32,
        height: f32,
    ) -> Vec<usize> {
        advance_entries(entries, dt, width, height)
    }

    fn pair_collisions(&self, _sources: &[BoxView], _targets: &[BoxView]) -> Vec<(usize, usize)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_truncates_toward_zero() {
        let mut entries = [
            MotionEntry::new(Vec2::ZERO, Vec2::new(33.0, 33.0)),
            MotionEntry::new(Vec2::new(10.0, 10.0), Vec2::new(-3.0, -3.0)),
        ];
        let survivors = advance_entries(&mut entries, 0.5, 800.0, 600.0);
        assert_eq!(survivors, vec![0, 1]);
        assert_eq!(entries[0].truncated(), (16, 16));
        // 10 - 1.5 = 8.5 -> 8
        assert_eq!(entries[1].truncated(), (8, 8));
    }

    #[test]
    fn test_culls_past_margin() {
        let mut entries = [
            MotionEntry::new(Vec2::new(-40.0, 100.0), Vec2::new(-20.0, 0.0)),
            MotionEntry::new(Vec2::new(100.0, 100.0), Vec2::new(0.0, 0.0)),
            MotionEntry::new(Vec2::new(840.0, 100.0), Vec2::new(10.0, 0.0)),
            MotionEntry::new(Vec2::new(100.0, 640.0), Vec2::new(0.0, 20.0)),
        ];
        let before = entries[0];
        let survivors = advance_entries(&mut entries, 1.0, 800.0, 600.0);
        // -60 is out; 850 sits exactly on the margin and stays; 660 is out
        assert_eq!(survivors, vec![1, 2]);
        // Culled entries are not written back
        assert_eq!(entries[0], before);
        assert_eq!(entries[2].truncated(), (850, 100));
    }

    #[test]
    fn test_native_does_not_pair() {
        let backend = NativeBackend::new().unwrap();
        let a = [BoxView::new(0.0, 0.0, 10.0, 10.0)];
        assert!(backend.pair_collisions(&a, &a).is_empty());
        assert!(!backend.supports_pairing());
    }

    #[test]
    fn test_first_overlaps_picks_first_target() {
        let sources = [
            BoxView::new(0.0, 0.0, 4.0, 4.0),
            BoxView::new(100.0, 100.0, 4.0, 4.0),
            BoxView::new(50.0, 50.0, 4.0, 4.0),
        ];
        let targets = [
            BoxView::new(48.0, 48.0, 10.0, 10.0),
            BoxView::new(2.0, 2.0, 10.0, 10.0),
            BoxView::new(0.0, 0.0, 10.0, 10.0),
        ];
        assert_eq!(first_overlaps(&sources, &targets), vec![(0, 1), (2, 0)]);
    }

    proptest! {
        #[test]
        fn prop_zero_velocity_is_identity(
            x in -50i32..850, y in -50i32..650, dt in 0.0f32..2.0,
        ) {
            let mut entries = [MotionEntry::new(Vec2::new(x as f32, y as f32), Vec2::ZERO)];
            let survivors = advance_entries(&mut entries, dt, 800.0, 600.0);
            prop_assert_eq!(survivors, vec![0]);
            prop_assert_eq!(entries[0].truncated(), (x, y));
        }

        #[test]
        fn prop_position_is_truncated_sum(
            x in 0i32..800, y in 0i32..600,
            vx in -400.0f32..400.0, vy in -400.0f32..400.0,
            dt in 0.0f32..0.1,
        ) {
            let mut entries = [MotionEntry::new(Vec2::new(x as f32, y as f32), Vec2::new(vx, vy))];
            let survivors = advance_entries(&mut entries, dt, 800.0, 600.0);
            // At most 40px of travel never leaves the 50px margin
            prop_assert_eq!(survivors.len(), 1);
            let expect_x = (x as f32 + vx * dt) as i32;
            let expect_y = (y as f32 + vy * dt) as i32;
            prop_assert_eq!(entries[0].truncated(), (expect_x, expect_y));
        }
    }
}
