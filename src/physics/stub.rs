//! No-op floor tier: nothing moves, nothing is culled, nothing pairs

use super::{BackendTier, BoxView, MotionEntry, PhysicsBackend};

#[derive(Debug, Default, Clone, Copy)]
pub struct StubBackend;

impl PhysicsBackend for StubBackend {
    fn tier(&self) -> BackendTier {
        BackendTier::Stub
    }

    fn supports_pairing(&self) -> bool {
        false
    }

    fn motion_update(
        &self,
        entries: &mut [MotionEntry],
        _dt: f32,
        _width: f32,
        _height: f32,
    ) -> Vec<usize> {
        (0..entries.len()).collect()
    }

    fn pair_collisions(&self, _sources: &[BoxView], _targets: &[BoxView]) -> Vec<(usize, usize)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_stub_keeps_everything_in_place() {
        let mut entries = [
            MotionEntry::new(Vec2::new(5.0, 5.0), Vec2::new(100.0, 0.0)),
            MotionEntry::new(Vec2::new(-5000.0, 0.0), Vec2::new(-1.0, 0.0)),
        ];
        let before = entries;
        assert_eq!(StubBackend.motion_update(&mut entries, 1.0, 800.0, 600.0), vec![0, 1]);
        assert_eq!(entries, before);
        let boxes = [BoxView::new(0.0, 0.0, 1.0, 1.0)];
        assert!(StubBackend.pair_collisions(&boxes, &boxes).is_empty());
    }
}
