//! Tiered batch physics backend
//!
//! Two bulk primitives (motion update and first-overlap pairing) behind one
//! trait, served by exactly one tier for the whole session:
//!
//! 1. `gpu`: wgpu compute kernels, only when an adapter and device exist
//! 2. `native`: compiled CPU loop; motion only, pairing is not offered
//! 3. `stub`: no movement, no culling, no pairs
//!
//! The resolver probes the tiers once at startup. Every probe runs inside a
//! failure boundary so a broken driver or kernel only costs a log line.

pub mod gpu;
pub mod native;
pub mod stub;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use gpu::GpuBackend;
pub use native::NativeBackend;
pub use stub::StubBackend;

/// Which implementation is serving the batch primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendTier {
    Gpu,
    Native,
    Stub,
}

impl BackendTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendTier::Gpu => "gpu",
            BackendTier::Native => "native",
            BackendTier::Stub => "stub",
        }
    }
}

/// Tier the resolver should start from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// GPU, then native, then stub
    #[default]
    Auto,
    /// Skip the GPU probe
    Native,
    /// Force the no-op floor
    Stub,
}

/// One body for the motion kernel: float shadow of an integer rect origin
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MotionEntry {
    pub pos: Vec2,
    pub vel: Vec2,
}

impl MotionEntry {
    pub fn new(pos: Vec2, vel: Vec2) -> Self {
        Self { pos, vel }
    }

    /// Integer position after truncation toward zero
    pub fn truncated(&self) -> (i32, i32) {
        (self.pos.x as i32, self.pos.y as i32)
    }
}

/// Position/size view of a rectangle for the pairing kernel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BoxView {
    pub pos: Vec2,
    pub size: Vec2,
}

impl BoxView {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Closed-interval overlap: touching edges count
    #[inline]
    pub fn overlaps(&self, other: &BoxView) -> bool {
        !(self.pos.x + self.size.x < other.pos.x
            || other.pos.x + other.size.x < self.pos.x
            || self.pos.y + self.size.y < other.pos.y
            || other.pos.y + other.size.y < self.pos.y)
    }
}

/// Failures inside a tier. Never escapes the resolver.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no compatible GPU adapter: {0}")]
    NoAdapter(String),
    #[error("GPU device request failed: {0}")]
    Device(String),
    #[error("kernel construction failed: {0}")]
    Kernel(String),
    #[error("kernel dispatch failed: {0}")]
    Dispatch(String),
    #[error("backend self-check failed")]
    ProbeFailed,
    #[error("backend panicked: {0}")]
    Panicked(String),
}

/// The two bulk primitives every tier implements
pub trait PhysicsBackend {
    fn tier(&self) -> BackendTier;

    /// Whether `pair_collisions` does real work on this tier
    fn supports_pairing(&self) -> bool;

    /// Advance each entry by `vel * dt` and return the indices still inside
    /// the screen grown by [`crate::consts::OFFSCREEN_MARGIN`]. Survivors
    /// have their positions written back.
    fn motion_update(&self, entries: &mut [MotionEntry], dt: f32, width: f32, height: f32)
    -> Vec<usize>;

    /// `(source, first overlapping target)` for every source that overlaps
    /// anything, in source order
    fn pair_collisions(&self, sources: &[BoxView], targets: &[BoxView]) -> Vec<(usize, usize)>;
}

/// Run `f`, turning a panic into a [`BackendError`]
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, BackendError>) -> Result<T, BackendError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(BackendError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The session's physics strategy: one tier, chosen once
pub struct PhysicsResolver {
    backend: Box<dyn PhysicsBackend>,
    gpu_capable: bool,
}

impl std::fmt::Debug for PhysicsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsResolver")
            .field("tier", &self.tier())
            .field("gpu_capable", &self.gpu_capable)
            .finish()
    }
}

impl PhysicsResolver {
    /// Probe the tiers in order, starting from `preference`
    pub fn resolve(preference: BackendPreference) -> Self {
        if preference == BackendPreference::Auto {
            match guarded(GpuBackend::new) {
                Ok(gpu) => {
                    log::info!("Physics backend: {} ({})", BackendTier::Gpu.as_str(), gpu.adapter_name());
                    return Self {
                        backend: Box::new(gpu),
                        gpu_capable: true,
                    };
                }
                Err(err) => log::warn!("GPU physics unavailable, falling back to native: {err}"),
            }
        }

        if preference != BackendPreference::Stub {
            match guarded(NativeBackend::new) {
                Ok(native) => {
                    log::info!("Physics backend: {}", BackendTier::Native.as_str());
                    return Self::with_backend(Box::new(native));
                }
                Err(err) => log::warn!("Native physics unavailable, using stub: {err}"),
            }
        }

        log::info!("Physics backend: {}", BackendTier::Stub.as_str());
        Self::with_backend(Box::new(StubBackend))
    }

    /// Wrap an already-built backend. The capability flag follows its tier.
    pub fn with_backend(backend: Box<dyn PhysicsBackend>) -> Self {
        let gpu_capable = backend.tier() == BackendTier::Gpu;
        Self {
            backend,
            gpu_capable,
        }
    }

    /// Session-wide capability flag: true only while the GPU tier serves
    pub fn gpu_capable(&self) -> bool {
        self.gpu_capable
    }

    pub fn tier(&self) -> BackendTier {
        self.backend.tier()
    }

    pub fn supports_pairing(&self) -> bool {
        self.backend.supports_pairing()
    }

    pub fn motion_update(
        &self,
        entries: &mut [MotionEntry],
        dt: f32,
        width: f32,
        height: f32,
    ) -> Vec<usize> {
        self.backend.motion_update(entries, dt, width, height)
    }

    pub fn pair_collisions(&self, sources: &[BoxView], targets: &[BoxView]) -> Vec<(usize, usize)> {
        self.backend.pair_collisions(sources, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_overlap_is_closed_interval() {
        let a = BoxView::new(0.0, 0.0, 10.0, 10.0);
        // Shares an edge
        assert!(a.overlaps(&BoxView::new(10.0, 0.0, 5.0, 5.0)));
        // One unit past the edge
        assert!(!a.overlaps(&BoxView::new(10.5, 0.0, 5.0, 5.0)));
        assert!(!a.overlaps(&BoxView::new(0.0, -6.0, 5.0, 5.0)));
        assert!(a.overlaps(&BoxView::new(2.0, 2.0, 1.0, 1.0)));
    }

    #[test]
    fn test_forced_native_is_not_gpu_capable() {
        let resolver = PhysicsResolver::resolve(BackendPreference::Native);
        assert_eq!(resolver.tier(), BackendTier::Native);
        assert!(!resolver.gpu_capable());
        assert!(!resolver.supports_pairing());
    }

    #[test]
    fn test_forced_stub() {
        let resolver = PhysicsResolver::resolve(BackendPreference::Stub);
        assert_eq!(resolver.tier(), BackendTier::Stub);
        assert!(!resolver.gpu_capable());
    }

    #[test]
    fn test_tier_names_match_preference_spelling() {
        assert_eq!(BackendTier::Gpu.as_str(), "gpu");
        let native: BackendPreference = serde_json::from_str(&format!("\"{}\"", BackendTier::Native.as_str())).unwrap();
        assert_eq!(native, BackendPreference::Native);
        let stub: BackendPreference = serde_json::from_str(&format!("\"{}\"", BackendTier::Stub.as_str())).unwrap();
        assert_eq!(stub, BackendPreference::Stub);
    }

    #[test]
    fn test_auto_resolves_to_some_tier() {
        // Whatever the machine offers, resolution never panics and the flag
        // agrees with the chosen tier.
        let resolver = PhysicsResolver::resolve(BackendPreference::Auto);
        assert_eq!(resolver.gpu_capable(), resolver.tier() == BackendTier::Gpu);
        assert_ne!(resolver.tier(), BackendTier::Stub);
    }

    #[test]
    fn test_guarded_catches_panics() {
        let result: Result<(), BackendError> = guarded(|| panic!("driver exploded"));
        match result {
            Err(BackendError::Panicked(msg)) => assert!(msg.contains("driver exploded")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
