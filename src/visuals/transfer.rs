use glam::Vec3;

/// Animation states of a looping transfer cue. The loop re-enters
/// `Approach` each cycle while the cue is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Approach,
    Grasp,
    Transit,
    Release,
}

/// Path-fraction thresholds for the phase machine.
const GRASP_AT: f32 = 0.10;
const TRANSIT_AT: f32 = 0.20;
const RELEASE_AT: f32 = 0.90;

/// How far below the endpoint midpoint the slerp center sits. Larger drop
/// flattens the arch.
const ARC_DROP: f32 = 0.5;

/// Seconds for one full approach-to-release cycle.
const CYCLE_SECONDS: f32 = 4.0;

impl TransferPhase {
    pub fn for_fraction(fraction: f32) -> Self {
        match fraction {
            f if f < GRASP_AT => TransferPhase::Approach,
            f if f < TRANSIT_AT => TransferPhase::Grasp,
            f if f < RELEASE_AT => TransferPhase::Transit,
            _ => TransferPhase::Release,
        }
    }
}

/// Arched path between a pick-up point and a put-down point.
///
/// Positions are spherically interpolated around a center dropped below the
/// endpoint midpoint, so the cue travels an arch whose apex is elevated
/// above both ends.
#[derive(Debug, Clone, Copy)]
pub struct TransferPath {
    center: Vec3,
    rel_source: Vec3,
    rel_destination: Vec3,
}

impl TransferPath {
    pub fn new(source: Vec3, destination: Vec3) -> Self {
        let center = (source + destination) * 0.5 - Vec3::Y * ARC_DROP;
        Self {
            center,
            rel_source: source - center,
            rel_destination: destination - center,
        }
    }

    pub fn source(&self) -> Vec3 {
        self.center + self.rel_source
    }

    pub fn destination(&self) -> Vec3 {
        self.center + self.rel_destination
    }

    /// Point along the arch at `fraction` in [0, 1].
    pub fn position_at(&self, fraction: f32) -> Vec3 {
        let t = fraction.clamp(0.0, 1.0);
        self.center + slerp(self.rel_source, self.rel_destination, t)
    }
}

/// Spherical interpolation of two offset vectors, interpolating length
/// linearly. Falls back to plain lerp when the vectors are near-parallel.
fn slerp(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    let from_len = from.length();
    let to_len = to.length();
    if from_len < f32::EPSILON || to_len < f32::EPSILON {
        return from.lerp(to, t);
    }

    let from_dir = from / from_len;
    let to_dir = to / to_len;
    let cos = from_dir.dot(to_dir).clamp(-1.0, 1.0);
    let angle = cos.acos();
    if angle < 1e-4 {
        return from.lerp(to, t);
    }

    let sin = angle.sin();
    let dir = from_dir * ((1.0 - t) * angle).sin() / sin + to_dir * (t * angle).sin() / sin;
    let len = from_len + (to_len - from_len) * t;
    dir * len
}

/// Drives one transfer cue along its path, looping indefinitely.
#[derive(Debug, Clone, Copy)]
pub struct TransferAnimator {
    path: TransferPath,
    fraction: f32,
}

impl TransferAnimator {
    pub fn new(path: TransferPath) -> Self {
        Self {
            path,
            fraction: 0.0,
        }
    }

    pub fn phase(&self) -> TransferPhase {
        TransferPhase::for_fraction(self.fraction)
    }

    /// Advance the loop by `dt` seconds; returns the cue position and the
    /// current phase. Wrapping past the end restarts at `Approach`.
    pub fn advance(&mut self, dt: f32) -> (Vec3, TransferPhase) {
        self.fraction = (self.fraction + dt / CYCLE_SECONDS).rem_euclid(1.0);
        (self.path.position_at(self.fraction), self.phase())
    }
}
