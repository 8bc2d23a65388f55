use serde::{Deserialize, Serialize};

use super::{GripContext, GripEvent, GripScript, GripState, TickContext, TransformOverride};
use crate::curve::ResponseCurve;
use crate::math::{KINDA_SMALL_NUMBER, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LerpInterpolationMode {
    #[default]
    Quaternion,
    Euler,
    DualQuaternion,
}

impl LerpInterpolationMode {
    fn blend_fn(self) -> fn(&Pose, &Pose, f32) -> Pose {
        match self {
            LerpInterpolationMode::Quaternion => Pose::blend,
            LerpInterpolationMode::Euler => Pose::blend_euler,
            LerpInterpolationMode::DualQuaternion => Pose::blend_dual_quat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LerpToHandConfig {
    pub mode: LerpInterpolationMode,
    /// Linear rate in 1/s. Curve playback runs in real time and only needs this to be positive.
    pub interp_speed: f32,
    /// Skip the lerp when the object already sits this close to the hand.
    pub min_distance_for_lerp: f32,
    /// Samples the blend factor from this curve instead of ramping linearly.
    pub curve: Option<ResponseCurve>,
}

impl Default for LerpToHandConfig {
    fn default() -> Self {
        Self { mode: LerpInterpolationMode::Quaternion, interp_speed: 1.0, min_distance_for_lerp: 0.0, curve: None }
    }
}

/// Eases a freshly gripped object from where it was into the hand instead of
/// snapping it there.
pub struct LerpToHand {
    config: LerpToHandConfig,
    blend: fn(&Pose, &Pose, f32) -> Pose,
    active: bool,
    start: Pose,
    alpha: f32,
    curve_time: f32,
    events: Vec<GripEvent>,
}

impl LerpToHand {
    pub fn new(config: LerpToHandConfig) -> Self {
        Self {
            blend: config.mode.blend_fn(),
            config,
            active: false,
            start: Pose::identity(),
            alpha: 0.0,
            curve_time: 0.0,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &LerpToHandConfig { &self.config }

    /// Current blend factor toward the hand.
    pub fn alpha(&self) -> f32 { self.alpha }

    fn finish(&mut self) {
        self.active = false;
        log::debug!("lerp to hand finished");
        self.events.push(GripEvent::LerpToHandFinished);
    }

    /// Next blend factor, and whether this is the last step.
    fn advance(&mut self, dt: f32) -> (f32, bool) {
        match &self.config.curve {
            Some(curve) => match curve.last_key_time() {
                Some(last) if self.curve_time <= last => {
                    let alpha = curve.eval(self.curve_time).clamp(0.0, 1.0);
                    self.curve_time += dt;
                    (alpha, false)
                }
                _ => {
                    self.curve_time = 0.0;
                    (1.0, true)
                }
            },
            None => {
                let mut alpha = (self.alpha + self.config.interp_speed * dt).clamp(0.0, 1.0);
                if alpha >= 1.0 - KINDA_SMALL_NUMBER {
                    alpha = 1.0;
                }
                (alpha, alpha >= 1.0)
            }
        }
    }
}

impl Default for LerpToHand {
    fn default() -> Self { Self::new(LerpToHandConfig::default()) }
}

impl GripScript for LerpToHand {
    fn override_type(&self) -> TransformOverride { TransformOverride::Modifies }

    fn is_active(&self) -> bool { self.active }

    fn on_grip(&mut self, ctx: &GripContext, grip: &GripState) {
        if self.config.interp_speed <= 0.0 {
            self.active = false;
            return;
        }

        self.start = ctx.object_world;
        self.alpha = 0.0;
        self.curve_time = 0.0;

        if self.config.min_distance_for_lerp > 0.0 {
            let target = grip.relative * ctx.controller.pivot;
            if (target.position - self.start.position).norm() < self.config.min_distance_for_lerp {
                log::trace!("object already in hand, skipping lerp");
                self.active = false;
                return;
            }
        }

        self.active = true;
    }

    fn on_grip_release(&mut self, _ctx: &GripContext, _grip: &GripState) { self.active = false; }

    #[profiling::function]
    fn world_transform(&mut self, ctx: &TickContext, _grip: &mut GripState, world: &mut Pose) -> bool {
        if self.config.interp_speed <= 0.0 {
            self.active = false;
            return true;
        }

        if !ctx.target.has_root {
            return false;
        }

        // Teleports land in the hand at once.
        let (alpha, done) = if ctx.is_teleport { (1.0, true) } else { self.advance(ctx.dt) };
        self.alpha = alpha;
        *world = (self.blend)(&self.start, world, alpha);

        if done {
            self.finish();
        }
        true
    }

    fn drain_events(&mut self, out: &mut Vec<GripEvent>) { out.append(&mut self.events); }
}
