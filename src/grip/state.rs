use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::math::{Pose, SMALL_NUMBER};

/// Countdown value at which a secondary grip lerp counts as finished.
pub const LERP_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LerpState {
    #[default]
    NotLerping,
    /// Easing into a freshly attached second hand.
    StartLerp,
    /// Easing back out after the second hand let go.
    EndLerp,
}

/// Where the second hand is this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondaryAttachment {
    pub world_location: Vector3<f32>,
    /// Freshly polled location of the other controller, when it belongs to the
    /// same owner and is tracked. Only trusted on the authoritative side.
    pub polled_location: Option<Vector3<f32>>,
}

impl SecondaryAttachment {
    pub fn at(world_location: Vector3<f32>) -> Self { Self { world_location, polled_location: None } }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondaryGripInfo {
    pub attachment: Option<SecondaryAttachment>,
    /// Contact point in the held object's space, captured when the second hand grabbed.
    pub relative_location: Vector3<f32>,
    pub lerp_state: LerpState,
    pub cur_lerp: f32,
    pub lerp_to_rate: f32,
    /// Last pivot-to-hand vector, used to ease out when the hand lets go.
    pub last_relative_location: Vector3<f32>,
    /// Distance between the original and current hand vectors, refreshed every tick.
    pub distance: f32,
}

impl Default for SecondaryGripInfo {
    fn default() -> Self {
        Self {
            attachment: None,
            relative_location: Vector3::zeros(),
            lerp_state: LerpState::NotLerping,
            cur_lerp: 0.0,
            lerp_to_rate: 0.0,
            last_relative_location: Vector3::zeros(),
            distance: 0.0,
        }
    }
}

impl SecondaryGripInfo {
    pub fn has_attachment(&self) -> bool { self.attachment.is_some() }

    /// Runs the countdown for a start or end lerp.
    pub fn tick_lerp(&mut self, dt: f32) {
        if !self.has_attachment() && self.lerp_state != LerpState::EndLerp {
            return;
        }

        match self.lerp_state {
            LerpState::StartLerp | LerpState::EndLerp => {
                self.cur_lerp -= dt;
                if self.cur_lerp <= LERP_EPSILON {
                    self.cur_lerp = 0.0;
                    self.lerp_state = LerpState::NotLerping;
                }
            }
            LerpState::NotLerping => {}
        }
    }

    /// Remaining share of the lerp, 1 when it just started and 0 when done.
    pub fn lerp_ratio(&self) -> f32 { (self.cur_lerp / self.lerp_to_rate.max(SMALL_NUMBER)).clamp(0.0, 1.0) }
}

/// Per-grip record owned by the grip controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GripState {
    /// Held object relative to the holder.
    pub relative: Pose,
    /// Static designer offset stacked on top of `relative`.
    pub addition: Pose,
    pub secondary: SecondaryGripInfo,
}

impl GripState {
    pub fn new(relative: Pose) -> Self { Self { relative, ..Default::default() } }

    pub fn begin_secondary(&mut self, attachment: SecondaryAttachment, relative_location: Vector3<f32>, lerp_to_rate: f32) {
        let info = &mut self.secondary;
        info.attachment = Some(attachment);
        info.relative_location = relative_location;
        info.lerp_to_rate = lerp_to_rate;
        info.cur_lerp = lerp_to_rate;
        info.lerp_state = if lerp_to_rate > 0.0 { LerpState::StartLerp } else { LerpState::NotLerping };
    }

    pub fn move_secondary(&mut self, world_location: Vector3<f32>, polled_location: Option<Vector3<f32>>) {
        if let Some(attachment) = self.secondary.attachment.as_mut() {
            attachment.world_location = world_location;
            attachment.polled_location = polled_location;
        }
    }

    pub fn end_secondary(&mut self) {
        let info = &mut self.secondary;
        info.attachment = None;
        info.cur_lerp = info.lerp_to_rate;
        info.lerp_state = if info.lerp_to_rate > 0.0 { LerpState::EndLerp } else { LerpState::NotLerping };
    }
}
