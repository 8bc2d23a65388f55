//! Two handed weapon handling: recoil, secondary hand aiming and the virtual
//! stock (shoulder mount).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{
    ControllerState, GripContext, GripEvent, GripScript, GripState, LerpState, SecondaryGripType, TickContext,
    TransformOverride,
};
use crate::grip::recoil::{RecoilAccumulator, RecoilSettings};
use crate::math::{Pose, SMALL_NUMBER, find_between, pure_yaw};
use crate::settings::VirtualStockSettings;
use crate::smoothing::{OneEuroFilter, OneEuroParams};

/// Smallest falloff distance used for secondary grip influence.
const MIN_INFLUENCE_DISTANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSecondarySettings {
    pub use_advanced_secondary_settings: bool,
    /// Smooth the secondary hand every frame.
    pub use_constant_grip_scaler: bool,
    /// Share of the raw hand position kept when smoothing, 1 disables smoothing.
    pub secondary_grip_scaler: f32,
    pub use_global_smoothing_settings: bool,
    pub secondary_smoothing: OneEuroParams,
    /// Fade out the secondary hand's influence the further it drifts from where it grabbed.
    pub use_secondary_grip_distance_influence: bool,
    pub grip_influence_dead_zone: f32,
    pub grip_influence_distance_to_zero: f32,
}

impl Default for AdvancedSecondarySettings {
    fn default() -> Self {
        Self {
            use_advanced_secondary_settings: false,
            use_constant_grip_scaler: false,
            secondary_grip_scaler: 1.0,
            use_global_smoothing_settings: true,
            secondary_smoothing: OneEuroParams::default(),
            use_secondary_grip_distance_influence: false,
            grip_influence_dead_zone: 50.0,
            grip_influence_distance_to_zero: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GunToolsConfig {
    /// Point, relative to the holder, that the secondary hand rotates the object around.
    pub pivot_offset: Vector3<f32>,
    pub use_virtual_stock: bool,
    pub use_global_virtual_stock_settings: bool,
    pub virtual_stock: VirtualStockSettings,
    pub advanced_secondary: AdvancedSecondarySettings,
    pub recoil: RecoilSettings,
    /// Run the full simulation on the non-authoritative side too.
    pub use_high_quality_remote_simulation: bool,
}

impl Default for GunToolsConfig {
    fn default() -> Self {
        Self {
            pivot_offset: Vector3::zeros(),
            use_virtual_stock: false,
            use_global_virtual_stock_settings: true,
            virtual_stock: VirtualStockSettings::default(),
            advanced_secondary: AdvancedSecondarySettings::default(),
            recoil: RecoilSettings::default(),
            use_high_quality_remote_simulation: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StockState {
    settings: VirtualStockSettings,
    mounted: bool,
    lerp_value: f32,
    smoothing: OneEuroFilter,
    /// Anchor resolved this tick, if any source was available.
    anchor: Option<Pose>,
}

impl StockState {
    fn new(settings: VirtualStockSettings) -> Self {
        Self {
            settings,
            mounted: false,
            lerp_value: 0.0,
            smoothing: OneEuroFilter::new(settings.stock_hand_smoothing),
            anchor: None,
        }
    }

    fn apply_settings(&mut self, settings: VirtualStockSettings) {
        self.settings = settings;
        self.smoothing = OneEuroFilter::new(settings.stock_hand_smoothing);
    }

    /// 0 at the snap distance, 1 once `snap_lerp_threshold` inside it.
    fn lerp_at(&self, distance: f32) -> f32 {
        let snap = self.settings.snap_distance;
        let threshold = self.settings.snap_lerp_threshold;
        if threshold <= 0.0 {
            return 1.0;
        }
        1.0 - ((distance - (snap - threshold)) / threshold.max(SMALL_NUMBER)).clamp(0.0, 1.0)
    }
}

pub struct GunTools {
    pub config: GunToolsConfig,
    recoil: RecoilAccumulator,
    stock: StockState,
    secondary_smoothing: OneEuroFilter,
    events: Vec<GripEvent>,
}

impl GunTools {
    pub fn new(config: GunToolsConfig) -> Self {
        Self {
            recoil: RecoilAccumulator::new(config.recoil),
            stock: StockState::new(config.virtual_stock),
            secondary_smoothing: OneEuroFilter::new(config.advanced_secondary.secondary_smoothing),
            events: Vec::new(),
            config,
        }
    }

    pub fn add_recoil(&mut self, impulse: &Pose) { self.recoil.add_recoil(impulse); }

    pub fn reset_recoil(&mut self) { self.recoil.reset(); }

    pub fn recoil(&self) -> &RecoilAccumulator { &self.recoil }

    pub fn is_mounted(&self) -> bool { self.stock.mounted }

    pub fn stock_lerp_value(&self) -> f32 { self.stock.lerp_value }

    /// Stock settings in effect for the current grip.
    pub fn virtual_stock_settings(&self) -> &VirtualStockSettings { &self.stock.settings }

    pub fn secondary_smoothing_params(&self) -> &OneEuroParams { &self.secondary_smoothing.params }

    fn reset_secondary_smoothing(&mut self, ctx: &GripContext) {
        let adv = &self.config.advanced_secondary;
        if !adv.use_constant_grip_scaler {
            return;
        }

        if adv.use_global_smoothing_settings {
            self.secondary_smoothing.params = ctx.settings.secondary_smoothing();
        }
        self.secondary_smoothing.reset();
    }

    fn set_mounted(&mut self, mounted: bool) {
        if self.stock.mounted == mounted {
            return;
        }

        self.stock.mounted = mounted;
        if mounted {
            self.stock.smoothing.reset();
        } else {
            self.stock.lerp_value = 0.0;
        }
        log::debug!("virtual stock {}", if mounted { "mounted" } else { "unmounted" });
        self.events.push(GripEvent::VirtualStockModeChanged(mounted));
    }

    fn mount_anchor(&self, ctx: &TickContext, controller: &ControllerState) -> Option<Pose> {
        let offset = self.stock.settings.snap_offset;
        let place = |source: &Pose| {
            let yaw = pure_yaw(&source.rotation);
            Pose::new(source.position + yaw * offset, yaw)
        };

        let tracking = ctx.tracking;
        if let Some(stock) = &tracking.stock {
            return Some(place(stock));
        }

        if controller.has_authority && tracking.head_tracking_allowed {
            if let Some(head) = &tracking.head {
                return Some(place(head) * controller.attach_parent);
            }
        }

        tracking.camera.as_ref().map(place)
    }

    fn update_virtual_stock(&mut self, ctx: &TickContext, controller: &ControllerState, world: &mut Pose) {
        let Some(mut anchor) = self.mount_anchor(ctx, controller) else {
            log::trace!("no virtual stock anchor this tick");
            return;
        };

        let snap = self.stock.settings.snap_distance;
        let distance_sq = (ctx.parent.position - anchor.position).norm_squared();

        if distance_sq <= snap * snap {
            self.stock.lerp_value = self.stock.lerp_at(distance_sq.sqrt());
            self.set_mounted(true);

            // Follow the primary hand vertically, the anchor only fixes the horizontal plane.
            anchor.position.z = ctx.parent.position.z;
        } else {
            self.set_mounted(false);
        }

        self.stock.anchor = Some(anchor);

        if self.stock.mounted && self.stock.settings.smooth_stock_hand {
            let smoothed = self.stock.smoothing.run(world.position, ctx.dt);
            world.position = world.position.lerp(&smoothed, self.stock.settings.smoothing_value_for_stock);
        }
    }

    /// Filters the current hand vector and eases it in while a start lerp runs.
    fn smooth_secondary(&mut self, grip: &GripState, front_loc: &mut Vector3<f32>, front_loc_orig: &Vector3<f32>, dt: f32, skip_hq: bool) {
        let adv = &self.config.advanced_secondary;
        if !skip_hq && adv.use_advanced_secondary_settings && adv.use_constant_grip_scaler {
            let smoothed = self.secondary_smoothing.run(*front_loc, dt);
            *front_loc = smoothed.lerp(front_loc, adv.secondary_grip_scaler);
        }

        if grip.secondary.lerp_state == LerpState::StartLerp {
            *front_loc = front_loc.lerp(front_loc_orig, grip.secondary.lerp_ratio());
        }
    }

    fn apply_secondary(
        &mut self,
        ctx: &TickContext,
        controller: &ControllerState,
        grip: &mut GripState,
        world: &mut Pose,
        secondary_type: SecondaryGripType,
        skip_hq: bool,
    ) {
        let base_point = ctx.parent.position;
        let pivot = ctx.parent.transform_point(&self.config.pivot_offset);
        let secondary_transform = grip.relative * ctx.parent;
        let contact_orig = secondary_transform.transform_point(&grip.secondary.relative_location) - base_point;

        let (mut front_loc, front_loc_orig) = if grip.secondary.lerp_state == LerpState::EndLerp {
            let last = grip.secondary.last_relative_location;
            (last, last.lerp(&contact_orig, grip.secondary.lerp_ratio()))
        } else {
            let Some(attachment) = grip.secondary.attachment else {
                return;
            };

            let current = match attachment.polled_location {
                Some(polled) if controller.has_authority => polled,
                _ => attachment.world_location,
            };
            let mut front_loc = current - base_point;
            self.smooth_secondary(grip, &mut front_loc, &contact_orig, ctx.dt, skip_hq);
            grip.secondary.last_relative_location = front_loc;
            (front_loc, contact_orig)
        };

        let scaler = if secondary_type == SecondaryGripType::ScalingOnly {
            Vector3::repeat(front_loc.norm() / front_loc_orig.norm().max(SMALL_NUMBER))
        } else {
            Vector3::repeat(1.0)
        };

        grip.secondary.distance = (front_loc_orig - front_loc).norm();

        let adv = &self.config.advanced_secondary;
        if !skip_hq && adv.use_advanced_secondary_settings && adv.use_secondary_grip_distance_influence {
            let falloff = adv.grip_influence_distance_to_zero.max(MIN_INFLUENCE_DISTANCE);
            let influence = 1.0 - ((grip.secondary.distance - adv.grip_influence_dead_zone) / falloff).clamp(0.0, 1.0);
            front_loc = front_loc_orig.lerp(&front_loc, influence);
        }

        let anchor = match (!skip_hq && self.config.use_virtual_stock && self.stock.mounted, self.stock.anchor) {
            (true, Some(anchor)) => Some(anchor),
            _ => None,
        };

        let correction = match (secondary_type, anchor) {
            (SecondaryGripType::ScalingOnly, None) => Pose::identity().with_scale(scaler),
            (SecondaryGripType::ScalingOnly, Some(anchor)) => {
                let mount = find_between(&front_loc_orig, &(controller.pivot.position - anchor.position));
                let free = Pose::identity().with_scale(scaler);
                let mounted = Pose::from_rotation(mount).with_scale(scaler);
                Pose::blend(&free, &mounted, self.stock.lerp_value)
            }
            (_, None) => Pose::from_rotation(find_between(&front_loc_orig, &front_loc)).with_scale(scaler),
            (_, Some(anchor)) => {
                let hand = controller.pivot.position - anchor.position;
                let aim = find_between(&hand, &(front_loc + base_point - anchor.position));
                let mount = find_between(&front_loc_orig, &hand);
                let free = Pose::from_rotation(find_between(&front_loc_orig, &front_loc)).with_scale(scaler);
                let mounted = Pose::from_rotation(aim * mount).with_scale(scaler);
                Pose::blend(&free, &mounted, self.stock.lerp_value)
            }
        };

        // Rotate and scale about the pivot rather than the origin.
        *world = *world * Pose::from_translation(-pivot) * correction * Pose::from_translation(pivot);
    }
}

impl GripScript for GunTools {
    fn override_type(&self) -> TransformOverride { TransformOverride::Overrides }

    fn is_active(&self) -> bool { true }

    fn on_grip(&mut self, ctx: &GripContext, _grip: &GripState) {
        if self.config.use_global_virtual_stock_settings && ctx.controller.locally_controlled {
            self.stock.apply_settings(ctx.settings.virtual_stock);
        }

        self.reset_secondary_smoothing(ctx);

        if self.config.use_virtual_stock {
            self.stock.smoothing.reset();
        }
    }

    fn on_secondary_grip(&mut self, ctx: &GripContext, _grip: &GripState) {
        self.reset_secondary_smoothing(ctx);

        if self.config.use_virtual_stock {
            self.stock.smoothing.reset();
        }
    }

    #[profiling::function]
    fn world_transform(&mut self, ctx: &TickContext, grip: &mut GripState, world: &mut Pose) -> bool {
        let Some(controller) = ctx.controller else {
            log::warn!("gun tools resolved without a gripping controller");
            return false;
        };

        let skip_hq = !self.config.use_high_quality_remote_simulation && !controller.has_authority;
        self.stock.anchor = None;

        self.recoil.tick(ctx.dt);
        let base = grip.relative * grip.addition * ctx.parent;
        *world = if self.recoil.is_active() { *self.recoil.offset() * base } else { base };

        if grip.secondary.has_attachment() {
            if !skip_hq && self.config.use_virtual_stock {
                self.update_virtual_stock(ctx, controller, world);
            }
        } else {
            self.set_mounted(false);
        }

        // Runs before the check below since it can end an EndLerp.
        grip.secondary.tick_lerp(ctx.dt);

        if !grip.secondary.has_attachment() && grip.secondary.lerp_state != LerpState::EndLerp {
            return true;
        }

        let secondary_type = ctx.target.secondary_grip_type();
        if secondary_type == SecondaryGripType::Custom {
            return true;
        }

        self.apply_secondary(ctx, controller, grip, world, secondary_type, skip_hq);
        true
    }

    fn drain_events(&mut self, out: &mut Vec<GripEvent>) { out.append(&mut self.events); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grip::{GripTarget, Grippable, SecondaryAttachment, TrackingSources, recoil_impulse};
    use crate::settings::GlobalSettings;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    struct Kind(SecondaryGripType);

    impl Grippable for Kind {
        fn secondary_grip_type(&self) -> SecondaryGripType { self.0 }
    }

    struct Rig {
        tools: GunTools,
        grip: GripState,
        controller: ControllerState,
        tracking: TrackingSources,
        kind: Kind,
    }

    impl Rig {
        fn new(config: GunToolsConfig, kind: SecondaryGripType) -> Self {
            Self {
                tools: GunTools::new(config),
                grip: GripState::default(),
                controller: ControllerState::default(),
                tracking: TrackingSources::default(),
                kind: Kind(kind),
            }
        }

        fn tick(&mut self, parent: Pose) -> Pose {
            let ctx = TickContext {
                dt: 1.0 / 60.0,
                parent,
                controller: Some(&self.controller),
                tracking: &self.tracking,
                target: GripTarget::root(&self.kind),
                is_teleport: false,
            };
            let mut world = Pose::identity();
            assert!(self.tools.world_transform(&ctx, &mut self.grip, &mut world));
            world
        }

        fn events(&mut self) -> Vec<GripEvent> {
            let mut out = Vec::new();
            self.tools.drain_events(&mut out);
            out
        }
    }

    fn stock_config(threshold: f32) -> GunToolsConfig {
        GunToolsConfig {
            use_virtual_stock: true,
            use_global_virtual_stock_settings: false,
            virtual_stock: VirtualStockSettings { snap_distance: 35.0, snap_lerp_threshold: threshold, ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn single_hand_is_plain_composition() {
        let mut rig = Rig::new(GunToolsConfig::default(), SecondaryGripType::Free);
        rig.grip.relative = Pose::from_translation(Vector3::new(10.0, 0.0, 0.0));
        let world = rig.tick(Pose::from_translation(Vector3::new(0.0, 5.0, 0.0)));
        assert_relative_eq!(world.position, Vector3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn missing_controller_fails() {
        let mut tools = GunTools::new(GunToolsConfig::default());
        let tracking = TrackingSources::default();
        let ctx = TickContext {
            dt: 0.01,
            parent: Pose::identity(),
            controller: None,
            tracking: &tracking,
            target: GripTarget::default(),
            is_teleport: false,
        };
        let mut world = Pose::from_translation(Vector3::new(1.0, 2.0, 3.0));
        assert!(!tools.world_transform(&ctx, &mut GripState::default(), &mut world));
        assert_eq!(world.position, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn second_hand_rotates_about_pivot() {
        let config = GunToolsConfig { pivot_offset: Vector3::new(5.0, 0.0, 0.0), ..Default::default() };
        let mut rig = Rig::new(config, SecondaryGripType::Free);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(0.0, 10.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);

        let world = rig.tick(Pose::identity());
        assert_relative_eq!(world.rotation * Vector3::x(), Vector3::y(), epsilon = 1.0e-5);
        assert_relative_eq!(world.position, Vector3::new(5.0, -5.0, 0.0), epsilon = 1.0e-4);
        assert_relative_eq!(rig.grip.secondary.distance, 200.0f32.sqrt(), epsilon = 1.0e-4);
    }

    #[test]
    fn custom_type_is_left_alone() {
        let mut rig = Rig::new(GunToolsConfig::default(), SecondaryGripType::Custom);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(0.0, 10.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        let world = rig.tick(Pose::identity());
        assert_eq!(world, Pose::identity());
    }

    #[test]
    fn scaling_only_scales_without_rotating() {
        let mut rig = Rig::new(GunToolsConfig::default(), SecondaryGripType::ScalingOnly);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(0.0, 20.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        let world = rig.tick(Pose::identity());
        assert_relative_eq!(world.scale, Vector3::repeat(2.0), epsilon = 1.0e-5);
        assert_relative_eq!(world.rotation.angle(), 0.0, epsilon = 1.0e-5);
    }

    #[test]
    fn polled_location_needs_authority() {
        let attachment = SecondaryAttachment {
            world_location: Vector3::new(0.0, 10.0, 0.0),
            polled_location: Some(Vector3::new(0.0, -10.0, 0.0)),
        };

        let mut rig = Rig::new(GunToolsConfig::default(), SecondaryGripType::Free);
        rig.grip.begin_secondary(attachment, Vector3::new(10.0, 0.0, 0.0), 0.0);
        let world = rig.tick(Pose::identity());
        assert_relative_eq!(world.rotation * Vector3::x(), -Vector3::y(), epsilon = 1.0e-5);

        rig.controller.has_authority = false;
        let world = rig.tick(Pose::identity());
        assert_relative_eq!(world.rotation * Vector3::x(), Vector3::y(), epsilon = 1.0e-5);
    }

    #[test]
    fn end_lerp_eases_back_to_single_hand() {
        let mut rig = Rig::new(GunToolsConfig::default(), SecondaryGripType::Free);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(0.0, 10.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        rig.tick(Pose::identity());

        rig.grip.secondary.lerp_to_rate = 0.5;
        rig.grip.end_secondary();
        assert_eq!(rig.grip.secondary.lerp_state, LerpState::EndLerp);

        let first = rig.tick(Pose::identity());
        let angle_first = first.rotation.angle();
        assert!(angle_first > 1.2, "released hand should not pop, got {angle_first}");

        let mut last = first;
        while rig.grip.secondary.lerp_state == LerpState::EndLerp {
            last = rig.tick(Pose::identity());
        }
        assert!(last.rotation.angle() < angle_first);
        let settled = rig.tick(Pose::identity());
        assert_eq!(settled, Pose::identity());
    }

    #[test]
    fn start_lerp_eases_in() {
        let mut rig = Rig::new(GunToolsConfig::default(), SecondaryGripType::Free);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(0.0, 10.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.5);

        let first = rig.tick(Pose::identity()).rotation.angle();
        assert!(first < std::f32::consts::FRAC_PI_2 * 0.5);
        for _ in 0..60 {
            rig.tick(Pose::identity());
        }
        let settled = rig.tick(Pose::identity());
        assert_relative_eq!(settled.rotation.angle(), std::f32::consts::FRAC_PI_2, epsilon = 1.0e-4);
    }

    #[test]
    fn distance_influence_damps_far_hands() {
        let config = GunToolsConfig {
            advanced_secondary: AdvancedSecondarySettings {
                use_advanced_secondary_settings: true,
                use_secondary_grip_distance_influence: true,
                grip_influence_dead_zone: 0.0,
                grip_influence_distance_to_zero: 5.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut rig = Rig::new(config, SecondaryGripType::Free);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(0.0, 10.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        let world = rig.tick(Pose::identity());
        assert_relative_eq!(world.rotation.angle(), 0.0, epsilon = 1.0e-5);
    }

    #[test]
    fn mount_fires_once_per_transition() {
        let mut rig = Rig::new(stock_config(0.0), SecondaryGripType::Free);
        rig.tracking.stock = Some(Pose::identity());
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(60.0, 0.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);

        let mut transitions = Vec::new();
        for (step, x) in [50.0, 40.0, 35.5, 35.0, 30.0, 20.0, 30.0, 35.0, 35.5, 40.0, 60.0].into_iter().enumerate() {
            rig.grip.move_secondary(Vector3::new(x + 10.0, 0.0, 0.0), None);
            rig.tick(Pose::from_translation(Vector3::new(x, 0.0, 0.0)));
            for event in rig.events() {
                transitions.push((step, event));
            }
        }

        assert_eq!(transitions, vec![
            (3, GripEvent::VirtualStockModeChanged(true)),
            (8, GripEvent::VirtualStockModeChanged(false)),
        ]);
    }

    #[test]
    fn stock_lerp_ramps_inside_threshold() {
        let mut rig = Rig::new(stock_config(20.0), SecondaryGripType::Free);
        rig.tracking.stock = Some(Pose::identity());
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(60.0, 0.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);

        rig.tick(Pose::from_translation(Vector3::new(25.0, 0.0, 0.0)));
        assert!(rig.tools.is_mounted());
        assert_relative_eq!(rig.tools.stock_lerp_value(), 0.5, epsilon = 1.0e-5);

        rig.tick(Pose::from_translation(Vector3::new(10.0, 0.0, 0.0)));
        assert_relative_eq!(rig.tools.stock_lerp_value(), 1.0);

        rig.tick(Pose::from_translation(Vector3::new(34.0, 0.0, 0.0)));
        assert_relative_eq!(rig.tools.stock_lerp_value(), 0.05, epsilon = 1.0e-5);

        rig.tick(Pose::from_translation(Vector3::new(36.0, 0.0, 0.0)));
        assert!(!rig.tools.is_mounted());
        assert_eq!(rig.tools.stock_lerp_value(), 0.0);
    }

    #[test]
    fn releasing_second_hand_unmounts() {
        let mut rig = Rig::new(stock_config(0.0), SecondaryGripType::Free);
        rig.tracking.stock = Some(Pose::identity());
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(20.0, 0.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        rig.tick(Pose::from_translation(Vector3::new(10.0, 0.0, 0.0)));
        assert_eq!(rig.events(), vec![GripEvent::VirtualStockModeChanged(true)]);

        rig.grip.end_secondary();
        rig.tick(Pose::from_translation(Vector3::new(10.0, 0.0, 0.0)));
        assert_eq!(rig.events(), vec![GripEvent::VirtualStockModeChanged(false)]);
        rig.tick(Pose::from_translation(Vector3::new(10.0, 0.0, 0.0)));
        assert!(rig.events().is_empty());
    }

    #[test]
    fn no_anchor_skips_mount_test() {
        let mut rig = Rig::new(stock_config(0.0), SecondaryGripType::Free);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(20.0, 0.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        rig.tick(Pose::identity());
        assert!(!rig.tools.is_mounted());
        assert!(rig.events().is_empty());
    }

    #[test]
    fn remote_side_skips_virtual_stock() {
        let mut rig = Rig::new(stock_config(0.0), SecondaryGripType::Free);
        rig.controller.has_authority = false;
        rig.tracking.stock = Some(Pose::identity());
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(20.0, 0.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        rig.tick(Pose::identity());
        assert!(!rig.tools.is_mounted());

        rig.tools.config.use_high_quality_remote_simulation = true;
        rig.tick(Pose::identity());
        assert!(rig.tools.is_mounted());
    }

    #[test]
    fn head_anchor_needs_authority_and_uses_yaw_only() {
        let mut rig = Rig::new(stock_config(0.0), SecondaryGripType::Free);
        rig.controller.attach_parent = Pose::from_translation(Vector3::new(100.0, 0.0, 0.0));
        let tilted = UnitQuaternion::from_euler_angles(0.3, 0.5, 0.0);
        rig.tracking.head = Some(Pose::new(Vector3::new(0.0, 0.0, 0.0), tilted));
        rig.tracking.head_tracking_allowed = true;
        rig.tools.stock.settings.snap_offset = Vector3::new(-10.0, 0.0, 0.0);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(120.0, 0.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);

        // Anchor sits at (90, 0, 0): head origin moved by the yaw-only offset, then into world space.
        rig.tick(Pose::from_translation(Vector3::new(90.0, 30.0, 0.0)));
        assert!(rig.tools.is_mounted());
        rig.tick(Pose::from_translation(Vector3::new(90.0, 36.0, 0.0)));
        assert!(!rig.tools.is_mounted());
    }

    #[test]
    fn recoil_offsets_world() {
        let config = GunToolsConfig {
            recoil: RecoilSettings { enabled: true, max_translation: Vector3::new(-5.0, 0.0, 0.0), ..Default::default() },
            ..Default::default()
        };
        let mut rig = Rig::new(config, SecondaryGripType::None);
        rig.tools.add_recoil(&recoil_impulse(Vector3::new(-5.0, 0.0, 0.0), Vector3::zeros()));

        let world = rig.tick(Pose::identity());
        assert!(world.position.x < 0.0);

        rig.tools.reset_recoil();
        let world = rig.tick(Pose::identity());
        assert_eq!(world, Pose::identity());
    }

    #[test]
    fn grip_pulls_global_stock_settings_when_local() {
        let mut tools = GunTools::new(GunToolsConfig::default());
        let mut settings = GlobalSettings::default();
        settings.virtual_stock.snap_distance = 80.0;
        settings.one_euro_min_cutoff = 3.0;

        let remote = ControllerState { locally_controlled: false, ..Default::default() };
        let ctx = GripContext { controller: &remote, object_world: Pose::identity(), settings: &settings };
        tools.on_grip(&ctx, &GripState::default());
        assert_eq!(tools.virtual_stock_settings().snap_distance, 35.0);

        let local = ControllerState::default();
        let ctx = GripContext { controller: &local, object_world: Pose::identity(), settings: &settings };
        tools.on_grip(&ctx, &GripState::default());
        assert_eq!(tools.virtual_stock_settings().snap_distance, 80.0);
        // Constant grip scaler is off, so secondary smoothing keeps its own values.
        assert_eq!(tools.secondary_smoothing_params().min_cutoff, 0.1);

        tools.config.advanced_secondary.use_constant_grip_scaler = true;
        tools.on_secondary_grip(&ctx, &GripState::default());
        assert_eq!(tools.secondary_smoothing_params().min_cutoff, 3.0);
    }

    fn shouldered(config: GunToolsConfig, kind: SecondaryGripType, stock: Vector3<f32>, second_hand: Vector3<f32>) -> Rig {
        let mut rig = Rig::new(config, kind);
        rig.tracking.stock = Some(Pose::from_translation(stock));
        rig.grip.begin_secondary(SecondaryAttachment::at(second_hand), Vector3::new(10.0, 0.0, 0.0), 0.0);
        rig
    }

    /// Moves the primary hand, and the controller pivot with it, to `parent`.
    fn tick_at(rig: &mut Rig, parent: Vector3<f32>) -> Pose {
        rig.controller.pivot = Pose::from_translation(parent);
        rig.tick(Pose::from_translation(parent))
    }

    #[test]
    fn mounted_aim_runs_from_shoulder_through_second_hand() {
        let shoulder = Vector3::new(0.0, -10.0, 0.0);
        let second_hand = Vector3::new(40.0, 20.0, 0.0);
        let mut rig = shouldered(stock_config(0.0), SecondaryGripType::Free, shoulder, second_hand);

        let world = tick_at(&mut rig, Vector3::new(20.0, 0.0, 0.0));
        assert!(rig.tools.is_mounted());
        assert_eq!(rig.tools.stock_lerp_value(), 1.0);
        assert_relative_eq!(world.rotation * Vector3::x(), (second_hand - shoulder).normalize(), epsilon = 1.0e-5);
        assert_relative_eq!(world.position, Vector3::new(20.0, 0.0, 0.0), epsilon = 1.0e-4);
        assert_relative_eq!(world.scale, Vector3::repeat(1.0));
    }

    #[test]
    fn partial_mount_blends_free_and_shouldered_aim() {
        let mut rig = shouldered(stock_config(20.0), SecondaryGripType::Free, Vector3::zeros(), Vector3::new(45.0, 20.0, 0.0));

        let world = tick_at(&mut rig, Vector3::new(25.0, 0.0, 0.0));
        assert_relative_eq!(rig.tools.stock_lerp_value(), 0.5, epsilon = 1.0e-5);

        // Free aim is 45 degrees, the shoulder line to the second hand is atan(20 / 45).
        let free = 45f32.to_radians();
        let mounted = 20f32.atan2(45.0);
        assert_relative_eq!(world.rotation.angle(), (free + mounted) * 0.5, epsilon = 1.0e-3);
        assert_relative_eq!(world.rotation.axis().map_or(0.0, |axis| axis.z), 1.0, epsilon = 1.0e-5);
    }

    #[test]
    fn scaling_only_mount_turns_toward_primary_hand() {
        let shoulder = Vector3::new(0.0, -20.0, 0.0);
        let mut rig = shouldered(stock_config(0.0), SecondaryGripType::ScalingOnly, shoulder, Vector3::new(40.0, 0.0, 0.0));

        let world = tick_at(&mut rig, Vector3::new(20.0, 0.0, 0.0));
        assert!(rig.tools.is_mounted());
        assert_relative_eq!(world.scale, Vector3::repeat(2.0), epsilon = 1.0e-5);
        assert_relative_eq!(world.rotation * Vector3::x(), Vector3::new(1.0, 1.0, 0.0).normalize(), epsilon = 1.0e-5);
        assert_relative_eq!(world.position, Vector3::new(20.0, 0.0, 0.0), epsilon = 1.0e-4);
    }

    #[test]
    fn smoothed_stock_hand_trails_sudden_moves() {
        let mut config = stock_config(0.0);
        config.virtual_stock.smooth_stock_hand = true;
        config.virtual_stock.smoothing_value_for_stock = 1.0;
        let mut rig = shouldered(config, SecondaryGripType::Free, Vector3::zeros(), Vector3::new(20.0, 0.0, 0.0));

        for _ in 0..2 {
            let world = tick_at(&mut rig, Vector3::new(10.0, 0.0, 0.0));
            assert_relative_eq!(world.position, Vector3::new(10.0, 0.0, 0.0), epsilon = 1.0e-5);
        }

        rig.grip.move_secondary(Vector3::new(22.0, 0.0, 0.0), None);
        let world = tick_at(&mut rig, Vector3::new(12.0, 0.0, 0.0));
        assert!(rig.tools.is_mounted());
        assert!(world.position.x > 10.0 && world.position.x < 11.99, "got {}", world.position.x);

        rig.tools.stock.settings.smoothing_value_for_stock = 0.0;
        let world = tick_at(&mut rig, Vector3::new(12.0, 0.0, 0.0));
        assert_relative_eq!(world.position, Vector3::new(12.0, 0.0, 0.0), epsilon = 1.0e-5);
    }

    #[test]
    fn constant_grip_scaler_smooths_second_hand() {
        let config = GunToolsConfig {
            advanced_secondary: AdvancedSecondarySettings {
                use_advanced_secondary_settings: true,
                use_constant_grip_scaler: true,
                secondary_grip_scaler: 0.0,
                use_global_smoothing_settings: false,
                secondary_smoothing: OneEuroParams { min_cutoff: 1.0, cutoff_slope: 0.0, delta_cutoff: 1.0 },
                ..Default::default()
            },
            ..Default::default()
        };
        let mut rig = Rig::new(config, SecondaryGripType::Free);
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(10.0, 0.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        for _ in 0..2 {
            assert_relative_eq!(rig.tick(Pose::identity()).rotation.angle(), 0.0, epsilon = 1.0e-5);
        }

        rig.grip.move_secondary(Vector3::new(0.0, 10.0, 0.0), None);
        let jumped = rig.tick(Pose::identity()).rotation.angle();
        assert!(jumped > 0.0 && jumped < 0.2, "got {jumped}");

        for _ in 0..600 {
            rig.tick(Pose::identity());
        }
        let settled = rig.tick(Pose::identity());
        assert_relative_eq!(settled.rotation.angle(), std::f32::consts::FRAC_PI_2, epsilon = 1.0e-3);

        // A scaler of 1 keeps the raw hand.
        rig.tools.config.advanced_secondary.secondary_grip_scaler = 1.0;
        rig.grip.move_secondary(Vector3::new(10.0, 0.0, 0.0), None);
        assert_relative_eq!(rig.tick(Pose::identity()).rotation.angle(), 0.0, epsilon = 1.0e-5);
    }

    #[test]
    fn camera_is_the_last_anchor() {
        let mut rig = Rig::new(stock_config(0.0), SecondaryGripType::Free);
        rig.tracking.head = Some(Pose::from_translation(Vector3::new(100.0, 0.0, 0.0)));
        rig.tracking.head_tracking_allowed = true;
        rig.tracking.camera = Some(Pose::identity());
        rig.grip.begin_secondary(SecondaryAttachment::at(Vector3::new(40.0, 0.0, 0.0)), Vector3::new(10.0, 0.0, 0.0), 0.0);
        let parent = Vector3::new(20.0, 0.0, 0.0);

        // Head wins while it may be used, and it is too far away.
        tick_at(&mut rig, parent);
        assert!(!rig.tools.is_mounted());

        rig.controller.has_authority = false;
        rig.tools.config.use_high_quality_remote_simulation = true;
        tick_at(&mut rig, parent);
        assert!(rig.tools.is_mounted());
        assert_eq!(rig.events(), vec![GripEvent::VirtualStockModeChanged(true)]);

        rig.controller.has_authority = true;
        rig.tracking.head_tracking_allowed = false;
        tick_at(&mut rig, parent);
        assert!(rig.tools.is_mounted());

        rig.tracking.camera = None;
        rig.tracking.head_tracking_allowed = true;
        tick_at(&mut rig, parent);
        assert!(!rig.tools.is_mounted());
    }
}
