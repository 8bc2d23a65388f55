//! Grip scripts and the per-tick resolution of a held object's world pose.
//!
//! The grip controller owns a [`GripState`] per held object and, every tick,
//! asks the object's [`ScriptStack`] for the pose to apply. Scripts either
//! override the world transform outright or post-process whatever the scripts
//! before them produced. Anything a script wants the host to know about is
//! queued as a [`GripEvent`] and drained once per tick.

pub mod gun_tools;
pub mod lerp_to_hand;
pub mod recoil;
pub mod state;

use serde::{Deserialize, Serialize};

use crate::math::Pose;
use crate::settings::GlobalSettings;

pub use gun_tools::{AdvancedSecondarySettings, GunTools, GunToolsConfig};
pub use lerp_to_hand::{LerpInterpolationMode, LerpToHand, LerpToHandConfig};
pub use recoil::{RecoilAccumulator, RecoilSettings, recoil_impulse};
pub use state::{GripState, LerpState, SecondaryAttachment, SecondaryGripInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecondaryGripType {
    #[default]
    None,
    Free,
    ScalingOnly,
    /// The object handles two handed movement itself.
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripEvent {
    /// The virtual stock engaged (`true`) or released (`false`).
    VirtualStockModeChanged(bool),
    LerpToHandFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOverride {
    /// Computes the world transform from scratch.
    Overrides,
    /// Adjusts the world transform produced so far.
    Modifies,
}

/// What the gripping controller looks like this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub has_authority: bool,
    pub locally_controlled: bool,
    /// Controller pivot in world space.
    pub pivot: Pose,
    /// Transform from tracking space to world space.
    pub attach_parent: Pose,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self { has_authority: true, locally_controlled: true, pivot: Pose::identity(), attach_parent: Pose::identity() }
    }
}

/// Candidate anchors for the virtual stock.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackingSources {
    /// Explicit stock component, world space.
    pub stock: Option<Pose>,
    /// Head pose in tracking space.
    pub head: Option<Pose>,
    pub head_tracking_allowed: bool,
    /// Fallback camera, world space.
    pub camera: Option<Pose>,
}

/// Capabilities a gripped object reports about itself.
pub trait Grippable {
    fn secondary_grip_type(&self) -> SecondaryGripType;
}

/// The gripped object as seen by the scripts: its root component and its
/// owning actor, either of which may implement [`Grippable`].
#[derive(Clone, Copy, Default)]
pub struct GripTarget<'a> {
    pub has_root: bool,
    pub root: Option<&'a dyn Grippable>,
    pub actor: Option<&'a dyn Grippable>,
}

impl<'a> GripTarget<'a> {
    pub fn root(root: &'a dyn Grippable) -> Self { Self { has_root: true, root: Some(root), actor: None } }

    pub fn secondary_grip_type(&self) -> SecondaryGripType {
        self.root.or(self.actor).map(|g| g.secondary_grip_type()).unwrap_or_default()
    }
}

pub struct TickContext<'a> {
    pub dt: f32,
    /// Holder's transform.
    pub parent: Pose,
    pub controller: Option<&'a ControllerState>,
    pub tracking: &'a TrackingSources,
    pub target: GripTarget<'a>,
    pub is_teleport: bool,
}

/// Passed along with grip lifecycle notifications.
pub struct GripContext<'a> {
    pub controller: &'a ControllerState,
    /// Held object's world pose at the time of the notification.
    pub object_world: Pose,
    pub settings: &'a GlobalSettings,
}

pub trait GripScript {
    fn override_type(&self) -> TransformOverride;

    fn is_active(&self) -> bool;

    fn on_grip(&mut self, _ctx: &GripContext, _grip: &GripState) {}

    fn on_grip_release(&mut self, _ctx: &GripContext, _grip: &GripState) {}

    fn on_secondary_grip(&mut self, _ctx: &GripContext, _grip: &GripState) {}

    fn on_secondary_grip_release(&mut self, _ctx: &GripContext, _grip: &GripState) {}

    /// Writes this tick's pose into `world`. Returns false when the script
    /// could not resolve a pose; the caller then keeps the previous one.
    fn world_transform(&mut self, ctx: &TickContext, grip: &mut GripState, world: &mut Pose) -> bool;

    fn drain_events(&mut self, _out: &mut Vec<GripEvent>) {}
}

pub enum Script {
    GunTools(GunTools),
    LerpToHand(LerpToHand),
}

impl From<GunTools> for Script {
    fn from(script: GunTools) -> Self { Script::GunTools(script) }
}

impl From<LerpToHand> for Script {
    fn from(script: LerpToHand) -> Self { Script::LerpToHand(script) }
}

impl Script {
    fn inner(&self) -> &dyn GripScript {
        match self {
            Script::GunTools(s) => s,
            Script::LerpToHand(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn GripScript {
        match self {
            Script::GunTools(s) => s,
            Script::LerpToHand(s) => s,
        }
    }
}

impl GripScript for Script {
    fn override_type(&self) -> TransformOverride { self.inner().override_type() }

    fn is_active(&self) -> bool { self.inner().is_active() }

    fn on_grip(&mut self, ctx: &GripContext, grip: &GripState) { self.inner_mut().on_grip(ctx, grip) }

    fn on_grip_release(&mut self, ctx: &GripContext, grip: &GripState) { self.inner_mut().on_grip_release(ctx, grip) }

    fn on_secondary_grip(&mut self, ctx: &GripContext, grip: &GripState) {
        self.inner_mut().on_secondary_grip(ctx, grip)
    }

    fn on_secondary_grip_release(&mut self, ctx: &GripContext, grip: &GripState) {
        self.inner_mut().on_secondary_grip_release(ctx, grip)
    }

    fn world_transform(&mut self, ctx: &TickContext, grip: &mut GripState, world: &mut Pose) -> bool {
        self.inner_mut().world_transform(ctx, grip, world)
    }

    fn drain_events(&mut self, out: &mut Vec<GripEvent>) { self.inner_mut().drain_events(out) }
}

/// Ordered grip scripts attached to one grippable object.
#[derive(Default)]
pub struct ScriptStack {
    scripts: Vec<Script>,
}

impl ScriptStack {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, script: impl Into<Script>) { self.scripts.push(script.into()); }

    pub fn len(&self) -> usize { self.scripts.len() }

    pub fn is_empty(&self) -> bool { self.scripts.is_empty() }

    pub fn gun_tools_mut(&mut self) -> Option<&mut GunTools> {
        self.scripts.iter_mut().find_map(|s| match s {
            Script::GunTools(g) => Some(g),
            _ => None,
        })
    }

    pub fn lerp_to_hand_mut(&mut self) -> Option<&mut LerpToHand> {
        self.scripts.iter_mut().find_map(|s| match s {
            Script::LerpToHand(l) => Some(l),
            _ => None,
        })
    }

    pub fn on_grip(&mut self, ctx: &GripContext, grip: &GripState) {
        self.scripts.iter_mut().for_each(|s| s.on_grip(ctx, grip));
    }

    pub fn on_grip_release(&mut self, ctx: &GripContext, grip: &GripState) {
        self.scripts.iter_mut().for_each(|s| s.on_grip_release(ctx, grip));
    }

    pub fn on_secondary_grip(&mut self, ctx: &GripContext, grip: &GripState) {
        self.scripts.iter_mut().for_each(|s| s.on_secondary_grip(ctx, grip));
    }

    pub fn on_secondary_grip_release(&mut self, ctx: &GripContext, grip: &GripState) {
        self.scripts.iter_mut().for_each(|s| s.on_secondary_grip_release(ctx, grip));
    }

    /// True when an active script computes the world transform itself.
    pub fn overrides(&self) -> bool {
        self.scripts.iter().any(|s| s.is_active() && s.override_type() == TransformOverride::Overrides)
    }

    /// Resolves this tick's world pose into `world`. Without an active
    /// overriding script the scripts start from `relative * addition * parent`,
    /// otherwise from the current `world`. On failure `world` is left untouched.
    #[profiling::function]
    pub fn resolve(&mut self, ctx: &TickContext, grip: &mut GripState, world: &mut Pose) -> bool {
        let mut resolved = if self.overrides() { *world } else { grip.relative * grip.addition * ctx.parent };

        for script in self.scripts.iter_mut().filter(|s| s.is_active()) {
            if !script.world_transform(ctx, grip, &mut resolved) {
                return false;
            }
        }

        *world = resolved;
        true
    }

    pub fn drain_events(&mut self) -> Vec<GripEvent> {
        let mut events = Vec::new();
        self.scripts.iter_mut().for_each(|s| s.drain_events(&mut events));
        events
    }
}

/// What a held object does when its holder teleports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TeleportBehavior {
    #[default]
    DropOnTeleport,
    /// Moves with the holder.
    TeleportAllComponents,
    /// Stays where it is, still held.
    DontTeleport,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GripInterfaceSettings {
    pub deny_gripping: bool,
    pub secondary_grip_type: SecondaryGripType,
    /// Hand the object back to physics when it is released.
    pub simulate_on_drop: bool,
    pub teleport_behavior: TeleportBehavior,
}

impl Default for GripInterfaceSettings {
    fn default() -> Self {
        Self {
            deny_gripping: false,
            secondary_grip_type: SecondaryGripType::None,
            simulate_on_drop: true,
            teleport_behavior: TeleportBehavior::DropOnTeleport,
        }
    }
}

impl Grippable for GripInterfaceSettings {
    fn secondary_grip_type(&self) -> SecondaryGripType { self.secondary_grip_type }
}

/// A held object: its grip settings, its scripts and where it currently is.
pub struct GrippableObject {
    pub settings: GripInterfaceSettings,
    pub scripts: ScriptStack,
    pub world: Pose,
    held: bool,
}

impl Grippable for GrippableObject {
    fn secondary_grip_type(&self) -> SecondaryGripType { self.settings.secondary_grip_type }
}

impl GrippableObject {
    pub fn new(settings: GripInterfaceSettings, world: Pose) -> Self {
        Self { settings, scripts: ScriptStack::new(), world, held: false }
    }

    pub fn with_script(mut self, script: impl Into<Script>) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn is_held(&self) -> bool { self.held }

    /// Returns false if the object refuses to be gripped.
    pub fn grip(&mut self, controller: &ControllerState, grip: &GripState, settings: &GlobalSettings) -> bool {
        if self.settings.deny_gripping {
            log::debug!("grip denied");
            return false;
        }

        self.held = true;
        let ctx = GripContext { controller, object_world: self.world, settings };
        self.scripts.on_grip(&ctx, grip);
        true
    }

    /// Returns true if the object should go back to simulating physics.
    pub fn release(&mut self, controller: &ControllerState, grip: &GripState, settings: &GlobalSettings) -> bool {
        self.held = false;
        let ctx = GripContext { controller, object_world: self.world, settings };
        self.scripts.on_grip_release(&ctx, grip);
        self.settings.simulate_on_drop
    }

    pub fn secondary_grip(&mut self, controller: &ControllerState, grip: &GripState, settings: &GlobalSettings) {
        let ctx = GripContext { controller, object_world: self.world, settings };
        self.scripts.on_secondary_grip(&ctx, grip);
    }

    pub fn secondary_release(&mut self, controller: &ControllerState, grip: &GripState, settings: &GlobalSettings) {
        let ctx = GripContext { controller, object_world: self.world, settings };
        self.scripts.on_secondary_grip_release(&ctx, grip);
    }

    /// Runs the scripts for one tick and moves the object if they succeed.
    pub fn tick(
        &mut self,
        dt: f32,
        parent: Pose,
        controller: Option<&ControllerState>,
        tracking: &TrackingSources,
        grip: &mut GripState,
    ) -> bool {
        self.step(dt, parent, controller, tracking, grip, false)
    }

    /// The holder jumped to `parent`. Returns true if the object moved with it.
    pub fn teleport(
        &mut self,
        parent: Pose,
        controller: &ControllerState,
        tracking: &TrackingSources,
        grip: &mut GripState,
        settings: &GlobalSettings,
    ) -> bool {
        if !self.held {
            return false;
        }

        match self.settings.teleport_behavior {
            TeleportBehavior::TeleportAllComponents => self.step(0.0, parent, Some(controller), tracking, grip, true),
            TeleportBehavior::DontTeleport => false,
            TeleportBehavior::DropOnTeleport => {
                log::debug!("dropped on teleport");
                self.release(controller, grip, settings);
                false
            }
        }
    }

    fn step(
        &mut self,
        dt: f32,
        parent: Pose,
        controller: Option<&ControllerState>,
        tracking: &TrackingSources,
        grip: &mut GripState,
        is_teleport: bool,
    ) -> bool {
        if !self.held {
            return false;
        }

        let ctx = TickContext { dt, parent, controller, tracking, target: GripTarget::root(&self.settings), is_teleport };
        self.scripts.resolve(&ctx, grip, &mut self.world)
    }
}
