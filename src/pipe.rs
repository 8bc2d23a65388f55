use gripwand::grip::{GripEvent, SecondaryGripType};
use gripwand::math::Pose;
use gripwand::settings::SettingsError;
use std::fmt::Display;

#[derive(PartialEq, Copy, Clone)]
pub enum Mode {
    /// Free two handed aiming.
    Free,
    /// Second hand only scales the object.
    ScalingOnly,
}

impl Mode {
    pub fn grip_type(self) -> SecondaryGripType {
        match self {
            Mode::Free => SecondaryGripType::Free,
            Mode::ScalingOnly => SecondaryGripType::ScalingOnly,
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Free => write!(f, "Free"),
            Mode::ScalingOnly => write!(f, "Scaling Only"),
        }
    }
}

pub enum UI2Sim {
    /// Shuts the background down.
    Shutdown,
    /// Grips the object and starts ticking.
    Start(Mode),
    /// Releases the object and idles.
    Stop,
    /// Kicks the held object.
    FireRecoil,
    /// Grabs or lets go with the second hand.
    ToggleSecondary,
    /// Moves the primary hand to or from the shoulder.
    ToggleHeadProximity,
}

pub struct SimInformation {
    pub settings_source: String,
    pub tick_rate: f32,
}

pub enum SimFailure {
    /// Settings file exists but could not be read.
    Settings(SettingsError),
    /// The object refused the grip.
    GripDenied,
    /// A script could not resolve a pose.
    Resolve,
}

impl Display for SimFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimFailure::Settings(err) => match std::error::Error::source(err) {
                Some(source) => write!(f, "{err}: {source}"),
                None => write!(f, "{err}"),
            },
            SimFailure::GripDenied => {
                write!(f, "The object refused to be gripped.")
            }
            SimFailure::Resolve => {
                write!(f, "Grip scripts failed to resolve a pose.")
            }
        }
    }
}

/// Snapshot of one resolved tick.
pub struct Frame {
    pub world: Pose,
    pub mounted: bool,
    pub recoil_active: bool,
    pub secondary: bool,
}

pub enum Sim2UI {
    /// Simulation is running, show visualizations/controls/etc.
    Running(SimInformation),
    /// Simulation has stopped after a release.
    Stopped,
    /// Simulation has failed.
    Failure(SimFailure),
    /// Resolved pose of the held object (for visualization).
    PoseUpdate(Frame),
    /// Something a grip script reported.
    Event(GripEvent),
}
