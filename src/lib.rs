//! Grip transform resolution for held objects in VR: recoil, two handed aiming,
//! shoulder mounting and easing freshly gripped objects into the hand.

pub mod curve;
pub mod grip;
pub mod math;
pub mod settings;
pub mod smoothing;
pub mod util;
