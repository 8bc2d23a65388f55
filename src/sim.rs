use crate::pipe::{Frame, Mode, Sim2UI, SimFailure, SimInformation, UI2Sim};
use gripwand::grip::{
    ControllerState, GripInterfaceSettings, GripState, GrippableObject, GunTools, GunToolsConfig, LerpToHand,
    LerpToHandConfig, RecoilSettings, SecondaryAttachment, TrackingSources, recoil_impulse,
};
use gripwand::math::Pose;
use gripwand::settings::GlobalSettings;
use nalgebra::{UnitQuaternion, Vector3};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::time::Duration;

const TICK_RATE: f32 = 90.0;
const SETTINGS_PATH: &str = "gripwand.json";

/// Where the object rests before it is picked up.
const TABLE: Vector3<f32> = Vector3::new(0.0, 60.0, 0.0);
/// Object origin relative to the primary hand.
const GRIP_OFFSET: Vector3<f32> = Vector3::new(20.0, 0.0, 0.0);
/// Foregrip, in the object's space.
const FOREGRIP: Vector3<f32> = Vector3::new(20.0, 0.0, 0.0);
const SECONDARY_LERP: f32 = 0.2;

pub struct Sim {}

/// One grip of the scripted object by a scripted pair of hands.
struct Session {
    object: GrippableObject,
    grip: GripState,
    controller: ControllerState,
    tracking: TrackingSources,
    settings: GlobalSettings,
    time: f32,
    secondary: bool,
    shoulder: bool,
}

impl Session {
    fn grip(mode: Mode, settings: GlobalSettings) -> Result<Self, SimFailure> {
        let gun = GunToolsConfig {
            use_virtual_stock: true,
            recoil: RecoilSettings {
                enabled: true,
                max_translation: Vector3::new(-4.0, 0.0, 2.0),
                max_rotation: Vector3::new(0.0, -12.0, 0.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let lerp = LerpToHandConfig { interp_speed: 2.0, ..Default::default() };
        let interface = GripInterfaceSettings { secondary_grip_type: mode.grip_type(), ..Default::default() };

        let mut session = Self {
            object: GrippableObject::new(interface, Pose::from_translation(TABLE))
                .with_script(GunTools::new(gun))
                .with_script(LerpToHand::new(lerp)),
            grip: GripState::new(Pose::from_translation(GRIP_OFFSET)),
            controller: ControllerState::default(),
            tracking: TrackingSources {
                head: Some(Pose::identity()),
                head_tracking_allowed: true,
                ..Default::default()
            },
            settings,
            time: 0.0,
            secondary: false,
            shoulder: false,
        };

        session.controller.pivot = session.hand();
        if !session.object.grip(&session.controller, &session.grip, &session.settings) {
            return Err(SimFailure::GripDenied);
        }
        log::info!("gripped in {mode} mode");
        Ok(session)
    }

    /// Primary hand, swaying slowly either at the shoulder or held out in front.
    fn hand(&self) -> Pose {
        let t = self.time;
        let rest = if self.shoulder { Vector3::new(15.0, 0.0, -5.0) } else { Vector3::new(45.0, -15.0, -10.0) };
        let sway = Vector3::new(0.0, (t * 0.7).sin() * 3.0, (t * 1.1).sin() * 2.0);
        let yaw = UnitQuaternion::from_euler_angles(0.0, 0.0, (t * 0.5).sin() * 0.2);
        Pose::new(rest + sway, yaw)
    }

    /// Second hand, wandering around the foregrip.
    fn second_hand(&self, parent: &Pose) -> Vector3<f32> {
        let t = self.time;
        let wander = Vector3::new(0.0, (t * 1.3).cos() * 6.0, (t * 0.9).sin() * 4.0);
        (Pose::from_translation(GRIP_OFFSET) * *parent).transform_point(&FOREGRIP) + wander
    }

    fn toggle_secondary(&mut self) {
        if self.secondary {
            self.grip.end_secondary();
            self.object.secondary_release(&self.controller, &self.grip, &self.settings);
        } else {
            let parent = self.hand();
            let attachment = SecondaryAttachment::at(self.second_hand(&parent));
            self.grip.begin_secondary(attachment, FOREGRIP, SECONDARY_LERP);
            self.object.secondary_grip(&self.controller, &self.grip, &self.settings);
        }
        self.secondary = !self.secondary;
        log::debug!("second hand {}", if self.secondary { "attached" } else { "released" });
    }

    fn fire(&mut self) {
        if let Some(gun) = self.object.scripts.gun_tools_mut() {
            gun.add_recoil(&recoil_impulse(Vector3::new(-2.5, 0.0, 0.8), Vector3::new(0.0, -5.0, 0.0)));
        }
    }

    fn release(&mut self) {
        if self.secondary {
            self.toggle_secondary();
        }
        if self.object.release(&self.controller, &self.grip, &self.settings) {
            log::debug!("object dropped back to physics");
        }
        if let Some(gun) = self.object.scripts.gun_tools_mut() {
            gun.reset_recoil();
        }
    }

    fn tick(&mut self, dt: f32) -> Result<Frame, SimFailure> {
        self.time += dt;
        let parent = self.hand();
        self.controller.pivot = parent;
        if self.secondary {
            self.grip.move_secondary(self.second_hand(&parent), None);
        }

        if !self.object.tick(dt, parent, Some(&self.controller), &self.tracking, &mut self.grip) {
            return Err(SimFailure::Resolve);
        }

        let (mounted, recoil_active) = match self.object.scripts.gun_tools_mut() {
            Some(gun) => (gun.is_mounted(), gun.recoil().is_active()),
            None => (false, false),
        };
        Ok(Frame { world: self.object.world, mounted, recoil_active, secondary: self.secondary })
    }
}

impl Sim {
    pub fn run(tx: Sender<Sim2UI>, rx: Receiver<UI2Sim>) {
        std::thread::spawn(move || Sim::run1(tx, rx));
    }

    fn run1(tx: Sender<Sim2UI>, rx: Receiver<UI2Sim>) {
        let settings = match GlobalSettings::load_or_default(SETTINGS_PATH) {
            Ok(settings) => settings,
            Err(err) => {
                log::error!("{err}");
                let _ = tx.send(Sim2UI::Failure(SimFailure::Settings(err)));
                return;
            }
        };

        let dt = 1.0 / TICK_RATE;
        loop {
            let mode = match rx.recv() {
                Ok(UI2Sim::Start(mode)) => mode,
                Ok(UI2Sim::Shutdown) | Err(_) => return,
                Ok(_) => continue,
            };

            let mut session = match Session::grip(mode, settings) {
                Ok(session) => session,
                Err(failure) => {
                    let _ = tx.send(Sim2UI::Failure(failure));
                    continue;
                }
            };
            let info = SimInformation { settings_source: SETTINGS_PATH.to_owned(), tick_rate: TICK_RATE };
            let _ = tx.send(Sim2UI::Running(info));

            'running: loop {
                loop {
                    match rx.try_recv() {
                        Ok(UI2Sim::Shutdown) | Err(TryRecvError::Disconnected) => {
                            session.release();
                            return;
                        }
                        Ok(UI2Sim::Stop) => {
                            session.release();
                            let _ = tx.send(Sim2UI::Stopped);
                            break 'running;
                        }
                        Ok(UI2Sim::Start(_)) => {}
                        Ok(UI2Sim::FireRecoil) => session.fire(),
                        Ok(UI2Sim::ToggleSecondary) => session.toggle_secondary(),
                        Ok(UI2Sim::ToggleHeadProximity) => session.shoulder = !session.shoulder,
                        Err(TryRecvError::Empty) => break,
                    }
                }

                match session.tick(dt) {
                    Ok(frame) => {
                        if tx.send(Sim2UI::PoseUpdate(frame)).is_err() {
                            return;
                        }
                    }
                    Err(failure) => {
                        log::warn!("{failure}");
                        let _ = tx.send(Sim2UI::Failure(failure));
                        break 'running;
                    }
                }

                for event in session.object.scripts.drain_events() {
                    let _ = tx.send(Sim2UI::Event(event));
                }

                std::thread::sleep(Duration::from_secs_f32(dt));
            }
        }
    }
}
