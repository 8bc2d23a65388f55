mod graph;
mod graph3d;

use crate::{
    pipe::{Frame, Mode, Sim2UI, SimFailure, SimInformation, UI2Sim},
    ui::graph3d::Graph3D,
};
use eframe::emath::Align;
use egui::{
    Color32, Layout, TextStyle, Widget, vec2,
    widgets::{DragValue, Slider},
};
use gripwand::grip::GripEvent;
use gripwand::util;
use log::info;
use std::collections::VecDeque;

const HISTORY: usize = 100;
const EVENT_LOG: usize = 8;
/// Positions are plotted within this many units of the origin.
const POSITION_RANGE: f32 = 100.0;

pub struct UI {
    tx: std::sync::mpsc::Sender<UI2Sim>,
    rx: std::sync::mpsc::Receiver<Sim2UI>,
    startup_mode: Mode,
    info: Option<SimInformation>,
    startup_failure: Option<SimFailure>,
    runtime_failure: Option<SimFailure>,
    graph3d: Graph3D,
    rotations: VecDeque<[f32; 4]>,
    positions: VecDeque<[f32; 4]>,
    latest: Option<Frame>,
    events: VecDeque<String>,
    trace_axis: [f32; 3],
}

fn push_capped<T>(queue: &mut VecDeque<T>, item: T, cap: usize) {
    if queue.len() == cap {
        queue.pop_front();
    }
    queue.push_back(item);
}

fn describe(event: &GripEvent) -> String {
    match event {
        GripEvent::VirtualStockModeChanged(true) => "Stock mounted".to_owned(),
        GripEvent::VirtualStockModeChanged(false) => "Stock released".to_owned(),
        GripEvent::LerpToHandFinished => "Object reached the hand".to_owned(),
    }
}

impl UI {
    pub fn new(
        tx: std::sync::mpsc::Sender<UI2Sim>,
        rx: std::sync::mpsc::Receiver<Sim2UI>,
        cc: &eframe::CreationContext,
    ) -> Self {
        cc.egui_ctx.style_mut(|style| {
            for (style, font) in &mut style.text_styles {
                match style {
                    TextStyle::Body => font.size = 17.0,
                    TextStyle::Heading => font.size = 30.0,
                    _ => {}
                }
            }
        });

        Self {
            tx,
            rx,
            startup_mode: Mode::Free,
            info: None,
            startup_failure: None,
            runtime_failure: None,
            graph3d: Graph3D::new(cc),
            rotations: VecDeque::with_capacity(HISTORY),
            positions: VecDeque::with_capacity(HISTORY),
            latest: None,
            events: VecDeque::with_capacity(EVENT_LOG),
            trace_axis: [1.0, 0.0, 0.0],
        }
    }

    pub fn run(tx: std::sync::mpsc::Sender<UI2Sim>, rx: std::sync::mpsc::Receiver<Sim2UI>) -> eframe::Result<()> {
        let rtn =
            eframe::run_native("GripWand", Default::default(), Box::new(|cc| Ok(Box::new(UI::new(tx, rx, cc)))));
        info!("Frontend stopped");
        rtn
    }

    fn receive(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                Sim2UI::Running(info) => {
                    self.info = Some(info);
                    self.runtime_failure = None;
                    self.rotations.clear();
                    self.positions.clear();
                    self.events.clear();
                }
                Sim2UI::Stopped => {
                    self.info = None;
                    self.latest = None;
                }
                Sim2UI::Failure(failure) => {
                    if self.info.is_none() && self.latest.is_none() {
                        self.startup_failure = Some(failure);
                    } else {
                        self.runtime_failure = Some(failure);
                        self.info = None;
                        self.latest = None;
                    }
                }
                Sim2UI::PoseUpdate(frame) => {
                    let world = &frame.world;
                    push_capped(&mut self.rotations, util::pack(&world.rotation), HISTORY);
                    push_capped(
                        &mut self.positions,
                        [world.position.x, world.position.y, world.position.z, world.scale.x],
                        HISTORY,
                    );
                    self.latest = Some(frame);
                }
                Sim2UI::Event(event) => push_capped(&mut self.events, describe(&event), EVENT_LOG),
            }
        }
    }

    fn start_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Not Running.");
        if let Some(failure) = &self.runtime_failure {
            ui.label(egui::RichText::from(format!("{}", failure)).color(Color32::RED));
        }

        let rect = egui::Rect::from_center_size(
            ui.available_rect_before_wrap().center(),
            vec2(200.0, 50.0 + ui.spacing().item_spacing.y + ui.spacing().interact_size.y),
        );
        let cursor = vec2(
            (ui.available_rect_before_wrap().width() - rect.width()) / 2.0 - ui.spacing().item_spacing.x,
            (ui.available_rect_before_wrap().height() - rect.height()) / 2.0 - ui.spacing().item_spacing.y,
        );

        ui.horizontal(|ui| {
            ui.allocate_space(cursor);
            ui.vertical(|ui| {
                ui.allocate_space(cursor);

                egui::ComboBox::from_id_salt("ModeComboBox")
                    .width(200.0)
                    .height(50.0)
                    .selected_text(format!("{}", self.startup_mode))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.startup_mode, Mode::Free, "Free");
                        ui.selectable_value(&mut self.startup_mode, Mode::ScalingOnly, "Scaling Only");
                    });

                if ui.add_sized(vec2(200.0, 50.0), egui::Button::new("Grip")).clicked() {
                    let _ = self.tx.send(UI2Sim::Start(self.startup_mode));
                }
            });
        });
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let (mounted, recoil, secondary) = match &self.latest {
            Some(frame) => (frame.mounted, frame.recoil_active, frame.secondary),
            None => (false, false, false),
        };

        ui.horizontal(|ui| {
            let flag = |ui: &mut egui::Ui, text: &str, on: bool| {
                ui.label(egui::RichText::from(text).color(if on { Color32::GREEN } else { Color32::DARK_GRAY }));
            };
            flag(ui, "Second hand", secondary);
            flag(ui, "Stock", mounted);
            flag(ui, "Recoil", recoil);
        });

        ui.horizontal(|ui| {
            if ui.button("Fire").clicked() {
                let _ = self.tx.send(UI2Sim::FireRecoil);
            }
            if ui.button(if secondary { "Release second hand" } else { "Grab with second hand" }).clicked() {
                let _ = self.tx.send(UI2Sim::ToggleSecondary);
            }
            if ui.button("Toggle shoulder").clicked() {
                let _ = self.tx.send(UI2Sim::ToggleHeadProximity);
            }
            if ui.button("Release").clicked() {
                let _ = self.tx.send(UI2Sim::Stop);
            }
        });

        ui.label("Traced axis: ");
        ui.horizontal(|ui| {
            ui.spacing_mut().slider_width = (ui.available_width() - ui.spacing().item_spacing.x * 2.0) / 3.0;
            for (lane, color) in [Color32::RED, Color32::GREEN, Color32::BLUE].into_iter().enumerate() {
                ui.style_mut().visuals.widgets.inactive.bg_fill = color;
                Slider::new(&mut self.trace_axis[lane], -1.0..=1.0).show_value(false).ui(ui);
            }
        });
        ui.horizontal(|ui| {
            ui.spacing_mut().interact_size.x = (ui.available_width() - ui.spacing().item_spacing.x * 2.0) / 3.0;
            for (lane, color) in [Color32::RED, Color32::GREEN, Color32::BLUE].into_iter().enumerate() {
                ui.style_mut().visuals.widgets.inactive.bg_fill = color;
                DragValue::new(&mut self.trace_axis[lane]).range(-1.0..=1.0).speed(0.01).ui(ui);
            }
        });
    }
}

impl eframe::App for UI {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();
        self.receive();

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(failure) = &self.startup_failure {
                ui.scope(|ui| {
                    ui.heading(egui::RichText::from("Startup Failed").color(Color32::RED));

                    ui.separator();

                    ui.label(format!("{}", failure));
                });

                return;
            }

            if self.info.is_none() {
                self.start_screen(ui);
                return;
            }

            if let Some(inf) = &self.info {
                ui.heading("Holding");
                ui.label(format!("{} Hz, settings from {}", inf.tick_rate, inf.settings_source));
                ui.separator();
            }

            self.controls(ui);

            let rotations: Vec<[f32; 4]> = self.rotations.iter().copied().collect();
            let positions: Vec<[f32; 4]> = self.positions.iter().copied().collect();
            let trace: Vec<[f32; 4]> = rotations.iter().map(|q| util::modifier(q, self.trace_axis)).collect();

            ui.with_layout(Layout::right_to_left(Align::Min), |ui| {
                self.graph3d.draw(&trace, ui);
                ui.vertical(|ui| {
                    ui.label("Orientation");
                    graph::graph(&rotations, 1.0, ui, |q| *q);
                    ui.label("Position");
                    graph::graph(&positions, POSITION_RANGE, ui, |p| [p[0], p[1], p[2], p[3] * POSITION_RANGE * 0.5]);
                    ui.separator();
                    for event in self.events.iter().rev() {
                        ui.label(event.as_str());
                    }
                });
            });
        });
    }

    fn on_exit(&mut self, _ctx: Option<&eframe::glow::Context>) { let _ = self.tx.send(UI2Sim::Shutdown); }
}
