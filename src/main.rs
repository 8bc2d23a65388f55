use crate::{
    pipe::{Sim2UI, UI2Sim},
    sim::Sim,
    ui::UI,
};

pub mod pipe;
mod sim;
mod ui;

#[profiling::function]
pub fn main() -> eframe::Result {
    gripwand::util::logger::init();

    let (ui_tx, sim_rx) = std::sync::mpsc::channel::<UI2Sim>();
    let (sim_tx, ui_rx) = std::sync::mpsc::channel::<Sim2UI>();

    Sim::run(sim_tx, sim_rx);
    UI::run(ui_tx, ui_rx)
}
