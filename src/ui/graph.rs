use eframe::epaint::{Color32, Rounding, Stroke};
use egui::{pos2, vec2};

const LANES: [Color32; 4] = [Color32::RED, Color32::GREEN, Color32::BLUE, Color32::YELLOW];

/// Plots four lanes of history left to right. Values are divided by `range` and
/// anything in `[-1, 1]` after that fits the plot.
pub fn graph(items: &[[f32; 4]], range: f32, ui: &mut egui::Ui, modifier: impl Fn(&[f32; 4]) -> [f32; 4]) -> egui::Response {
    let height = ui.spacing().interact_size.y * 6.0;

    let (rect, response) =
        ui.allocate_exact_size(vec2(ui.available_rect_before_wrap().width(), height), egui::Sense::hover());

    let rect = rect.shrink(ui.visuals().noninteractive().bg_stroke.width);
    let height = height - (ui.visuals().noninteractive().bg_stroke.width * 2.0);

    ui.painter().rect_filled(response.rect, Rounding::ZERO, Color32::BLACK);
    ui.painter().line_segment([rect.left_center(), rect.right_center()], Stroke::new(2.0, Color32::GRAY));

    if items.len() < 2 {
        return response;
    }

    let adv = rect.width() / (items.len() - 1) as f32;
    // y grows downwards, flip so positive values sit above the center line
    let lane_y = |v: f32| rect.min.y + (1.0 - ((v / range).clamp(-1.0, 1.0) + 1.0) / 2.0) * height;

    for (i, pair) in items.windows(2).enumerate() {
        let item0 = modifier(&pair[0]);
        let item1 = modifier(&pair[1]);
        let left = rect.min.x + adv * i as f32;
        let right = left + adv;

        for (lane, color) in LANES.iter().enumerate() {
            ui.painter().line_segment(
                [pos2(left, lane_y(item0[lane])), pos2(right, lane_y(item1[lane]))],
                Stroke::new(2.0, *color),
            );
        }
    }

    ui.painter().rect(response.rect, Rounding::ZERO, Color32::TRANSPARENT, ui.visuals().noninteractive().bg_stroke);
    response
}
