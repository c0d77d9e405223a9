// ============================================================================
// ui.rs — Life GPU
// Control strip on the left of the window: model size, rule, initial state,
// key guide and throughput statistics. Returns user selections as commands.
// ============================================================================

use std::time::{Duration, Instant};

use egui_plot::{Line, Plot, PlotPoints};

use crate::config::{InitialMode, ModelSize, UI_WIDTH};
use crate::input::{Command, KEY_HELP};
use crate::rules::RULES;
use crate::stats::FrameStats;

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// What the panel displays this frame.
pub struct PanelView<'a> {
    pub model_size: ModelSize,
    pub rule_index: usize,
    pub initial_mode: InitialMode,
    pub generation: u64,
    pub vsync: bool,
    pub stats: &'a FrameStats,
}

/// Temporary one-line message shown at the bottom of the window.
#[derive(Default)]
pub struct StatusLine {
    message: Option<(String, Instant)>,
}

impl StatusLine {
    pub fn set(&mut self, msg: String, now: Instant) {
        self.message = Some((msg, now));
    }

    /// The current message; cleared once it has been shown for 5 seconds.
    pub fn current(&mut self, now: Instant) -> Option<&str> {
        let expired = matches!(
            &self.message,
            Some((_, when)) if now.duration_since(*when) >= STATUS_TIMEOUT
        );
        if expired {
            self.message = None;
        }
        self.message.as_ref().map(|(msg, _)| msg.as_str())
    }
}

/// Main entry point for the UI; called once per frame inside `Context::run`.
pub fn render_panel(ctx: &egui::Context, view: &PanelView<'_>, status: Option<&str>) -> Vec<Command> {
    let mut commands = Vec::new();

    egui::SidePanel::left("control_panel")
        .exact_width(UI_WIDTH)
        .resizable(false)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Life GPU");
                ui.separator();

                render_size_section(ui, view, &mut commands);
                ui.separator();
                render_rule_section(ui, view, &mut commands);
                ui.separator();
                render_mode_section(ui, view, &mut commands);
                ui.separator();
                render_stats_section(ui, view, &mut commands);
                ui.separator();
                render_guide_section(ui);
            });
        });

    if let Some(msg) = status {
        render_status_bar(ctx, msg);
    }
    commands
}

// ======================== Sections ========================

fn render_size_section(ui: &mut egui::Ui, view: &PanelView<'_>, commands: &mut Vec<Command>) {
    ui.label(egui::RichText::new("Model size").strong());
    let mut size = view.model_size;
    ui.horizontal_wrapped(|ui| {
        for s in ModelSize::ALL {
            ui.radio_value(&mut size, s, s.label());
        }
    });
    if size != view.model_size {
        commands.push(Command::SetModelSize(size));
    }
}

fn render_rule_section(ui: &mut egui::Ui, view: &PanelView<'_>, commands: &mut Vec<Command>) {
    ui.label(egui::RichText::new("Rule").strong());
    for (i, rule) in RULES.iter().enumerate() {
        let text = format!("{:<14} {}", rule.name, rule.descriptor);
        let label = egui::RichText::new(text).monospace();
        if ui.selectable_label(i == view.rule_index, label).clicked() && i != view.rule_index {
            commands.push(Command::SelectRule(i));
        }
    }
}

fn render_mode_section(ui: &mut egui::Ui, view: &PanelView<'_>, commands: &mut Vec<Command>) {
    ui.label(egui::RichText::new("Initial state").strong());
    let mut mode = view.initial_mode;
    for m in InitialMode::ALL {
        ui.radio_value(&mut mode, m, m.label());
    }
    if mode != view.initial_mode {
        commands.push(Command::SetInitialMode(mode));
    }
    ui.horizontal(|ui| {
        if ui.button("Restart").clicked() {
            commands.push(Command::Reset);
        }
        if ui.button("Save PNG").clicked() {
            commands.push(Command::Screenshot);
        }
    });
}

fn render_stats_section(ui: &mut egui::Ui, view: &PanelView<'_>, commands: &mut Vec<Command>) {
    egui::Grid::new("stats_grid").num_columns(2).show(ui, |ui| {
        stat_row(ui, "Generation", &view.generation.to_string());
        stat_row(ui, "Gens/sec", &format!("{:.0}", view.stats.gens_per_sec()));
        stat_row(ui, "FPS", &format!("{:.0}", view.stats.fps()));
        let uptime = view.stats.uptime(Instant::now()).as_secs();
        stat_row(ui, "Uptime", &format!("{}:{:02}", uptime / 60, uptime % 60));
    });

    let mut vsync = view.vsync;
    if ui.checkbox(&mut vsync, "VSync").changed() {
        commands.push(Command::ToggleVsync);
    }

    let points: PlotPoints = view.stats.history().collect();
    Plot::new("plot_gens_per_sec")
        .height(80.0)
        .show_axes(true)
        .show_grid(true)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .include_y(0.0)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(points).name("gens/sec"));
        });
}

fn render_guide_section(ui: &mut egui::Ui) {
    ui.collapsing("Keys", |ui| {
        egui::Grid::new("key_guide").num_columns(2).show(ui, |ui| {
            for (key, action) in KEY_HELP {
                ui.label(egui::RichText::new(*key).monospace());
                ui.label(*action);
                ui.end_row();
            }
        });
    });
}

fn stat_row(ui: &mut egui::Ui, label: &str, value: &str) {
    ui.label(label);
    ui.label(egui::RichText::new(value).monospace());
    ui.end_row();
}

// ======================== Status Bar ========================

fn render_status_bar(ctx: &egui::Context, msg: &str) {
    egui::Area::new(egui::Id::new("status_bar"))
        .anchor(egui::Align2::CENTER_BOTTOM, egui::vec2(0.0, -10.0))
        .show(ctx, |ui| {
            egui::Frame::default()
                .fill(egui::Color32::from_rgba_premultiplied(30, 80, 30, 220))
                .corner_radius(egui::CornerRadius::same(4))
                .inner_margin(egui::Margin::symmetric(12, 6))
                .show(ui, |ui| {
                    ui.label(egui::RichText::new(msg).color(egui::Color32::WHITE));
                });
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_expires() {
        let mut status = StatusLine::default();
        let now = Instant::now();
        assert!(status.current(now).is_none());
        status.set("Snapshot saved".to_string(), now);
        assert_eq!(status.current(now + Duration::from_millis(4999)), Some("Snapshot saved"));
        assert!(status.current(now + STATUS_TIMEOUT).is_none());
        assert!(status.current(now).is_none());
    }

    #[test]
    fn test_panel_renders_without_commands() {
        let ctx = egui::Context::default();
        let stats = FrameStats::new(Instant::now());
        let view = PanelView {
            model_size: ModelSize::S512,
            rule_index: 0,
            initial_mode: InitialMode::RadialRandom,
            generation: 17,
            vsync: false,
            stats: &stats,
        };
        let mut commands = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            commands = render_panel(ctx, &view, Some("hello"));
        });
        assert!(commands.is_empty());
    }
}
