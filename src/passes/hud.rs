use std::time::Instant;

use glam::{Vec2, Vec3};

use crate::error::Result;
use crate::host::{FontSize, FrameContext, PassExecutor, TextAlignment, UiDrawManager, Viewport};
use crate::passes::{PassInfo, RenderPass, TargetBindings};
use crate::render_targets::{RenderTargetSet, TargetRole};

const HUD_TARGETS: &[TargetRole] = &[TargetRole::Color, TargetRole::Depth];

const REPORT_INTERVAL_US: u64 = 1_000_000;

const TEXT_COLOR: Vec3 = Vec3::splat(0.3);

/// Rolling frame statistics, reported once per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    time_accu: u64,
    frame_accu: u32,
    fps: u32,
    average_us: u64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one frame of `elapsed_us`. Returns `true` when a new report was
    /// taken, after which both accumulators are zero again.
    pub fn record(&mut self, elapsed_us: u64) -> bool {
        self.time_accu += elapsed_us;
        self.frame_accu += 1;

        if self.time_accu <= REPORT_INTERVAL_US {
            return false;
        }

        self.fps = self.frame_accu;
        self.average_us = self.time_accu / u64::from(self.frame_accu);
        self.time_accu = 0;
        self.frame_accu = 0;
        true
    }

    /// Frames counted in the last report.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Mean frame time of the last report, in microseconds.
    pub fn average_us(&self) -> u64 {
        self.average_us
    }

    pub fn accumulated_us(&self) -> u64 {
        self.time_accu
    }

    pub fn accumulated_frames(&self) -> u32 {
        self.frame_accu
    }
}

/// Draws the renderer name and frame statistics over the viewport.
pub struct HudPass {
    name: String,
    title: String,
    bindings: TargetBindings,
    stats: FrameStats,
    stats_text: String,
    previous_frame: Option<Instant>,
}

impl HudPass {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        targets: &RenderTargetSet,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            title: title.into(),
            bindings: TargetBindings::resolve(HUD_TARGETS, targets)?,
            stats: FrameStats::new(),
            stats_text: String::new(),
            previous_frame: None,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// The stats line as of the last report. Empty until the first one.
    pub fn stats_text(&self) -> &str {
        &self.stats_text
    }

    /// Feeds one frame time into the statistics and refreshes the text when
    /// a report is due.
    pub fn record_frame(&mut self, elapsed_us: u64, viewport: &Viewport) -> bool {
        if !self.stats.record(elapsed_us) {
            return false;
        }
        self.stats_text = format!(
            "Resolution [{}, {}]      FPS: {} -> each frame: {} us",
            viewport.width,
            viewport.height,
            self.stats.fps(),
            self.stats.average_us()
        );
        log::debug!("{}", self.stats_text);
        true
    }

    fn add_ui_drawables(&mut self, draw: &mut dyn UiDrawManager, frame: &FrameContext) {
        let now = Instant::now();
        if let Some(previous) = self.previous_frame.replace(now) {
            let elapsed = now.duration_since(previous).as_micros();
            self.record_frame(u64::try_from(elapsed).unwrap_or(u64::MAX), &frame.viewport);
        }

        let width = frame.viewport.width as f32;
        let height = frame.viewport.height as f32;

        draw.begin_drawable();
        draw.set_color(TEXT_COLOR);
        draw.set_font_size(FontSize::Small);
        draw.text(
            Vec2::new(width * 0.01, height * 0.97),
            &self.title,
            TextAlignment::Left,
        );
        draw.text(
            Vec2::new(width * 0.01, height * 0.95),
            &self.stats_text,
            TextAlignment::Left,
        );
        draw.end_drawable();
    }
}

impl RenderPass for HudPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn bindings(&self) -> &TargetBindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut TargetBindings {
        &mut self.bindings
    }

    fn execute(&mut self, executor: &mut dyn PassExecutor, frame: &FrameContext) -> Result<()> {
        // The draw callback borrows `self` mutably.
        let name = self.name.clone();
        let bindings = self.bindings.clone();
        let info = PassInfo {
            name: &name,
            bindings: &bindings,
            clear: self.clear_policy(),
        };
        executor.render_ui(&info, &mut |draw| self.add_ui_drawables(draw, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── FrameStats ────────────────────────────────────────────────────────

    #[test]
    fn reports_once_past_one_second() {
        let mut stats = FrameStats::new();

        let refreshed: Vec<bool> = [250_000, 250_000, 250_000, 250_001]
            .into_iter()
            .map(|us| stats.record(us))
            .collect();

        assert_eq!(refreshed, [false, false, false, true]);
        assert_eq!(stats.fps(), 4);
        assert_eq!(stats.average_us(), 1_000_001 / 4);
        assert_eq!(stats.accumulated_us(), 0);
        assert_eq!(stats.accumulated_frames(), 0);
    }

    #[test]
    fn exactly_one_second_does_not_report() {
        let mut stats = FrameStats::new();
        assert!(!stats.record(1_000_000));
        assert_eq!(stats.fps(), 0);
        assert!(stats.record(1));
        assert_eq!(stats.fps(), 2);
    }

    #[test]
    fn single_long_frame() {
        let mut stats = FrameStats::new();
        assert!(stats.record(3_000_000));
        assert_eq!(stats.fps(), 1);
        assert_eq!(stats.average_us(), 3_000_000);
    }

    // ── HudPass ───────────────────────────────────────────────────────────

    #[test]
    fn stats_text_only_changes_on_report() {
        use crate::headless::HeadlessRenderer;
        use std::rc::Rc;

        let set = RenderTargetSet::acquire(Rc::new(HeadlessRenderer::new())).unwrap();
        let mut hud = HudPass::new("hud", "View Override - Headless", &set).unwrap();
        let viewport = Viewport::new(800, 600);

        assert!(!hud.record_frame(600_000, &viewport));
        assert_eq!(hud.stats_text(), "");

        assert!(hud.record_frame(600_000, &viewport));
        assert_eq!(
            hud.stats_text(),
            "Resolution [800, 600]      FPS: 2 -> each frame: 600000 us"
        );
    }

    #[test]
    fn draws_title_and_stats() {
        use crate::headless::{ExecutedPass, HeadlessRenderer, RecordingExecutor};
        use std::rc::Rc;

        let set = RenderTargetSet::acquire(Rc::new(HeadlessRenderer::new())).unwrap();
        let mut hud = HudPass::new("hud", "View Override - Headless", &set).unwrap();
        let mut executor = RecordingExecutor::new();

        hud.execute(&mut executor, &FrameContext::new(100, 100)).unwrap();

        let [ExecutedPass::Ui { text, .. }] = executor.passes() else {
            panic!("expected one ui pass, got {:?}", executor.passes());
        };
        assert_eq!(text[0].text, "View Override - Headless");
        assert!(text[0].position.abs_diff_eq(Vec2::new(1.0, 97.0), 1e-4));
        assert_eq!(text[0].color, TEXT_COLOR);
        assert_eq!(text[0].font_size, FontSize::Small);
        assert!(text[1].position.abs_diff_eq(Vec2::new(1.0, 95.0), 1e-4));
    }
}
