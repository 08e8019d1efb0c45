use std::path::PathBuf;

use anyhow::Context;
use ash::vk;
use lumen_crate_tools::init_log::init_log;
use lumen_crate_tools::settings::load_toml_or_default;
use lumen_gfx::headless::HeadlessBackend;
use lumen_render_graph::render_pipeline::RenderPipelineBuilder;
use lumen_render_graph::stages::forward_stage::ForwardStage;
use lumen_render_graph::stages::overlay_stage::OverlayStage;
use lumen_render_interface::pipeline_settings::RendererSettings;
use lumen_renderer::renderer::{Renderer, TickStatus};

mod demo_scene;
mod stats_overlay;

use demo_scene::DemoScene;
use stats_overlay::StatsOverlay;

const TICK_COUNT: u64 = 240;
const DEFAULT_SETTINGS_PATH: &str = "lumen.toml";

#[derive(Default, Debug)]
struct TickSummary {
    rendered: u32,
    dropped: u32,
    recreated: u32,
}

impl TickSummary {
    fn record(&mut self, status: TickStatus) {
        match status {
            TickStatus::Rendered => self.rendered += 1,
            TickStatus::Dropped(_) => self.dropped += 1,
            TickStatus::Recreated => self.recreated += 1,
        }
    }
}

fn load_settings() -> anyhow::Result<RendererSettings> {
    let path = std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
    let settings: RendererSettings =
        load_toml_or_default(&path).with_context(|| format!("failed to load renderer settings from {}", path.display()))?;
    settings.validate().context("invalid renderer settings")?;
    Ok(settings)
}

fn main() -> anyhow::Result<()> {
    init_log();

    let settings = load_settings()?;
    let initial_extent = settings.initial_extent();
    let pipeline = RenderPipelineBuilder::new()
        .add_stage(0, "forward", ForwardStage::new().with_depth("scene-depth"))
        .add_stage(100, "overlay", OverlayStage::new(StatsOverlay::default()))
        .build()?;
    let mut renderer = Renderer::new(HeadlessBackend::new(), settings, pipeline, initial_extent)?;
    let mut scene = DemoScene::new(renderer.bindless())?;

    let mut summary = TickSummary::default();
    for tick in 0..TICK_COUNT {
        let _span = tracy_client::span!("main loop");

        // 模拟窗口尺寸改变
        if tick == TICK_COUNT / 2 {
            renderer.notify_surface_changed(vk::Extent2D {
                width: initial_extent.width / 2,
                height: initial_extent.height / 2,
            });
        }

        scene.update(tick)?;
        let status = renderer.tick(&scene.frame_inputs(tick))?;
        if status != TickStatus::Rendered {
            log::info!("tick {}: {:?}", tick, status);
        }
        summary.record(status);
    }

    let timer = renderer.timer();
    log::info!(
        "{} ticks in {:.1} ms ({:.0} fps): {:?}",
        timer.tick_count(),
        timer.total_time().as_secs_f32() * 1000.0,
        timer.average_fps(),
        summary
    );

    let gfx = renderer.destroy();
    let validation_errors = gfx.validation_errors();
    if !validation_errors.is_empty() {
        anyhow::bail!("headless device reported {} validation errors: {:?}", validation_errors.len(), validation_errors);
    }
    if gfx.live_object_count() != 0 {
        anyhow::bail!("{} gpu objects leaked", gfx.live_object_count());
    }
    log::info!("{} submissions, {} presents, no validation error", gfx.submissions().len(), gfx.presents().len());
    Ok(())
}
