use ash::vk;
use ash::vk::Handle;
use lumen_render_graph::stage::StageContext;
use lumen_render_graph::stages::overlay_stage::OverlayRecorder;

/// 在画面角落绘制帧信息
///
/// 代替真正的 GUI，只录制一个 quad
pub struct StatsOverlay {
    pipeline: vk::Pipeline,
    recorded_frames: u64,
}

impl Default for StatsOverlay {
    fn default() -> Self {
        Self {
            pipeline: vk::Pipeline::from_raw(0xdead_0002),
            recorded_frames: 0,
        }
    }
}

impl OverlayRecorder for StatsOverlay {
    fn record_overlay(&mut self, ctx: &StageContext<'_>) -> Result<(), String> {
        ctx.recorder.cmd_bind_pipeline(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
        ctx.recorder.cmd_draw(ctx.cmd, 6, 1, 0, 0);
        self.recorded_frames += 1;

        log::trace!(
            "overlay frame {} ({}), {} draws",
            ctx.generation,
            ctx.frame_label,
            ctx.inputs.draws.len()
        );
        Ok(())
    }
}
