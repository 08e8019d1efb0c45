use lumen_gfx::pipelines::rendering_info::{GfxRenderingAttachment, GfxRenderingInfo};

use crate::attachments::AttachmentRef;
use crate::stage::{RecordingFailure, RenderStage, StageContext};

/// 由 GUI 提供的录制能力
///
/// 调用时 dynamic rendering 已经开始，目标为 surface，viewport 与 scissor 已经设置
pub trait OverlayRecorder {
    fn record_overlay(&mut self, ctx: &StageContext<'_>) -> Result<(), String>;
}

/// 在场景之上绘制 GUI，保留 surface 已有的内容
pub struct OverlayStage<R: OverlayRecorder> {
    overlay: R,
}

impl<R: OverlayRecorder> OverlayStage<R> {
    pub fn new(overlay: R) -> Self {
        Self { overlay }
    }
}

impl<R: OverlayRecorder> RenderStage for OverlayStage<R> {
    fn attachments(&self) -> Vec<AttachmentRef> {
        vec![AttachmentRef::SurfaceColor]
    }

    fn record(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RecordingFailure> {
        let ctx = &*ctx;
        let surface = ctx.surface()?;
        let rendering_info = GfxRenderingInfo::new(surface.extent, vec![GfxRenderingAttachment::color_load(surface.view)]);

        ctx.recorder.cmd_begin_rendering(ctx.cmd, &rendering_info);
        ctx.recorder.cmd_set_viewport_scissor(ctx.cmd, surface.extent);
        let result = self.overlay.record_overlay(ctx).map_err(RecordingFailure::StageFailed);
        ctx.recorder.cmd_end_rendering(ctx.cmd);
        result
    }
}
