use ash::vk;
use lumen_gfx::descriptors::GfxBindlessLayoutDesc;
use lumen_gfx::pipelines::rendering_info::{GfxRenderingAttachment, GfxRenderingInfo};

use crate::attachments::AttachmentRef;
use crate::stage::{DrawItem, RecordingFailure, RenderStage, StageContext};

/// 前向渲染：清除 surface，然后绘制 [`crate::stage::FrameInputs::draws`]
///
/// 每个 draw 引用的 bindless 资源会被 resolve 为 index，依次写入 push constant
#[derive(Default)]
pub struct ForwardStage {
    /// 深度 target 的名字，由 renderer 按 surface 尺寸创建
    depth_target: Option<String>,
}

impl ForwardStage {
    /// 一个 index 占 4 字节
    pub const MAX_HANDLES_PER_DRAW: usize = (GfxBindlessLayoutDesc::PUSH_CONSTANT_SIZE / 4) as usize;

    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    pub fn with_depth(mut self, name: impl Into<String>) -> Self {
        self.depth_target = Some(name.into());
        self
    }

    fn resolve_draw(ctx: &StageContext<'_>, draw_index: usize, draw: &DrawItem) -> Result<Vec<u32>, RecordingFailure> {
        if draw.resources.len() > Self::MAX_HANDLES_PER_DRAW {
            return Err(RecordingFailure::PushConstantOverflow {
                draw: draw_index,
                count: draw.resources.len(),
                max: Self::MAX_HANDLES_PER_DRAW,
            });
        }
        draw.resources
            .iter()
            .map(|handle| ctx.bindless.resolve(*handle))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| RecordingFailure::UnresolvedHandle {
                draw: draw_index,
                source,
            })
    }

    fn record_draws(ctx: &StageContext<'_>) -> Result<(), RecordingFailure> {
        let recorder = ctx.recorder;
        for (draw_index, draw) in ctx.inputs.draws.iter().enumerate() {
            let indices = Self::resolve_draw(ctx, draw_index, draw)?;
            let layout = draw.layout.unwrap_or(ctx.bindless_layout);

            recorder.cmd_bind_pipeline(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, draw.pipeline);
            recorder.cmd_bind_descriptor_sets(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, layout, 0, &[ctx.bindless_set]);
            if !indices.is_empty() {
                recorder.cmd_push_constants(
                    ctx.cmd,
                    layout,
                    vk::ShaderStageFlags::ALL,
                    0,
                    bytemuck::cast_slice(&indices),
                );
            }
            recorder.cmd_draw(ctx.cmd, draw.vertex_count, draw.instance_count, draw.first_vertex, 0);
        }
        Ok(())
    }
}

impl RenderStage for ForwardStage {
    fn attachments(&self) -> Vec<AttachmentRef> {
        let mut attachments = vec![AttachmentRef::SurfaceColor];
        if let Some(depth) = &self.depth_target {
            attachments.push(AttachmentRef::Depth(depth.clone()));
        }
        attachments
    }

    fn record(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RecordingFailure> {
        let ctx = &*ctx;
        let surface = ctx.surface()?;
        let depth = match &self.depth_target {
            Some(name) => Some(GfxRenderingAttachment::depth_clear(ctx.depth(name)?.view)),
            None => None,
        };

        let rendering_info = GfxRenderingInfo::new(
            surface.extent,
            vec![GfxRenderingAttachment::color_clear(surface.view, ctx.inputs.clear_color.to_array())],
        )
        .depth(depth);

        ctx.recorder.cmd_begin_rendering(ctx.cmd, &rendering_info);
        ctx.recorder.cmd_set_viewport_scissor(ctx.cmd, surface.extent);
        let result = Self::record_draws(ctx);
        ctx.recorder.cmd_end_rendering(ctx.cmd);
        result
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;
    use lumen_gfx::headless::HeadlessCommand;
    use lumen_render_interface::bindless_table::{BindlessKind, BindlessResource};

    use super::*;
    use crate::attachments::OffscreenTarget;
    use crate::test_utils::StageHarness;

    fn draw(resources: Vec<lumen_render_interface::bindless_table::BindlessHandle>) -> DrawItem {
        DrawItem {
            pipeline: vk::Pipeline::from_raw(0x77),
            layout: None,
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            resources,
        }
    }

    #[test]
    fn draws_push_resolved_indices() {
        let mut harness = StageHarness::new();
        let _skip = harness
            .bindless
            .store(BindlessKind::StorageBuffer, BindlessResource::whole_buffer(vk::Buffer::from_raw(1)))
            .unwrap();
        let a = harness
            .bindless
            .store(BindlessKind::StorageBuffer, BindlessResource::whole_buffer(vk::Buffer::from_raw(2)))
            .unwrap();
        harness.inputs.draws = vec![draw(vec![a]), draw(vec![])];
        harness.inputs.clear_color = glam::vec4(0.1, 0.2, 0.3, 1.0);

        ForwardStage::new().record(&mut harness.context()).unwrap();

        let commands = harness.commands();
        assert!(matches!(
            &commands[0],
            HeadlessCommand::BeginRendering { color_load_ops, depth_view: None, .. }
                if color_load_ops == &[vk::AttachmentLoadOp::CLEAR]
        ));
        assert_eq!(commands[1], HeadlessCommand::SetViewportScissor(StageHarness::EXTENT));
        assert!(commands.contains(&HeadlessCommand::PushConstants {
            offset: 0,
            data: 1u32.to_ne_bytes().to_vec(),
        }));
        let draws = commands.iter().filter(|c| matches!(c, HeadlessCommand::Draw { .. })).count();
        assert_eq!(draws, 2);
        // 没有资源的 draw 不会 push constant
        let pushes = commands.iter().filter(|c| matches!(c, HeadlessCommand::PushConstants { .. })).count();
        assert_eq!(pushes, 1);
        assert_eq!(commands.last(), Some(&HeadlessCommand::EndRendering));
    }

    #[test]
    fn released_handle_fails_recording() {
        let mut harness = StageHarness::new();
        let a = harness
            .bindless
            .store(BindlessKind::StorageBuffer, BindlessResource::whole_buffer(vk::Buffer::from_raw(1)))
            .unwrap();
        harness.bindless.release(a).unwrap();
        harness.inputs.draws = vec![draw(vec![a])];

        let result = ForwardStage::new().record(&mut harness.context());
        assert!(matches!(result, Err(RecordingFailure::UnresolvedHandle { draw: 0, .. })));
        let draws = harness.commands().iter().filter(|c| matches!(c, HeadlessCommand::Draw { .. })).count();
        assert_eq!(draws, 0);
    }

    #[test]
    fn too_many_handles_overflow_push_constants() {
        let mut harness = StageHarness::new();
        let a = harness
            .bindless
            .store(BindlessKind::UniformBuffer, BindlessResource::whole_buffer(vk::Buffer::from_raw(1)))
            .unwrap();
        harness.inputs.draws = vec![draw(vec![a; ForwardStage::MAX_HANDLES_PER_DRAW + 1])];

        let result = ForwardStage::new().record(&mut harness.context());
        assert_eq!(
            result,
            Err(RecordingFailure::PushConstantOverflow {
                draw: 0,
                count: 33,
                max: 32
            })
        );
    }

    #[test]
    fn depth_target_must_match_surface_extent() {
        let mut harness = StageHarness::new();
        let stage = ForwardStage::new().with_depth("depth");
        let depth = OffscreenTarget {
            image: vk::Image::from_raw(0x50),
            view: vk::ImageView::from_raw(0x51),
            format: vk::Format::D32_SFLOAT,
            extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
        };
        harness.attachments.set_depth("depth", depth);

        let attachments = stage.attachments();
        assert_eq!(attachments[1], AttachmentRef::Depth("depth".to_string()));
        assert!(matches!(
            harness.attachments.validate("forward", &attachments[1]),
            Err(RecordingFailure::AttachmentExtentMismatch { .. })
        ));

        harness.attachments.set_depth(
            "depth",
            OffscreenTarget {
                extent: StageHarness::EXTENT,
                ..depth
            },
        );
        assert_eq!(harness.attachments.validate("forward", &attachments[1]), Ok(()));
    }

    #[test]
    fn depth_view_is_cleared_with_the_surface() {
        let mut harness = StageHarness::new();
        harness.attachments.set_depth(
            "depth",
            OffscreenTarget {
                image: vk::Image::from_raw(0x50),
                view: vk::ImageView::from_raw(0x51),
                format: vk::Format::D32_SFLOAT,
                extent: StageHarness::EXTENT,
            },
        );

        ForwardStage::new().with_depth("depth").record(&mut harness.context()).unwrap();
        assert!(matches!(
            &harness.commands()[0],
            HeadlessCommand::BeginRendering { depth_view: Some(view), .. } if *view == vk::ImageView::from_raw(0x51)
        ));

        // 离屏 target 不会被当作深度使用
        let mut harness = StageHarness::new();
        harness.attachments.register_offscreen(
            "depth",
            OffscreenTarget {
                image: vk::Image::from_raw(0x50),
                view: vk::ImageView::from_raw(0x51),
                format: vk::Format::D32_SFLOAT,
                extent: StageHarness::EXTENT,
            },
        );
        let result = ForwardStage::new().with_depth("depth").record(&mut harness.context());
        assert!(matches!(
            result,
            Err(RecordingFailure::MissingAttachment { attachment: AttachmentRef::Depth(_), .. })
        ));
    }
}
