use ash::vk;
use ash::vk::Handle;
use lumen_gfx::backend::GfxBackend;
use lumen_gfx::headless::{HeadlessBackend, HeadlessCommand};
use lumen_gfx::swapchain::surface_image::SurfaceImage;
use lumen_render_interface::bindless_table::BindlessTable;
use lumen_render_interface::pipeline_settings::{BindlessCapacities, FrameLabel};

use crate::attachments::FrameAttachments;
use crate::stage::{FrameInputs, StageContext};

/// 在 headless 设备上录制 stage 所需的全部内容
pub struct StageHarness {
    pub gfx: HeadlessBackend,
    pub cmd: vk::CommandBuffer,
    pub attachments: FrameAttachments,
    pub inputs: FrameInputs,
    pub bindless: BindlessTable,
}

impl StageHarness {
    pub const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 640,
        height: 480,
    };

    pub fn new() -> Self {
        let gfx = HeadlessBackend::new();
        let pool = gfx.create_command_pool("test").unwrap();
        let cmd = gfx.allocate_command_buffer(pool, "test").unwrap();
        gfx.begin_command_buffer(cmd).unwrap();

        let mut attachments = FrameAttachments::new();
        attachments.set_surface(Some(SurfaceImage {
            index: 0,
            image: vk::Image::from_raw(0x1000),
            view: vk::ImageView::from_raw(0x1001),
            format: vk::Format::R8G8B8A8_SRGB,
            extent: Self::EXTENT,
        }));

        Self {
            gfx,
            cmd,
            attachments,
            inputs: FrameInputs::default(),
            bindless: BindlessTable::new(&BindlessCapacities::default(), 2),
        }
    }

    pub fn context(&self) -> StageContext<'_> {
        StageContext {
            cmd: self.cmd,
            recorder: &self.gfx,
            attachments: &self.attachments,
            inputs: &self.inputs,
            bindless: &self.bindless,
            bindless_set: self.gfx.bindless_descriptor_set(),
            bindless_layout: self.gfx.bindless_pipeline_layout(),
            frame_label: FrameLabel::A,
            generation: 0,
        }
    }

    pub fn commands(&self) -> Vec<HeadlessCommand> {
        self.gfx.recorded_commands(self.cmd)
    }
}
