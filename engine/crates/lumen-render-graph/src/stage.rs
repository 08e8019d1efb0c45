use ash::vk;
use lumen_gfx::backend::GfxCommandRecorder;
use lumen_gfx::swapchain::surface_image::SurfaceImage;
use lumen_render_interface::bindless_table::{BindlessError, BindlessHandle, BindlessTable};
use lumen_render_interface::pipeline_settings::FrameLabel;

use crate::attachments::{AttachmentRef, FrameAttachments, OffscreenTarget};

/// 场景每帧提供的绘制数据
#[derive(Clone, Debug)]
pub struct FrameInputs {
    pub clear_color: glam::Vec4,
    pub draws: Vec<DrawItem>,
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            clear_color: glam::vec4(0.0, 0.0, 0.0, 1.0),
            draws: vec![],
        }
    }
}

/// 一次 draw call
#[derive(Clone, Debug)]
pub struct DrawItem {
    pub pipeline: vk::Pipeline,
    /// 为 None 时使用 bindless 的 pipeline layout
    pub layout: Option<vk::PipelineLayout>,
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    /// 按顺序作为 push constant 传给 shader 的 bindless 资源
    pub resources: Vec<BindlessHandle>,
}

/// 录制失败，整帧的命令都会被丢弃
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordingFailure {
    #[error("stage `{stage}` requires {attachment}, which is not available")]
    MissingAttachment { stage: String, attachment: AttachmentRef },
    #[error("attachment `{name}` has extent {actual:?}, surface extent is {expected:?}")]
    AttachmentExtentMismatch {
        name: String,
        expected: vk::Extent2D,
        actual: vk::Extent2D,
    },
    #[error("draw {draw} references an unresolved bindless handle: {source}")]
    UnresolvedHandle { draw: usize, source: BindlessError },
    #[error("draw {draw} uses {count} bindless handles, push constants hold at most {max}")]
    PushConstantOverflow { draw: usize, count: usize, max: usize },
    #[error("stage failed: {0}")]
    StageFailed(String),
}

/// stage 录制时可以访问的内容
pub struct StageContext<'a> {
    /// 已经 begin 的 command buffer
    pub cmd: vk::CommandBuffer,
    pub recorder: &'a dyn GfxCommandRecorder,
    pub attachments: &'a FrameAttachments,
    pub inputs: &'a FrameInputs,
    /// 录制期间 store/update 得到的 index 会在提交之前写入 descriptor set
    pub bindless: &'a BindlessTable,
    pub bindless_set: vk::DescriptorSet,
    pub bindless_layout: vk::PipelineLayout,
    pub frame_label: FrameLabel,
    pub generation: u64,
}

impl StageContext<'_> {
    #[inline]
    pub fn surface(&self) -> Result<&SurfaceImage, RecordingFailure> {
        self.attachments.surface().ok_or_else(|| RecordingFailure::MissingAttachment {
            stage: String::new(),
            attachment: AttachmentRef::SurfaceColor,
        })
    }

    #[inline]
    pub fn offscreen(&self, name: &str) -> Result<&OffscreenTarget, RecordingFailure> {
        self.attachments.offscreen(name).ok_or_else(|| RecordingFailure::MissingAttachment {
            stage: String::new(),
            attachment: AttachmentRef::Offscreen(name.to_string()),
        })
    }

    #[inline]
    pub fn depth(&self, name: &str) -> Result<&OffscreenTarget, RecordingFailure> {
        self.attachments.depth(name).ok_or_else(|| RecordingFailure::MissingAttachment {
            stage: String::new(),
            attachment: AttachmentRef::Depth(name.to_string()),
        })
    }
}

/// RenderStage trait
///
/// 帧中的一个录制步骤。管线在调用 `record` 之前会检查 `attachments` 中声明的内容都可用。
///
/// # 示例
///
/// ```ignore
/// struct ClearStage;
///
/// impl RenderStage for ClearStage {
///     fn attachments(&self) -> Vec<AttachmentRef> {
///         vec![AttachmentRef::SurfaceColor]
///     }
///
///     fn record(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RecordingFailure> {
///         let surface = ctx.surface()?;
///         // begin rendering, draw...
///         Ok(())
///     }
/// }
/// ```
///
/// # 线程安全
///
/// Stage 不需要是 Send + Sync，管线只在渲染线程中使用。
pub trait RenderStage {
    /// 声明这个 stage 会使用的 attachment
    fn attachments(&self) -> Vec<AttachmentRef>;

    /// 录制命令，返回错误时整帧被丢弃
    fn record(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RecordingFailure>;
}
