use std::collections::HashMap;
use std::fmt::Display;

use ash::vk;
use lumen_gfx::swapchain::surface_image::SurfaceImage;

use crate::stage::RecordingFailure;

/// stage 声明需要使用的 attachment
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentRef {
    /// 当前帧 acquire 得到的 swapchain image
    SurfaceColor,
    /// 由外部注册的离屏 render target
    Offscreen(String),
    /// 由 renderer 创建的深度 target，尺寸始终与 surface 一致
    Depth(String),
}

impl Display for AttachmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SurfaceColor => write!(f, "surface-color"),
            Self::Offscreen(name) => write!(f, "offscreen `{}`", name),
            Self::Depth(name) => write!(f, "depth `{}`", name),
        }
    }
}

/// 离屏 render target，尺寸需要与 surface 一致
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OffscreenTarget {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

/// 一帧中可以使用的全部 attachment
#[derive(Default)]
pub struct FrameAttachments {
    surface: Option<SurfaceImage>,
    offscreen: HashMap<String, OffscreenTarget>,
    depth: HashMap<String, OffscreenTarget>,
}

// new & init
impl FrameAttachments {
    pub fn new() -> Self {
        Self::default()
    }
}

// update
impl FrameAttachments {
    /// 由 renderer 在 acquire 之后设置，帧结束后清除
    #[inline]
    pub fn set_surface(&mut self, surface: Option<SurfaceImage>) {
        self.surface = surface;
    }

    /// 返回被替换的旧 target
    pub fn register_offscreen(&mut self, name: impl Into<String>, target: OffscreenTarget) -> Option<OffscreenTarget> {
        self.offscreen.insert(name.into(), target)
    }

    pub fn remove_offscreen(&mut self, name: &str) -> Option<OffscreenTarget> {
        self.offscreen.remove(name)
    }

    /// 由 renderer 在创建或重建深度 target 之后设置
    pub fn set_depth(&mut self, name: impl Into<String>, target: OffscreenTarget) -> Option<OffscreenTarget> {
        self.depth.insert(name.into(), target)
    }

    pub fn clear_depth(&mut self) {
        self.depth.clear();
    }
}

// getters
impl FrameAttachments {
    #[inline]
    pub fn surface(&self) -> Option<&SurfaceImage> {
        self.surface.as_ref()
    }

    #[inline]
    pub fn offscreen(&self, name: &str) -> Option<&OffscreenTarget> {
        self.offscreen.get(name)
    }

    #[inline]
    pub fn depth(&self, name: &str) -> Option<&OffscreenTarget> {
        self.depth.get(name)
    }

    /// 检查 stage 声明的 attachment 在这一帧中是否可用
    pub fn validate(&self, stage: &str, attachment: &AttachmentRef) -> Result<(), RecordingFailure> {
        let missing = || RecordingFailure::MissingAttachment {
            stage: stage.to_string(),
            attachment: attachment.clone(),
        };

        let surface = self.surface.as_ref().ok_or_else(missing)?;
        let (name, target) = match attachment {
            AttachmentRef::SurfaceColor => return Ok(()),
            AttachmentRef::Offscreen(name) => (name, self.offscreen.get(name)),
            AttachmentRef::Depth(name) => (name, self.depth.get(name)),
        };
        let target = target.ok_or_else(missing)?;
        if target.extent != surface.extent {
            return Err(RecordingFailure::AttachmentExtentMismatch {
                name: name.clone(),
                expected: surface.extent,
                actual: target.extent,
            });
        }
        Ok(())
    }
}
