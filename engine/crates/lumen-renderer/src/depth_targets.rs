use ash::vk;
use itertools::Itertools;
use lumen_gfx::backend::GfxBackend;
use lumen_gfx::resources::depth_image::GfxDepthImage;
use lumen_render_graph::attachments::{FrameAttachments, OffscreenTarget};
use lumen_render_interface::pipeline_settings::DefaultRendererSettings;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DepthTargetError {
    #[error("none of the depth formats {0:?} can be used as a depth attachment")]
    NoSupportedFormat(Vec<vk::Format>),
    #[error("gfx call failed while creating depth target `{name}`: {result}")]
    Gfx { name: String, result: vk::Result },
}

/// render pipeline 声明的所有深度 target
///
/// 尺寸始终跟随 swapchain，surface 重建之后整体重新创建
pub struct DepthTargets {
    /// 没有 stage 需要深度时为 None
    format: Option<vk::Format>,
    names: Vec<String>,
    images: Vec<GfxDepthImage>,
    /// 当前 images 的尺寸，创建失败或者尚未创建时为 None
    extent: Option<vk::Extent2D>,
}

// new & init
impl DepthTargets {
    /// 选择第一个可以作为深度 attachment 的格式，此时还不会创建 image
    pub fn new(gfx: &impl GfxBackend, names: Vec<String>) -> Result<Self, DepthTargetError> {
        let format = if names.is_empty() {
            None
        } else {
            let candidates = DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES;
            let supported = gfx.find_supported_format(
                candidates,
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            );
            let format = *supported.first().ok_or_else(|| DepthTargetError::NoSupportedFormat(candidates.to_vec()))?;
            log::info!("depth format {:?} for targets [{}]", format, names.iter().join(", "));
            Some(format)
        };

        Ok(Self {
            format,
            names,
            images: vec![],
            extent: None,
        })
    }
}

// getters
impl DepthTargets {
    #[inline]
    pub fn format(&self) -> Option<vk::Format> {
        self.format
    }

    #[inline]
    pub fn images(&self) -> &[GfxDepthImage] {
        &self.images
    }

    /// 尺寸与 surface 不一致，或者上一次创建失败
    #[inline]
    pub fn is_stale(&self, surface_extent: vk::Extent2D) -> bool {
        !self.names.is_empty() && self.extent != Some(surface_extent)
    }
}

// update
impl DepthTargets {
    /// 销毁旧的 image，按照新的尺寸重新创建并注册到 attachments
    ///
    /// 调用前需要保证没有帧仍在使用旧的 image；失败时不会留下任何 image，下一次 tick 会重试
    pub fn rebuild(
        &mut self,
        gfx: &impl GfxBackend,
        extent: vk::Extent2D,
        attachments: &mut FrameAttachments,
    ) -> Result<(), DepthTargetError> {
        let _span = tracy_client::span!("DepthTargets::rebuild");
        let Some(format) = self.format else {
            return Ok(());
        };

        self.extent = None;
        Self::release(&mut self.images, gfx, attachments);
        for name in &self.names {
            match gfx.create_depth_image(format, extent, &format!("depth-{}", name)) {
                Ok(image) => self.images.push(image),
                Err(result) => {
                    log::warn!("failed to create depth target `{}` ({}x{}): {}", name, extent.width, extent.height, result);
                    Self::release(&mut self.images, gfx, attachments);
                    return Err(DepthTargetError::Gfx {
                        name: name.clone(),
                        result,
                    });
                }
            }
        }

        for (name, image) in self.names.iter().zip(&self.images) {
            attachments.set_depth(
                name.clone(),
                OffscreenTarget {
                    image: image.image,
                    view: image.view,
                    format: image.format,
                    extent: image.extent,
                },
            );
        }
        self.extent = Some(extent);
        log::info!("depth targets created: {}x{}, {:?}", extent.width, extent.height, format);
        Ok(())
    }

    fn release(images: &mut Vec<GfxDepthImage>, gfx: &impl GfxBackend, attachments: &mut FrameAttachments) {
        attachments.clear_depth();
        for image in images.drain(..) {
            gfx.destroy_depth_image(image);
        }
    }
}

// destroy
impl DepthTargets {
    pub fn destroy(mut self, gfx: &impl GfxBackend) {
        for image in self.images.drain(..) {
            gfx.destroy_depth_image(image);
        }
    }
}
