use ash::vk;

/// 深度 attachment 使用的 image、view 与显存
///
/// 由 [`crate::backend::GfxBackend::create_depth_image`] 创建，
/// 需要通过 [`crate::backend::GfxBackend::destroy_depth_image`] 手动销毁
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxDepthImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub memory: vk::DeviceMemory,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl GfxDepthImage {
    /// 带 stencil 的格式需要同时包含 STENCIL aspect
    pub fn aspect_of(format: vk::Format) -> vk::ImageAspectFlags {
        match format {
            vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::DEPTH,
        }
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        Self::aspect_of(self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stencil_formats_include_stencil_aspect() {
        assert_eq!(GfxDepthImage::aspect_of(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(GfxDepthImage::aspect_of(vk::Format::D16_UNORM), vk::ImageAspectFlags::DEPTH);
        assert!(GfxDepthImage::aspect_of(vk::Format::D24_UNORM_S8_UINT).contains(vk::ImageAspectFlags::STENCIL));
    }
}
