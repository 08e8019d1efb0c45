use ash::vk;

/// surface 在当前 physical device 上的支持情况
#[derive(Clone, Debug, Default)]
pub struct GfxSurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// 创建 swapchain 所需的全部参数，由 [`GfxSurfaceSupport::choose`] 得到
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxSwapchainDesc {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl GfxSurfaceSupport {
    /// 期望的 swapchain image 数量
    pub const PREFERRED_IMAGE_COUNT: u32 = 3;

    /// 根据期望的参数选出最终的 swapchain 配置
    pub fn choose(
        &self,
        preferred_format: vk::SurfaceFormatKHR,
        preferred_present_mode: vk::PresentModeKHR,
        window_physical_extent: vk::Extent2D,
    ) -> Option<GfxSwapchainDesc> {
        Some(GfxSwapchainDesc {
            format: self.choose_format(preferred_format)?,
            present_mode: self.choose_present_mode(preferred_present_mode),
            extent: Self::calculate_swapchain_extent(&self.capabilities, window_physical_extent),
            image_count: self.choose_image_count(),
            composite_alpha: self.choose_composite_alpha(),
            pre_transform: self.choose_pre_transform(),
        })
    }

    /// 优先使用期望的格式，否则使用 surface 报告的第一个格式
    ///
    /// surface 没有报告任何格式时返回 None
    pub fn choose_format(&self, preferred: vk::SurfaceFormatKHR) -> Option<vk::SurfaceFormatKHR> {
        self.formats
            .iter()
            .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
            .or_else(|| self.formats.first())
            .copied()
    }

    /// FIFO 是所有设备都必须支持的 present mode
    pub fn choose_present_mode(&self, preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
        if self.present_modes.contains(&preferred) { preferred } else { vk::PresentModeKHR::FIFO }
    }

    /// max_image_count == 0，表示不限制 image 数量
    pub fn choose_image_count(&self) -> u32 {
        let min = self.capabilities.min_image_count;
        let max = if self.capabilities.max_image_count == 0 { u32::MAX } else { self.capabilities.max_image_count };
        Self::PREFERRED_IMAGE_COUNT.clamp(min, max.max(min))
    }

    pub fn choose_composite_alpha(&self) -> vk::CompositeAlphaFlagsKHR {
        let supported = self.capabilities.supported_composite_alpha;
        [
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::INHERIT,
        ]
        .into_iter()
        .find(|flag| supported.contains(*flag))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
    }

    pub fn choose_pre_transform(&self) -> vk::SurfaceTransformFlagsKHR {
        if self.capabilities.supported_transforms.contains(vk::SurfaceTransformFlagsKHR::IDENTITY) {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            self.capabilities.current_transform
        }
    }

    /// 确定 window 的 extent 尺寸
    ///
    /// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
    pub fn calculate_swapchain_extent(
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        window_physical_extent: vk::Extent2D,
    ) -> vk::Extent2D {
        let surface_extent = surface_capabilities.current_extent;
        if surface_extent.width == u32::MAX || surface_extent.height == u32::MAX {
            let width = window_physical_extent.width.clamp(
                surface_capabilities.min_image_extent.width,
                surface_capabilities.max_image_extent.width.max(surface_capabilities.min_image_extent.width),
            );
            let height = window_physical_extent.height.clamp(
                surface_capabilities.min_image_extent.height,
                surface_capabilities.max_image_extent.height.max(surface_capabilities.min_image_extent.height),
            );
            vk::Extent2D { width, height }
        } else {
            surface_extent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srgb() -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn support() -> GfxSurfaceSupport {
        GfxSurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE
                    | vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                srgb(),
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    #[test]
    fn preferred_format_wins_over_first() {
        assert_eq!(support().choose_format(srgb()), Some(srgb()));
    }

    #[test]
    fn falls_back_to_first_reported_format() {
        let mut s = support();
        s.formats.remove(1);
        assert_eq!(s.choose_format(srgb()).map(|f| f.format), Some(vk::Format::B8G8R8A8_UNORM));

        s.formats.clear();
        assert!(s.choose(srgb(), vk::PresentModeKHR::MAILBOX, vk::Extent2D::default()).is_none());
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let s = support();
        assert_eq!(s.choose_present_mode(vk::PresentModeKHR::MAILBOX), vk::PresentModeKHR::MAILBOX);
        assert_eq!(s.choose_present_mode(vk::PresentModeKHR::IMMEDIATE), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn image_count_is_clamped() {
        let mut s = support();
        assert_eq!(s.choose_image_count(), 3);

        s.capabilities.min_image_count = 4;
        assert_eq!(s.choose_image_count(), 4);

        s.capabilities.min_image_count = 1;
        s.capabilities.max_image_count = 2;
        assert_eq!(s.choose_image_count(), 2);

        // 0 表示没有上限
        s.capabilities.max_image_count = 0;
        assert_eq!(s.choose_image_count(), 3);
    }

    #[test]
    fn extent_is_clamped_when_surface_leaves_it_open() {
        let s = support();
        let extent = GfxSurfaceSupport::calculate_swapchain_extent(
            &s.capabilities,
            vk::Extent2D {
                width: 8000,
                height: 600,
            },
        );
        assert_eq!(
            extent,
            vk::Extent2D {
                width: 4096,
                height: 600
            }
        );

        let mut fixed = s.capabilities;
        fixed.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = GfxSurfaceSupport::calculate_swapchain_extent(
            &fixed,
            vk::Extent2D {
                width: 1,
                height: 1,
            },
        );
        assert_eq!(extent.width, 800);
    }

    #[test]
    fn composite_alpha_preference_order() {
        let mut s = support();
        assert_eq!(s.choose_composite_alpha(), vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED);

        s.capabilities.supported_composite_alpha = vk::CompositeAlphaFlagsKHR::OPAQUE;
        assert_eq!(s.choose_composite_alpha(), vk::CompositeAlphaFlagsKHR::OPAQUE);
    }
}
