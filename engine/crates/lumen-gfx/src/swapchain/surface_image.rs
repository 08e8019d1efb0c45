use ash::vk;

/// swapchain 中的一张 image，以及为它创建的 view
///
/// 生命周期与当前 swapchain 配置相同，重建时整体替换
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SurfaceImage {
    pub index: u32,
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}
