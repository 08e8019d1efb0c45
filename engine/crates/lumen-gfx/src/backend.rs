use ash::prelude::VkResult;
use ash::vk;

use crate::commands::barrier::GfxImageBarrier;
use crate::commands::submit_info::GfxSubmitInfo;
use crate::descriptors::{GfxBindlessLayoutDesc, GfxDescriptorWrite};
use crate::pipelines::rendering_info::GfxRenderingInfo;
use crate::resources::depth_image::GfxDepthImage;
use crate::swapchain::surface_support::{GfxSurfaceSupport, GfxSwapchainDesc};

/// 向 command buffer 中录制命令
///
/// render stage 只能看到这一部分接口，因此需要保持 object safe
pub trait GfxCommandRecorder {
    fn cmd_image_barrier(&self, cmd: vk::CommandBuffer, barriers: &[GfxImageBarrier]);

    fn cmd_begin_rendering(&self, cmd: vk::CommandBuffer, rendering_info: &GfxRenderingInfo);

    fn cmd_end_rendering(&self, cmd: vk::CommandBuffer);

    /// viewport 和 scissor 都覆盖整个 extent
    fn cmd_set_viewport_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D);

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    );

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, label_name: &str);

    fn cmd_end_label(&self, cmd: vk::CommandBuffer);
}

/// 帧组织逻辑所需要的全部 GPU 能力
///
/// 所有对象都是 `ash::vk` 的不透明句柄，由调用者负责销毁。
/// 除了 `wait_fence` 的 `Err(TIMEOUT)` 之外，任何错误都由调用者决定是否致命。
pub trait GfxBackend: GfxCommandRecorder {
    // fence
    fn create_fence(&self, signaled: bool, debug_name: &str) -> VkResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    /// timeout: nano seconds
    ///
    /// 超时返回 `Err(vk::Result::TIMEOUT)`
    fn wait_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    // semaphore
    fn create_semaphore(&self, debug_name: &str) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    // command
    fn create_command_pool(&self, debug_name: &str) -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    /// 丢弃 pool 中所有 command buffer 已经录制的内容
    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()>;
    fn allocate_command_buffer(&self, pool: vk::CommandPool, debug_name: &str) -> VkResult<vk::CommandBuffer>;
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    // queue
    fn queue_submit(&self, submit_info: &GfxSubmitInfo, fence: vk::Fence) -> VkResult<()>;
    fn wait_idle(&self) -> VkResult<()>;

    // surface & swapchain
    fn surface_support(&self) -> VkResult<GfxSurfaceSupport>;
    fn create_swapchain(&self, desc: &GfxSwapchainDesc, old_swapchain: vk::SwapchainKHR)
    -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn create_image_view(&self, image: vk::Image, format: vk::Format, debug_name: &str) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    // image
    /// 按照 candidates 的顺序，返回在 tiling 下支持 features 的格式
    fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Vec<vk::Format>;
    /// 创建 device local 的深度 image 以及对应的 view
    fn create_depth_image(&self, format: vk::Format, extent: vk::Extent2D, debug_name: &str) -> VkResult<GfxDepthImage>;
    fn destroy_depth_image(&self, depth_image: GfxDepthImage);

    /// timeout: nano seconds
    ///
    /// return: (image index, is suboptimal)
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    /// return: is suboptimal
    fn queue_present(&self, swapchain: vk::SwapchainKHR, image_index: u32, wait_semaphore: vk::Semaphore)
    -> VkResult<bool>;

    // bindless
    /// descriptor set 中每个数组的长度，写入的 index 不能超过它
    fn bindless_layout_desc(&self) -> GfxBindlessLayoutDesc;
    fn bindless_descriptor_set(&self) -> vk::DescriptorSet;
    fn bindless_pipeline_layout(&self) -> vk::PipelineLayout;
    fn write_bindless_descriptors(&self, writes: &[GfxDescriptorWrite]);
}
