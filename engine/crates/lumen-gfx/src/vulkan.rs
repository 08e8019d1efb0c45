use std::ffi::CString;

use ash::prelude::VkResult;
use ash::vk;
use itertools::Itertools;

use crate::backend::{GfxBackend, GfxCommandRecorder};
use crate::commands::barrier::GfxImageBarrier;
use crate::commands::submit_info::GfxSubmitInfo;
use crate::descriptors::{GfxBindlessLayoutDesc, GfxDescriptorResource, GfxDescriptorWrite};
use crate::error::{GfxError, VkResultExt};
use crate::pipelines::rendering_info::GfxRenderingInfo;
use crate::resources::depth_image::GfxDepthImage;
use crate::swapchain::surface_support::{GfxSurfaceSupport, GfxSwapchainDesc};

/// 创建 [`VulkanBackend`] 所需的外部对象
///
/// instance、device、surface 的创建属于窗口与启动流程，不在这里完成。
/// device 需要开启 Vulkan 1.3 的 synchronization2、dynamic rendering 以及 descriptor indexing。
pub struct VulkanBackendCreateInfo {
    /// 用于查询 physical device 的格式与显存属性
    pub instance: ash::Instance,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub swapchain_loader: ash::khr::swapchain::Device,
    /// 为 None 时，debug name 和 label 都会被忽略
    pub debug_utils: Option<ash::ext::debug_utils::Device>,
    pub bindless_layout: GfxBindlessLayoutDesc,
}

/// 基于 ash 的 [`GfxBackend`] 实现
///
/// # Destroy
/// 需要手动调用 [`VulkanBackend::destroy`]，device 和 surface 仍由调用者销毁
pub struct VulkanBackend {
    instance: ash::Instance,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue: vk::Queue,
    queue_family_index: u32,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,

    bindless_layout: GfxBindlessLayoutDesc,
    bindless_set_layout: vk::DescriptorSetLayout,
    bindless_pool: vk::DescriptorPool,
    bindless_set: vk::DescriptorSet,
    bindless_pipeline_layout: vk::PipelineLayout,
}

// new & init
impl VulkanBackend {
    pub fn new(create_info: VulkanBackendCreateInfo) -> Result<Self, GfxError> {
        let VulkanBackendCreateInfo {
            instance,
            device,
            physical_device,
            queue,
            queue_family_index,
            surface,
            surface_loader,
            swapchain_loader,
            debug_utils,
            bindless_layout,
        } = create_info;

        let counts = [
            (
                GfxBindlessLayoutDesc::UNIFORM_BINDING,
                vk::DescriptorType::UNIFORM_BUFFER,
                bindless_layout.uniform_buffer_count,
            ),
            (
                GfxBindlessLayoutDesc::STORAGE_BINDING,
                vk::DescriptorType::STORAGE_BUFFER,
                bindless_layout.storage_buffer_count,
            ),
            (
                GfxBindlessLayoutDesc::SAMPLED_IMAGE_BINDING,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                bindless_layout.sampled_image_count,
            ),
        ];

        let bindings = counts
            .iter()
            .map(|(binding, ty, count)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(*binding)
                    .descriptor_type(*ty)
                    .descriptor_count(*count)
                    .stage_flags(vk::ShaderStageFlags::ALL)
            })
            .collect_vec();
        // 允许部分 slot 为空，并且允许在 set 被 command buffer 引用时更新未使用的 slot
        let binding_flags = [vk::DescriptorBindingFlags::PARTIALLY_BOUND
            | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND; 3];
        let mut binding_flags_ci = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
        let set_layout_ci = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            .bindings(&bindings)
            .push_next(&mut binding_flags_ci);
        let bindless_set_layout =
            unsafe { device.create_descriptor_set_layout(&set_layout_ci, None) }.call("create_descriptor_set_layout")?;

        let pool_sizes = counts
            .iter()
            .filter(|(_, _, count)| *count > 0)
            .map(|(_, ty, count)| vk::DescriptorPoolSize {
                ty: *ty,
                descriptor_count: *count,
            })
            .collect_vec();
        let pool_ci = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let bindless_pool = unsafe { device.create_descriptor_pool(&pool_ci, None) }.call("create_descriptor_pool")?;

        let set_layouts = [bindless_set_layout];
        let alloc_info =
            vk::DescriptorSetAllocateInfo::default().descriptor_pool(bindless_pool).set_layouts(&set_layouts);
        let bindless_set = unsafe { device.allocate_descriptor_sets(&alloc_info) }
            .call("allocate_descriptor_sets")?
            .into_iter()
            .next()
            .ok_or(GfxError::Vk {
                call: "allocate_descriptor_sets",
                result: vk::Result::ERROR_OUT_OF_POOL_MEMORY,
            })?;

        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::ALL,
            offset: 0,
            size: GfxBindlessLayoutDesc::PUSH_CONSTANT_SIZE,
        }];
        let pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let bindless_pipeline_layout =
            unsafe { device.create_pipeline_layout(&pipeline_layout_ci, None) }.call("create_pipeline_layout")?;

        log::info!(
            "bindless descriptor set created: uniform {}, storage {}, sampled image {}",
            bindless_layout.uniform_buffer_count,
            bindless_layout.storage_buffer_count,
            bindless_layout.sampled_image_count
        );

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let backend = Self {
            instance,
            device,
            physical_device,
            memory_properties,
            queue,
            queue_family_index,
            surface,
            surface_loader,
            swapchain_loader,
            debug_utils,
            bindless_layout,
            bindless_set_layout,
            bindless_pool,
            bindless_set,
            bindless_pipeline_layout,
        };
        backend.set_object_debug_name(bindless_set, "bindless");
        backend.set_object_debug_name(bindless_pipeline_layout, "bindless");
        Ok(backend)
    }
}

// getters
impl VulkanBackend {
    #[inline]
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }
}

// tools
impl VulkanBackend {
    /// 第一个满足 type_bits 并且具有 flags 属性的 memory type
    fn find_memory_type(&self, type_bits: u32, flags: vk::MemoryPropertyFlags) -> Option<u32> {
        (0..self.memory_properties.memory_type_count).find(|index| {
            type_bits & (1 << index) != 0
                && self.memory_properties.memory_types[*index as usize].property_flags.contains(flags)
        })
    }

    /// debug name 设置失败不影响渲染，只记录日志
    pub fn set_object_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            log::warn!("debug name {:?} contains nul byte", name);
            return;
        };
        let name_info = vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle);
        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&name_info) } {
            log::warn!("failed to set debug name {:?}: {:?}", name, e);
        }
    }
}

// destroy
impl VulkanBackend {
    /// 销毁 backend 自己创建的对象，返回 device 交给调用者销毁
    pub fn destroy(self) -> ash::Device {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::error!("device wait idle failed before destroy: {:?}", e);
            }
            self.device.destroy_pipeline_layout(self.bindless_pipeline_layout, None);
            self.device.destroy_descriptor_pool(self.bindless_pool, None);
            self.device.destroy_descriptor_set_layout(self.bindless_set_layout, None);
        }
        self.device
    }
}

impl GfxCommandRecorder for VulkanBackend {
    fn cmd_image_barrier(&self, cmd: vk::CommandBuffer, barriers: &[GfxImageBarrier]) {
        let barriers = barriers.iter().map(|b| b.to_vk()).collect_vec();
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe { self.device.cmd_pipeline_barrier2(cmd, &dependency_info) }
    }

    fn cmd_begin_rendering(&self, cmd: vk::CommandBuffer, rendering_info: &GfxRenderingInfo) {
        let color_attachments = rendering_info.color_attachments.iter().map(|a| a.to_vk()).collect_vec();
        let depth_attachment = rendering_info.depth_attachment.map(|a| a.to_vk());

        let mut vk_rendering_info = vk::RenderingInfo::default()
            .render_area(rendering_info.render_area())
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = depth_attachment.as_ref() {
            vk_rendering_info = vk_rendering_info.depth_attachment(depth_attachment);
        }
        unsafe { self.device.cmd_begin_rendering(cmd, &vk_rendering_info) }
    }

    fn cmd_end_rendering(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_rendering(cmd) }
    }

    fn cmd_set_viewport_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport));
            self.device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor));
        }
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.cmd_bind_pipeline(cmd, bind_point, pipeline) }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe { self.device.cmd_bind_descriptor_sets(cmd, bind_point, layout, first_set, sets, &[]) }
    }

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe { self.device.cmd_push_constants(cmd, layout, stages, offset, data) }
    }

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe { self.device.cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance) }
    }

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, label_name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let name = CString::new(label_name).unwrap_or_default();
        let label = vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color([0.2, 0.6, 0.9, 1.0]);
        unsafe { debug_utils.cmd_begin_debug_utils_label(cmd, &label) }
    }

    fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe { debug_utils.cmd_end_debug_utils_label(cmd) }
        }
    }
}

impl GfxBackend for VulkanBackend {
    fn create_fence(&self, signaled: bool, debug_name: &str) -> VkResult<vk::Fence> {
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None)? };
        self.set_object_debug_name(fence, &format!("GfxFence::{}", debug_name));
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(std::slice::from_ref(&fence), true, timeout) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(std::slice::from_ref(&fence)) }
    }

    fn create_semaphore(&self, debug_name: &str) -> VkResult<vk::Semaphore> {
        let semaphore = unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };
        self.set_object_debug_name(semaphore, &format!("GfxSemaphore::{}", debug_name));
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_command_pool(&self, debug_name: &str) -> VkResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { self.device.create_command_pool(&create_info, None)? };
        self.set_object_debug_name(pool, &format!("GfxCommandPool::{}", debug_name));
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()> {
        unsafe { self.device.reset_command_pool(pool, vk::CommandPoolResetFlags::empty()) }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool, debug_name: &str) -> VkResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = unsafe { self.device.allocate_command_buffers(&alloc_info)? }
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_OUT_OF_POOL_MEMORY)?;
        self.set_object_debug_name(cmd, &format!("GfxCommandBuffer::{}", debug_name));
        Ok(cmd)
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(cmd, &begin_info) }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }
    }

    fn queue_submit(&self, submit_info: &GfxSubmitInfo, fence: vk::Fence) -> VkResult<()> {
        let command_buffer_infos = submit_info
            .command_buffers
            .iter()
            .map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(*cmd))
            .collect_vec();
        let to_vk = |info: &crate::commands::submit_info::GfxSemaphoreSubmit| {
            vk::SemaphoreSubmitInfo::default().semaphore(info.semaphore).stage_mask(info.stage).value(info.value)
        };
        let wait_infos = submit_info.wait_infos.iter().map(to_vk).collect_vec();
        let signal_infos = submit_info.signal_infos.iter().map(to_vk).collect_vec();

        let vk_submit_info = vk::SubmitInfo2::default()
            .command_buffer_infos(&command_buffer_infos)
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos);
        unsafe { self.device.queue_submit2(self.queue, std::slice::from_ref(&vk_submit_info), fence) }
    }

    fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn surface_support(&self) -> VkResult<GfxSurfaceSupport> {
        unsafe {
            Ok(GfxSurfaceSupport {
                capabilities: self
                    .surface_loader
                    .get_physical_device_surface_capabilities(self.physical_device, self.surface)?,
                formats: self.surface_loader.get_physical_device_surface_formats(self.physical_device, self.surface)?,
                present_modes: self
                    .surface_loader
                    .get_physical_device_surface_present_modes(self.physical_device, self.surface)?,
            })
        }
    }

    fn create_swapchain(
        &self,
        desc: &GfxSwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> VkResult<vk::SwapchainKHR> {
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(desc.image_count)
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            // TRANSFER_DST 用于 Nsight 分析
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(desc.pre_transform)
            .composite_alpha(desc.composite_alpha)
            .present_mode(desc.present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None)? };
        self.set_object_debug_name(swapchain, "main");
        Ok(swapchain)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format, debug_name: &str) -> VkResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe { self.device.create_image_view(&create_info, None)? };
        self.set_object_debug_name(view, &format!("GfxImageView::{}", debug_name));
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Vec<vk::Format> {
        candidates
            .iter()
            .filter(|format| {
                let props =
                    unsafe { self.instance.get_physical_device_format_properties(self.physical_device, **format) };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .copied()
            .collect()
    }

    fn create_depth_image(&self, format: vk::Format, extent: vk::Extent2D, debug_name: &str) -> VkResult<GfxDepthImage> {
        let image_ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { self.device.create_image(&image_ci, None)? };

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let Some(memory_type_index) =
            self.find_memory_type(requirements.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
        else {
            unsafe { self.device.destroy_image(image, None) };
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        };
        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = match unsafe { self.device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let view_ci = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: GfxDepthImage::aspect_of(format),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe {
            self.device
                .bind_image_memory(image, memory, 0)
                .and_then(|()| self.device.create_image_view(&view_ci, None))
        };
        let view = match view {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    self.device.destroy_image(image, None);
                    self.device.free_memory(memory, None);
                }
                return Err(e);
            }
        };

        self.set_object_debug_name(image, &format!("GfxImage::{}", debug_name));
        self.set_object_debug_name(view, &format!("GfxImageView::{}", debug_name));
        self.set_object_debug_name(memory, &format!("GfxMemory::{}", debug_name));
        Ok(GfxDepthImage {
            image,
            view,
            memory,
            format,
            extent,
        })
    }

    fn destroy_depth_image(&self, depth_image: GfxDepthImage) {
        unsafe {
            self.device.destroy_image_view(depth_image.view, None);
            self.device.destroy_image(depth_image.image, None);
            self.device.free_memory(depth_image.memory, None);
        }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe { self.swapchain_loader.acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null()) }
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool> {
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(std::slice::from_ref(&wait_semaphore))
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&swapchain));
        unsafe { self.swapchain_loader.queue_present(self.queue, &present_info) }
    }

    fn bindless_layout_desc(&self) -> GfxBindlessLayoutDesc {
        self.bindless_layout
    }

    fn bindless_descriptor_set(&self) -> vk::DescriptorSet {
        self.bindless_set
    }

    fn bindless_pipeline_layout(&self) -> vk::PipelineLayout {
        self.bindless_pipeline_layout
    }

    fn write_bindless_descriptors(&self, writes: &[GfxDescriptorWrite]) {
        if writes.is_empty() {
            return;
        }

        // 先收集所有 info，WriteDescriptorSet 只持有它们的引用
        let buffer_infos = writes
            .iter()
            .map(|write| match write.resource {
                GfxDescriptorResource::Buffer { buffer, offset, range } => {
                    vk::DescriptorBufferInfo { buffer, offset, range }
                }
                GfxDescriptorResource::Image { .. } => vk::DescriptorBufferInfo::default(),
            })
            .collect_vec();
        let image_infos = writes
            .iter()
            .map(|write| match write.resource {
                GfxDescriptorResource::Image { view, sampler, layout } => vk::DescriptorImageInfo {
                    sampler,
                    image_view: view,
                    image_layout: layout,
                },
                GfxDescriptorResource::Buffer { .. } => vk::DescriptorImageInfo::default(),
            })
            .collect_vec();

        let vk_writes = writes
            .iter()
            .enumerate()
            .map(|(i, write)| {
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(self.bindless_set)
                    .dst_binding(write.binding)
                    .dst_array_element(write.array_element)
                    .descriptor_type(write.descriptor_type);
                if write.resource.is_buffer() {
                    vk_write.buffer_info(std::slice::from_ref(&buffer_infos[i]))
                } else {
                    vk_write.image_info(std::slice::from_ref(&image_infos[i]))
                }
            })
            .collect_vec();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) }
    }
}
