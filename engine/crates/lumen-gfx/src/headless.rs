//! 内存中的确定性 GPU 设备
//!
//! 所有提交都会立刻"完成"，除非通过 [`HeadlessBackend::set_gpu_hung`] 模拟 GPU 卡住。
//! 设备会记录所有录制的命令、提交、present 以及对象的生命周期，
//! 并检查 semaphore 和 fence 的使用是否合法，违规情况记录在 `validation_errors` 中。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;

use crate::backend::{GfxBackend, GfxCommandRecorder};
use crate::commands::barrier::GfxImageBarrier;
use crate::commands::submit_info::GfxSubmitInfo;
use crate::descriptors::{GfxBindlessLayoutDesc, GfxDescriptorWrite};
use crate::pipelines::rendering_info::GfxRenderingInfo;
use crate::resources::depth_image::GfxDepthImage;
use crate::swapchain::surface_support::{GfxSurfaceSupport, GfxSwapchainDesc};

/// 录制到 command buffer 中的一条命令
#[derive(Clone, Debug, PartialEq)]
pub enum HeadlessCommand {
    ImageBarrier {
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    },
    BeginRendering {
        extent: vk::Extent2D,
        color_views: Vec<vk::ImageView>,
        color_load_ops: Vec<vk::AttachmentLoadOp>,
        depth_view: Option<vk::ImageView>,
    },
    EndRendering,
    SetViewportScissor(vk::Extent2D),
    BindPipeline(vk::Pipeline),
    BindDescriptorSets {
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
    PushConstants {
        offset: u32,
        data: Vec<u8>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    BeginLabel(String),
    EndLabel,
}

/// 一次 queue submit 的记录
#[derive(Clone, Debug)]
pub struct HeadlessSubmission {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub commands: Vec<HeadlessCommand>,
    pub wait_semaphores: Vec<vk::Semaphore>,
    pub signal_semaphores: Vec<vk::Semaphore>,
    pub fence: vk::Fence,
    /// 提交时已经写入 descriptor set 的次数，对应 [`HeadlessBackend::descriptor_writes`] 的前缀
    pub descriptor_writes_before: usize,
}

impl HeadlessSubmission {
    /// 提交中第一个 label 的名字，renderer 用它标记帧
    pub fn first_label(&self) -> Option<&str> {
        self.commands.iter().find_map(|cmd| match cmd {
            HeadlessCommand::BeginLabel(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|cmd| matches!(cmd, HeadlessCommand::Draw { .. })).count()
    }

    /// 提交中所有 push constant 的内容，按 u32 解析
    pub fn pushed_indices(&self) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                HeadlessCommand::PushConstants { data, .. } => Some(data),
                _ => None,
            })
            .flat_map(|data| {
                data.chunks_exact(4)
                    .map(|bytes| u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// 一次 queue present 的记录
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeadlessPresent {
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
    pub wait_semaphore: vk::Semaphore,
    pub result: vk::Result,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum FenceState {
    Unsignaled,
    /// 已经提交，但 GPU 卡住了
    Pending,
    Signaled,
}

struct HeadlessCommandBuffer {
    pool: vk::CommandPool,
    recording: bool,
    commands: Vec<HeadlessCommand>,
}

struct HeadlessSwapchain {
    images: Vec<vk::Image>,
    next_image: u32,
}

struct HeadlessState {
    next_handle: u64,

    fences: HashMap<vk::Fence, FenceState>,
    /// value: 是否处于 signaled 状态
    semaphores: HashMap<vk::Semaphore, bool>,
    command_pools: HashSet<vk::CommandPool>,
    command_buffers: HashMap<vk::CommandBuffer, HeadlessCommandBuffer>,
    image_views: HashSet<vk::ImageView>,
    swapchains: HashMap<vk::SwapchainKHR, HeadlessSwapchain>,
    depth_images: HashMap<vk::Image, GfxDepthImage>,

    submissions: Vec<HeadlessSubmission>,
    presents: Vec<HeadlessPresent>,
    descriptor_writes: Vec<GfxDescriptorWrite>,

    surface_support: GfxSurfaceSupport,
    /// 可以作为深度 attachment 的格式
    depth_formats: Vec<vk::Format>,
    gpu_hung: bool,

    acquire_results: VecDeque<vk::Result>,
    present_results: VecDeque<vk::Result>,
    submit_results: VecDeque<vk::Result>,
    swapchain_failures: u32,
    depth_image_failures: u32,
    /// 注入的失败生效之前还会成功的次数
    depth_image_failure_skip: u32,

    fence_wait_count: usize,
    swapchain_create_count: usize,
    swapchain_destroy_count: usize,
    acquire_count: usize,
    validation_errors: Vec<String>,
}

impl HeadlessState {
    fn new_handle<T: Handle>(&mut self) -> T {
        self.next_handle += 1;
        T::from_raw(self.next_handle)
    }

    fn report(&mut self, message: String) {
        log::error!("[headless] {}", message);
        self.validation_errors.push(message);
    }

    fn record(&mut self, cmd: vk::CommandBuffer, command: HeadlessCommand) {
        match self.command_buffers.get_mut(&cmd) {
            Some(buffer) if buffer.recording => buffer.commands.push(command),
            Some(_) => self.report(format!("record {:?} into command buffer {:?} that is not recording", command, cmd)),
            None => self.report(format!("record into unknown command buffer {:?}", cmd)),
        }
    }

    fn consume_semaphore(&mut self, semaphore: vk::Semaphore, usage: &str) {
        match self.semaphores.get_mut(&semaphore) {
            Some(signaled) if *signaled => *signaled = false,
            Some(_) => self.report(format!("{} waits on semaphore {:?} that has no pending signal", usage, semaphore)),
            None => self.report(format!("{} waits on unknown semaphore {:?}", usage, semaphore)),
        }
    }

    fn signal_semaphore(&mut self, semaphore: vk::Semaphore, usage: &str) {
        match self.semaphores.get_mut(&semaphore) {
            Some(signaled) if !*signaled => *signaled = true,
            Some(_) => self.report(format!("{} signals semaphore {:?} that is already signaled", usage, semaphore)),
            None => self.report(format!("{} signals unknown semaphore {:?}", usage, semaphore)),
        }
    }
}

/// 内存中的确定性设备，用于测试以及无窗口运行
pub struct HeadlessBackend {
    state: Mutex<HeadlessState>,
    bindless_layout_desc: GfxBindlessLayoutDesc,
    bindless_set: vk::DescriptorSet,
    bindless_layout: vk::PipelineLayout,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl HeadlessBackend {
    /// 最大的 swapchain 尺寸
    pub const MAX_EXTENT: u32 = 16384;
    /// 每个 bindless 数组的默认长度
    pub const DEFAULT_DESCRIPTOR_COUNT: u32 = 65536;

    pub fn new() -> Self {
        Self::with_bindless_layout(GfxBindlessLayoutDesc::uniform(Self::DEFAULT_DESCRIPTOR_COUNT))
    }

    /// 指定 bindless descriptor 数组的长度，超出范围的写入会记录为 validation error
    pub fn with_bindless_layout(bindless_layout_desc: GfxBindlessLayoutDesc) -> Self {
        let mut state = HeadlessState {
            next_handle: 0,
            fences: HashMap::new(),
            semaphores: HashMap::new(),
            command_pools: HashSet::new(),
            command_buffers: HashMap::new(),
            image_views: HashSet::new(),
            swapchains: HashMap::new(),
            depth_images: HashMap::new(),
            submissions: vec![],
            presents: vec![],
            descriptor_writes: vec![],
            surface_support: Self::default_surface_support(),
            depth_formats: vec![vk::Format::D32_SFLOAT, vk::Format::D16_UNORM],
            gpu_hung: false,
            acquire_results: VecDeque::new(),
            present_results: VecDeque::new(),
            submit_results: VecDeque::new(),
            swapchain_failures: 0,
            depth_image_failures: 0,
            depth_image_failure_skip: 0,
            fence_wait_count: 0,
            swapchain_create_count: 0,
            swapchain_destroy_count: 0,
            acquire_count: 0,
            validation_errors: vec![],
        };
        let bindless_set = state.new_handle();
        let bindless_layout = state.new_handle();

        Self {
            state: Mutex::new(state),
            bindless_layout_desc,
            bindless_set,
            bindless_layout,
        }
    }

    /// 类似桌面平台：extent 由 swapchain 自行决定，支持 MAILBOX 和 FIFO
    fn default_surface_support() -> GfxSurfaceSupport {
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
                    width: Self::MAX_EXTENT,
                    height: Self::MAX_EXTENT,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    #[inline]
    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// 故障注入
impl HeadlessBackend {
    /// GPU 卡住时，提交的 fence 不会被 signal；恢复时所有等待中的 fence 都会完成
    pub fn set_gpu_hung(&self, hung: bool) {
        let mut state = self.state();
        state.gpu_hung = hung;
        if !hung {
            for fence in state.fences.values_mut() {
                if *fence == FenceState::Pending {
                    *fence = FenceState::Signaled;
                }
            }
        }
    }

    /// 接下来的 acquire 依次返回这些结果
    ///
    /// `SUBOPTIMAL_KHR` 会正常得到 image；其他值作为错误返回
    pub fn push_acquire_result(&self, result: vk::Result) {
        self.state().acquire_results.push_back(result);
    }

    /// 接下来的 present 依次返回这些结果
    pub fn push_present_result(&self, result: vk::Result) {
        self.state().present_results.push_back(result);
    }

    /// 接下来的 submit 依次返回这些错误，例如 `ERROR_DEVICE_LOST`
    pub fn push_submit_result(&self, result: vk::Result) {
        self.state().submit_results.push_back(result);
    }

    /// 接下来的 `count` 次 swapchain 创建都会失败
    pub fn fail_next_swapchain_creations(&self, count: u32) {
        self.state().swapchain_failures = count;
    }

    /// 固定 surface 的 current extent，模拟 window 系统决定 swapchain 尺寸的平台
    pub fn set_surface_extent(&self, extent: Option<vk::Extent2D>) {
        self.state().surface_support.capabilities.current_extent = extent.unwrap_or(vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        });
    }

    pub fn set_present_modes(&self, present_modes: Vec<vk::PresentModeKHR>) {
        self.state().surface_support.present_modes = present_modes;
    }

    /// 可以作为深度 attachment 的格式，默认为 D32_SFLOAT 与 D16_UNORM
    pub fn set_depth_formats(&self, formats: Vec<vk::Format>) {
        self.state().depth_formats = formats;
    }

    /// 接下来的 `count` 次深度 image 创建都会失败
    pub fn fail_next_depth_image_creations(&self, count: u32) {
        self.fail_depth_image_creations_after(0, count);
    }

    /// 先成功 `skip` 次，之后的 `count` 次深度 image 创建失败
    pub fn fail_depth_image_creations_after(&self, skip: u32, count: u32) {
        let mut state = self.state();
        state.depth_image_failure_skip = skip;
        state.depth_image_failures = count;
    }
}

// 观测
impl HeadlessBackend {
    pub fn submissions(&self) -> Vec<HeadlessSubmission> {
        self.state().submissions.clone()
    }

    pub fn presents(&self) -> Vec<HeadlessPresent> {
        self.state().presents.clone()
    }

    pub fn descriptor_writes(&self) -> Vec<GfxDescriptorWrite> {
        self.state().descriptor_writes.clone()
    }

    pub fn validation_errors(&self) -> Vec<String> {
        self.state().validation_errors.clone()
    }

    /// 调用 `wait_fence` 的总次数
    pub fn fence_wait_count(&self) -> usize {
        self.state().fence_wait_count
    }

    pub fn acquire_count(&self) -> usize {
        self.state().acquire_count
    }

    pub fn swapchain_create_count(&self) -> usize {
        self.state().swapchain_create_count
    }

    pub fn swapchain_destroy_count(&self) -> usize {
        self.state().swapchain_destroy_count
    }

    /// 还没有销毁的深度 image
    pub fn live_depth_images(&self) -> Vec<GfxDepthImage> {
        self.state().depth_images.values().copied().collect()
    }

    /// 当前 swapchain 的数量（包括被替换但还没有销毁的）
    pub fn live_swapchain_count(&self) -> usize {
        self.state().swapchains.len()
    }

    /// 还没有销毁的 fence、semaphore、command pool、image view、swapchain 和深度 image 的总数
    ///
    /// 一个深度 image 连同它的 view 和显存只计为一个对象
    pub fn live_object_count(&self) -> usize {
        let state = self.state();
        state.fences.len()
            + state.semaphores.len()
            + state.command_pools.len()
            + state.image_views.len()
            + state.swapchains.len()
            + state.depth_images.len()
    }

    /// command buffer 当前录制的命令，reset 之后为空
    pub fn recorded_commands(&self, cmd: vk::CommandBuffer) -> Vec<HeadlessCommand> {
        self.state().command_buffers.get(&cmd).map(|buffer| buffer.commands.clone()).unwrap_or_default()
    }

    pub fn is_fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state().fences.get(&fence) == Some(&FenceState::Signaled)
    }
}

impl GfxCommandRecorder for HeadlessBackend {
    fn cmd_image_barrier(&self, cmd: vk::CommandBuffer, barriers: &[GfxImageBarrier]) {
        let mut state = self.state();
        for barrier in barriers {
            state.record(
                cmd,
                HeadlessCommand::ImageBarrier {
                    image: barrier.image,
                    old_layout: barrier.old_layout,
                    new_layout: barrier.new_layout,
                },
            );
        }
    }

    fn cmd_begin_rendering(&self, cmd: vk::CommandBuffer, rendering_info: &GfxRenderingInfo) {
        self.state().record(
            cmd,
            HeadlessCommand::BeginRendering {
                extent: rendering_info.extent,
                color_views: rendering_info.color_attachments.iter().map(|a| a.view).collect(),
                color_load_ops: rendering_info.color_attachments.iter().map(|a| a.load_op).collect(),
                depth_view: rendering_info.depth_attachment.map(|a| a.view),
            },
        );
    }

    fn cmd_end_rendering(&self, cmd: vk::CommandBuffer) {
        self.state().record(cmd, HeadlessCommand::EndRendering);
    }

    fn cmd_set_viewport_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        self.state().record(cmd, HeadlessCommand::SetViewportScissor(extent));
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, _bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.state().record(cmd, HeadlessCommand::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        self.state().record(
            cmd,
            HeadlessCommand::BindDescriptorSets {
                first_set,
                sets: sets.to_vec(),
            },
        );
    }

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.state().record(
            cmd,
            HeadlessCommand::PushConstants {
                offset,
                data: data.to_vec(),
            },
        );
    }

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.state().record(
            cmd,
            HeadlessCommand::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            },
        );
    }

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, label_name: &str) {
        self.state().record(cmd, HeadlessCommand::BeginLabel(label_name.to_string()));
    }

    fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        self.state().record(cmd, HeadlessCommand::EndLabel);
    }
}

impl GfxBackend for HeadlessBackend {
    fn create_fence(&self, signaled: bool, _debug_name: &str) -> VkResult<vk::Fence> {
        let mut state = self.state();
        let fence = state.new_handle();
        state.fences.insert(fence, if signaled { FenceState::Signaled } else { FenceState::Unsignaled });
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state();
        match state.fences.remove(&fence) {
            Some(FenceState::Pending) => state.report(format!("destroy fence {:?} that is still in use", fence)),
            Some(_) => {}
            None => state.report(format!("destroy unknown fence {:?}", fence)),
        }
    }

    fn wait_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        let mut state = self.state();
        state.fence_wait_count += 1;
        match state.fences.get(&fence).copied() {
            Some(FenceState::Signaled) => Ok(()),
            Some(FenceState::Pending) => Err(vk::Result::TIMEOUT),
            Some(FenceState::Unsignaled) => {
                state.report(format!("wait on fence {:?} that has never been submitted", fence));
                Err(vk::Result::TIMEOUT)
            }
            None => {
                state.report(format!("wait on unknown fence {:?}", fence));
                Err(vk::Result::ERROR_UNKNOWN)
            }
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut state = self.state();
        match state.fences.get(&fence).copied() {
            Some(FenceState::Pending) => {
                state.report(format!("reset fence {:?} that is still in use", fence));
                Ok(())
            }
            Some(_) => {
                state.fences.insert(fence, FenceState::Unsignaled);
                Ok(())
            }
            None => {
                state.report(format!("reset unknown fence {:?}", fence));
                Err(vk::Result::ERROR_UNKNOWN)
            }
        }
    }

    fn create_semaphore(&self, _debug_name: &str) -> VkResult<vk::Semaphore> {
        let mut state = self.state();
        let semaphore = state.new_handle();
        state.semaphores.insert(semaphore, false);
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state();
        if state.semaphores.remove(&semaphore).is_none() {
            state.report(format!("destroy unknown semaphore {:?}", semaphore));
        }
    }

    fn create_command_pool(&self, _debug_name: &str) -> VkResult<vk::CommandPool> {
        let mut state = self.state();
        let pool = state.new_handle();
        state.command_pools.insert(pool);
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut state = self.state();
        if !state.command_pools.remove(&pool) {
            state.report(format!("destroy unknown command pool {:?}", pool));
        }
        state.command_buffers.retain(|_, buffer| buffer.pool != pool);
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()> {
        let mut state = self.state();
        if !state.command_pools.contains(&pool) {
            state.report(format!("reset unknown command pool {:?}", pool));
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        for buffer in state.command_buffers.values_mut().filter(|buffer| buffer.pool == pool) {
            buffer.recording = false;
            buffer.commands.clear();
        }
        Ok(())
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool, _debug_name: &str) -> VkResult<vk::CommandBuffer> {
        let mut state = self.state();
        if !state.command_pools.contains(&pool) {
            state.report(format!("allocate command buffer from unknown pool {:?}", pool));
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        let cmd = state.new_handle();
        state.command_buffers.insert(
            cmd,
            HeadlessCommandBuffer {
                pool,
                recording: false,
                commands: vec![],
            },
        );
        Ok(cmd)
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut state = self.state();
        match state.command_buffers.get_mut(&cmd) {
            Some(buffer) => {
                buffer.recording = true;
                buffer.commands.clear();
                Ok(())
            }
            None => {
                state.report(format!("begin unknown command buffer {:?}", cmd));
                Err(vk::Result::ERROR_UNKNOWN)
            }
        }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut state = self.state();
        match state.command_buffers.get_mut(&cmd) {
            Some(buffer) if buffer.recording => {
                buffer.recording = false;
                Ok(())
            }
            _ => {
                state.report(format!("end command buffer {:?} that is not recording", cmd));
                Err(vk::Result::ERROR_UNKNOWN)
            }
        }
    }

    fn queue_submit(&self, submit_info: &GfxSubmitInfo, fence: vk::Fence) -> VkResult<()> {
        let mut state = self.state();
        if let Some(result) = state.submit_results.pop_front() {
            return Err(result);
        }

        let mut commands = vec![];
        for cmd in &submit_info.command_buffers {
            match state.command_buffers.get(cmd) {
                Some(buffer) if !buffer.recording => commands.extend(buffer.commands.iter().cloned()),
                Some(_) => state.report(format!("submit command buffer {:?} that is still recording", cmd)),
                None => state.report(format!("submit unknown command buffer {:?}", cmd)),
            }
        }

        for wait in &submit_info.wait_infos {
            state.consume_semaphore(wait.semaphore, "queue submit");
        }
        for signal in &submit_info.signal_infos {
            state.signal_semaphore(signal.semaphore, "queue submit");
        }

        if fence != vk::Fence::null() {
            let next = if state.gpu_hung { FenceState::Pending } else { FenceState::Signaled };
            match state.fences.get(&fence).copied() {
                Some(FenceState::Unsignaled) => {
                    state.fences.insert(fence, next);
                }
                Some(_) => state.report(format!("submit with fence {:?} that is not reset", fence)),
                None => state.report(format!("submit with unknown fence {:?}", fence)),
            }
        }

        let descriptor_writes_before = state.descriptor_writes.len();
        state.submissions.push(HeadlessSubmission {
            command_buffers: submit_info.command_buffers.clone(),
            commands,
            wait_semaphores: submit_info.wait_infos.iter().map(|info| info.semaphore).collect(),
            signal_semaphores: submit_info.signal_infos.iter().map(|info| info.semaphore).collect(),
            fence,
            descriptor_writes_before,
        });
        Ok(())
    }

    fn wait_idle(&self) -> VkResult<()> {
        if self.state().gpu_hung { Err(vk::Result::TIMEOUT) } else { Ok(()) }
    }

    fn surface_support(&self) -> VkResult<GfxSurfaceSupport> {
        Ok(self.state().surface_support.clone())
    }

    fn create_swapchain(
        &self,
        desc: &GfxSwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> VkResult<vk::SwapchainKHR> {
        let mut state = self.state();
        if state.swapchain_failures > 0 {
            state.swapchain_failures -= 1;
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        if old_swapchain != vk::SwapchainKHR::null() && !state.swapchains.contains_key(&old_swapchain) {
            state.report(format!("create swapchain from unknown old swapchain {:?}", old_swapchain));
        }

        let swapchain = state.new_handle();
        let images = (0..desc.image_count).map(|_| state.new_handle()).collect();
        state.swapchains.insert(swapchain, HeadlessSwapchain { images, next_image: 0 });
        state.swapchain_create_count += 1;
        Ok(swapchain)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.state()
            .swapchains
            .get(&swapchain)
            .map(|sc| sc.images.clone())
            .ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state();
        if state.swapchains.remove(&swapchain).is_some() {
            state.swapchain_destroy_count += 1;
        } else {
            state.report(format!("destroy unknown swapchain {:?}", swapchain));
        }
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format, _debug_name: &str) -> VkResult<vk::ImageView> {
        let mut state = self.state();
        let view = state.new_handle();
        state.image_views.insert(view);
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut state = self.state();
        if !state.image_views.remove(&view) {
            state.report(format!("destroy unknown image view {:?}", view));
        }
    }

    fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        _tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Vec<vk::Format> {
        if features != vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT {
            return vec![];
        }
        let state = self.state();
        candidates.iter().filter(|format| state.depth_formats.contains(*format)).copied().collect()
    }

    fn create_depth_image(&self, format: vk::Format, extent: vk::Extent2D, _debug_name: &str) -> VkResult<GfxDepthImage> {
        let mut state = self.state();
        if state.depth_image_failure_skip > 0 {
            state.depth_image_failure_skip -= 1;
        } else if state.depth_image_failures > 0 {
            state.depth_image_failures -= 1;
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        if !state.depth_formats.contains(&format) {
            state.report(format!("create depth image with unsupported format {:?}", format));
            return Err(vk::Result::ERROR_FORMAT_NOT_SUPPORTED);
        }
        if extent.width == 0 || extent.height == 0 {
            state.report(format!("create depth image with zero extent {:?}", extent));
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }

        let depth_image = GfxDepthImage {
            image: state.new_handle(),
            view: state.new_handle(),
            memory: state.new_handle(),
            format,
            extent,
        };
        state.depth_images.insert(depth_image.image, depth_image);
        Ok(depth_image)
    }

    fn destroy_depth_image(&self, depth_image: GfxDepthImage) {
        let mut state = self.state();
        if state.depth_images.remove(&depth_image.image).is_none() {
            state.report(format!("destroy unknown depth image {:?}", depth_image.image));
        }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state();
        state.acquire_count += 1;

        let is_suboptimal = match state.acquire_results.pop_front() {
            None => false,
            Some(vk::Result::SUBOPTIMAL_KHR) => true,
            Some(result) => return Err(result),
        };

        if !state.swapchains.contains_key(&swapchain) {
            state.report(format!("acquire from unknown swapchain {:?}", swapchain));
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        let image_index = match state.swapchains.get_mut(&swapchain) {
            Some(sc) => {
                let index = sc.next_image;
                sc.next_image = (sc.next_image + 1) % sc.images.len().max(1) as u32;
                index
            }
            None => 0,
        };

        state.signal_semaphore(semaphore, "acquire");
        Ok((image_index, is_suboptimal))
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut state = self.state();
        if !state.swapchains.contains_key(&swapchain) {
            state.report(format!("present to unknown swapchain {:?}", swapchain));
        }
        state.consume_semaphore(wait_semaphore, "present");

        let result = state.present_results.pop_front().unwrap_or(vk::Result::SUCCESS);
        state.presents.push(HeadlessPresent {
            swapchain,
            image_index,
            wait_semaphore,
            result,
        });

        match result {
            vk::Result::SUCCESS => Ok(false),
            vk::Result::SUBOPTIMAL_KHR => Ok(true),
            err => Err(err),
        }
    }

    fn bindless_layout_desc(&self) -> GfxBindlessLayoutDesc {
        self.bindless_layout_desc
    }

    fn bindless_descriptor_set(&self) -> vk::DescriptorSet {
        self.bindless_set
    }

    fn bindless_pipeline_layout(&self) -> vk::PipelineLayout {
        self.bindless_layout
    }

    fn write_bindless_descriptors(&self, writes: &[GfxDescriptorWrite]) {
        let mut state = self.state();
        for write in writes {
            match self.bindless_layout_desc.descriptor_count(write.binding) {
                Some(count) if write.array_element < count => state.descriptor_writes.push(*write),
                Some(count) => state.report(format!(
                    "descriptor write to binding {} element {} is out of range {}",
                    write.binding, write.array_element, count
                )),
                None => state.report(format!("descriptor write to unknown binding {}", write.binding)),
            }
        }
    }
}
