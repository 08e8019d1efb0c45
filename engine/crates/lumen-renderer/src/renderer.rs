use std::sync::Arc;

use ash::vk;
use itertools::Itertools;
use lumen_crate_tools::timer::Timer;
use lumen_gfx::backend::GfxBackend;
use lumen_gfx::commands::barrier::GfxImageBarrier;
use lumen_gfx::commands::submit_info::GfxSubmitInfo;
use lumen_gfx::swapchain::surface_image::SurfaceImage;
use lumen_render_graph::attachments::FrameAttachments;
use lumen_render_graph::render_pipeline::RenderPipeline;
use lumen_render_graph::stage::{FrameInputs, RecordingFailure, StageContext};
use lumen_render_interface::bindless_table::BindlessTable;
use lumen_render_interface::frame_counter::FrameCounter;
use lumen_render_interface::pipeline_settings::{
    BindlessCapacities, DefaultRendererSettings, RendererSettings, SettingsError,
};

use crate::depth_targets::{DepthTargetError, DepthTargets};
use crate::frame_pool::{FrameContext, FrameError, FramePool};
use crate::present::render_present::{AcquireResult, PresentError, RenderPresent, SurfaceOutcome, SurfaceState};

/// 帧被丢弃的原因
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// 某个 stage 录制失败，整帧的命令都被丢弃
    RecordingFailed,
    /// surface 无法重建，例如窗口被最小化
    SurfaceUnavailable,
    AcquireTimeout,
    CompletionTimeout,
}

impl DropReason {
    #[inline]
    fn is_timeout(self) -> bool {
        matches!(self, Self::AcquireTimeout | Self::CompletionTimeout)
    }
}

/// 一次 tick 的结果
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickStatus {
    Rendered,
    Dropped(DropReason),
    /// 本次 tick 重建了 surface，没有渲染
    Recreated,
}

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("invalid renderer settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("depth target: {0}")]
    DepthTarget(#[from] DepthTargetError),
    #[error("device did not respond for {0} consecutive ticks")]
    DeviceUnresponsive(u32),
    #[error("gfx call failed: {0}")]
    Gfx(vk::Result),
    #[error("unexpected presentation error: {0}")]
    Present(PresentError),
}

impl From<PresentError> for RendererError {
    fn from(e: PresentError) -> Self {
        match e {
            PresentError::Gfx(result) => Self::Gfx(result),
            other => Self::Present(other),
        }
    }
}

/// 帧组织
///
/// 每次 [`Renderer::tick`] 依次经过：
/// 1. 重建 surface 与深度 target（如果需要）
/// 2. 选择 frame context，等待它上一次的提交完成
/// 3. acquire swapchain image
/// 4. 录制 render pipeline
/// 5. 写入 bindless descriptor，提交并 present
pub struct Renderer<B: GfxBackend> {
    gfx: B,
    settings: RendererSettings,

    frame_counter: FrameCounter,
    frame_pool: FramePool,
    render_present: RenderPresent,
    pipeline: RenderPipeline,
    attachments: FrameAttachments,
    depth_targets: DepthTargets,
    bindless: Arc<BindlessTable>,

    /// window 最近一次通知的尺寸
    surface_extent: vk::Extent2D,
    consecutive_timeouts: u32,
    timer: Timer,
}

// new & init
impl<B: GfxBackend> Renderer<B> {
    /// 创建 frame context 和第一个 swapchain
    ///
    /// swapchain 创建失败不是致命错误，会在第一次 tick 时重试
    pub fn new(
        gfx: B,
        settings: RendererSettings,
        pipeline: RenderPipeline,
        extent: vk::Extent2D,
    ) -> Result<Self, RendererError> {
        settings.validate()?;
        tracy_client::Client::start();

        let mut depth_targets = DepthTargets::new(&gfx, pipeline.depth_targets())?;
        let frame_pool = FramePool::new(&gfx, settings.frames_in_flight).map_err(|e| match e {
            FrameError::Gfx(result) => RendererError::Gfx(result),
            FrameError::CompletionTimeout { .. } => RendererError::Gfx(vk::Result::TIMEOUT),
        })?;

        let mut render_present =
            RenderPresent::new(DefaultRendererSettings::DEFAULT_SURFACE_FORMAT, settings.present_mode.to_vk());
        let mut attachments = FrameAttachments::new();
        match render_present.recreate(&gfx, extent) {
            Ok(_) => {
                if let Some(surface_extent) = render_present.extent()
                    && let Err(e) = depth_targets.rebuild(&gfx, surface_extent, &mut attachments)
                {
                    log::warn!("initial depth target creation failed, retry on the first tick: {}", e);
                }
            }
            Err(e) => log::warn!("initial swapchain creation failed, retry on the first tick: {}", e),
        }

        let capacities = Self::bindless_capacities(&gfx, &settings.bindless);
        let bindless = Arc::new(BindlessTable::new(&capacities, settings.frames_in_flight));
        let frame_counter = FrameCounter::new(0, settings.frames_in_flight);

        log::info!(
            "renderer created: {} frames in flight ({}), {}x{}",
            settings.frames_in_flight,
            frame_counter.frame_labels().iter().join(""),
            extent.width,
            extent.height
        );

        Ok(Self {
            gfx,
            settings,
            frame_counter,
            frame_pool,
            render_present,
            pipeline,
            attachments,
            depth_targets,
            bindless,
            surface_extent: extent,
            consecutive_timeouts: 0,
            timer: Timer::default(),
        })
    }

    /// 上限不能超过 descriptor set 中数组的长度，没有配置上限时使用数组长度
    fn bindless_capacities(gfx: &B, configured: &BindlessCapacities) -> BindlessCapacities {
        let layout = gfx.bindless_layout_desc();
        let capacities = configured.clamp_to_layout(&layout);
        let shrunk = [
            (configured.uniform_buffers, capacities.uniform_buffers),
            (configured.storage_buffers, capacities.storage_buffers),
            (configured.sampled_images, capacities.sampled_images),
        ]
        .into_iter()
        .any(|(configured, clamped)| configured.is_some() && configured != clamped);
        if shrunk {
            log::warn!("bindless capacities {:?} exceed the descriptor arrays, clamped to {:?}", configured, capacities);
        }
        capacities
    }
}

// getters
impl<B: GfxBackend> Renderer<B> {
    #[inline]
    pub fn gfx(&self) -> &B {
        &self.gfx
    }

    #[inline]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// 资源加载线程通过它注册 bindless 资源
    #[inline]
    pub fn bindless(&self) -> Arc<BindlessTable> {
        self.bindless.clone()
    }

    /// 注册离屏 target，例如在 [`TickStatus::Recreated`] 之后按新的尺寸重新注册
    ///
    /// 深度 target 由 renderer 自己管理，不需要在这里注册
    #[inline]
    pub fn attachments_mut(&mut self) -> &mut FrameAttachments {
        &mut self.attachments
    }

    #[inline]
    pub fn depth_targets(&self) -> &DepthTargets {
        &self.depth_targets
    }

    #[inline]
    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    #[inline]
    pub fn frame_pool(&self) -> &FramePool {
        &self.frame_pool
    }

    #[inline]
    pub fn surface_state(&self) -> SurfaceState {
        self.render_present.state()
    }

    /// 当前 swapchain 的实际尺寸
    #[inline]
    pub fn surface_extent(&self) -> Option<vk::Extent2D> {
        self.render_present.extent()
    }

    #[inline]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }
}

// update
impl<B: GfxBackend> Renderer<B> {
    /// window 尺寸改变或者 surface 发生变化，在下一次 tick 开始时重建
    pub fn notify_surface_changed(&mut self, extent: vk::Extent2D) {
        log::info!("surface changed: {}x{}", extent.width, extent.height);
        self.surface_extent = extent;
        self.render_present.invalidate();
    }

    pub fn tick(&mut self, inputs: &FrameInputs) -> Result<TickStatus, RendererError> {
        let _span = tracy_client::span!("Renderer::tick");
        self.timer.tick();

        let status = self.run_phases(inputs)?;
        match status {
            TickStatus::Dropped(reason) if reason.is_timeout() => {}
            _ => self.consecutive_timeouts = 0,
        }
        Ok(status)
    }

    fn run_phases(&mut self, inputs: &FrameInputs) -> Result<TickStatus, RendererError> {
        if self.render_present.state() != SurfaceState::Valid || self.depth_targets_stale() {
            return self.recreate_surface();
        }

        // select context
        let generation = self.frame_counter.frame_id();
        let frame_name = self.frame_counter.frame_name();
        let ctx = match self.frame_pool.next_context(&self.gfx, generation, self.settings.completion_timeout_ns()) {
            Ok(ctx) => *ctx,
            Err(FrameError::CompletionTimeout { label, .. }) => {
                log::error!("{} frame context {} is still busy", frame_name, label);
                return self.on_timeout(DropReason::CompletionTimeout);
            }
            Err(FrameError::Gfx(e)) => return Err(RendererError::Gfx(e)),
        };
        self.frame_counter.next_frame();
        self.bindless.begin_frame(generation);

        // acquire
        let acquired =
            self.render_present.acquire_next(&self.gfx, ctx.image_available, self.settings.acquire_timeout_ns());
        let (image, acquire_suboptimal) = match acquired {
            Ok(AcquireResult::Ready(image)) => (image, false),
            Ok(AcquireResult::Suboptimal(image)) => (image, true),
            Ok(AcquireResult::Invalidated) => return self.recreate_surface(),
            Err(PresentError::AcquireTimeout) => {
                log::error!("{} acquire timed out", frame_name);
                return self.on_timeout(DropReason::AcquireTimeout);
            }
            Err(e) => return Err(e.into()),
        };

        // record
        let status = match self.record_frame(&ctx, &image, &frame_name, inputs, generation)? {
            Ok(()) => TickStatus::Rendered,
            Err(failure) => {
                log::error!("{} dropped, recording failed: {}", frame_name, failure);
                self.record_release(&ctx, &image, &frame_name)?;
                TickStatus::Dropped(DropReason::RecordingFailed)
            }
        };

        self.publish_bindless();
        self.submit(&ctx, &image, generation)?;

        // present
        match self.render_present.present(&self.gfx, &image) {
            Ok(SurfaceOutcome::Ready) if !acquire_suboptimal => {}
            Ok(_) => {
                log::info!("{} swapchain is suboptimal, recreate on next tick", frame_name);
                self.render_present.invalidate();
            }
            Err(PresentError::PresentationLost(_)) => return self.recreate_surface(),
            Err(e) => return Err(e.into()),
        }

        Ok(status)
    }

    fn depth_targets_stale(&self) -> bool {
        self.render_present.extent().is_some_and(|extent| self.depth_targets.is_stale(extent))
    }

    /// 在提交之前把新的 bindless 资源写入 descriptor set
    ///
    /// 录制期间 store/update 得到的 index 也包含在内，所以只能在录制结束之后写入
    fn publish_bindless(&mut self) {
        let writes = self.bindless.take_pending_writes();
        if !writes.is_empty() {
            log::debug!("flush {} bindless descriptor writes", writes.len());
            self.gfx.write_bindless_descriptors(&writes.iter().map(|write| write.to_gfx()).collect_vec());
        }
    }

    /// 外层的 Result 是 GPU 错误，内层的是 stage 的录制失败
    ///
    /// 录制失败时 command buffer 仍处于录制状态，由 [`Self::record_release`] 丢弃
    fn record_frame(
        &mut self,
        ctx: &FrameContext,
        image: &SurfaceImage,
        frame_name: &str,
        inputs: &FrameInputs,
        generation: u64,
    ) -> Result<Result<(), RecordingFailure>, RendererError> {
        let _span = tracy_client::span!("Renderer::record_frame");
        let cmd = ctx.command_buffer;

        self.gfx.begin_command_buffer(cmd).map_err(RendererError::Gfx)?;
        self.gfx.cmd_begin_label(cmd, frame_name);
        let barriers = std::iter::once(GfxImageBarrier::present_to_color_attachment(image.image))
            .chain(
                self.depth_targets
                    .images()
                    .iter()
                    .map(|depth| GfxImageBarrier::undefined_to_depth_attachment(depth.image, depth.aspect())),
            )
            .collect_vec();
        self.gfx.cmd_image_barrier(cmd, &barriers);

        self.attachments.set_surface(Some(*image));
        let result = {
            let mut stage_ctx = StageContext {
                cmd,
                recorder: &self.gfx,
                attachments: &self.attachments,
                inputs,
                bindless: &self.bindless,
                bindless_set: self.gfx.bindless_descriptor_set(),
                bindless_layout: self.gfx.bindless_pipeline_layout(),
                frame_label: ctx.label,
                generation,
            };
            self.pipeline.execute(&mut stage_ctx)
        };
        self.attachments.set_surface(None);

        if result.is_ok() {
            self.gfx.cmd_image_barrier(cmd, &[GfxImageBarrier::color_attachment_to_present(image.image)]);
            self.gfx.cmd_end_label(cmd);
            self.gfx.end_command_buffer(cmd).map_err(RendererError::Gfx)?;
        }
        Ok(result)
    }

    /// 丢弃已经录制的命令，只录制一个 layout 转换，把 image 归还给 present 引擎
    fn record_release(&mut self, ctx: &FrameContext, image: &SurfaceImage, frame_name: &str) -> Result<(), RendererError> {
        let cmd = ctx.command_buffer;
        self.gfx.reset_command_pool(ctx.command_pool).map_err(RendererError::Gfx)?;

        self.gfx.begin_command_buffer(cmd).map_err(RendererError::Gfx)?;
        self.gfx.cmd_begin_label(cmd, &format!("{}release-image", frame_name));
        self.gfx.cmd_image_barrier(cmd, &[GfxImageBarrier::discard_to_present(image.image)]);
        self.gfx.cmd_end_label(cmd);
        self.gfx.end_command_buffer(cmd).map_err(RendererError::Gfx)
    }

    fn submit(&mut self, ctx: &FrameContext, image: &SurfaceImage, generation: u64) -> Result<(), RendererError> {
        let _span = tracy_client::span!("Renderer::submit");
        let render_complete = self
            .render_present
            .render_complete_semaphore(image.index)
            .ok_or(RendererError::Gfx(vk::Result::ERROR_UNKNOWN))?;
        let submit_info = GfxSubmitInfo::new(&[ctx.command_buffer])
            .wait(ctx.image_available, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, None)
            .signal(render_complete, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, None);

        // fence 只在这里 reset，紧接着的提交一定会 signal 它
        self.gfx.reset_fence(ctx.completion_fence).map_err(RendererError::Gfx)?;
        self.gfx.queue_submit(&submit_info, ctx.completion_fence).map_err(RendererError::Gfx)?;

        if let Some(context) = self.frame_pool.context_mut(ctx.label) {
            context.submitted_generation = Some(generation);
        }
        Ok(())
    }

    /// 等待所有帧完成，然后按照最近一次通知的尺寸重建 surface，深度 target 跟随 swapchain 的实际尺寸
    fn recreate_surface(&mut self) -> Result<TickStatus, RendererError> {
        let _span = tracy_client::span!("Renderer::recreate_surface");
        match self.frame_pool.wait_all(&self.gfx, self.settings.completion_timeout_ns()) {
            Ok(()) => {}
            Err(FrameError::CompletionTimeout { label, .. }) => {
                log::error!("frame context {} is still busy, surface recreation postponed", label);
                return self.on_timeout(DropReason::CompletionTimeout);
            }
            Err(FrameError::Gfx(e)) => return Err(RendererError::Gfx(e)),
        }

        match self.render_present.recreate(&self.gfx, self.surface_extent) {
            Ok(_) => {}
            Err(PresentError::Gfx(vk::Result::ERROR_DEVICE_LOST)) => {
                return Err(RendererError::Gfx(vk::Result::ERROR_DEVICE_LOST));
            }
            Err(e) => {
                log::warn!("surface unavailable, frame dropped: {}", e);
                return Ok(TickStatus::Dropped(DropReason::SurfaceUnavailable));
            }
        }

        if let Some(extent) = self.render_present.extent()
            && self.depth_targets.is_stale(extent)
        {
            match self.depth_targets.rebuild(&self.gfx, extent, &mut self.attachments) {
                Ok(()) => {}
                Err(DepthTargetError::Gfx {
                    result: vk::Result::ERROR_DEVICE_LOST,
                    ..
                }) => return Err(RendererError::Gfx(vk::Result::ERROR_DEVICE_LOST)),
                Err(e) => {
                    log::warn!("depth targets unavailable, frame dropped: {}", e);
                    return Ok(TickStatus::Dropped(DropReason::SurfaceUnavailable));
                }
            }
        }
        Ok(TickStatus::Recreated)
    }

    fn on_timeout(&mut self, reason: DropReason) -> Result<TickStatus, RendererError> {
        self.consecutive_timeouts += 1;
        if self.consecutive_timeouts > self.settings.max_consecutive_timeouts {
            log::error!("device unresponsive after {} consecutive timeouts", self.consecutive_timeouts);
            return Err(RendererError::DeviceUnresponsive(self.consecutive_timeouts));
        }
        log::error!("frame dropped: {:?} ({} consecutive timeouts)", reason, self.consecutive_timeouts);
        Ok(TickStatus::Dropped(reason))
    }
}

// destroy
impl<B: GfxBackend> Renderer<B> {
    /// 等待所有帧完成，销毁深度 target、frame context 与 swapchain，然后交还 backend
    pub fn destroy(self) -> B {
        let Self {
            gfx,
            frame_pool,
            mut render_present,
            depth_targets,
            ..
        } = self;

        if let Err(e) = gfx.wait_idle() {
            log::error!("wait idle failed before destroy: {:?}", e);
        }
        depth_targets.destroy(&gfx);
        frame_pool.destroy(&gfx);
        render_present.destroy(&gfx);

        log::info!("renderer destroyed");
        gfx
    }
}
