use ash::vk;
use itertools::Itertools;
use lumen_gfx::backend::GfxBackend;
use lumen_render_interface::pipeline_settings::FrameLabel;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame context {label} did not complete within {timeout_ns} ns")]
    CompletionTimeout { label: FrameLabel, timeout_ns: u64 },
    #[error("gfx call failed while managing frame contexts: {0}")]
    Gfx(vk::Result),
}

/// 一个 frame in flight 独占的全部对象
#[derive(Copy, Clone, Debug)]
pub struct FrameContext {
    pub label: FrameLabel,
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    /// 创建时为 signaled，只在即将提交之前 reset
    pub completion_fence: vk::Fence,
    /// 由 acquire signal，由本帧的提交等待
    pub image_available: vk::Semaphore,
    /// 最近一次提交时的帧序号
    pub submitted_generation: Option<u64>,
}

// new & init
impl FrameContext {
    fn new(gfx: &impl GfxBackend, label: FrameLabel) -> Result<Self, vk::Result> {
        let command_pool = gfx.create_command_pool(&format!("frame-{}", label))?;
        let command_buffer = match gfx.allocate_command_buffer(command_pool, &format!("frame-{}", label)) {
            Ok(cmd) => cmd,
            Err(e) => {
                gfx.destroy_command_pool(command_pool);
                return Err(e);
            }
        };
        let completion_fence = match gfx.create_fence(true, &format!("frame-complete-{}", label)) {
            Ok(fence) => fence,
            Err(e) => {
                gfx.destroy_command_pool(command_pool);
                return Err(e);
            }
        };
        let image_available = match gfx.create_semaphore(&format!("image-available-{}", label)) {
            Ok(semaphore) => semaphore,
            Err(e) => {
                gfx.destroy_fence(completion_fence);
                gfx.destroy_command_pool(command_pool);
                return Err(e);
            }
        };

        Ok(Self {
            label,
            command_pool,
            command_buffer,
            completion_fence,
            image_available,
            submitted_generation: None,
        })
    }
}

// destroy
impl FrameContext {
    fn destroy(self, gfx: &impl GfxBackend) {
        gfx.destroy_semaphore(self.image_available);
        gfx.destroy_fence(self.completion_fence);
        gfx.destroy_command_pool(self.command_pool);
    }
}

/// 固定数量的 frame context，按照帧序号轮流使用
pub struct FramePool {
    contexts: Vec<FrameContext>,
}

// new & init
impl FramePool {
    /// fif_count 需要在 1..=3 之间，由 `RendererSettings::validate` 保证
    pub fn new(gfx: &impl GfxBackend, fif_count: usize) -> Result<Self, FrameError> {
        let mut contexts = Vec::with_capacity(fif_count);
        for label in (0..fif_count.max(1)).map(FrameLabel::from_usize) {
            match FrameContext::new(gfx, label) {
                Ok(ctx) => contexts.push(ctx),
                Err(e) => {
                    contexts.into_iter().for_each(|ctx: FrameContext| ctx.destroy(gfx));
                    return Err(FrameError::Gfx(e));
                }
            }
        }

        log::info!("frame pool created with {} contexts", contexts.len());
        Ok(Self { contexts })
    }
}

// getters
impl FramePool {
    #[inline]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    #[inline]
    pub fn contexts(&self) -> &[FrameContext] {
        &self.contexts
    }

    #[inline]
    pub fn context_mut(&mut self, label: FrameLabel) -> Option<&mut FrameContext> {
        self.contexts.get_mut(*label)
    }
}

// update
impl FramePool {
    /// 选择 `generation % N` 对应的 context
    ///
    /// 等待它上一次提交完成，然后 reset 它的 command pool。fence 不会在这里 reset。
    ///
    /// timeout: nano seconds
    pub fn next_context(
        &mut self,
        gfx: &impl GfxBackend,
        generation: u64,
        timeout_ns: u64,
    ) -> Result<&mut FrameContext, FrameError> {
        let _span = tracy_client::span!("FramePool::next_context");
        let index = (generation % self.contexts.len().max(1) as u64) as usize;
        let ctx = self.contexts.get_mut(index).ok_or(FrameError::Gfx(vk::Result::ERROR_INITIALIZATION_FAILED))?;

        match gfx.wait_fence(ctx.completion_fence, timeout_ns) {
            Ok(()) => {}
            Err(vk::Result::TIMEOUT) => {
                return Err(FrameError::CompletionTimeout {
                    label: ctx.label,
                    timeout_ns,
                });
            }
            Err(e) => return Err(FrameError::Gfx(e)),
        }
        gfx.reset_command_pool(ctx.command_pool).map_err(FrameError::Gfx)?;

        Ok(ctx)
    }

    /// 等待所有 context 的提交完成，用于重建 surface 之前
    pub fn wait_all(&self, gfx: &impl GfxBackend, timeout_ns: u64) -> Result<(), FrameError> {
        let _span = tracy_client::span!("FramePool::wait_all");
        for ctx in &self.contexts {
            match gfx.wait_fence(ctx.completion_fence, timeout_ns) {
                Ok(()) => {}
                Err(vk::Result::TIMEOUT) => {
                    return Err(FrameError::CompletionTimeout {
                        label: ctx.label,
                        timeout_ns,
                    });
                }
                Err(e) => return Err(FrameError::Gfx(e)),
            }
        }
        Ok(())
    }
}

// destroy
impl FramePool {
    /// 不限时地等待所有提交完成，然后销毁
    pub fn destroy(self, gfx: &impl GfxBackend) {
        for ctx in &self.contexts {
            if let Err(e) = gfx.wait_fence(ctx.completion_fence, u64::MAX) {
                log::error!("failed to wait frame context {} before destroy: {:?}", ctx.label, e);
            }
        }
        log::info!(
            "destroy frame contexts: {}",
            self.contexts.iter().map(|ctx| ctx.label.to_string()).join(", ")
        );
        self.contexts.into_iter().for_each(|ctx| ctx.destroy(gfx));
    }
}

#[cfg(test)]
mod tests {
    use lumen_gfx::backend::GfxCommandRecorder;
    use lumen_gfx::commands::submit_info::GfxSubmitInfo;
    use lumen_gfx::headless::HeadlessBackend;

    use super::*;

    fn submit(gfx: &HeadlessBackend, ctx: &FrameContext) {
        gfx.begin_command_buffer(ctx.command_buffer).unwrap();
        gfx.end_command_buffer(ctx.command_buffer).unwrap();
        gfx.reset_fence(ctx.completion_fence).unwrap();
        gfx.queue_submit(&GfxSubmitInfo::new(&[ctx.command_buffer]), ctx.completion_fence).unwrap();
    }

    #[test]
    fn contexts_rotate_with_generation() {
        let gfx = HeadlessBackend::new();
        let mut pool = FramePool::new(&gfx, 2).unwrap();
        assert_eq!(pool.len(), 2);

        let labels = (0..5).map(|g| pool.next_context(&gfx, g, 1_000).unwrap().label).collect_vec();
        assert_eq!(labels, vec![FrameLabel::A, FrameLabel::B, FrameLabel::A, FrameLabel::B, FrameLabel::A]);
        assert_eq!(gfx.fence_wait_count(), 5);
        assert!(gfx.validation_errors().is_empty());
    }

    #[test]
    fn hung_context_times_out() {
        let gfx = HeadlessBackend::new();
        let mut pool = FramePool::new(&gfx, 1).unwrap();
        let ctx = *pool.next_context(&gfx, 0, 1_000).unwrap();

        gfx.set_gpu_hung(true);
        submit(&gfx, &ctx);
        assert_eq!(
            pool.next_context(&gfx, 1, 1_000).unwrap_err(),
            FrameError::CompletionTimeout {
                label: FrameLabel::A,
                timeout_ns: 1_000
            }
        );
        assert!(pool.wait_all(&gfx, 1_000).is_err());

        gfx.set_gpu_hung(false);
        assert!(pool.next_context(&gfx, 1, 1_000).is_ok());
        assert!(pool.wait_all(&gfx, 1_000).is_ok());
    }

    #[test]
    fn next_context_discards_previous_commands() {
        let gfx = HeadlessBackend::new();
        let mut pool = FramePool::new(&gfx, 1).unwrap();
        let ctx = *pool.next_context(&gfx, 0, 1_000).unwrap();
        gfx.begin_command_buffer(ctx.command_buffer).unwrap();
        gfx.cmd_begin_label(ctx.command_buffer, "stale");
        assert_eq!(gfx.recorded_commands(ctx.command_buffer).len(), 1);

        pool.next_context(&gfx, 1, 1_000).unwrap();
        assert!(gfx.recorded_commands(ctx.command_buffer).is_empty());
        // fence 仍然是 signaled
        assert!(gfx.is_fence_signaled(ctx.completion_fence));
    }

    #[test]
    fn destroy_releases_every_object() {
        let gfx = HeadlessBackend::new();
        let pool = FramePool::new(&gfx, 3).unwrap();
        assert_eq!(gfx.live_object_count(), 3 * 3);
        pool.destroy(&gfx);
        assert_eq!(gfx.live_object_count(), 0);
        assert!(gfx.validation_errors().is_empty());
    }
}
