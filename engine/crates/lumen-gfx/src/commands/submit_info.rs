use ash::vk;

/// 一个 semaphore 的 wait/signal 信息
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxSemaphoreSubmit {
    pub semaphore: vk::Semaphore,
    pub stage: vk::PipelineStageFlags2,
    /// 只对 timeline semaphore 有意义
    pub value: u64,
}

/// Gfx 关于 submitInfo 的封装，更易用
///
/// 不持有 Vulkan 结构体，由 backend 在提交时组装 `vk::SubmitInfo2`
#[derive(Clone, Debug, Default)]
pub struct GfxSubmitInfo {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub wait_infos: Vec<GfxSemaphoreSubmit>,
    pub signal_infos: Vec<GfxSemaphoreSubmit>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[vk::CommandBuffer]) -> Self {
        Self {
            command_buffers: commands.to_vec(),
            wait_infos: vec![],
            signal_infos: vec![],
        }
    }

    #[inline]
    pub fn wait(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.wait_infos.push(GfxSemaphoreSubmit {
            semaphore,
            stage,
            value: value.unwrap_or_default(),
        });
        self
    }

    #[inline]
    pub fn signal(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.signal_infos.push(GfxSemaphoreSubmit {
            semaphore,
            stage,
            value: value.unwrap_or_default(),
        });
        self
    }
}
