use ash::vk;
use lumen_gfx::backend::GfxBackend;
use lumen_gfx::swapchain::surface_image::SurfaceImage;
use lumen_gfx::swapchain::surface_support::GfxSwapchainDesc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    /// 可以 acquire
    Valid,
    /// 需要在下一次 tick 开始时重建
    Invalidated,
    Recreating,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquireResult {
    Ready(SurfaceImage),
    /// 可以继续使用，但需要安排重建
    Suboptimal(SurfaceImage),
    /// 本次 tick 不能渲染，需要重建
    Invalidated,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SurfaceOutcome {
    Ready,
    Suboptimal,
}

#[derive(Copy, Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum PresentError {
    #[error("acquire timed out")]
    AcquireTimeout,
    #[error("presentation surface lost: {0}")]
    PresentationLost(vk::Result),
    #[error("surface extent is zero")]
    ZeroExtent,
    #[error("surface reports no usable format")]
    NoSurfaceFormat,
    #[error("gfx call failed: {0}")]
    Gfx(vk::Result),
}

/// 一次 swapchain 配置得到的全部对象，重建时整体替换
struct SurfaceImageSet {
    swapchain: vk::SwapchainKHR,
    desc: GfxSwapchainDesc,
    /// 触发这次创建时请求的尺寸，可能与 swapchain 实际尺寸不同
    requested_extent: vk::Extent2D,
    images: Vec<SurfaceImage>,
    /// 每个 swapchain image 一个：提交时 signal，present 时等待
    render_complete_semaphores: Vec<vk::Semaphore>,
}

impl SurfaceImageSet {
    fn destroy(self, gfx: &impl GfxBackend) {
        self.render_complete_semaphores.into_iter().for_each(|semaphore| gfx.destroy_semaphore(semaphore));
        self.images.into_iter().for_each(|image| gfx.destroy_image_view(image.view));
        gfx.destroy_swapchain(self.swapchain);
    }

    /// 为新的 swapchain 创建 view 和 semaphore；失败时已经创建的部分保留在 self 中，由调用者销毁
    fn create_image_resources(&mut self, gfx: &impl GfxBackend) -> Result<(), PresentError> {
        let images = gfx.swapchain_images(self.swapchain).map_err(PresentError::Gfx)?;
        for (index, image) in images.into_iter().enumerate() {
            let view = gfx
                .create_image_view(image, self.desc.format.format, &format!("swapchain-image-{}", index))
                .map_err(PresentError::Gfx)?;
            self.images.push(SurfaceImage {
                index: index as u32,
                image,
                view,
                format: self.desc.format.format,
                extent: self.desc.extent,
            });

            let semaphore =
                gfx.create_semaphore(&format!("render-complete-{}", index)).map_err(PresentError::Gfx)?;
            self.render_complete_semaphores.push(semaphore);
        }
        Ok(())
    }
}

/// surface 的 swapchain、image view 以及 present 同步对象
pub struct RenderPresent {
    state: SurfaceState,
    current: Option<SurfaceImageSet>,

    preferred_format: vk::SurfaceFormatKHR,
    preferred_present_mode: vk::PresentModeKHR,
}

// new & init
impl RenderPresent {
    /// 创建之后处于 Invalidated 状态，第一次 [`Self::recreate`] 才会创建 swapchain
    pub fn new(preferred_format: vk::SurfaceFormatKHR, preferred_present_mode: vk::PresentModeKHR) -> Self {
        Self {
            state: SurfaceState::Invalidated,
            current: None,
            preferred_format,
            preferred_present_mode,
        }
    }
}

// getters
impl RenderPresent {
    #[inline]
    pub fn state(&self) -> SurfaceState {
        self.state
    }

    /// 当前 swapchain 的实际尺寸
    #[inline]
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.current.as_ref().map(|set| set.desc.extent)
    }

    #[inline]
    pub fn swapchain_desc(&self) -> Option<&GfxSwapchainDesc> {
        self.current.as_ref().map(|set| &set.desc)
    }

    #[inline]
    pub fn images(&self) -> &[SurfaceImage] {
        self.current.as_ref().map_or(&[], |set| set.images.as_slice())
    }

    #[inline]
    pub fn render_complete_semaphore(&self, image_index: u32) -> Option<vk::Semaphore> {
        self.current.as_ref()?.render_complete_semaphores.get(image_index as usize).copied()
    }
}

// update
impl RenderPresent {
    /// 外部通知 surface 已经变化，例如窗口尺寸改变
    pub fn invalidate(&mut self) {
        if self.state == SurfaceState::Valid {
            log::info!("surface invalidated");
            self.state = SurfaceState::Invalidated;
        }
    }

    /// 重建 swapchain，成功之后才销毁旧的 swapchain
    ///
    /// 调用者需要保证旧 swapchain 的 image 不再被 GPU 使用
    pub fn recreate(&mut self, gfx: &impl GfxBackend, new_extent: vk::Extent2D) -> Result<SurfaceOutcome, PresentError> {
        let _span = tracy_client::span!("RenderPresent::recreate");

        if self.state == SurfaceState::Valid {
            if let Some(set) = &self.current {
                if set.desc.extent == new_extent || set.requested_extent == new_extent {
                    return Ok(SurfaceOutcome::Ready);
                }
            }
        }
        if new_extent.width == 0 || new_extent.height == 0 {
            self.state = SurfaceState::Invalidated;
            return Err(PresentError::ZeroExtent);
        }

        self.state = SurfaceState::Recreating;
        match self.build_image_set(gfx, new_extent) {
            Ok(new_set) => {
                log::info!(
                    "swapchain created: {}x{}, {} images, {:?}, {:?}",
                    new_set.desc.extent.width,
                    new_set.desc.extent.height,
                    new_set.images.len(),
                    new_set.desc.format.format,
                    new_set.desc.present_mode
                );
                if let Some(old_set) = self.current.replace(new_set) {
                    old_set.destroy(gfx);
                }
                self.state = SurfaceState::Valid;
                Ok(SurfaceOutcome::Ready)
            }
            Err(e) => {
                log::warn!("failed to recreate swapchain ({}x{}): {}", new_extent.width, new_extent.height, e);
                self.state = SurfaceState::Invalidated;
                Err(e)
            }
        }
    }

    fn build_image_set(&self, gfx: &impl GfxBackend, requested_extent: vk::Extent2D) -> Result<SurfaceImageSet, PresentError> {
        let support = gfx.surface_support().map_err(PresentError::Gfx)?;
        let desc = support
            .choose(self.preferred_format, self.preferred_present_mode, requested_extent)
            .ok_or(PresentError::NoSurfaceFormat)?;
        // surface 被最小化时 current_extent 可能为 0
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(PresentError::ZeroExtent);
        }

        let old_swapchain = self.current.as_ref().map_or(vk::SwapchainKHR::null(), |set| set.swapchain);
        let swapchain = gfx.create_swapchain(&desc, old_swapchain).map_err(PresentError::Gfx)?;

        let mut new_set = SurfaceImageSet {
            swapchain,
            desc,
            requested_extent,
            images: vec![],
            render_complete_semaphores: vec![],
        };
        if let Err(e) = new_set.create_image_resources(gfx) {
            new_set.destroy(gfx);
            return Err(e);
        }
        Ok(new_set)
    }

    /// 获取下一张 image，并 signal `image_available`
    ///
    /// timeout: nano seconds
    pub fn acquire_next(
        &mut self,
        gfx: &impl GfxBackend,
        image_available: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<AcquireResult, PresentError> {
        let _span = tracy_client::span!("RenderPresent::acquire_next");
        if self.state != SurfaceState::Valid {
            return Ok(AcquireResult::Invalidated);
        }
        let Some(set) = &self.current else {
            return Ok(AcquireResult::Invalidated);
        };

        match gfx.acquire_next_image(set.swapchain, timeout_ns, image_available) {
            Ok((image_index, is_suboptimal)) => {
                let image = set.images.get(image_index as usize).copied().ok_or(PresentError::Gfx(vk::Result::ERROR_UNKNOWN))?;
                if is_suboptimal {
                    log::warn!("swapchain is suboptimal at acquire");
                    Ok(AcquireResult::Suboptimal(image))
                } else {
                    Ok(AcquireResult::Ready(image))
                }
            }
            Err(e @ (vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::ERROR_SURFACE_LOST_KHR)) => {
                log::warn!("swapchain invalidated at acquire: {:?}", e);
                self.state = SurfaceState::Invalidated;
                Ok(AcquireResult::Invalidated)
            }
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Err(PresentError::AcquireTimeout),
            Err(e) => Err(PresentError::Gfx(e)),
        }
    }

    /// 等待 image 对应的 render complete semaphore，然后 present
    pub fn present(&mut self, gfx: &impl GfxBackend, image: &SurfaceImage) -> Result<SurfaceOutcome, PresentError> {
        let _span = tracy_client::span!("RenderPresent::present");
        let set = self.current.as_ref().ok_or(PresentError::PresentationLost(vk::Result::ERROR_OUT_OF_DATE_KHR))?;
        let wait_semaphore = set
            .render_complete_semaphores
            .get(image.index as usize)
            .copied()
            .ok_or(PresentError::Gfx(vk::Result::ERROR_UNKNOWN))?;

        match gfx.queue_present(set.swapchain, image.index, wait_semaphore) {
            Ok(false) => Ok(SurfaceOutcome::Ready),
            Ok(true) => {
                log::warn!("swapchain is suboptimal at present");
                Ok(SurfaceOutcome::Suboptimal)
            }
            Err(e @ (vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::ERROR_SURFACE_LOST_KHR)) => {
                log::warn!("presentation lost: {:?}", e);
                self.state = SurfaceState::Invalidated;
                Err(PresentError::PresentationLost(e))
            }
            Err(e) => Err(PresentError::Gfx(e)),
        }
    }
}

// destroy
impl RenderPresent {
    pub fn destroy(&mut self, gfx: &impl GfxBackend) {
        if let Some(set) = self.current.take() {
            set.destroy(gfx);
        }
        self.state = SurfaceState::Invalidated;
    }
}
