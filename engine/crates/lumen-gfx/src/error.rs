use ash::vk;

#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("vulkan call `{call}` failed: {result}")]
    Vk { call: &'static str, result: vk::Result },
}

pub trait VkResultExt<T> {
    /// 给 `vk::Result` 附加上失败的调用名称
    fn call(self, call: &'static str) -> Result<T, GfxError>;
}

impl<T> VkResultExt<T> for ash::prelude::VkResult<T> {
    #[inline]
    fn call(self, call: &'static str) -> Result<T, GfxError> {
        self.map_err(|result| GfxError::Vk { call, result })
    }
}
