//! GPU 边界层
//!
//! 帧组织逻辑只通过 [`backend::GfxBackend`] 与 GPU 交互，所有对象都以 `ash::vk` 的不透明句柄表示。
//!
//! - [`vulkan::VulkanBackend`]：基于外部创建的 `ash` 设备、队列和 surface
//! - [`headless::HeadlessBackend`]：内存中的确定性设备，用于测试和无窗口运行

pub mod backend;
pub mod commands;
pub mod descriptors;
pub mod error;
pub mod headless;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
pub mod vulkan;
