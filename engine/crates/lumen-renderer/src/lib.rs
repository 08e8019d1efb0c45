//! 帧组织
//!
//! [`renderer::Renderer`] 每次 tick 依次完成：按需重建 surface 与深度 target、选择 frame context、
//! acquire、录制 [`lumen_render_graph::render_pipeline::RenderPipeline`]、提交以及 present。

pub mod depth_targets;
pub mod frame_pool;
pub mod present;
pub mod renderer;
