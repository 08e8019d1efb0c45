//! 帧录制管线
//!
//! 一帧由若干 [`stage::RenderStage`] 组成，按照 order 从小到大依次录制到同一个 command buffer 中。
//! 管线在 [`render_pipeline::RenderPipelineBuilder::build`] 之后就不再变化。

pub mod attachments;
pub mod render_pipeline;
pub mod stage;
pub mod stages;

#[cfg(test)]
pub(crate) mod test_utils;
