use crate::attachments::AttachmentRef;
use crate::stage::{RecordingFailure, RenderStage, StageContext};

/// 管线中的一个 stage 及其排序信息
pub struct StageDescriptor {
    pub order: i32,
    pub name: String,
    stage: Box<dyn RenderStage>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("render pipeline has no stage")]
    Empty,
    #[error("stage `{second}` has the same order {order} as stage `{first}`")]
    DuplicateOrder { order: i32, first: String, second: String },
}

/// RenderPipeline 构建器
///
/// stage 的添加顺序无关紧要，`build` 时按照 order 排序
#[derive(Default)]
pub struct RenderPipelineBuilder {
    stages: Vec<StageDescriptor>,
}

impl RenderPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    pub fn add_stage(mut self, order: i32, name: impl Into<String>, stage: impl RenderStage + 'static) -> Self {
        self.stages.push(StageDescriptor {
            order,
            name: name.into(),
            stage: Box::new(stage),
        });
        self
    }

    pub fn build(mut self) -> Result<RenderPipeline, PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        // 稳定排序，重复的 order 中先添加的在前
        self.stages.sort_by_key(|stage| stage.order);
        if let Some(pair) = self.stages.windows(2).find(|pair| pair[0].order == pair[1].order) {
            return Err(PipelineError::DuplicateOrder {
                order: pair[0].order,
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }

        log::info!(
            "render pipeline built: {}",
            self.stages.iter().map(|stage| format!("{}({})", stage.name, stage.order)).collect::<Vec<_>>().join(" -> ")
        );
        Ok(RenderPipeline { stages: self.stages })
    }
}

/// 按固定顺序录制的 stage 序列
///
/// 构建完成后不能再增加或删除 stage
pub struct RenderPipeline {
    stages: Vec<StageDescriptor>,
}

impl RenderPipeline {
    #[inline]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name.as_str()).collect()
    }

    /// 所有 stage 声明的深度 target，按首次出现的顺序去重
    pub fn depth_targets(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![];
        for attachment in self.stages.iter().flat_map(|descriptor| descriptor.stage.attachments()) {
            if let AttachmentRef::Depth(name) = attachment
                && !names.contains(&name)
            {
                names.push(name);
            }
        }
        names
    }

    /// 依次录制所有 stage
    ///
    /// 每个 stage 录制前先检查它声明的 attachment；遇到第一个失败就停止，后面的 stage 不会被录制
    pub fn execute(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RecordingFailure> {
        for descriptor in &mut self.stages {
            for attachment in descriptor.stage.attachments() {
                ctx.attachments.validate(&descriptor.name, &attachment)?;
            }

            ctx.recorder.cmd_begin_label(ctx.cmd, &descriptor.name);
            let result = descriptor.stage.record(ctx);
            ctx.recorder.cmd_end_label(ctx.cmd);

            if let Err(failure) = result {
                log::debug!("stage `{}` failed to record: {}", descriptor.name, failure);
                return Err(failure);
            }
        }
        Ok(())
    }
}
