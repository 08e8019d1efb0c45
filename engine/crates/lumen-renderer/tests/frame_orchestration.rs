use std::cell::Cell;
use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;
use lumen_gfx::backend::GfxCommandRecorder;
use lumen_gfx::descriptors::GfxBindlessLayoutDesc;
use lumen_gfx::headless::{HeadlessBackend, HeadlessCommand, HeadlessSubmission};
use lumen_render_graph::attachments::AttachmentRef;
use lumen_render_graph::render_pipeline::RenderPipelineBuilder;
use lumen_render_graph::stage::{DrawItem, FrameInputs, RecordingFailure, RenderStage, StageContext};
use lumen_render_graph::stages::forward_stage::ForwardStage;
use lumen_render_interface::bindless_table::{BindlessError, BindlessHandle, BindlessKind, BindlessResource};
use lumen_render_interface::pipeline_settings::{BindlessCapacities, RendererSettings};
use lumen_renderer::present::render_present::SurfaceState;
use lumen_renderer::renderer::{DropReason, Renderer, RendererError, TickStatus};

const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

/// 每次录制一个 vertex_count 为 `MARKER_BASE + 调用次数` 的 draw，可以在第 `fail_on` 次调用时失败
struct MarkerStage {
    calls: Rc<Cell<u32>>,
    fail_on: Option<u32>,
}

impl MarkerStage {
    const MARKER_BASE: u32 = 1000;
}

impl RenderStage for MarkerStage {
    fn attachments(&self) -> Vec<AttachmentRef> {
        vec![AttachmentRef::SurfaceColor]
    }

    fn record(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RecordingFailure> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        ctx.recorder.cmd_draw(ctx.cmd, Self::MARKER_BASE + call, 1, 0, 0);
        if self.fail_on == Some(call) {
            return Err(RecordingFailure::StageFailed(format!("marker failed on call {}", call)));
        }
        Ok(())
    }
}

fn marker_draw(call: u32) -> HeadlessCommand {
    HeadlessCommand::Draw {
        vertex_count: MarkerStage::MARKER_BASE + call,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    }
}

fn create_renderer(settings: RendererSettings, fail_on: Option<u32>) -> Renderer<HeadlessBackend> {
    let pipeline = RenderPipelineBuilder::new()
        .add_stage(10, "marker", MarkerStage {
            calls: Rc::new(Cell::new(0)),
            fail_on,
        })
        .add_stage(0, "forward", ForwardStage::new())
        .build()
        .unwrap();
    Renderer::new(HeadlessBackend::new(), settings, pipeline, EXTENT).unwrap()
}

fn renderer_with_fif(frames_in_flight: usize) -> Renderer<HeadlessBackend> {
    create_renderer(
        RendererSettings {
            frames_in_flight,
            ..Default::default()
        },
        None,
    )
}

fn assert_no_validation_errors(renderer: &Renderer<HeadlessBackend>) {
    assert_eq!(renderer.gfx().validation_errors(), Vec::<String>::new());
}

/// 模拟在录制期间替换资源的加载 stage：第 `update_on` 次录制时 update `handle`
struct LoaderStage {
    handle: Rc<Cell<Option<BindlessHandle>>>,
    update_on: u32,
    calls: u32,
}

impl RenderStage for LoaderStage {
    fn attachments(&self) -> Vec<AttachmentRef> {
        vec![]
    }

    fn record(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RecordingFailure> {
        self.calls += 1;
        if let Some(handle) = self.handle.get()
            && self.calls == self.update_on
        {
            let buffer = vk::Buffer::from_raw(0x500 + self.calls as u64);
            ctx.bindless
                .update(handle, BindlessResource::whole_buffer(buffer))
                .map_err(|e| RecordingFailure::StageFailed(e.to_string()))?;
        }
        Ok(())
    }
}

fn storage_draw(handle: BindlessHandle) -> DrawItem {
    DrawItem {
        pipeline: vk::Pipeline::from_raw(0x99),
        layout: None,
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        resources: vec![handle],
    }
}

/// 提交时 push 的每个 storage index 都已经写入 descriptor set
fn assert_pushed_indices_written(gfx: &HeadlessBackend, submission: &HeadlessSubmission) {
    let writes = gfx.descriptor_writes();
    let written = writes[..submission.descriptor_writes_before]
        .iter()
        .filter(|write| write.binding == GfxBindlessLayoutDesc::STORAGE_BINDING)
        .map(|write| write.array_element)
        .collect_vec();
    for index in submission.pushed_indices() {
        assert!(written.contains(&index), "index {} pushed before its descriptor was written", index);
    }
}

fn create_depth_renderer() -> Renderer<HeadlessBackend> {
    let pipeline = RenderPipelineBuilder::new()
        .add_stage(0, "forward", ForwardStage::new().with_depth("depth"))
        .build()
        .unwrap();
    let settings = RendererSettings {
        frames_in_flight: 2,
        ..Default::default()
    };
    Renderer::new(HeadlessBackend::new(), settings, pipeline, EXTENT).unwrap()
}

fn begin_rendering(submission: &HeadlessSubmission) -> Option<(vk::Extent2D, Option<vk::ImageView>)> {
    submission.commands.iter().find_map(|cmd| match cmd {
        HeadlessCommand::BeginRendering { extent, depth_view, .. } => Some((*extent, *depth_view)),
        _ => None,
    })
}

#[test]
fn contexts_alternate_with_two_frames_in_flight() {
    let mut renderer = renderer_with_fif(2);
    let inputs = FrameInputs::default();

    for _ in 0..5 {
        let waits_before = renderer.gfx().fence_wait_count();
        assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
        assert!(renderer.gfx().fence_wait_count() - waits_before <= 1);
    }

    let fences = renderer.frame_pool().contexts().iter().map(|ctx| ctx.completion_fence).collect_vec();
    let submissions = renderer.gfx().submissions();
    let used = submissions
        .iter()
        .map(|submission| fences.iter().position(|fence| *fence == submission.fence).unwrap())
        .collect_vec();
    assert_eq!(used, vec![0, 1, 0, 1, 0]);

    let labels = submissions.iter().map(|submission| submission.first_label().unwrap().to_string()).collect_vec();
    assert_eq!(labels, vec!["[F0A]", "[F1B]", "[F2A]", "[F3B]", "[F4A]"]);
    assert_eq!(renderer.gfx().presents().len(), 5);
    assert_eq!(renderer.frame_pool().contexts()[0].submitted_generation, Some(4));
    assert_eq!(renderer.frame_pool().contexts()[1].submitted_generation, Some(3));
    assert_no_validation_errors(&renderer);
}

#[test]
fn frame_is_recorded_between_layout_transitions() {
    let mut renderer = renderer_with_fif(3);
    renderer.tick(&FrameInputs::default()).unwrap();

    let submissions = renderer.gfx().submissions();
    let submission = &submissions[0];
    let commands = &submission.commands;
    assert!(matches!(
        &commands[1],
        HeadlessCommand::ImageBarrier { new_layout, .. } if *new_layout == vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    ));
    assert!(matches!(
        &commands[commands.len() - 2],
        HeadlessCommand::ImageBarrier { new_layout, .. } if *new_layout == vk::ImageLayout::PRESENT_SRC_KHR
    ));
    // stage 按照 order 录制
    let stage_labels = commands
        .iter()
        .filter_map(|cmd| match cmd {
            HeadlessCommand::BeginLabel(name) => Some(name.as_str()),
            _ => None,
        })
        .collect_vec();
    assert_eq!(stage_labels, vec!["[F0A]", "forward", "marker"]);
    assert_eq!(submission.wait_semaphores, vec![renderer.frame_pool().contexts()[0].image_available]);
}

#[test]
fn invalidated_acquire_skips_the_frame() {
    let mut renderer = renderer_with_fif(3);
    let inputs = FrameInputs::default();
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);

    renderer.gfx().push_acquire_result(vk::Result::ERROR_OUT_OF_DATE_KHR);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Recreated);
    assert_eq!(renderer.gfx().submissions().len(), 1);
    assert_eq!(renderer.gfx().presents().len(), 1);
    assert_eq!(renderer.gfx().swapchain_create_count(), 2);
    assert_eq!(renderer.surface_state(), SurfaceState::Valid);

    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_eq!(renderer.gfx().submissions().len(), 2);
    assert_no_validation_errors(&renderer);
}

#[test]
fn stage_failure_drops_only_that_frame() {
    let mut renderer = create_renderer(RendererSettings::default(), Some(3));
    let inputs = FrameInputs::default();

    let statuses = (0..5).map(|_| renderer.tick(&inputs).unwrap()).collect_vec();
    assert_eq!(
        statuses,
        vec![
            TickStatus::Rendered,
            TickStatus::Rendered,
            TickStatus::Dropped(DropReason::RecordingFailed),
            TickStatus::Rendered,
            TickStatus::Rendered,
        ]
    );

    let submissions = renderer.gfx().submissions();
    assert_eq!(submissions.len(), 5);
    assert!(submissions.iter().all(|submission| !submission.commands.contains(&marker_draw(3))));
    assert!(submissions[3].commands.contains(&marker_draw(4)));

    // 被丢弃的帧只把 image 归还给 present 引擎
    assert_eq!(submissions[2].first_label(), Some("[F2C]release-image"));
    assert_eq!(submissions[2].draw_count(), 0);
    assert_eq!(renderer.gfx().presents().len(), 5);
    assert_no_validation_errors(&renderer);
}

#[test]
fn failed_recreation_keeps_old_surface_and_retries() {
    let mut renderer = renderer_with_fif(2);
    let inputs = FrameInputs::default();
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);

    let resized = vk::Extent2D {
        width: 1024,
        height: 768,
    };
    renderer.notify_surface_changed(resized);
    renderer.gfx().fail_next_swapchain_creations(1);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Dropped(DropReason::SurfaceUnavailable));
    assert_eq!(renderer.surface_extent(), Some(EXTENT));
    assert_eq!(renderer.gfx().live_swapchain_count(), 1);

    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Recreated);
    assert_eq!(renderer.surface_extent(), Some(resized));
    assert_eq!(renderer.gfx().live_swapchain_count(), 1);

    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert!(matches!(
        &renderer.gfx().submissions()[1].commands[..],
        [_, _, HeadlessCommand::BeginLabel(_), HeadlessCommand::BeginRendering { extent, .. }, ..] if *extent == resized
    ));
    assert_no_validation_errors(&renderer);
}

#[test]
fn lost_presentation_recreates_surface() {
    let mut renderer = renderer_with_fif(2);
    let inputs = FrameInputs::default();

    renderer.gfx().push_present_result(vk::Result::ERROR_OUT_OF_DATE_KHR);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Recreated);
    assert_eq!(renderer.gfx().swapchain_create_count(), 2);
    assert_eq!(renderer.gfx().swapchain_destroy_count(), 1);

    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_eq!(renderer.gfx().presents().last().map(|present| present.result), Some(vk::Result::SUCCESS));
    assert_no_validation_errors(&renderer);
}

#[test]
fn suboptimal_acquire_renders_then_recreates() {
    let mut renderer = renderer_with_fif(2);
    let inputs = FrameInputs::default();

    renderer.gfx().push_acquire_result(vk::Result::SUBOPTIMAL_KHR);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_eq!(renderer.surface_state(), SurfaceState::Invalidated);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Recreated);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_no_validation_errors(&renderer);
}

#[test]
fn repeated_timeouts_escalate() {
    let mut renderer = create_renderer(
        RendererSettings {
            frames_in_flight: 1,
            max_consecutive_timeouts: 2,
            ..Default::default()
        },
        None,
    );
    let inputs = FrameInputs::default();

    renderer.gfx().set_gpu_hung(true);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Dropped(DropReason::CompletionTimeout));
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Dropped(DropReason::CompletionTimeout));
    assert!(matches!(renderer.tick(&inputs), Err(RendererError::DeviceUnresponsive(3))));
    // 超时的帧不会推进帧序号
    assert_eq!(renderer.frame_counter().frame_id(), 1);

    renderer.gfx().set_gpu_hung(false);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_eq!(renderer.frame_counter().frame_id(), 2);

    // 计数器已经清零
    renderer.gfx().push_acquire_result(vk::Result::TIMEOUT);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Dropped(DropReason::AcquireTimeout));
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_no_validation_errors(&renderer);
}

#[test]
fn device_loss_is_fatal() {
    let mut renderer = renderer_with_fif(2);
    renderer.gfx().push_submit_result(vk::Result::ERROR_DEVICE_LOST);
    assert!(matches!(
        renderer.tick(&FrameInputs::default()),
        Err(RendererError::Gfx(vk::Result::ERROR_DEVICE_LOST))
    ));
}

#[test]
fn zero_extent_drops_until_restored() {
    let mut renderer = renderer_with_fif(2);
    let inputs = FrameInputs::default();

    renderer.notify_surface_changed(vk::Extent2D { width: 0, height: 0 });
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Dropped(DropReason::SurfaceUnavailable));
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Dropped(DropReason::SurfaceUnavailable));
    assert_eq!(renderer.surface_state(), SurfaceState::Invalidated);

    renderer.notify_surface_changed(EXTENT);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Recreated);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_no_validation_errors(&renderer);
}

#[test]
fn bindless_resources_flow_into_draws() {
    let mut renderer = renderer_with_fif(2);
    let bindless = renderer.bindless();
    let handle = bindless
        .store(BindlessKind::StorageBuffer, BindlessResource::whole_buffer(vk::Buffer::from_raw(0x70)))
        .unwrap();
    let index = bindless.resolve(handle).unwrap();

    let mut inputs = FrameInputs {
        clear_color: glam::vec4(0.2, 0.3, 0.4, 1.0),
        ..Default::default()
    };
    inputs.draws.push(DrawItem {
        pipeline: vk::Pipeline::from_raw(0x99),
        layout: None,
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        resources: vec![handle],
    });

    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    // descriptor 在提交之前写入
    assert_eq!(renderer.gfx().descriptor_writes().len(), 1);
    assert_eq!(renderer.gfx().submissions()[0].descriptor_writes_before, 1);
    assert!(renderer.gfx().submissions()[0].commands.contains(&HeadlessCommand::PushConstants {
        offset: 0,
        data: index.to_ne_bytes().to_vec(),
    }));

    // 释放之后 handle 失效，引用它的帧被丢弃
    bindless.release(handle).unwrap();
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Dropped(DropReason::RecordingFailed));
    inputs.draws.clear();
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_no_validation_errors(&renderer);
}

#[test]
fn released_index_is_reused_only_after_frames_in_flight_ticks() {
    let mut renderer = renderer_with_fif(2);
    let bindless = renderer.bindless();
    let buffer = |raw: u64| BindlessResource::whole_buffer(vk::Buffer::from_raw(raw));

    let first = bindless.store(BindlessKind::StorageBuffer, buffer(0x10)).unwrap();
    let released_index = bindless.resolve(first).unwrap();
    let mut inputs = FrameInputs::default();
    inputs.draws.push(storage_draw(first));
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    inputs.draws.clear();

    // 在第 0 帧之后释放
    let released_at = renderer.frame_counter().frame_id() - 1;
    bindless.release(first).unwrap();

    let mut reused_at = None;
    for raw in 0x11..0x16 {
        let handle = bindless.store(BindlessKind::StorageBuffer, buffer(raw)).unwrap();
        let current = renderer.frame_counter().frame_id() - 1;
        if reused_at.is_none() && bindless.resolve(handle).unwrap() == released_index {
            reused_at = Some(current);
        }
        assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    }

    assert_eq!(reused_at, Some(released_at + 2));
    for submission in &renderer.gfx().submissions() {
        assert_pushed_indices_written(renderer.gfx(), submission);
    }
    assert_no_validation_errors(&renderer);
}

#[test]
fn descriptors_written_during_recording_are_published_before_submit() {
    let loaded = Rc::new(Cell::new(None));
    let pipeline = RenderPipelineBuilder::new()
        .add_stage(0, "forward", ForwardStage::new())
        .add_stage(-10, "loader", LoaderStage {
            handle: loaded.clone(),
            update_on: 2,
            calls: 0,
        })
        .build()
        .unwrap();
    let settings = RendererSettings {
        frames_in_flight: 2,
        ..Default::default()
    };
    let mut renderer = Renderer::new(HeadlessBackend::new(), settings, pipeline, EXTENT).unwrap();
    let bindless = renderer.bindless();
    let handle = bindless
        .store(BindlessKind::StorageBuffer, BindlessResource::whole_buffer(vk::Buffer::from_raw(0x70)))
        .unwrap();
    loaded.set(Some(handle));

    let mut inputs = FrameInputs::default();
    inputs.draws.push(storage_draw(handle));
    for _ in 0..4 {
        assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    }

    let submissions = renderer.gfx().submissions();
    // 第二帧录制时 update 得到新的 index，同一帧就使用它
    let pushed = submissions.iter().map(|submission| submission.pushed_indices()).collect_vec();
    assert_eq!(pushed, vec![vec![0], vec![1], vec![1], vec![1]]);
    for submission in &submissions {
        assert_pushed_indices_written(renderer.gfx(), submission);
    }
    assert_no_validation_errors(&renderer);
}

#[test]
fn capacities_are_limited_by_descriptor_arrays() {
    let pipeline = RenderPipelineBuilder::new().add_stage(0, "forward", ForwardStage::new()).build().unwrap();
    let settings = RendererSettings {
        frames_in_flight: 2,
        bindless: BindlessCapacities {
            uniform_buffers: Some(100),
            storage_buffers: None,
            sampled_images: None,
        },
        ..Default::default()
    };
    let gfx = HeadlessBackend::with_bindless_layout(GfxBindlessLayoutDesc::uniform(2));
    let mut renderer = Renderer::new(gfx, settings, pipeline, EXTENT).unwrap();
    let bindless = renderer.bindless();
    let buffer = |raw: u64| BindlessResource::whole_buffer(vk::Buffer::from_raw(raw));

    for kind in [BindlessKind::StorageBuffer, BindlessKind::UniformBuffer] {
        bindless.store(kind, buffer(0x10)).unwrap();
        bindless.store(kind, buffer(0x11)).unwrap();
        assert_eq!(
            bindless.store(kind, buffer(0x12)),
            Err(BindlessError::CapacityExceeded { kind, capacity: 2 })
        );
    }

    assert_eq!(renderer.tick(&FrameInputs::default()).unwrap(), TickStatus::Rendered);
    assert_eq!(renderer.gfx().descriptor_writes().len(), 4);
    assert_no_validation_errors(&renderer);
}

#[test]
fn depth_target_follows_surface_resize() {
    let mut renderer = create_depth_renderer();
    let inputs = FrameInputs::default();
    let depth_extents = |renderer: &Renderer<HeadlessBackend>| {
        renderer.depth_targets().images().iter().map(|image| image.extent).collect_vec()
    };
    assert_eq!(depth_extents(&renderer), vec![EXTENT]);
    assert_eq!(renderer.gfx().live_depth_images().len(), 1);

    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    let first_view = renderer.depth_targets().images()[0].view;
    let submissions = renderer.gfx().submissions();
    assert!(matches!(
        &submissions[0].commands[2],
        HeadlessCommand::ImageBarrier { new_layout, .. } if *new_layout == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    ));
    assert_eq!(begin_rendering(&submissions[0]), Some((EXTENT, Some(first_view))));

    let resized = vk::Extent2D {
        width: 1024,
        height: 768,
    };
    renderer.notify_surface_changed(resized);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Recreated);
    assert_eq!(depth_extents(&renderer), vec![resized]);
    assert_eq!(renderer.gfx().live_depth_images().len(), 1);

    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    let resized_view = renderer.depth_targets().images()[0].view;
    assert_ne!(resized_view, first_view);
    assert_eq!(begin_rendering(&renderer.gfx().submissions()[1]), Some((resized, Some(resized_view))));

    // 深度 image 创建失败时 swapchain 已经重建，下一次 tick 只重试深度 target
    let smaller = vk::Extent2D {
        width: 400,
        height: 300,
    };
    renderer.notify_surface_changed(smaller);
    renderer.gfx().fail_next_depth_image_creations(1);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Dropped(DropReason::SurfaceUnavailable));
    assert_eq!(renderer.surface_extent(), Some(smaller));
    assert!(renderer.gfx().live_depth_images().is_empty());

    let swapchains_created = renderer.gfx().swapchain_create_count();
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Recreated);
    assert_eq!(renderer.gfx().swapchain_create_count(), swapchains_created);
    assert_eq!(depth_extents(&renderer), vec![smaller]);
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Rendered);
    assert_eq!(begin_rendering(&renderer.gfx().submissions()[2]).map(|(extent, _)| extent), Some(smaller));
    assert_no_validation_errors(&renderer);

    let gfx = renderer.destroy();
    assert_eq!(gfx.live_object_count(), 0);
    assert!(gfx.validation_errors().is_empty());
}

#[test]
fn invalid_settings_are_rejected() {
    let pipeline = RenderPipelineBuilder::new().add_stage(0, "forward", ForwardStage::new()).build().unwrap();
    let settings = RendererSettings {
        frames_in_flight: 4,
        ..Default::default()
    };
    assert!(matches!(
        Renderer::new(HeadlessBackend::new(), settings, pipeline, EXTENT),
        Err(RendererError::Settings(_))
    ));
}

#[test]
fn destroy_releases_every_object() {
    let mut renderer = renderer_with_fif(3);
    let inputs = FrameInputs::default();
    for _ in 0..4 {
        renderer.tick(&inputs).unwrap();
    }
    renderer.notify_surface_changed(vk::Extent2D {
        width: 300,
        height: 200,
    });
    assert_eq!(renderer.tick(&inputs).unwrap(), TickStatus::Recreated);
    renderer.tick(&inputs).unwrap();

    let gfx = renderer.destroy();
    assert_eq!(gfx.live_object_count(), 0);
    assert!(gfx.validation_errors().is_empty());
}
