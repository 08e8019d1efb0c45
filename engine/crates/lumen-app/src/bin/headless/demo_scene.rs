use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use lumen_render_graph::stage::{DrawItem, FrameInputs};
use lumen_render_interface::bindless_table::{BindlessError, BindlessHandle, BindlessKind, BindlessResource, BindlessTable};

/// 无窗口运行时的场景
///
/// headless 设备不会解释 buffer / image / pipeline，这里的 handle 只用于区分不同的资源
pub struct DemoScene {
    bindless: Arc<BindlessTable>,
    pipeline: vk::Pipeline,

    vertex_buffer: BindlessHandle,
    material: BindlessHandle,
    textures: Vec<BindlessHandle>,

    next_raw_handle: u64,
}

// new & init
impl DemoScene {
    const TEXTURE_COUNT: usize = 4;
    /// 每隔多少 tick 更新一次 material
    const MATERIAL_UPDATE_INTERVAL: u64 = 16;
    /// 每隔多少 tick 替换一张 texture
    const TEXTURE_STREAM_INTERVAL: u64 = 40;

    pub fn new(bindless: Arc<BindlessTable>) -> Result<Self, BindlessError> {
        let mut scene = Self {
            bindless,
            pipeline: vk::Pipeline::from_raw(0xdead_0001),
            vertex_buffer: BindlessHandle::default(),
            material: BindlessHandle::default(),
            textures: vec![],
            next_raw_handle: 0x1_0000,
        };

        scene.vertex_buffer = scene.store_buffer(BindlessKind::StorageBuffer)?;
        scene.material = scene.store_buffer(BindlessKind::UniformBuffer)?;
        for _ in 0..Self::TEXTURE_COUNT {
            let texture = scene.store_texture()?;
            scene.textures.push(texture);
        }

        log::info!("demo scene created with {} textures", scene.textures.len());
        Ok(scene)
    }

    fn next_raw(&mut self) -> u64 {
        self.next_raw_handle += 1;
        self.next_raw_handle
    }

    fn store_buffer(&mut self, kind: BindlessKind) -> Result<BindlessHandle, BindlessError> {
        let buffer = vk::Buffer::from_raw(self.next_raw());
        self.bindless.store(kind, BindlessResource::whole_buffer(buffer))
    }

    fn store_texture(&mut self) -> Result<BindlessHandle, BindlessError> {
        let view = vk::ImageView::from_raw(self.next_raw());
        let sampler = vk::Sampler::from_raw(self.next_raw());
        self.bindless.store(BindlessKind::SampledImage, BindlessResource::sampled_image(view, sampler))
    }
}

// update
impl DemoScene {
    /// 模拟资源加载：周期性地更新 material，并替换最旧的 texture
    pub fn update(&mut self, tick: u64) -> Result<(), BindlessError> {
        if tick > 0 && tick % Self::MATERIAL_UPDATE_INTERVAL == 0 {
            let buffer = vk::Buffer::from_raw(self.next_raw());
            let index = self.bindless.update(self.material, BindlessResource::whole_buffer(buffer))?;
            log::debug!("material moved to index {}", index);
        }

        if tick > 0 && tick % Self::TEXTURE_STREAM_INTERVAL == 0 && !self.textures.is_empty() {
            let oldest = self.textures.remove(0);
            self.bindless.release(oldest)?;
            let texture = self.store_texture()?;
            self.textures.push(texture);
            log::debug!("texture streamed, {} pending free", self.bindless.pending_free_count(BindlessKind::SampledImage));
        }
        Ok(())
    }

    /// 每张 texture 一个 quad，背景色随 tick 变化
    pub fn frame_inputs(&self, tick: u64) -> FrameInputs {
        let t = (tick % 120) as f32 / 120.0;
        FrameInputs {
            clear_color: glam::vec4(0.1, 0.1 + 0.2 * t, 0.3, 1.0),
            draws: self
                .textures
                .iter()
                .enumerate()
                .map(|(i, texture)| DrawItem {
                    pipeline: self.pipeline,
                    layout: None,
                    vertex_count: 6,
                    instance_count: 1,
                    first_vertex: 6 * i as u32,
                    resources: vec![self.vertex_buffer, self.material, *texture],
                })
                .collect(),
        }
    }
}
