use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ash::vk;
use lumen_gfx::descriptors::{GfxBindlessLayoutDesc, GfxDescriptorResource, GfxDescriptorWrite};
use slotmap::SlotMap;

use crate::pipeline_settings::BindlessCapacities;

slotmap::new_key_type! {
    /// bindless 资源的句柄，release 之后立刻失效
    pub struct BindlessHandle;
}

/// bindless 资源的种类，每种资源有自己的 binding 和 index 空间
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindlessKind {
    UniformBuffer,
    StorageBuffer,
    SampledImage,
}

impl BindlessKind {
    pub const ALL: [Self; 3] = [Self::UniformBuffer, Self::StorageBuffer, Self::SampledImage];

    #[inline]
    fn pool_index(self) -> usize {
        match self {
            Self::UniformBuffer => 0,
            Self::StorageBuffer => 1,
            Self::SampledImage => 2,
        }
    }

    #[inline]
    pub fn binding(self) -> u32 {
        match self {
            Self::UniformBuffer => GfxBindlessLayoutDesc::UNIFORM_BINDING,
            Self::StorageBuffer => GfxBindlessLayoutDesc::STORAGE_BINDING,
            Self::SampledImage => GfxBindlessLayoutDesc::SAMPLED_IMAGE_BINDING,
        }
    }

    #[inline]
    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            Self::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            Self::SampledImage => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }

    /// buffer 只能绑定到 buffer 类型的 binding，image 只能绑定到 SampledImage
    #[inline]
    pub fn accepts(self, resource: &BindlessResource) -> bool {
        match self {
            Self::UniformBuffer | Self::StorageBuffer => resource.is_buffer(),
            Self::SampledImage => !resource.is_buffer(),
        }
    }
}

impl Display for BindlessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UniformBuffer => write!(f, "uniform-buffer"),
            Self::StorageBuffer => write!(f, "storage-buffer"),
            Self::SampledImage => write!(f, "sampled-image"),
        }
    }
}

pub type BindlessResource = GfxDescriptorResource;

/// 一个存活的 bindless slot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResourceSlot {
    pub handle: BindlessHandle,
    pub kind: BindlessKind,
    /// 在 descriptor 数组中的位置，shader 通过它访问资源
    pub binding_index: u32,
    /// 最近一次绑定时的帧序号
    pub generation: u64,
    pub resource: BindlessResource,
}

/// 需要写入 descriptor set 的内容
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BindlessWrite {
    pub kind: BindlessKind,
    pub binding_index: u32,
    pub resource: BindlessResource,
}

impl BindlessWrite {
    pub fn to_gfx(&self) -> GfxDescriptorWrite {
        GfxDescriptorWrite {
            binding: self.kind.binding(),
            array_element: self.binding_index,
            descriptor_type: self.kind.descriptor_type(),
            resource: self.resource,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BindlessError {
    #[error("bindless {kind} capacity exceeded: {capacity}")]
    CapacityExceeded { kind: BindlessKind, capacity: u32 },
    #[error("bindless handle {0:?} is unknown or already released")]
    UnknownHandle(BindlessHandle),
    #[error("resource can not be bound as {kind}")]
    KindMismatch { kind: BindlessKind },
}

/// 被回收的 index，需要等所有可能引用它的帧都完成之后才能复用
#[derive(Copy, Clone, Debug)]
struct RetiredIndex {
    binding_index: u32,
    retired_generation: u64,
}

/// 一种资源的 index 空间
struct IndexPool {
    capacity: Option<u32>,
    /// 从未分配过的最小 index
    high_water: u32,
    /// 按回收的先后顺序排列，retired_generation 单调不减
    free_list: VecDeque<RetiredIndex>,
    live_count: usize,
}

impl IndexPool {
    fn new(capacity: Option<u32>) -> Self {
        Self {
            capacity,
            high_water: 0,
            free_list: VecDeque::new(),
            live_count: 0,
        }
    }

    /// 优先复用最早回收且已经安全的 index，否则扩展 index 空间
    fn allocate(&mut self, current_generation: u64, fif_count: u64) -> Option<u32> {
        let eligible = self
            .free_list
            .front()
            .is_some_and(|front| current_generation >= front.retired_generation.saturating_add(fif_count));
        if eligible {
            self.live_count += 1;
            return self.free_list.pop_front().map(|retired| retired.binding_index);
        }

        if self.capacity.is_some_and(|capacity| self.high_water >= capacity) {
            return None;
        }
        let index = self.high_water;
        self.high_water += 1;
        self.live_count += 1;
        Some(index)
    }

    fn retire(&mut self, binding_index: u32, generation: u64) {
        self.live_count -= 1;
        self.free_list.push_back(RetiredIndex {
            binding_index,
            retired_generation: generation,
        });
    }
}

struct BindlessTableInner {
    slots: SlotMap<BindlessHandle, ResourceSlot>,
    /// 按 [`BindlessKind::pool_index`] 排列
    pools: [IndexPool; 3],
    current_generation: u64,
    pending_writes: Vec<BindlessWrite>,
}

/// Bindless 资源表
///
/// 为 GPU 可见的资源分配 descriptor 数组中的 index，shader 通过 index 访问资源。
///
/// # 复用规则
/// release 的 index 不会立刻复用：在帧序号 g 回收的 index，
/// 只有当前帧序号不小于 g + frames_in_flight 时才能再次分配，
/// 此时所有可能引用旧内容的帧都已经完成。
///
/// # 线程
/// 所有状态都在一个 `RwLock` 中，可以通过 `Arc` 在加载线程与渲染线程之间共享。
/// `resolve` 只需要读锁，不会看到分配了一半的 slot。
pub struct BindlessTable {
    inner: RwLock<BindlessTableInner>,
    fif_count: u64,
}

// new & init
impl BindlessTable {
    pub fn new(capacities: &BindlessCapacities, fif_count: usize) -> Self {
        Self {
            inner: RwLock::new(BindlessTableInner {
                slots: SlotMap::with_key(),
                pools: [
                    IndexPool::new(capacities.uniform_buffers),
                    IndexPool::new(capacities.storage_buffers),
                    IndexPool::new(capacities.sampled_images),
                ],
                current_generation: 0,
                pending_writes: vec![],
            }),
            fif_count: fif_count as u64,
        }
    }

    #[inline]
    fn read(&self) -> RwLockReadGuard<'_, BindlessTableInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, BindlessTableInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// update
impl BindlessTable {
    /// 为资源分配一个 slot
    ///
    /// 达到上限时返回 `CapacityExceeded`，即使 free list 中还有尚未安全的 index
    pub fn store(&self, kind: BindlessKind, resource: BindlessResource) -> Result<BindlessHandle, BindlessError> {
        if !kind.accepts(&resource) {
            return Err(BindlessError::KindMismatch { kind });
        }

        let mut inner = self.write();
        let generation = inner.current_generation;
        let binding_index = Self::allocate_index(&mut inner, kind, self.fif_count)?;
        let handle = inner.slots.insert_with_key(|handle| ResourceSlot {
            handle,
            kind,
            binding_index,
            generation,
            resource,
        });
        inner.pending_writes.push(BindlessWrite {
            kind,
            binding_index,
            resource,
        });

        log::trace!("bindless store {} {:?} -> index {}", kind, handle, binding_index);
        Ok(handle)
    }

    /// 回收 slot，handle 立刻失效，index 要等到 frames_in_flight 帧之后才会复用
    pub fn release(&self, handle: BindlessHandle) -> Result<(), BindlessError> {
        let mut inner = self.write();
        let slot = inner.slots.remove(handle).ok_or(BindlessError::UnknownHandle(handle))?;
        let generation = inner.current_generation;
        inner.pools[slot.kind.pool_index()].retire(slot.binding_index, generation);

        log::trace!("bindless release {} {:?} (index {})", slot.kind, handle, slot.binding_index);
        Ok(())
    }

    /// 让 handle 指向新的资源
    ///
    /// 旧的 index 按照 release 的规则回收，并分配新的 index，正在执行的帧仍然读取旧的 index。
    /// 返回新的 index
    pub fn update(&self, handle: BindlessHandle, resource: BindlessResource) -> Result<u32, BindlessError> {
        let mut inner = self.write();
        let kind = inner.slots.get(handle).ok_or(BindlessError::UnknownHandle(handle))?.kind;
        if !kind.accepts(&resource) {
            return Err(BindlessError::KindMismatch { kind });
        }

        let generation = inner.current_generation;
        let new_index = Self::allocate_index(&mut inner, kind, self.fif_count)?;
        let Some(slot) = inner.slots.get_mut(handle) else {
            return Err(BindlessError::UnknownHandle(handle));
        };
        let old_index = std::mem::replace(&mut slot.binding_index, new_index);
        slot.generation = generation;
        slot.resource = resource;

        inner.pools[kind.pool_index()].retire(old_index, generation);
        inner.pending_writes.push(BindlessWrite {
            kind,
            binding_index: new_index,
            resource,
        });

        log::trace!("bindless update {} {:?}: index {} -> {}", kind, handle, old_index, new_index);
        Ok(new_index)
    }

    /// 进入新的一帧，之前回收的 index 可能因此变为可用
    ///
    /// 帧序号只能递增，更小的值会被忽略
    pub fn begin_frame(&self, generation: u64) {
        let mut inner = self.write();
        if generation < inner.current_generation {
            log::warn!(
                "bindless table ignores generation {} which is older than current generation {}",
                generation,
                inner.current_generation
            );
            return;
        }
        inner.current_generation = generation;
    }

    /// 取出自上次调用以来所有需要写入 descriptor set 的内容
    ///
    /// `resolve` 在 store/update 返回之后立刻可以得到新的 index，
    /// 因此一帧的录制结束之后、提交之前必须再取一次，这一帧引用的 index 才都已经写入。
    /// 新的 index 要么从未使用过，要么已经过了 frames_in_flight 帧，写入它不会影响正在执行的帧。
    pub fn take_pending_writes(&self) -> Vec<BindlessWrite> {
        std::mem::take(&mut self.write().pending_writes)
    }

    fn allocate_index(inner: &mut BindlessTableInner, kind: BindlessKind, fif_count: u64) -> Result<u32, BindlessError> {
        let generation = inner.current_generation;
        let pool = &mut inner.pools[kind.pool_index()];
        pool.allocate(generation, fif_count).ok_or(BindlessError::CapacityExceeded {
            kind,
            capacity: pool.capacity.unwrap_or(u32::MAX),
        })
    }
}

// getters
impl BindlessTable {
    /// 得到 handle 在 descriptor 数组中的 index
    #[inline]
    pub fn resolve(&self, handle: BindlessHandle) -> Result<u32, BindlessError> {
        self.read()
            .slots
            .get(handle)
            .map(|slot| slot.binding_index)
            .ok_or(BindlessError::UnknownHandle(handle))
    }

    #[inline]
    pub fn kind(&self, handle: BindlessHandle) -> Option<BindlessKind> {
        self.read().slots.get(handle).map(|slot| slot.kind)
    }

    #[inline]
    pub fn slot(&self, handle: BindlessHandle) -> Option<ResourceSlot> {
        self.read().slots.get(handle).copied()
    }

    #[inline]
    pub fn current_generation(&self) -> u64 {
        self.read().current_generation
    }

    #[inline]
    pub fn fif_count(&self) -> u64 {
        self.fif_count
    }

    #[inline]
    pub fn live_count(&self, kind: BindlessKind) -> usize {
        self.read().pools[kind.pool_index()].live_count
    }

    /// 已经回收但还没有被复用的 index 数量
    #[inline]
    pub fn pending_free_count(&self, kind: BindlessKind) -> usize {
        self.read().pools[kind.pool_index()].free_list.len()
    }
}
