use ash::vk;

/// 写入 descriptor 的资源数据
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GfxDescriptorResource {
    Buffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    Image {
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    },
}

impl GfxDescriptorResource {
    /// 整个 buffer
    #[inline]
    pub fn whole_buffer(buffer: vk::Buffer) -> Self {
        Self::Buffer {
            buffer,
            offset: 0,
            range: vk::WHOLE_SIZE,
        }
    }

    /// 在 shader 中采样的 image
    #[inline]
    pub fn sampled_image(view: vk::ImageView, sampler: vk::Sampler) -> Self {
        Self::Image {
            view,
            sampler,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    #[inline]
    pub fn is_buffer(&self) -> bool {
        matches!(self, Self::Buffer { .. })
    }
}

/// 对 bindless descriptor set 中某个数组元素的一次写入
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxDescriptorWrite {
    pub binding: u32,
    pub array_element: u32,
    pub descriptor_type: vk::DescriptorType,
    pub resource: GfxDescriptorResource,
}

/// bindless descriptor set 每个 binding 的数组长度
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxBindlessLayoutDesc {
    pub uniform_buffer_count: u32,
    pub storage_buffer_count: u32,
    pub sampled_image_count: u32,
}

impl GfxBindlessLayoutDesc {
    pub const UNIFORM_BINDING: u32 = 0;
    pub const STORAGE_BINDING: u32 = 1;
    pub const SAMPLED_IMAGE_BINDING: u32 = 2;

    /// push constant 的大小，所有 shader stage 共享
    pub const PUSH_CONSTANT_SIZE: u32 = 128;

    /// 每个 binding 都使用相同的数组长度
    pub const fn uniform(count: u32) -> Self {
        Self {
            uniform_buffer_count: count,
            storage_buffer_count: count,
            sampled_image_count: count,
        }
    }

    /// binding 的数组长度，未知的 binding 返回 None
    #[inline]
    pub fn descriptor_count(&self, binding: u32) -> Option<u32> {
        match binding {
            Self::UNIFORM_BINDING => Some(self.uniform_buffer_count),
            Self::STORAGE_BINDING => Some(self.storage_buffer_count),
            Self::SAMPLED_IMAGE_BINDING => Some(self.sampled_image_count),
            _ => None,
        }
    }
}
