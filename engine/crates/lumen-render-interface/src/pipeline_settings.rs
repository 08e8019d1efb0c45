use std::{fmt::Display, ops::Deref};

use ash::vk;
use lumen_gfx::descriptors::GfxBindlessLayoutDesc;
use serde::Deserialize;

/// 渲染器默认配置
pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        // shader 输出会被自动改变： liner -> sRGB
        format: vk::Format::R8G8B8A8_SRGB,
        // 通知 OS，将数值按照 sRGB 空间进行处理和显示
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;
    /// 按优先级排列，renderer 选择第一个可以作为深度 attachment 的格式
    pub const DEPTH_FORMAT_CANDIDATES: &'static [vk::Format] = &[
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D32_SFLOAT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D16_UNORM_S8_UINT,
        vk::Format::D16_UNORM,
    ];

    pub const FRAMES_IN_FLIGHT: usize = 3;
    pub const ACQUIRE_TIMEOUT_MS: u64 = 1000;
    pub const COMPLETION_TIMEOUT_MS: u64 = 5000;
    pub const MAX_CONSECUTIVE_TIMEOUTS: u32 = 8;
    pub const INITIAL_EXTENT: [u32; 2] = [1280, 720];
    /// 每种 bindless 资源的默认上限
    pub const BINDLESS_CAPACITY: u32 = 65536;
}

/// present mode 的配置项
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresentModeSetting {
    #[default]
    Mailbox,
    Fifo,
    Immediate,
}

impl PresentModeSetting {
    pub fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// 每种 bindless 资源的 index 上限，None 表示不限制
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BindlessCapacities {
    pub uniform_buffers: Option<u32>,
    pub storage_buffers: Option<u32>,
    pub sampled_images: Option<u32>,
}

impl Default for BindlessCapacities {
    fn default() -> Self {
        Self {
            uniform_buffers: Some(DefaultRendererSettings::BINDLESS_CAPACITY),
            storage_buffers: Some(DefaultRendererSettings::BINDLESS_CAPACITY),
            sampled_images: Some(DefaultRendererSettings::BINDLESS_CAPACITY),
        }
    }
}

impl BindlessCapacities {
    /// 根据 descriptor 数组的实际长度收紧上限
    ///
    /// None 或者超过数组长度的上限都会变为数组长度，保证分配的 index 不会越界
    pub fn clamp_to_layout(&self, layout: &GfxBindlessLayoutDesc) -> Self {
        let clamp = |capacity: Option<u32>, count: u32| Some(capacity.map_or(count, |capacity| capacity.min(count)));
        Self {
            uniform_buffers: clamp(self.uniform_buffers, layout.uniform_buffer_count),
            storage_buffers: clamp(self.storage_buffers, layout.storage_buffer_count),
            sampled_images: clamp(self.sampled_images, layout.sampled_image_count),
        }
    }
}

/// 渲染器配置，可以从 toml 中读取
///
/// ```toml
/// frames_in_flight = 2
/// present_mode = "fifo"
/// initial_extent = [800, 600]
///
/// [bindless]
/// storage_buffers = 4
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RendererSettings {
    pub frames_in_flight: usize,
    pub acquire_timeout_ms: u64,
    pub completion_timeout_ms: u64,
    /// 连续超时超过这个次数，认为设备已经失去响应
    pub max_consecutive_timeouts: u32,
    pub present_mode: PresentModeSetting,
    pub initial_extent: [u32; 2],
    pub bindless: BindlessCapacities,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: DefaultRendererSettings::FRAMES_IN_FLIGHT,
            acquire_timeout_ms: DefaultRendererSettings::ACQUIRE_TIMEOUT_MS,
            completion_timeout_ms: DefaultRendererSettings::COMPLETION_TIMEOUT_MS,
            max_consecutive_timeouts: DefaultRendererSettings::MAX_CONSECUTIVE_TIMEOUTS,
            present_mode: PresentModeSetting::default(),
            initial_extent: DefaultRendererSettings::INITIAL_EXTENT,
            bindless: BindlessCapacities::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("frames_in_flight must be in 1..={max}, got {value}")]
    FramesInFlight { value: usize, max: usize },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

impl RendererSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(1..=FrameLabel::MAX_COUNT).contains(&self.frames_in_flight) {
            return Err(SettingsError::FramesInFlight {
                value: self.frames_in_flight,
                max: FrameLabel::MAX_COUNT,
            });
        }
        if self.acquire_timeout_ms == 0 {
            return Err(SettingsError::Zero {
                field: "acquire_timeout_ms",
            });
        }
        if self.completion_timeout_ms == 0 {
            return Err(SettingsError::Zero {
                field: "completion_timeout_ms",
            });
        }
        Ok(())
    }

    #[inline]
    pub fn initial_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.initial_extent[0],
            height: self.initial_extent[1],
        }
    }

    /// 纳秒
    #[inline]
    pub fn acquire_timeout_ns(&self) -> u64 {
        self.acquire_timeout_ms.saturating_mul(1_000_000)
    }

    /// 纳秒
    #[inline]
    pub fn completion_timeout_ns(&self) -> u64 {
        self.completion_timeout_ms.saturating_mul(1_000_000)
    }
}

/// 帧标签（A/B/C）
///
/// 表示当前处于 Frames in Flight 的哪一帧。
/// 通过 `Deref` 转换为索引 0/1/2。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    A,
    B,
    C,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
            Self::C => &Self::INDEX[2],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 3] = [0, 1, 2];
    pub const MAX_COUNT: usize = 3;

    /// 超出范围的 index 会回绕
    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx % Self::MAX_COUNT {
            0 => Self::A,
            1 => Self::B,
            _ => Self::C,
        }
    }
}
