use ash::vk;

/// dynamic rendering 的一个 attachment
///
/// `vk::ClearValue` 是 union，所以 `Debug` 需要手动实现
#[derive(Copy, Clone)]
pub struct GfxRenderingAttachment {
    pub view: vk::ImageView,
    pub layout: vk::ImageLayout,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_value: vk::ClearValue,
}

impl GfxRenderingAttachment {
    /// 先清除再写入的 color attachment
    pub fn color_clear(view: vk::ImageView, clear_color: [f32; 4]) -> Self {
        Self {
            view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            },
        }
    }

    /// 保留已有内容的 color attachment，用于叠加绘制
    pub fn color_load(view: vk::ImageView) -> Self {
        Self {
            view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::LOAD,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue::default(),
        }
    }

    /// 深度清除为 1.0，内容不需要保留到下一帧
    pub fn depth_clear(view: vk::ImageView) -> Self {
        Self {
            view,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        }
    }

    #[inline]
    pub fn is_depth(&self) -> bool {
        self.layout == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    }

    pub fn to_vk(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(self.clear_value)
    }
}

impl std::fmt::Debug for GfxRenderingAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("GfxRenderingAttachment");
        debug
            .field("view", &self.view)
            .field("layout", &self.layout)
            .field("load_op", &self.load_op)
            .field("store_op", &self.store_op);
        // 只有 CLEAR 时 clear value 才有意义
        if self.load_op == vk::AttachmentLoadOp::CLEAR {
            // SAFETY: 两个成员都是 plain old data，按照 attachment 的种类读取
            if self.is_depth() {
                let depth = unsafe { self.clear_value.depth_stencil };
                debug.field("clear_depth", &depth.depth).field("clear_stencil", &depth.stencil);
            } else {
                let color = unsafe { self.clear_value.color.float32 };
                debug.field("clear_color", &color);
            }
        }
        debug.finish()
    }
}

/// dynamic rendering 的参数
#[derive(Clone, Debug)]
pub struct GfxRenderingInfo {
    pub extent: vk::Extent2D,
    pub color_attachments: Vec<GfxRenderingAttachment>,
    pub depth_attachment: Option<GfxRenderingAttachment>,
}

impl GfxRenderingInfo {
    pub fn new(extent: vk::Extent2D, color_attachments: Vec<GfxRenderingAttachment>) -> Self {
        Self {
            extent,
            color_attachments,
            depth_attachment: None,
        }
    }

    /// builder
    #[inline]
    pub fn depth(mut self, depth_attachment: Option<GfxRenderingAttachment>) -> Self {
        self.depth_attachment = depth_attachment;
        self
    }

    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}
