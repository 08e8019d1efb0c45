use crate::pipeline_settings::FrameLabel;

/// 帧序号（generation）与 frames in flight 数量
pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    fif_count: usize,
}
// new & init
impl FrameCounter {
    /// fif_count 需要在 1..=3 之间，由 `RendererSettings::validate` 保证
    pub fn new(init_frame_id: u64, fif_count: usize) -> Self {
        debug_assert!((1..=FrameLabel::MAX_COUNT).contains(&fif_count));
        Self {
            frame_id: init_frame_id,
            fif_count,
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn fif_count(&self) -> usize {
        self.fif_count
    }
    #[inline]
    pub fn frame_labels(&self) -> Vec<FrameLabel> {
        (0..self.fif_count).map(FrameLabel::from_usize).collect()
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize((self.frame_id % self.fif_count as u64) as usize)
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cycle_with_fif_count() {
        let mut counter = FrameCounter::new(0, 2);
        let mut names = vec![];
        for _ in 0..3 {
            names.push(counter.frame_name());
            counter.next_frame();
        }
        assert_eq!(names, ["[F0A]", "[F1B]", "[F2A]"]);
        assert_eq!(counter.frame_labels().len(), 2);
    }
}
