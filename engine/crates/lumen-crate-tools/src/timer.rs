use std::time::{Duration, Instant};

/// 记录 tick 之间的时间间隔
///
/// renderer 每次 tick 调用一次 [`Timer::tick`]
pub struct Timer {
    start_time: Instant,
    last_tick: Instant,
    delta_time: Duration,
    tick_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_tick: now,
            delta_time: Duration::ZERO,
            tick_count: 0,
        }
    }
}

// update
impl Timer {
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta_time = now - self.last_tick;
        self.last_tick = now;
        self.tick_count += 1;
    }
}

// getters
impl Timer {
    #[inline]
    pub fn delta_time(&self) -> Duration {
        self.delta_time
    }

    #[inline]
    pub fn delta_time_ms(&self) -> f32 {
        self.delta_time.as_secs_f32() * 1000.0
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    #[inline]
    pub fn total_time(&self) -> Duration {
        self.last_tick - self.start_time
    }

    /// 从创建到最近一次 tick 的平均帧率
    pub fn average_fps(&self) -> f32 {
        let total = self.total_time().as_secs_f32();
        if total <= f32::EPSILON { 0.0 } else { self.tick_count as f32 / total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_accumulates() {
        let mut timer = Timer::default();
        assert_eq!(timer.average_fps(), 0.0);

        timer.tick();
        std::thread::sleep(Duration::from_millis(2));
        timer.tick();

        assert_eq!(timer.tick_count(), 2);
        assert!(timer.delta_time() >= Duration::from_millis(2));
        assert!(timer.total_time() >= timer.delta_time());
        assert!(timer.average_fps() > 0.0);
    }
}
