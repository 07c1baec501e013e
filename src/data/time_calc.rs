use std::time::Duration;

/// Accumulates per-stage durations over many runs.
///
/// Stage `i` is one slot in `duration`; `n` counts every sample pushed, so a run that
/// records all stages adds one sample per stage.
#[derive(Debug, Default)]
pub struct TimeCalc {
    n: usize,
    duration: Vec<Duration>,
}

impl TimeCalc {
    pub fn total(&self) -> Duration {
        self.duration.iter().sum::<Duration>()
    }

    pub fn n(&self) -> usize {
        if self.duration.is_empty() {
            return 0;
        }
        self.n / self.duration.len()
    }

    pub fn avg(&self) -> Duration {
        match self.n() {
            0 => Duration::ZERO,
            n => self.total() / n as u32,
        }
    }

    pub fn avg_i(&self, i: usize) -> Duration {
        match (self.duration.get(i), self.n()) {
            (Some(_), 0) | (None, _) => Duration::ZERO,
            (Some(d), n) => *d / n as u32,
        }
    }

    pub fn add_or_push(&mut self, i: usize, x: Duration) {
        match self.duration.get_mut(i) {
            Some(elem) => *elem += x,
            None => {
                if i >= self.duration.len() {
                    self.duration.push(x)
                }
            }
        }
        self.n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_per_stage() {
        let mut t = TimeCalc::default();
        for _ in 0..2 {
            t.add_or_push(0, Duration::from_millis(10));
            t.add_or_push(1, Duration::from_millis(30));
        }
        assert_eq!(t.n(), 2);
        assert_eq!(t.avg_i(0), Duration::from_millis(10));
        assert_eq!(t.avg_i(1), Duration::from_millis(30));
        assert_eq!(t.avg(), Duration::from_millis(40));
    }

    #[test]
    fn empty_is_zero() {
        let t = TimeCalc::default();
        assert_eq!(t.avg(), Duration::ZERO);
        assert_eq!(t.avg_i(3), Duration::ZERO);
    }
}
