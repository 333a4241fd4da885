use std::time::Duration;

/// How many of the current headlines the banner rotates through.
pub const BANNER_SIZE: usize = 4;

/// Index into the banner articles, wrapping at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerRotator {
    len: usize,
    index: usize,
}

impl BannerRotator {
    pub fn new(len: usize) -> Self {
        Self { len, index: 0 }
    }

    /// Current index, or `None` when there is nothing to show.
    pub fn current(&self) -> Option<usize> {
        (self.len > 0).then_some(self.index)
    }

    pub fn advance(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.index = (self.index + 1) % self.len;
        Some(self.index)
    }
}

/// Show banner slot 0, then advance once per `interval`.
///
/// Plain sleeps, so a slow `on_tick` pushes later ticks back. Stops after
/// `cycles` advances, or runs until the future is dropped when `cycles` is
/// `None`. Returns immediately when `len` is zero.
pub async fn rotate_banner<F>(len: usize, interval: Duration, cycles: Option<usize>, mut on_tick: F)
where
    F: FnMut(usize),
{
    let mut rotator = BannerRotator::new(len);
    let Some(first) = rotator.current() else {
        return;
    };
    on_tick(first);

    let mut advanced = 0usize;
    while cycles.map_or(true, |limit| advanced < limit) {
        tokio::time::sleep(interval).await;
        if let Some(index) = rotator.advance() {
            on_tick(index);
        }
        advanced += 1;
    }
}
