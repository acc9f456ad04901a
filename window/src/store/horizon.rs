//! Translate a read offset (in records) into windows of page offsets.

/// A half-open window `[min, max)` of page offsets. A `max` of `None` is unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub min: u64,
    pub max: Option<u64>,
}

impl Window {
    /// Whether `offset` lies within the window.
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.min && self.max.map_or(true, |max| offset < max)
    }

    pub fn is_empty(&self) -> bool {
        self.max.is_some_and(|max| max <= self.min)
    }

    /// Whether every offset in `other` also lies within this window.
    pub fn covers(&self, other: &Window) -> bool {
        if other.is_empty() {
            return true;
        }
        if other.min < self.min {
            return false;
        }
        match (self.max, other.max) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(max), Some(other)) => other <= max,
        }
    }
}

/// The load and unload windows derived from a read offset.
///
/// Pages within `load` must be present (and requested). Pages outside `unload` must be evicted.
/// Between the two, settled pages are kept and unsettled pages are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Horizons {
    pub load: Window,
    pub unload: Window,
}

impl Horizons {
    /// Compute the horizons for `read_offset` (a record index).
    ///
    /// `load_horizon` and `unload_horizon` are radii (in records) around `read_offset`; an
    /// `unload_horizon` of `None` is unbounded. Both windows are clamped to `total_pages` (if
    /// known) and the unload window is further clamped to one past `last_offset` (the largest
    /// indexed page offset, if any).
    pub fn compute(
        read_offset: u64,
        page_size: u64,
        load_horizon: u64,
        unload_horizon: Option<u64>,
        total_pages: Option<u64>,
        last_offset: Option<u64>,
    ) -> Self {
        let bound = |max: u64| total_pages.map_or(max, |total| max.min(total));

        // The page containing the read offset always falls within both windows
        let current = (read_offset / page_size).saturating_add(1);
        let upper = |radius: u64| {
            read_offset
                .saturating_add(radius)
                .div_ceil(page_size)
                .max(current)
        };
        let lower = |radius: u64| read_offset.saturating_sub(radius) / page_size;

        let load = Window {
            min: lower(load_horizon),
            max: Some(bound(upper(load_horizon))),
        };
        let unload = match unload_horizon {
            Some(radius) => Window {
                min: lower(radius),
                max: Some(bound(upper(radius))),
            },
            None => Window {
                min: 0,
                max: total_pages,
            },
        };
        let unload = match last_offset {
            Some(last) => {
                let end = last.saturating_add(1);
                Window {
                    min: unload.min,
                    max: Some(unload.max.map_or(end, |max| max.min(end))),
                }
            }
            None => unload,
        };
        Self { load, unload }
    }
}
