use crate::geometry::PageMetrics;

/// Snapshot of what the render surface is showing. Owned by the surface;
/// the overlay logic only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerRenderState {
    /// 0-based
    pub current_page_index: usize,
    pub total_pages: usize,
    /// Pixel rectangle of the current page, when it has been laid out
    pub page_metrics: Option<PageMetrics>,
}

/// The PDF render collaborator, reduced to the four capabilities the core
/// needs: page counts, a jump command, and layout queries. Zoom changes
/// arrive as re-render notifications carrying fresh metrics.
pub trait RenderSurface {
    fn render_state(&self) -> ViewerRenderState;

    /// Command the surface to show a 0-based page index
    fn jump_to_page(&mut self, page_index: usize);

    /// Pixel rectangle of a page, None while that page has no layout yet
    fn page_metrics(&self, page_index: usize) -> Option<PageMetrics>;
}

/// In-memory render surface for headless runs and tests. Pages all share
/// one size; layout availability can be delayed to exercise the overlay's
/// pending-attach path.
pub struct SimulatedSurface {
    current_page_index: usize,
    total_pages: usize,
    metrics: PageMetrics,
    /// Number of metric queries to refuse before the page "finishes
    /// rendering"
    renders_pending: u32,
}

impl SimulatedSurface {
    pub fn new(total_pages: usize, metrics: PageMetrics) -> Self {
        Self {
            current_page_index: 0,
            total_pages,
            metrics,
            renders_pending: 0,
        }
    }

    /// Delay layout availability by `count` metric queries
    pub fn with_delayed_render(mut self, count: u32) -> Self {
        self.renders_pending = count;
        self
    }

    /// Simulate a zoom/resize: all following metric queries see the new size
    pub fn resize(&mut self, metrics: PageMetrics) {
        self.metrics = metrics;
    }
}

impl RenderSurface for SimulatedSurface {
    fn render_state(&self) -> ViewerRenderState {
        ViewerRenderState {
            current_page_index: self.current_page_index,
            total_pages: self.total_pages,
            page_metrics: if self.renders_pending == 0 {
                Some(self.metrics)
            } else {
                None
            },
        }
    }

    fn jump_to_page(&mut self, page_index: usize) {
        if page_index < self.total_pages {
            self.current_page_index = page_index;
        }
    }

    fn page_metrics(&self, page_index: usize) -> Option<PageMetrics> {
        if page_index != self.current_page_index {
            return None;
        }
        if self.renders_pending > 0 {
            // Interior mutability is not worth it for a test double; the
            // countdown ticks in render_complete() instead
            return None;
        }
        Some(self.metrics)
    }
}

impl SimulatedSurface {
    /// Finish one pending render pass
    pub fn render_complete(&mut self) {
        self.renders_pending = self.renders_pending.saturating_sub(1);
    }
}
