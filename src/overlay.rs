use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::geometry::{self, OverlayPlacement, OverlayRect, PageMetrics, PageReference};
use crate::ocr::TextSpan;

/// The single field currently requested for on-page highlighting
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightTarget {
    /// 1-based page the span lives on
    pub page: u32,
    pub source_span: TextSpan,
}

impl HighlightTarget {
    pub fn for_span(span: TextSpan) -> Self {
        Self {
            page: span.page,
            source_span: span,
        }
    }

    /// 0-based page index the render surface should show
    pub fn page_index(&self) -> usize {
        self.page.saturating_sub(1) as usize
    }

    /// Identity key for duplicate-selection suppression. Content plus page
    /// is not enough on its own (content can repeat), so the box origin
    /// participates too.
    pub fn identity(&self) -> TargetIdentity {
        TargetIdentity {
            content: self.source_span.content.clone(),
            page: self.page,
            origin_bits: (
                self.source_span.bounding_box.x_min.to_bits(),
                self.source_span.bounding_box.y_min.to_bits(),
            ),
        }
    }
}

/// Comparable identity of a highlight target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    content: String,
    page: u32,
    origin_bits: (u64, u64),
}

/// Transient request to scroll a field-list entry into view and flash it.
/// Consumed once; expires on a short timer to avoid repeat triggers.
#[derive(Debug, Clone)]
pub struct ScrollTarget {
    pub span: TextSpan,
    issued_at: Instant,
    ttl: Duration,
}

impl ScrollTarget {
    pub fn new(span: TextSpan, ttl: Duration) -> Self {
        Self {
            span,
            issued_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.issued_at.elapsed() >= self.ttl
    }
}

/// Overlay lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayState {
    Hidden,
    /// Target set but the page element is not attachable yet
    PendingAttach { target: HighlightTarget },
    /// Overlay positioned on the current page
    Visible {
        target: HighlightTarget,
        page_index: usize,
        rect: OverlayRect,
    },
}

/// Inputs the machine reacts to
#[derive(Debug, Clone)]
pub enum OverlayEvent {
    /// User clicked a field in the analysis panel
    TargetSelected(HighlightTarget),
    /// New document selected, explicit clear, or overlay dismissed
    TargetCleared,
    /// Render surface reports a different current page
    PageChanged { current_page_index: usize },
    /// Render surface finished laying out a page and can be measured
    PageRendered {
        page_index: usize,
        metrics: PageMetrics,
    },
    /// The single bounded attach timer fired without a measurable page
    AttachTimedOut,
    /// User clicked the overlay rectangle itself
    OverlayClicked,
}

/// Side effects for the caller to execute; the machine itself stays pure
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCommand {
    /// Command the render surface to show this 0-based page.
    /// Emitted at most once per new target identity.
    NavigateToPage(usize),
    /// Arm one short timer, then report PageRendered or AttachTimedOut
    ScheduleAttachRetry,
    /// Hand off to the analysis panel: scroll this span into view
    ScrollFieldIntoView(TextSpan),
}

/// Tracks which field (if any) is highlighted and reconciles it with what
/// the render surface is showing.
pub struct OverlayMachine {
    state: OverlayState,
    reference: PageReference,
    unit_scale: f64,
    padding_pct: f64,
    /// Identity we already issued a navigation command for; repeated
    /// commands for the same target would fight user-initiated page turns
    navigated_for: Option<TargetIdentity>,
}

impl OverlayMachine {
    pub fn new(reference: PageReference, unit_scale: f64, padding_pct: f64) -> Self {
        Self {
            state: OverlayState::Hidden,
            reference,
            unit_scale,
            padding_pct,
            navigated_for: None,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    /// Per-document page reference can differ from the configured default
    pub fn set_page_reference(&mut self, reference: PageReference) {
        self.reference = reference;
    }

    pub fn visible_rect(&self) -> Option<OverlayRect> {
        match &self.state {
            OverlayState::Visible { rect, .. } => Some(*rect),
            _ => None,
        }
    }

    pub fn is_visible_for(&self, span: &TextSpan) -> bool {
        match &self.state {
            OverlayState::Visible { target, .. } => {
                target.identity() == HighlightTarget::for_span(span.clone()).identity()
            }
            _ => false,
        }
    }

    pub fn handle(&mut self, event: OverlayEvent) -> Vec<OverlayCommand> {
        match event {
            OverlayEvent::TargetSelected(target) => self.on_target_selected(target),
            OverlayEvent::TargetCleared => {
                debug!("highlight target cleared");
                self.state = OverlayState::Hidden;
                self.navigated_for = None;
                Vec::new()
            }
            OverlayEvent::PageChanged { current_page_index } => {
                self.on_page_changed(current_page_index)
            }
            OverlayEvent::PageRendered {
                page_index,
                metrics,
            } => self.on_page_rendered(page_index, metrics),
            OverlayEvent::AttachTimedOut => {
                // Non-fatal: stay pending until the next page-change or
                // re-render event re-triggers the attach attempt
                if let OverlayState::PendingAttach { target } = &self.state {
                    debug!(page = target.page, "attach timed out, overlay stays pending");
                }
                Vec::new()
            }
            OverlayEvent::OverlayClicked => self.on_overlay_clicked(),
        }
    }

    fn on_target_selected(&mut self, target: HighlightTarget) -> Vec<OverlayCommand> {
        let identity = target.identity();

        // Re-selecting the field already on screen must not re-trigger
        // navigation or re-attach
        if let OverlayState::Visible {
            target: current, ..
        } = &self.state
        {
            if current.identity() == identity {
                debug!("same field re-selected while visible, no-op");
                return Vec::new();
            }
        }

        let page_index = target.page_index();
        info!(page = target.page, text = %target.source_span.content, "field selected for highlight");
        self.state = OverlayState::PendingAttach { target };

        let mut commands = Vec::new();
        if self.navigated_for.as_ref() != Some(&identity) {
            commands.push(OverlayCommand::NavigateToPage(page_index));
            self.navigated_for = Some(identity);
        }
        commands.push(OverlayCommand::ScheduleAttachRetry);
        commands
    }

    fn on_page_changed(&mut self, current_page_index: usize) -> Vec<OverlayCommand> {
        match &self.state {
            OverlayState::Visible { target, page_index, .. } => {
                if *page_index != current_page_index {
                    // Detach but retain the target
                    debug!(
                        from = page_index,
                        to = current_page_index,
                        "page changed away from overlay, detaching"
                    );
                    let target = target.clone();
                    self.state = OverlayState::PendingAttach { target };
                }
                Vec::new()
            }
            OverlayState::PendingAttach { target } => {
                if target.page_index() == current_page_index {
                    // Target page arrived; ask the caller to measure it
                    vec![OverlayCommand::ScheduleAttachRetry]
                } else {
                    Vec::new()
                }
            }
            OverlayState::Hidden => Vec::new(),
        }
    }

    fn on_page_rendered(&mut self, page_index: usize, metrics: PageMetrics) -> Vec<OverlayCommand> {
        let target = match &self.state {
            OverlayState::PendingAttach { target } if target.page_index() == page_index => {
                target.clone()
            }
            OverlayState::Visible { target, page_index: visible_page, .. } => {
                if *visible_page == page_index {
                    // Same page re-rendered (zoom/resize): reposition
                    target.clone()
                } else {
                    // Rendered page is not ours anymore; detach
                    let target = target.clone();
                    self.state = OverlayState::PendingAttach { target };
                    return Vec::new();
                }
            }
            _ => return Vec::new(),
        };

        match geometry::place(
            &target.source_span.bounding_box,
            self.reference,
            Some(metrics),
            self.unit_scale,
            self.padding_pct,
        ) {
            OverlayPlacement::Visible { percent, .. } => {
                debug!(
                    page_index,
                    left = percent.left_pct,
                    top = percent.top_pct,
                    "overlay attached"
                );
                self.state = OverlayState::Visible {
                    target,
                    page_index,
                    rect: percent,
                };
                Vec::new()
            }
            OverlayPlacement::NotVisible => {
                // Metrics were degenerate after all; wait for a real render
                self.state = OverlayState::PendingAttach { target };
                Vec::new()
            }
        }
    }

    fn on_overlay_clicked(&mut self) -> Vec<OverlayCommand> {
        match std::mem::replace(&mut self.state, OverlayState::Hidden) {
            OverlayState::Visible { target, .. } => {
                info!(text = %target.source_span.content, "overlay clicked, handing off to field list");
                self.navigated_for = None;
                vec![OverlayCommand::ScrollFieldIntoView(target.source_span)]
            }
            other => {
                // Click on a stale overlay element; nothing to hand off
                self.state = other;
                Vec::new()
            }
        }
    }
}
