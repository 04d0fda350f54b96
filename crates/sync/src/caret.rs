use tracing::debug;

/// A caret or selection inside a container, addressed by child indices from
/// the container down to the focused node. Survives the container's content
/// being rebuilt as long as the same path still resolves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaretPosition {
    pub path: Vec<usize>,
    pub start: usize,
    pub end: usize,
}

impl CaretPosition {
    pub fn new(path: Vec<usize>, start: usize, end: usize) -> Self {
        Self { path, start, end }
    }

    pub fn collapsed(path: Vec<usize>, offset: usize) -> Self {
        Self::new(path, offset, offset)
    }
}

/// The editable area whose caret the history follows.
pub trait CaretContainer {
    /// Current selection, if focus is inside the container.
    fn selection(&self) -> Option<CaretPosition>;
    /// Places the caret. Returns false if `position` no longer resolves.
    fn select(&mut self, position: &CaretPosition) -> bool;
}

/// Caret bookkeeping for one bound container.
#[derive(Default)]
pub struct HistoryBinding {
    container: Option<Box<dyn CaretContainer>>,
    last: Option<CaretPosition>,
}

impl HistoryBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_container(&mut self, container: Box<dyn CaretContainer>) {
        self.last = container.selection();
        self.container = Some(container);
    }

    pub fn unbind_container(&mut self) {
        self.container = None;
        self.last = None;
    }

    pub fn is_bound(&self) -> bool {
        self.container.is_some()
    }

    /// Caret recorded before the change being observed.
    pub fn last(&self) -> Option<CaretPosition> {
        self.last.clone()
    }

    pub fn current(&self) -> Option<CaretPosition> {
        self.container.as_ref().and_then(|c| c.selection())
    }

    /// Remembers the current caret as the one preceding the next change.
    pub fn record(&mut self) {
        if let Some(container) = &self.container {
            self.last = container.selection();
        }
    }

    pub fn set_last(&mut self, position: Option<CaretPosition>) {
        self.last = position;
    }

    /// Puts the caret back. A stale path leaves the caret where it is.
    pub fn restore(&mut self, position: &CaretPosition) {
        let Some(container) = self.container.as_mut() else {
            return;
        };
        if container.select(position) {
            self.last = Some(position.clone());
        } else {
            debug!(path = ?position.path, "caret path no longer resolves");
        }
    }
}
