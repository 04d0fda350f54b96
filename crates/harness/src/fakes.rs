use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use taller_core::{Clock, UtcInstant};
use taller_sync::{CaretContainer, CaretPosition};

/// A clock that only moves when told to. Clones share the time.
#[derive(Clone)]
pub struct ManualClock(Rc<Cell<UtcInstant>>);

impl ManualClock {
    pub fn new(start: UtcInstant) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    pub fn set(&self, instant: UtcInstant) {
        self.0.set(instant);
    }

    pub fn advance_ms(&self, millis: i64) {
        self.0.set(UtcInstant::from_millis(self.0.get().millis() + millis));
    }

    pub fn advance_hours(&self, hours: i64) {
        self.0.set(self.0.get().add_hours(hours));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UtcInstant {
        self.0.get()
    }
}

#[derive(Default)]
struct ContainerState {
    nodes: BTreeSet<Vec<usize>>,
    selection: Option<CaretPosition>,
}

/// Stand-in for an editable container: a set of node paths that currently
/// resolve, plus the selection. Clones share state, so a test can keep one
/// while the session owns another.
#[derive(Clone, Default)]
pub struct FakeContainer(Rc<RefCell<ContainerState>>);

impl FakeContainer {
    /// A container with `lines` top-level text nodes.
    pub fn with_lines(lines: usize) -> Self {
        let container = Self::default();
        container.set_lines(lines);
        container
    }

    /// Rebuilds the content; paths beyond `lines` stop resolving.
    pub fn set_lines(&self, lines: usize) {
        self.0.borrow_mut().nodes = (0..lines).map(|i| vec![i]).collect();
    }

    /// Moves the caret as a user would.
    pub fn place(&self, position: CaretPosition) {
        self.0.borrow_mut().selection = Some(position);
    }

    pub fn blur(&self) {
        self.0.borrow_mut().selection = None;
    }

    pub fn caret(&self) -> Option<CaretPosition> {
        self.0.borrow().selection.clone()
    }
}

impl CaretContainer for FakeContainer {
    fn selection(&self) -> Option<CaretPosition> {
        self.caret()
    }

    fn select(&mut self, position: &CaretPosition) -> bool {
        let mut state = self.0.borrow_mut();
        if !state.nodes.contains(&position.path) {
            return false;
        }
        state.selection = Some(position.clone());
        true
    }
}
