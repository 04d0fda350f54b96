use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, trace};

use taller_core::{CoreError, Fingerprint, UtcInstant};

use crate::caret::CaretPosition;

/// One recorded value plus the carets around the edit that produced it.
struct HistoryInstant<T> {
    data: T,
    caret_before: Option<CaretPosition>,
    caret_after: Option<CaretPosition>,
    fingerprint: Fingerprint,
    recorded_at: UtcInstant,
}

/// A value to put back into the draft, and where the caret goes.
#[derive(Debug, Clone, PartialEq)]
pub struct Restore<T> {
    pub data: T,
    pub caret: Option<CaretPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    /// Undo or redo just produced this value; its observation is not an edit.
    Restoring(Fingerprint),
}

/// Linear undo/redo history, newest instant first.
///
/// `cursor` indexes the instant currently shown. Recording while the cursor
/// is not at the front discards the instants ahead of it.
pub struct History<T> {
    instants: VecDeque<HistoryInstant<T>>,
    cursor: usize,
    capacity: usize,
    coalesce_ms: i64,
    /// The front instant takes no more folded edits.
    sealed: bool,
    mode: Mode,
}

impl<T: Clone + Serialize> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            instants: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
            coalesce_ms: 0,
            sealed: false,
            mode: Mode::Idle,
        }
    }

    /// Edits closer together than `window_ms` fold into one instant.
    pub fn with_coalescing(mut self, window_ms: i64) -> Self {
        self.coalesce_ms = window_ms.max(0);
        self
    }

    /// Closes the front instant to coalescing. The next observation always
    /// starts a fresh instant.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Feeds a draft change. Returns true if it became a new instant.
    pub fn observe(
        &mut self,
        value: &T,
        caret_before: Option<CaretPosition>,
        caret_after: Option<CaretPosition>,
        at: UtcInstant,
    ) -> Result<bool, CoreError> {
        let fingerprint = Fingerprint::of(value)?;

        if let Mode::Restoring(restored) = std::mem::replace(&mut self.mode, Mode::Idle) {
            if restored == fingerprint {
                trace!("restoration observed");
                return Ok(false);
            }
        }

        if self
            .instants
            .get(self.cursor)
            .is_some_and(|current| current.fingerprint == fingerprint)
        {
            return Ok(false);
        }

        if self.cursor > 0 {
            debug!(dropped = self.cursor, "new edit discards redo branch");
            self.instants.drain(..self.cursor);
            self.cursor = 0;
        }

        if self.coalesce_ms > 0 && self.instants.len() > 1 && !self.sealed {
            if let Some(front) = self.instants.front_mut() {
                if at.millis() - front.recorded_at.millis() < self.coalesce_ms {
                    front.data = value.clone();
                    front.fingerprint = fingerprint;
                    front.caret_after = caret_after;
                    front.recorded_at = at;
                    return Ok(true);
                }
            }
        }

        self.instants.push_front(HistoryInstant {
            data: value.clone(),
            caret_before,
            caret_after,
            fingerprint,
            recorded_at: at,
        });
        self.sealed = false;
        // Enforce capacity by dropping the oldest instant
        if self.instants.len() > self.capacity {
            self.instants.pop_back();
        }
        Ok(true)
    }

    pub fn undo(&mut self) -> Option<Restore<T>> {
        if !self.can_undo() {
            return None;
        }
        let caret = self.instants[self.cursor].caret_before.clone();
        self.cursor += 1;
        self.sealed = true;
        let target = &self.instants[self.cursor];
        self.mode = Mode::Restoring(target.fingerprint);
        Some(Restore {
            data: target.data.clone(),
            caret,
        })
    }

    pub fn redo(&mut self) -> Option<Restore<T>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor -= 1;
        self.sealed = true;
        let target = &self.instants[self.cursor];
        self.mode = Mode::Restoring(target.fingerprint);
        Some(Restore {
            data: target.data.clone(),
            caret: target.caret_after.clone(),
        })
    }

    pub fn can_undo(&self) -> bool {
        self.cursor + 1 < self.instants.len()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor > 0
    }

    pub fn len(&self) -> usize {
        self.instants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instants.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_restoring(&self) -> bool {
        matches!(self.mode, Mode::Restoring(_))
    }

    pub fn clear(&mut self) {
        self.instants.clear();
        self.cursor = 0;
        self.sealed = false;
        self.mode = Mode::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> UtcInstant {
        UtcInstant::from_millis(ms)
    }

    fn record(history: &mut History<String>, value: &str) -> bool {
        history.observe(&value.to_string(), None, None, at(0)).unwrap()
    }

    /// Applies a restore the way an editor would: write it back and observe it.
    fn apply(history: &mut History<String>, restore: Option<Restore<String>>) -> Option<String> {
        let restore = restore?;
        assert!(!history.observe(&restore.data, None, None, at(0)).unwrap());
        Some(restore.data)
    }

    #[test]
    fn undo_and_redo_walk_the_list() {
        let mut h = History::new(10);
        record(&mut h, "A");
        record(&mut h, "B");
        let undone = h.undo();
        assert_eq!(apply(&mut h, undone).as_deref(), Some("A"));
        let redone = h.redo();
        assert_eq!(apply(&mut h, redone).as_deref(), Some("B"));
        assert!(!h.can_redo());
    }

    #[test]
    fn bounded_moves_are_noops() {
        let mut h = History::new(10);
        assert!(h.undo().is_none());
        record(&mut h, "A");
        assert!(h.undo().is_none());
        assert!(h.redo().is_none());
        assert!(!h.is_restoring());
    }

    #[test]
    fn new_edit_after_undo_drops_redo_branch() {
        let mut h = History::new(10);
        for v in ["A", "B", "C"] {
            record(&mut h, v);
        }
        let first = h.undo();
        apply(&mut h, first);
        let second = h.undo();
        assert_eq!(apply(&mut h, second).as_deref(), Some("A"));
        assert!(record(&mut h, "D"));
        assert!(h.redo().is_none());
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn identical_observation_is_not_recorded() {
        let mut h = History::new(10);
        assert!(record(&mut h, "A"));
        assert!(!record(&mut h, "A"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn unexpected_value_while_restoring_is_recorded() {
        let mut h = History::new(10);
        record(&mut h, "A");
        record(&mut h, "B");
        h.undo();
        assert!(record(&mut h, "Z"));
        assert!(!h.is_restoring());
        assert!(!h.can_redo());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut h = History::new(3);
        for v in ["A", "B", "C", "D"] {
            record(&mut h, v);
        }
        assert_eq!(h.len(), 3);
        h.undo();
        let oldest = h.undo().map(|r| r.data);
        assert_eq!(oldest.as_deref(), Some("B"));
        assert!(h.undo().is_none());
    }

    #[test]
    fn carets_follow_the_edit() {
        let mut h = History::new(10);
        let p = |o| Some(CaretPosition::collapsed(vec![0], o));
        h.observe(&"A".to_string(), None, p(0), at(0)).unwrap();
        h.observe(&"AB".to_string(), p(1), p(2), at(0)).unwrap();
        let undo = h.undo().unwrap();
        assert_eq!(undo.caret, p(1));
        h.observe(&undo.data, None, None, at(0)).unwrap();
        assert_eq!(h.redo().unwrap().caret, p(2));
    }

    #[test]
    fn coalescing_folds_quick_edits() {
        let mut h = History::new(10).with_coalescing(500);
        h.observe(&"A".to_string(), None, None, at(0)).unwrap();
        h.observe(&"AB".to_string(), None, None, at(1000)).unwrap();
        h.observe(&"ABC".to_string(), None, None, at(1200)).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.undo().map(|r| r.data).as_deref(), Some("A"));
    }

    #[test]
    fn sealed_front_takes_no_folded_edits() {
        let mut h = History::new(10).with_coalescing(500);
        h.observe(&"A".to_string(), None, None, at(0)).unwrap();
        h.observe(&"AB".to_string(), None, None, at(1000)).unwrap();
        h.seal();
        assert!(h.observe(&"AB+remote".to_string(), None, None, at(1100)).unwrap());
        h.seal();
        assert!(h.observe(&"AB+remoteC".to_string(), None, None, at(1200)).unwrap());
        assert_eq!(h.len(), 4);

        h.observe(&"AB+remoteCD".to_string(), None, None, at(1300)).unwrap();
        assert_eq!(h.len(), 4);
        assert_eq!(h.undo().map(|r| r.data).as_deref(), Some("AB+remote"));
    }
}
