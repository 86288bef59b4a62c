//! Solving-session state machine.
//!
//! A [`SessionManager`] holds the task currently being solved: its training
//! examples, its test pairs, and the one mutable output grid the solver
//! edits. Loading a task replaces the whole session; navigating between test
//! pairs moves an index and re-derives the output grid. The manager knows
//! nothing about where tasks come from or where attempts go.

use thiserror::Error;

use crate::catalog::Subset;
use crate::grid::{Grid, GridError};
use crate::task::{Pair, Task};

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no task is loaded")]
    NoTaskLoaded,

    #[error("task '{name}' has no test pairs")]
    NoTestPairs { name: String },

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Direction of test-pair navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Navigation context supplied alongside a task load.
///
/// Each field is an explicit patch: `Some` overwrites the session's value,
/// `None` keeps whatever was there before. A task imported from a local file
/// passes `LoadContext::default()` and leaves all three untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadContext {
    pub subset: Option<Subset>,
    pub task_index: Option<usize>,
    pub total_task_count: Option<usize>,
}

/// Session tuning.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Keep each test pair's edited output as a draft when navigating away
    /// and restore it on return. Off by default: moving between pairs
    /// discards the previous pair's edits.
    pub retain_drafts: bool,
}

struct ActiveTask {
    task: Task,
    active_test_index: usize,
    /// The grid the solver edits. `None` only when the task has no test
    /// pairs at all.
    output: Option<Grid>,
    /// Per-pair saved outputs, used only with `retain_drafts`.
    drafts: Vec<Option<Grid>>,
}

impl ActiveTask {
    fn active_pair(&self) -> Option<&Pair> {
        self.task.test.get(self.active_test_index)
    }

    fn fresh_output(&self, index: usize) -> Option<Grid> {
        self.task
            .test
            .get(index)
            .map(|pair| Grid::zeros_like(&pair.input))
    }
}

/// State machine for one solving session.
///
/// Reusable indefinitely: every [`load_task`](Self::load_task) replaces the
/// previous task wholesale. All operations are synchronous; the manager is
/// driven from a single logical thread.
pub struct SessionManager {
    config: SessionConfig,
    active: Option<ActiveTask>,
    subset: Option<Subset>,
    task_index: Option<usize>,
    total_task_count: Option<usize>,
    selected_symbol: u8,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            active: None,
            subset: None,
            task_index: None,
            total_task_count: None,
            selected_symbol: 0,
        }
    }

    /// Load `task` into the session, replacing any previous one.
    ///
    /// The active test index always resets to 0 and the editable output
    /// becomes an all-zero grid shaped like the first test input (absent
    /// when the task has no test pairs). Context fields update only where
    /// the patch supplies a value.
    pub fn load_task(&mut self, task: Task, context: LoadContext) {
        if let Some(subset) = context.subset {
            self.subset = Some(subset);
        }
        if let Some(index) = context.task_index {
            self.task_index = Some(index);
        }
        if let Some(total) = context.total_task_count {
            self.total_task_count = Some(total);
        }

        tracing::debug!(
            "Loading task '{}' ({} train, {} test pairs)",
            task.name,
            task.train.len(),
            task.test.len()
        );

        let output = task.test.first().map(|pair| Grid::zeros_like(&pair.input));
        let drafts = vec![None; task.test.len()];
        self.active = Some(ActiveTask {
            task,
            active_test_index: 0,
            output,
            drafts,
        });
    }

    /// Move to the next or previous test pair.
    ///
    /// Returns `Ok(true)` on a move and `Ok(false)` when already at the
    /// boundary; a boundary call changes nothing. Moving resets the output
    /// to zeros for the new pair's input, discarding the previous pair's
    /// edits unless [`SessionConfig::retain_drafts`] is on.
    pub fn advance_test_pair(&mut self, direction: Direction) -> Result<bool, SessionError> {
        let retain = self.config.retain_drafts;
        let active = self.active.as_mut().ok_or(SessionError::NoTaskLoaded)?;
        let current = active.active_test_index;
        let target = match direction {
            Direction::Next => current + 1,
            Direction::Previous => {
                if current == 0 {
                    return Ok(false);
                }
                current - 1
            }
        };
        if target >= active.task.test.len() {
            return Ok(false);
        }

        if retain {
            active.drafts[current] = active.output.take();
            active.output = match active.drafts[target].take() {
                Some(draft) => Some(draft),
                None => active.fresh_output(target),
            };
        } else {
            active.output = active.fresh_output(target);
        }
        active.active_test_index = target;
        Ok(true)
    }

    /// Set one cell of the editable output.
    pub fn set_output_cell(
        &mut self,
        row: usize,
        col: usize,
        value: u8,
    ) -> Result<(), SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoTaskLoaded)?;
        match active.output.as_mut() {
            Some(output) => {
                output.set(row, col, value)?;
                Ok(())
            }
            None => Err(SessionError::NoTestPairs {
                name: active.task.name.clone(),
            }),
        }
    }

    /// Set one cell of the editable output to the currently selected symbol.
    pub fn paint_output_cell(&mut self, row: usize, col: usize) -> Result<(), SessionError> {
        let symbol = self.selected_symbol;
        self.set_output_cell(row, col, symbol)
    }

    /// Replace the editable output with an independent copy of the active
    /// test input. Later edits to the output never touch the input.
    pub fn copy_input_to_output(&mut self) -> Result<(), SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoTaskLoaded)?;
        let input = match active.active_pair() {
            Some(pair) => pair.input.clone(),
            None => {
                return Err(SessionError::NoTestPairs {
                    name: active.task.name.clone(),
                })
            }
        };
        active.output = Some(input);
        Ok(())
    }

    /// Replace the editable output with an all-zero grid matching the
    /// active test input's dimensions.
    pub fn reset_output_grid(&mut self) -> Result<(), SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoTaskLoaded)?;
        let zeros = match active.active_pair() {
            Some(pair) => Grid::zeros_like(&pair.input),
            None => {
                return Err(SessionError::NoTestPairs {
                    name: active.task.name.clone(),
                })
            }
        };
        active.output = Some(zeros);
        Ok(())
    }

    /// Replace the editable output with a new `height` x `width` all-zero
    /// grid. With `preserve_content` and a `source` grid, the overlapping
    /// top-left region of `source` is copied in; anything outside the
    /// overlap is clipped silently.
    pub fn resize_output_grid(
        &mut self,
        height: usize,
        width: usize,
        preserve_content: bool,
        source: Option<&Grid>,
    ) -> Result<(), SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoTaskLoaded)?;
        if active.task.test.is_empty() {
            return Err(SessionError::NoTestPairs {
                name: active.task.name.clone(),
            });
        }
        let mut resized = Grid::zeros(height, width)?;
        if preserve_content {
            if let Some(source) = source {
                resized.copy_clipped_from(source);
            }
        }
        active.output = Some(resized);
        Ok(())
    }

    // ── Read accessors ──────────────────────────────────────────────

    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    pub fn task(&self) -> Option<&Task> {
        self.active.as_ref().map(|a| &a.task)
    }

    pub fn task_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.task.name.as_str())
    }

    pub fn train_examples(&self) -> Option<&[Pair]> {
        self.active.as_ref().map(|a| a.task.train.as_slice())
    }

    pub fn test_pair_count(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.task.test.len())
    }

    pub fn active_test_index(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.active_test_index)
    }

    /// Input grid of the active test pair.
    pub fn active_input(&self) -> Option<&Grid> {
        self.active
            .as_ref()
            .and_then(|a| a.active_pair())
            .map(|pair| &pair.input)
    }

    /// Ground-truth output of the active test pair, when the task file
    /// carries one. Not shown to the solver during a session.
    pub fn active_reference_output(&self) -> Option<&Grid> {
        self.active
            .as_ref()
            .and_then(|a| a.active_pair())
            .and_then(|pair| pair.output.as_ref())
    }

    /// The grid the solver is editing.
    pub fn output(&self) -> Option<&Grid> {
        self.active.as_ref().and_then(|a| a.output.as_ref())
    }

    pub fn subset(&self) -> Option<Subset> {
        self.subset
    }

    pub fn task_index(&self) -> Option<usize> {
        self.task_index
    }

    pub fn total_task_count(&self) -> Option<usize> {
        self.total_task_count
    }

    pub fn selected_symbol(&self) -> u8 {
        self.selected_symbol
    }

    pub fn select_symbol(&mut self, symbol: u8) {
        self.selected_symbol = symbol;
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: Vec<Vec<u8>>) -> Grid {
        Grid::from_rows(rows).unwrap()
    }

    fn pair(input: Grid) -> Pair {
        Pair {
            input,
            output: None,
        }
    }

    fn task_with_test_inputs(inputs: Vec<Grid>) -> Task {
        let train = vec![Pair {
            input: grid(vec![vec![1]]),
            output: Some(grid(vec![vec![2]])),
        }];
        let test = inputs.into_iter().map(pair).collect();
        Task::new("sample", train, test).unwrap()
    }

    fn full_context() -> LoadContext {
        LoadContext {
            subset: Some(Subset::Training),
            task_index: Some(3),
            total_task_count: Some(10),
        }
    }

    #[test]
    fn load_zeroes_output_to_first_test_input_shape() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![7, 7], vec![7, 7], vec![7, 7]])]),
            LoadContext::default(),
        );

        let output = session.output().unwrap();
        assert_eq!(output.height(), 3);
        assert_eq!(output.width(), 2);
        assert!(output.rows().iter().flatten().all(|&c| c == 0));
        assert_eq!(session.active_test_index(), Some(0));
    }

    #[test]
    fn omitted_context_fields_keep_previous_values() {
        let mut session = SessionManager::new();
        session.load_task(task_with_test_inputs(vec![grid(vec![vec![0]])]), full_context());

        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0]])]),
            LoadContext {
                task_index: Some(4),
                ..LoadContext::default()
            },
        );

        assert_eq!(session.subset(), Some(Subset::Training));
        assert_eq!(session.task_index(), Some(4));
        assert_eq!(session.total_task_count(), Some(10));
    }

    #[test]
    fn advance_clamps_at_both_ends() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0]]), grid(vec![vec![0, 0]])]),
            LoadContext::default(),
        );

        assert!(!session.advance_test_pair(Direction::Previous).unwrap());
        assert_eq!(session.active_test_index(), Some(0));

        assert!(session.advance_test_pair(Direction::Next).unwrap());
        assert_eq!(session.active_test_index(), Some(1));

        assert!(!session.advance_test_pair(Direction::Next).unwrap());
        assert_eq!(session.active_test_index(), Some(1));
    }

    #[test]
    fn advance_discards_edits_by_default() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0, 0]]), grid(vec![vec![0, 0]])]),
            LoadContext::default(),
        );

        session.set_output_cell(0, 0, 5).unwrap();
        session.advance_test_pair(Direction::Next).unwrap();
        session.advance_test_pair(Direction::Previous).unwrap();

        assert_eq!(session.output().unwrap().get(0, 0).unwrap(), 0);
    }

    #[test]
    fn retain_drafts_restores_edits_per_pair() {
        let mut session = SessionManager::with_config(SessionConfig {
            retain_drafts: true,
        });
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0, 0]]), grid(vec![vec![0, 0, 0]])]),
            LoadContext::default(),
        );

        session.set_output_cell(0, 0, 5).unwrap();
        session.advance_test_pair(Direction::Next).unwrap();
        // The second pair starts from a fresh zero grid.
        assert_eq!(session.output().unwrap().width(), 3);
        assert_eq!(session.output().unwrap().get(0, 0).unwrap(), 0);

        session.set_output_cell(0, 2, 9).unwrap();
        session.advance_test_pair(Direction::Previous).unwrap();
        assert_eq!(session.output().unwrap().get(0, 0).unwrap(), 5);

        session.advance_test_pair(Direction::Next).unwrap();
        assert_eq!(session.output().unwrap().get(0, 2).unwrap(), 9);
    }

    #[test]
    fn set_output_cell_rejects_out_of_bounds() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0, 0], vec![0, 0]])]),
            LoadContext::default(),
        );

        let err = session.set_output_cell(5, 0, 1).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Grid(GridError::OutOfBounds { row: 5, .. })
        ));
    }

    #[test]
    fn copy_input_to_output_is_a_deep_copy() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![3, 4], vec![5, 6]])]),
            LoadContext::default(),
        );

        session.copy_input_to_output().unwrap();
        assert_eq!(session.output().unwrap().get(1, 0).unwrap(), 5);

        session.set_output_cell(1, 0, 9).unwrap();
        assert_eq!(session.active_input().unwrap().get(1, 0).unwrap(), 5);
    }

    #[test]
    fn reset_matches_input_dimensions_not_output() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![1, 2], vec![3, 4]])]),
            LoadContext::default(),
        );

        session.resize_output_grid(5, 5, false, None).unwrap();
        assert_eq!(session.output().unwrap().height(), 5);

        session.reset_output_grid().unwrap();
        let output = session.output().unwrap();
        assert_eq!((output.height(), output.width()), (2, 2));
        assert!(output.rows().iter().flatten().all(|&c| c == 0));
    }

    #[test]
    fn resize_clips_source_silently() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0, 0, 0], vec![0, 0, 0], vec![0, 0, 0]])]),
            LoadContext::default(),
        );

        let source = grid(vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]);
        session.resize_output_grid(2, 4, true, Some(&source)).unwrap();

        let output = session.output().unwrap();
        assert_eq!((output.height(), output.width()), (2, 4));
        assert_eq!(output.get(0, 0).unwrap(), 1);
        assert_eq!(output.get(1, 2).unwrap(), 6);
        // Outside the overlap everything stays zero.
        assert_eq!(output.get(0, 3).unwrap(), 0);
        assert_eq!(output.get(1, 3).unwrap(), 0);
    }

    #[test]
    fn resize_rejects_zero_dimensions() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0]])]),
            LoadContext::default(),
        );

        let err = session.resize_output_grid(0, 3, false, None).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Grid(GridError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn operations_require_a_loaded_task() {
        let mut session = SessionManager::new();
        assert!(matches!(
            session.set_output_cell(0, 0, 1),
            Err(SessionError::NoTaskLoaded)
        ));
        assert!(matches!(
            session.advance_test_pair(Direction::Next),
            Err(SessionError::NoTaskLoaded)
        ));
        assert!(matches!(
            session.copy_input_to_output(),
            Err(SessionError::NoTaskLoaded)
        ));
    }

    #[test]
    fn task_without_test_pairs_has_no_output() {
        let mut session = SessionManager::new();
        session.load_task(task_with_test_inputs(vec![]), LoadContext::default());

        assert!(session.output().is_none());
        assert!(matches!(
            session.set_output_cell(0, 0, 1),
            Err(SessionError::NoTestPairs { .. })
        ));
        // Navigation among zero pairs clamps rather than failing.
        assert!(!session.advance_test_pair(Direction::Next).unwrap());
    }

    #[test]
    fn paint_uses_selected_symbol() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0, 0]])]),
            LoadContext::default(),
        );

        session.select_symbol(7);
        session.paint_output_cell(0, 1).unwrap();
        assert_eq!(session.output().unwrap().get(0, 1).unwrap(), 7);
    }

    #[test]
    fn edit_reset_round_trip() {
        let mut session = SessionManager::new();
        session.load_task(
            task_with_test_inputs(vec![grid(vec![vec![0, 0], vec![0, 0]])]),
            LoadContext::default(),
        );

        assert_eq!(session.output().unwrap().rows(), &[vec![0, 0], vec![0, 0]]);

        session.set_output_cell(0, 0, 5).unwrap();
        assert_eq!(session.output().unwrap().rows(), &[vec![5, 0], vec![0, 0]]);

        session.reset_output_grid().unwrap();
        assert_eq!(session.output().unwrap().rows(), &[vec![0, 0], vec![0, 0]]);
    }
}
