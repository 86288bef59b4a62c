//! # arclab
//!
//! Session and completion engine for ARC-style visual reasoning puzzles.
//!
//! Two cooperating cores:
//! - A [`SessionManager`] holds the task being solved (training examples,
//!   test pairs) and the one output grid the solver edits, with clamped
//!   navigation between test pairs.
//! - A [`CompletionStore`] keeps a durable per-task ledger of solve
//!   attempts, merging each new attempt into the existing record and
//!   migrating records written in the legacy single-attempt shape.
//!
//! ```text
//!   TaskSource ──► TaskLoader ──► SessionManager
//!                                       │ submit
//!                                       ▼
//!                                 CompletionStore ──► KvStore
//! ```
//!
//! ## Modules
//! - `grid`: rectangular symbol grids and their invariant
//! - `task`: puzzle payloads (train and test pairs)
//! - `session`: the solving-session state machine
//! - `catalog`: collection vocabulary and the remote task source
//! - `loader`: catalog navigation and local file import
//! - `completion`: the attempt ledger and its merge rules
//! - `storage`: key-value backends (memory, file, SQLite)
//! - `export`: dated JSON export of the ledger

pub mod catalog;
pub mod completion;
pub mod config;
pub mod export;
pub mod grid;
pub mod loader;
pub mod session;
pub mod storage;
pub mod task;

pub use catalog::{ArcVersion, GithubTaskSource, Subset, TaskRef, TaskSource};
pub use completion::{CompletionRecord, CompletionStore, NewAttempt};
pub use config::Config;
pub use grid::Grid;
pub use loader::{LoadedTask, TaskLoader};
pub use session::{Direction, LoadContext, SessionConfig, SessionManager};
pub use task::Task;
