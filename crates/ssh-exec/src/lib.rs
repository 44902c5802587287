//! `ssh-exec` — remote execution half of the muster workspace.
//!
//! Three pieces:
//!
//! ```text
//! Remote (trait)        ← execute / put_file against one host, with timeout
//!     │                   production impl shells out to ssh/scp
//!     ▼
//! DispatchEngine        ← applies one command across an Inventory:
//!     │                   serial (pacing, abort) or bounded-parallel
//!     ▼
//! ExecutionResult       ← one per target, failures isolated as data
//! ```
//!
//! plus [`session::ConnectionSession`], the interactive attach-to-one-host
//! state machine with reconnect-on-drop.

pub mod dispatch;
pub mod error;
pub mod executor;
pub mod session;

pub use dispatch::{
    parse_decision, AutoContinue, DispatchEngine, ExecFailure, ExecutionRequest, ExecutionResult,
    Mode, NullSink, OutputDedup, PaceDecision, Pacing, PacingPrompt, ProgressSink,
    DEDUP_PLACEHOLDER, DEFAULT_POOL_SIZE,
};
pub use error::{ErrorKind, ExecError};
pub use executor::{Remote, SshExecutor};
pub use session::{
    AttachOutcome, AttachTransport, ConnectionSession, SessionState, SshAttachTransport,
    TargetMenu,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ExecError>;
