//! Long-running autonomous coding agent harness.
//!
//! Runs an external coding agent in a loop of fresh sessions against one
//! project directory, with every shell command the agent attempts checked by
//! an allowlist security gate before anything is spawned. The architecture
//! enforces a strict separation:
//!
//! - **[`core`]**: pure, deterministic decisions (command extraction, policy,
//!   gate verdicts, session-type selection). No I/O, fully testable in
//!   isolation.
//! - **[`io`]**: side-effecting adapters (project marker, config, git,
//!   process spawning, the external agent CLI). Isolated so tests can script
//!   them.
//!
//! [`looping`] wires the two together into the auto-continuation loop;
//! [`hook`] is the out-of-process interception endpoint the engine registers
//! with the agent CLI.

pub mod core;
pub mod exit_codes;
pub mod hook;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
