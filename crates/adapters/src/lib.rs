// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete `ActionRunner` implementations (spec §1/§4.4): the only place
//! outside `oja-engine`'s trait definition that knows how an Action actually
//! becomes a subprocess.
//!
//! [`ProcessActionRunner`] is a best-effort local stand-in for the job
//! sandbox the specification calls out of scope — it spawns real child
//! processes and applies real signals on cancel, but it never claims to
//! impersonate the target OS user. Production deployments plug a real
//! sandbox in at the same `ActionRunner` seam.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod process_action_runner;

pub use process_action_runner::{CommandResolver, ProcessActionRunner, ShellCommandResolver};

#[cfg(feature = "test-support")]
mod fake_action_runner;
#[cfg(feature = "test-support")]
pub use fake_action_runner::FakeActionRunner;
