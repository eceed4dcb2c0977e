#![allow(dead_code)]

use std::error::Error;

use buildrelay::exec::Command;

pub use buildrelay_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// `/bin/sh -c <script>`.
pub fn sh(script: &str) -> Command {
    Command::from_argv(["/bin/sh", "-c", script])
}
