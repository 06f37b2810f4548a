//! Terminal output helpers for the `recall` CLI
//!
//! Uses `cliclack` log lines in interactive terminals and falls back to
//! plain tagged lines when output is piped or running in CI, so listings
//! stay greppable.

mod context;
mod output;

pub use context::UiContext;
pub use output::{intro, key_value, remark, section, step_info, step_ok_detail, step_warn_hint};
