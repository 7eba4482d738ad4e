//! Approval gates (spec.md §4.8): a `Gated` stage awaits an external
//! approval signal before it may run. The interactive prompt itself belongs
//! to the command-line front-end (out of scope here, per spec.md §1); this
//! crate only defines the seam a front-end plugs into, plus the one
//! non-interactive path spec.md names explicitly: `APPROVE_ALL=1`.

use async_trait::async_trait;

/// Decides whether a `Gated` stage may proceed.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn approve(&self, stage_name: &str) -> bool;
}

/// Satisfies every gate non-interactively when `APPROVE_ALL=1` is set in the
/// process environment, and denies otherwise. This is the engine's default
/// gate; a CLI front-end wanting an interactive prompt supplies its own
/// [`ApprovalGate`] instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvApprovalGate;

#[async_trait]
impl ApprovalGate for EnvApprovalGate {
    async fn approve(&self, _stage_name: &str) -> bool {
        std::env::var("APPROVE_ALL").map(|v| v == "1").unwrap_or(false)
    }
}

/// Approves every gate unconditionally; useful for `--dry-run` (spec.md
/// §4.8: "`--dry-run` bypasses gates and prints the plan") and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysApprove;

#[async_trait]
impl ApprovalGate for AlwaysApprove {
    async fn approve(&self, _stage_name: &str) -> bool {
        true
    }
}

/// Denies every gate; useful for tests exercising a stalled workflow.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverApprove;

#[async_trait]
impl ApprovalGate for NeverApprove {
    async fn approve(&self, _stage_name: &str) -> bool {
        false
    }
}
