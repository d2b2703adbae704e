//! Lifecycle guard rules for mission control operations.

use serde::{Deserialize, Serialize};

/// Strictness switches for the resume and complete guards.
///
/// Both default to `false`: resume is accepted in any status and complete is
/// accepted from `planned` as well as `in-progress`. Completion from a terminal
/// status is rejected regardless of these flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRules {
    /// Only accept resume for in-progress missions
    #[serde(default)]
    pub strict_resume: bool,
    /// Only accept complete for in-progress missions
    #[serde(default)]
    pub strict_complete: bool,
}

impl LifecycleRules {
    pub fn strict() -> Self {
        Self {
            strict_resume: true,
            strict_complete: true,
        }
    }
}
