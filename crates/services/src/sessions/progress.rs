use quiz_core::quiz::PassMode;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub mode: PassMode,
    /// Zero-based cursor within the current pass.
    pub position: usize,
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub score: u32,
    pub is_complete: bool,
}
