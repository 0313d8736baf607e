/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: u32,
    pub remaining: usize,
    pub missed_pending: usize,
    /// 1-based round number.
    pub round: u32,
    pub is_complete: bool,
}
