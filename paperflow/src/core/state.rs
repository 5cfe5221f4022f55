//! Per-document run state.

use super::{StageName, StageStatus};

/// Tracks which stages have run for a single document.
///
/// Owned by the coordinator for the lifetime of one document and dropped
/// afterwards; it is never shared between documents.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    statuses: [StageStatus; 4],
}

impl RunState {
    /// Creates a state with every stage pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status of a stage.
    #[must_use]
    pub fn status(&self, stage: StageName) -> StageStatus {
        self.statuses[stage.index()]
    }

    /// Returns true if the stage may start: every earlier stage succeeded
    /// and this one has not run yet.
    #[must_use]
    pub fn can_start(&self, stage: StageName) -> bool {
        self.statuses[..stage.index()].iter().all(StageStatus::is_success)
            && self.status(stage) == StageStatus::Pending
    }

    /// Marks a stage as running.
    pub fn start(&mut self, stage: StageName) {
        self.statuses[stage.index()] = StageStatus::Running;
    }

    /// Marks a stage as completed.
    pub fn complete(&mut self, stage: StageName) {
        self.statuses[stage.index()] = StageStatus::Ok;
    }

    /// Marks a stage as failed and every later stage as skipped.
    pub fn fail(&mut self, stage: StageName) {
        self.statuses[stage.index()] = StageStatus::Fail;
        for later in &mut self.statuses[stage.index() + 1..] {
            *later = StageStatus::Skip;
        }
    }

    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.statuses.iter().all(StageStatus::is_success)
    }

    /// The last stage that completed successfully, if any.
    #[must_use]
    pub fn last_completed(&self) -> Option<StageName> {
        StageName::ALL
            .iter()
            .rev()
            .find(|stage| self.status(**stage).is_success())
            .copied()
    }

    /// Stages that completed successfully, in order.
    #[must_use]
    pub fn completed(&self) -> Vec<StageName> {
        StageName::ALL
            .iter()
            .filter(|stage| self.status(**stage).is_success())
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_only_read_can_start() {
        let state = RunState::new();
        assert!(state.can_start(StageName::Read));
        assert!(!state.can_start(StageName::Review));
        assert!(state.last_completed().is_none());
    }

    #[test]
    fn test_completion_unlocks_next_stage() {
        let mut state = RunState::new();
        state.start(StageName::Read);
        assert_eq!(state.status(StageName::Read), StageStatus::Running);
        state.complete(StageName::Read);
        assert!(state.can_start(StageName::Review));
        assert!(!state.can_start(StageName::Read));
        assert_eq!(state.last_completed(), Some(StageName::Read));
    }

    #[test]
    fn test_failure_skips_later_stages() {
        let mut state = RunState::new();
        state.complete(StageName::Read);
        state.fail(StageName::Review);

        assert_eq!(state.status(StageName::Review), StageStatus::Fail);
        assert_eq!(state.status(StageName::Research), StageStatus::Skip);
        assert_eq!(state.status(StageName::Compose), StageStatus::Skip);
        assert!(!state.can_start(StageName::Research));
        assert_eq!(state.completed(), vec![StageName::Read]);
    }

    #[test]
    fn test_is_complete() {
        let mut state = RunState::new();
        for stage in StageName::ALL {
            state.complete(stage);
        }
        assert!(state.is_complete());
    }
}
