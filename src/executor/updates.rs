use crate::signals::{Artifact, BuildNotes, ReviewNotes};
use crate::snapshot::{BuildState, Plan, ReviewState, Snapshot};

/// Phase-specific changes to merge into the snapshot before the transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StateUpdate {
    /// A fresh plan, or `None` when the agent produced no `<plan>` block.
    Plan(Option<Plan>),
    Build(BuildNotes),
    Review(ReviewNotes),
    #[default]
    None,
}

impl From<Artifact> for StateUpdate {
    fn from(artifact: Artifact) -> Self {
        match artifact {
            Artifact::Plan(plan) => StateUpdate::Plan(plan),
            Artifact::Build(notes) => StateUpdate::Build(notes.unwrap_or_default()),
            Artifact::Review(notes) => StateUpdate::Review(notes.unwrap_or_default()),
            Artifact::Empty => StateUpdate::None,
        }
    }
}

impl StateUpdate {
    /// Merge into `snapshot`.
    ///
    /// Only a PLAN update touches `plan`; it also starts build and review
    /// state over. BUILD appends completed steps and replaces blockers.
    /// REVIEW replaces the review state wholesale.
    pub fn apply_to(self, snapshot: &mut Snapshot) {
        match self {
            StateUpdate::Plan(plan) => {
                snapshot.plan = plan;
                snapshot.build_state = BuildState::default();
                snapshot.review_state = ReviewState::default();
            }
            StateUpdate::Build(notes) => {
                snapshot
                    .build_state
                    .steps_completed
                    .extend(notes.steps_completed);
                snapshot.build_state.blockers = notes.blockers;
            }
            StateUpdate::Review(notes) => {
                let feedback = notes.feedback.trim().to_string();
                snapshot.review_state = ReviewState {
                    last_feedback: (!feedback.is_empty()).then_some(feedback),
                    issues: notes.issues,
                };
            }
            StateUpdate::None => {}
        }
    }
}
