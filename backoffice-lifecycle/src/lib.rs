//! Lifecycle of a staged draft.
//!
//! ```text
//! (none) --upload--> unpacking --unpack ok--> unpacked --tests started--> testing
//! unpacking --unpack failed--> error
//! testing --tests completed--> awaiting_review      testing --crash--> error
//! awaiting_review --request changes--> changes_requested
//! awaiting_review --accept--> accepted --publish--> published
//! any non-terminal --supersede--> superseded
//! ```
//!
//! `published` and `superseded` are terminal. `error` accepts only `supersede`:
//! a corrected upload gets a new staged number and supersedes the failed one.
//! Reviewer decisions (`accept`, `request changes`) additionally require the
//! acting user to be in the reviewer set.

use backoffice_types::versions::{LifecycleState, StageNumber};
use thiserror::Error;

/// Something that happened to a staged draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Upload,
    UnpackSucceeded,
    UnpackFailed,
    TestsStarted,
    TestsCompleted,
    /// Unhandled failure while validating or testing.
    Crash,
    RequestChanges,
    Accept,
    Publish,
    /// A newer draft of the same resource was uploaded or published.
    Supersede,
}

impl Event {
    pub const ALL: [Event; 10] = [
        Event::Upload,
        Event::UnpackSucceeded,
        Event::UnpackFailed,
        Event::TestsStarted,
        Event::TestsCompleted,
        Event::Crash,
        Event::RequestChanges,
        Event::Accept,
        Event::Publish,
        Event::Supersede,
    ];

    /// Events only a reviewer may trigger.
    pub fn requires_reviewer(self) -> bool {
        matches!(self, Event::Accept | Event::RequestChanges)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Event::Upload => "upload",
            Event::UnpackSucceeded => "unpack succeeded",
            Event::UnpackFailed => "unpack failed",
            Event::TestsStarted => "tests started",
            Event::TestsCompleted => "tests completed",
            Event::Crash => "crash",
            Event::RequestChanges => "request changes",
            Event::Accept => "accept",
            Event::Publish => "publish",
            Event::Supersede => "supersede",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot apply '{event}' to a draft in state '{}'", state_name(.from))]
    Illegal {
        from: Option<LifecycleState>,
        event: Event,
    },

    #[error("'{user}' is not a reviewer and cannot '{event}'")]
    NotAReviewer { user: String, event: Event },

    #[error("draft is {state}; no further transitions are possible")]
    Terminal { state: LifecycleState },

    #[error("staged version {number} of '{id}' does not exist")]
    UnknownVersion { id: String, number: StageNumber },
}

fn state_name(state: &Option<LifecycleState>) -> &'static str {
    state.map_or("none", LifecycleState::as_str)
}

/// Membership test for the reviewer set.
pub trait ReviewerSet {
    fn is_reviewer(&self, user: &str) -> bool;
}

impl<S: AsRef<str>> ReviewerSet for [S] {
    fn is_reviewer(&self, user: &str) -> bool {
        self.iter().any(|r| r.as_ref() == user)
    }
}

impl<S: AsRef<str>> ReviewerSet for Vec<S> {
    fn is_reviewer(&self, user: &str) -> bool {
        self.as_slice().is_reviewer(user)
    }
}

/// Next state for `event`, or why it is not allowed.
///
/// `from` is `None` for a staged number that does not exist yet.
pub fn transition(
    from: Option<LifecycleState>,
    event: Event,
) -> Result<LifecycleState, TransitionError> {
    use Event as E;
    use LifecycleState as S;

    if let Some(state) = from.filter(|s| s.is_terminal()) {
        return Err(TransitionError::Terminal { state });
    }

    let next = match (from, event) {
        (None, E::Upload) => S::Unpacking,
        (Some(S::Unpacking), E::UnpackSucceeded) => S::Unpacked,
        (Some(S::Unpacking), E::UnpackFailed) => S::Error,
        (Some(S::Unpacked), E::TestsStarted) => S::Testing,
        (Some(S::Testing), E::TestsCompleted) => S::AwaitingReview,
        (Some(S::AwaitingReview), E::RequestChanges) => S::ChangesRequested,
        (Some(S::AwaitingReview), E::Accept) => S::Accepted,
        (Some(S::Accepted), E::Publish) => S::Published,
        (Some(s), E::Crash) if s != S::Error => S::Error,
        (Some(_), E::Supersede) => S::Superseded,
        (from, event) => return Err(TransitionError::Illegal { from, event }),
    };
    Ok(next)
}

/// [`transition`] with the reviewer check applied first.
pub fn authorized_transition(
    from: Option<LifecycleState>,
    event: Event,
    actor: &str,
    reviewers: &dyn ReviewerSet,
) -> Result<LifecycleState, TransitionError> {
    if event.requires_reviewer() && !reviewers.is_reviewer(actor) {
        return Err(TransitionError::NotAReviewer {
            user: actor.to_string(),
            event,
        });
    }
    transition(from, event)
}
