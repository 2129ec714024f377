//! The learning → enforcing lifecycle.

use netpol_generator_k8s_api::Phase;
use std::{str::FromStr, time::Duration};

/// The declared mode of a generator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Learning,
    Enforcing,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized mode")]
pub struct UnknownMode(());

/// What a reconcile pass should do next.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Learning starts now: record `phase=Learning` and `lastAnalyzed=now`.
    EnterLearning { wake_after: Duration },

    /// The learning window is still open.
    KeepLearning { wake_after: Duration },

    /// The learning window has closed: record `mode=enforcing` and `phase=Enforcing`, then
    /// reconcile again immediately.
    BeginEnforcing,

    /// Compile and apply documents.
    Enforce,
}

// === impl Mode ===

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::Enforcing => "enforcing",
        }
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learning" => Ok(Self::Learning),
            "enforcing" => Ok(Self::Enforcing),
            _ => Err(UnknownMode(())),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Step ===

impl Step {
    /// Decides the next step from the declared mode and the recorded status.
    ///
    /// `elapsed` is the time since `lastAnalyzed`, or `None` when it was never recorded. A
    /// generator in `learning` mode whose status says `Enforcing` has been switched back by
    /// hand and starts a fresh learning window.
    pub fn next(
        mode: Mode,
        phase: Option<Phase>,
        elapsed: Option<Duration>,
        duration: Duration,
    ) -> Self {
        if mode == Mode::Enforcing {
            return Self::Enforce;
        }

        let elapsed = match (phase, elapsed) {
            (Some(Phase::Learning), Some(elapsed)) => elapsed,
            _ => {
                return Self::EnterLearning {
                    wake_after: duration,
                }
            }
        };

        match duration.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => Self::KeepLearning {
                wake_after: remaining,
            },
            _ => Self::BeginEnforcing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn enforcing_is_terminal() {
        for phase in [None, Some(Phase::Learning), Some(Phase::Enforcing)] {
            assert_eq!(
                Step::next(Mode::Enforcing, phase, Some(MINUTE), MINUTE),
                Step::Enforce
            );
        }
    }

    #[test]
    fn first_entry_starts_window() {
        assert_eq!(
            Step::next(Mode::Learning, None, None, 10 * MINUTE),
            Step::EnterLearning {
                wake_after: 10 * MINUTE
            }
        );
        assert_eq!(
            Step::next(Mode::Learning, Some(Phase::Learning), None, MINUTE),
            Step::EnterLearning { wake_after: MINUTE }
        );
    }

    #[test]
    fn switching_back_restarts_window() {
        assert_eq!(
            Step::next(
                Mode::Learning,
                Some(Phase::Enforcing),
                Some(60 * MINUTE),
                MINUTE
            ),
            Step::EnterLearning { wake_after: MINUTE }
        );
    }

    #[test]
    fn waits_for_remaining_window() {
        assert_eq!(
            Step::next(
                Mode::Learning,
                Some(Phase::Learning),
                Some(3 * MINUTE),
                10 * MINUTE
            ),
            Step::KeepLearning {
                wake_after: 7 * MINUTE
            }
        );
        assert_eq!(
            Step::next(
                Mode::Learning,
                Some(Phase::Learning),
                Some(Duration::ZERO),
                MINUTE
            ),
            Step::KeepLearning { wake_after: MINUTE }
        );
    }

    #[test]
    fn elapsed_window_begins_enforcing() {
        assert_eq!(
            Step::next(
                Mode::Learning,
                Some(Phase::Learning),
                Some(2 * MINUTE),
                MINUTE
            ),
            Step::BeginEnforcing
        );
        // Exactly at the boundary.
        assert_eq!(
            Step::next(Mode::Learning, Some(Phase::Learning), Some(MINUTE), MINUTE),
            Step::BeginEnforcing
        );
    }

    #[test]
    fn zero_duration_ends_on_next_pass() {
        assert_eq!(
            Step::next(Mode::Learning, None, None, Duration::ZERO),
            Step::EnterLearning {
                wake_after: Duration::ZERO
            }
        );
        assert_eq!(
            Step::next(
                Mode::Learning,
                Some(Phase::Learning),
                Some(Duration::ZERO),
                Duration::ZERO
            ),
            Step::BeginEnforcing
        );
    }

    #[test]
    fn parses_modes() {
        assert_eq!("learning".parse::<Mode>().unwrap(), Mode::Learning);
        assert_eq!("enforcing".parse::<Mode>().unwrap(), Mode::Enforcing);
        assert!("Learning".parse::<Mode>().is_err());
    }
}
