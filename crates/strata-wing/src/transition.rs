//! Manifest state transitions
//!
//! `None` is a track that has never run. Every cycle enters `converging`
//! and leaves it for `converged` or `error`. A record left in `converging`
//! by an interrupted cycle may be picked up again.

use crate::error::{Track, WingError};
use strata_api::ManifestState;

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: Option<ManifestState>) -> Vec<ManifestState> {
    use ManifestState::{Converged, Converging, Error};
    match from {
        None | Some(Converged | Error) => vec![Converging],
        Some(Converging) => vec![Converging, Converged, Error],
    }
}

/// # Errors
/// Returns `WingError::Transition` if `to` is not reachable from `from`
pub fn validate_transition(
    track: Track,
    from: Option<ManifestState>,
    to: ManifestState,
) -> Result<(), WingError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WingError::Transition { track, from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ManifestState::{Converged, Converging, Error};

    #[test]
    fn cycle_transitions() {
        assert!(validate_transition(Track::Converge, None, Converging).is_ok());
        assert!(validate_transition(Track::Converge, Some(Converging), Converged).is_ok());
        assert!(validate_transition(Track::Converge, Some(Converging), Error).is_ok());
        assert!(validate_transition(Track::Converge, Some(Error), Converging).is_ok());
        assert!(validate_transition(Track::Converge, Some(Converged), Converging).is_ok());
    }

    #[test]
    fn terminal_states_must_pass_through_converging() {
        assert!(validate_transition(Track::Converge, None, Converged).is_err());
        assert!(validate_transition(Track::DryRun, Some(Error), Converged).is_err());
        assert!(validate_transition(Track::DryRun, Some(Converged), Error).is_err());
    }

    fn state() -> impl Strategy<Value = Option<ManifestState>> {
        prop_oneof![
            Just(None),
            Just(Some(Converging)),
            Just(Some(Converged)),
            Just(Some(Error)),
        ]
    }

    proptest! {
        #[test]
        fn validation_matches_table(from in state(), to in state()) {
            if let Some(to) = to {
                let ok = validate_transition(Track::Converge, from, to).is_ok();
                prop_assert_eq!(ok, allowed_transitions(from).contains(&to));
            }
        }

        #[test]
        fn terminal_only_from_converging(from in state(), to in state()) {
            if let Some(to) = to.filter(|s| s.is_terminal()) {
                let ok = validate_transition(Track::DryRun, from, to).is_ok();
                prop_assert_eq!(ok, from == Some(Converging));
            }
        }
    }
}
