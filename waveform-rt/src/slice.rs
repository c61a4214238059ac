// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Slice activation state machine (`spec` §4.6, component C6): a waveform
activates when a `slice <n> mode=<m>` status names its short mode, and
deactivates when a later status for the same slice names a different
mode. Interlock status drives PTT/unkey state events.
*/

/// A waveform's activation state on the radio (`spec` §3).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum SliceState {
    /// Not bound to any slice.
    #[default]
    Inactive,
    /// Bound to the given slice index.
    Active(u8),
}

/// The effect a `slice <n> mode=<m>` status has on a waveform currently
/// in `current`, given the waveform's own `short_name` (`spec` §4.6).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SliceTransition {
    /// No state change.
    None,
    /// Transition to `Active(slice)` and start the data plane.
    Activate(u8),
    /// Transition to `Inactive` and tear down the data plane.
    Deactivate,
}

/// Computes the transition a `slice <n> mode=<m>` status causes for a
/// waveform with short name `short_name` currently in `current`.
pub fn on_slice_status(current: SliceState, short_name: &str, slice: u8, mode: &str) -> SliceTransition {
    match current {
        SliceState::Inactive if mode == short_name => SliceTransition::Activate(slice),
        SliceState::Active(active_slice) if active_slice == slice && mode != short_name => {
            SliceTransition::Deactivate
        }
        // Second activation attempt on an already-active waveform, or a
        // status for a slice this waveform doesn't own, is a no-op
        // (`spec` §3 invariant, §8 property 8).
        _ => SliceTransition::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_waveform_activates_on_matching_mode() {
        assert_eq!(
            on_slice_status(SliceState::Inactive, "JUNK", 1, "JUNK"),
            SliceTransition::Activate(1)
        );
    }

    #[test]
    fn inactive_waveform_ignores_non_matching_mode() {
        assert_eq!(
            on_slice_status(SliceState::Inactive, "JUNK", 1, "USB"),
            SliceTransition::None
        );
    }

    #[test]
    fn active_waveform_deactivates_on_mode_change() {
        assert_eq!(
            on_slice_status(SliceState::Active(1), "JUNK", 1, "USB"),
            SliceTransition::Deactivate
        );
    }

    #[test]
    fn second_activation_while_active_is_a_no_op() {
        // Same slice, same mode: nothing changes (property 8).
        assert_eq!(
            on_slice_status(SliceState::Active(1), "JUNK", 1, "JUNK"),
            SliceTransition::None
        );
    }

    #[test]
    fn status_for_a_different_slice_is_ignored() {
        assert_eq!(
            on_slice_status(SliceState::Active(1), "JUNK", 2, "USB"),
            SliceTransition::None
        );
    }
}
