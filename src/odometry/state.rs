//! Integrator state machine.

/// Phase of the pose integrator.
///
/// `Uninitialized` → `Tracking` on the first frame after (re)creation of the
/// frame processor; back to `Uninitialized` on a numerical fault or an
/// explicit reinit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegratorPhase {
    /// No frame processor; the next frame creates one and sets the anchor.
    #[default]
    Uninitialized,
    /// Frame processor live, anchor fixed.
    Tracking,
}

/// How the anchor is chosen when the integrator next leaves `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorMode {
    /// Snapshot the current base → sensor extrinsics (pose restarts at
    /// identity).
    #[default]
    ColdStart,
    /// Anchor already set from the last good pose after a numerical fault;
    /// keep it.
    Resume,
}
