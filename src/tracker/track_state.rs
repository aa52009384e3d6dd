/// Track lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum TrackState {
    /// Newly spawned, not yet matched for `min_hits` consecutive frames
    #[default]
    Tentative,
    /// Stable identity, visible to targeting and renderers
    Confirmed,
    /// Dropped from the store; never comes back
    Lost,
}
