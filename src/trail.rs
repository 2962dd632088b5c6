use crate::version::Version;

/// The upgrade candidates sitting above a baseline on the index:
/// the first strictly-greater version, the latest, and the "trail"
/// version halfway between them in the full ascending version list.
///
/// The trail is a graduated upgrade — far enough to clear stale
/// dependents, short of the bleeding edge. It is a heuristic, not a
/// compatibility proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailVersions {
    pub first: Version,
    pub latest: Version,
    pub trail: Version,
}

/// `available` must be ascending (the index contract). Returns `None`
/// when nothing is strictly greater than `baseline` — the caller's
/// termination signal.
pub fn select(available: &[Version], baseline: &Version) -> Option<TrailVersions> {
    let first_idx = available.iter().position(|v| v > baseline)?;
    let latest_idx = available.len() - 1;
    let trail_idx = (first_idx + latest_idx) / 2;
    Some(TrailVersions {
        first: available[first_idx].clone(),
        latest: available[latest_idx].clone(),
        trail: available[trail_idx].clone(),
    })
}
