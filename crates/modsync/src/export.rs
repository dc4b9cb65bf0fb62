//! Export profiles
//!
//! A profile bundles the side target and the override types admitted by
//! a side-targeted pass, so callers ask for "a server pack" instead of
//! assembling filters by hand.

use std::collections::HashSet;

use crate::data::project::ProjectSide;
use crate::overrides::OverrideType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportProfile {
    pub name: &'static str,
    pub side: ProjectSide,
    pub allowed_overrides: HashSet<OverrideType>,
}

impl ExportProfile {
    /// Server-side content only: no client overrides, no client-only
    /// projects.
    pub fn server_pack() -> Self {
        Self {
            name: "server",
            side: ProjectSide::Server,
            allowed_overrides: OverrideType::allowed_for(ProjectSide::Server),
        }
    }

    /// Client-side content only.
    pub fn client_pack() -> Self {
        Self {
            name: "client",
            side: ProjectSide::Client,
            allowed_overrides: OverrideType::allowed_for(ProjectSide::Client),
        }
    }

    /// Everything, both sides.
    pub fn full_pack() -> Self {
        Self {
            name: "full",
            side: ProjectSide::Both,
            allowed_overrides: OverrideType::allowed_for(ProjectSide::Both),
        }
    }
}

/// First-non-null-wins combinator for layered settings: later layers
/// only apply where earlier layers are silent.
pub fn first_some<T>(layers: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    layers.into_iter().flatten().next()
}
