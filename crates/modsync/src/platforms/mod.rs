//! Platform registry
//!
//! The registry order is significant: it is the priority order used
//! whenever several platforms could serve the same project.

use std::sync::Arc;

use once_cell::sync::Lazy;

pub mod curseforge;
pub mod modrinth;
pub mod multiplatform;
pub mod provider;

pub use curseforge::CurseForge;
pub use modrinth::Modrinth;
pub use multiplatform::Multiplatform;
pub use provider::Provider;

static PROVIDERS: Lazy<Vec<Arc<dyn Provider>>> =
    Lazy::new(|| vec![Arc::new(CurseForge), Arc::new(Modrinth)]);

/// All registered platforms, in priority order.
pub fn providers() -> &'static [Arc<dyn Provider>] {
    &PROVIDERS
}

/// Look a provider up by its serial name, as stored in lock files.
pub fn get_provider(serial_name: &str) -> Option<Arc<dyn Provider>> {
    if serial_name == "multiplatform" {
        return Some(Arc::new(Multiplatform::of_registry()));
    }
    providers()
        .iter()
        .find(|p| p.serial_name() == serial_name)
        .cloned()
}
