//! Capability Registry - the named host functions guests may call.
//!
//! Each capability is a closed enum variant with a wire name and a protection
//! flag. Protected capabilities require the caller's trust token (assigned at
//! channel creation, see [`crate::origin`]) to be `TrustedSystem`; the check
//! happens in the router before dispatch ever reaches a handler.

pub mod handlers;

use once_cell::sync::Lazy;
use std::collections::HashMap;

use ractor::ActorRef;

use crate::actors::apps::{AppRegistryError, AppRegistryMsg};
use crate::actors::chrome::ChromeBusMsg;
use crate::actors::embed::{EmbedError, EmbedMsg};
use crate::actors::router::ChannelPeer;
use crate::actors::store::{StoreError, StoreMsg};

// ============================================================================
// Capability Set
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ShowPopup,
    ShowNotification,
    MinimizeApp,
    LaunchApp,
    InstallApp,
    UninstallApp,
    GetStorage,
    SetStorage,
    GetWallpaper,
    SetWallpaper,
    GetDiagnostics,
    ReportGeometry,
    Ping,
}

const ALL: &[Capability] = &[
    Capability::ShowPopup,
    Capability::ShowNotification,
    Capability::MinimizeApp,
    Capability::LaunchApp,
    Capability::InstallApp,
    Capability::UninstallApp,
    Capability::GetStorage,
    Capability::SetStorage,
    Capability::GetWallpaper,
    Capability::SetWallpaper,
    Capability::GetDiagnostics,
    Capability::ReportGeometry,
    Capability::Ping,
];

static REGISTRY: Lazy<HashMap<&'static str, Capability>> = Lazy::new(|| {
    ALL.iter().map(|cap| (cap.wire_name(), *cap)).collect()
});

impl Capability {
    /// The function name as it appears on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Capability::ShowPopup => "showPopup",
            Capability::ShowNotification => "showNotification",
            Capability::MinimizeApp => "minimizeApp",
            Capability::LaunchApp => "launchApp",
            Capability::InstallApp => "installApp",
            Capability::UninstallApp => "uninstallApp",
            Capability::GetStorage => "getStorage",
            Capability::SetStorage => "setStorage",
            Capability::GetWallpaper => "getWallpaper",
            Capability::SetWallpaper => "setWallpaper",
            Capability::GetDiagnostics => "getDiagnostics",
            Capability::ReportGeometry => "reportGeometry",
            Capability::Ping => "ping",
        }
    }

    /// Mutating system state requires a `TrustedSystem` caller.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Capability::InstallApp
                | Capability::UninstallApp
                | Capability::SetStorage
                | Capability::SetWallpaper
        )
    }

    /// Look up a wire name. Unknown names resolve to `None`; callers drop
    /// the message rather than reply with an error.
    pub fn resolve(name: &str) -> Option<Capability> {
        REGISTRY.get(name).copied()
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Everything a handler may touch: the calling peer plus the actor surface.
pub struct CapabilityContext<'a> {
    pub caller: &'a ChannelPeer,
    pub embed: &'a ActorRef<EmbedMsg>,
    pub apps: &'a ActorRef<AppRegistryMsg>,
    pub store: &'a ActorRef<StoreMsg>,
    pub chrome: &'a ActorRef<ChromeBusMsg>,
}

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Bad arguments for {capability}: {detail}")]
    BadArguments {
        capability: &'static str,
        detail: String,
    },

    #[error("Actor unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Lifecycle(#[from] EmbedError),

    #[error(transparent)]
    Registry(#[from] AppRegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Execute one capability. Handlers never reply with errors across the
/// channel boundary; a returned error is logged (and dropped) by the caller.
pub async fn invoke(
    capability: Capability,
    ctx: &CapabilityContext<'_>,
    args: Vec<serde_json::Value>,
) -> Result<(), CapabilityError> {
    match capability {
        Capability::ShowPopup => handlers::show_popup(ctx, args),
        Capability::ShowNotification => handlers::show_notification(ctx, args),
        Capability::MinimizeApp => handlers::minimize_app(ctx).await,
        Capability::LaunchApp => handlers::launch_app(ctx, args).await,
        Capability::InstallApp => handlers::install_app(ctx, args).await,
        Capability::UninstallApp => handlers::uninstall_app(ctx, args).await,
        Capability::GetStorage => handlers::get_storage(ctx, args).await,
        Capability::SetStorage => handlers::set_storage(ctx, args).await,
        Capability::GetWallpaper => handlers::get_wallpaper(ctx).await,
        Capability::SetWallpaper => handlers::set_wallpaper(ctx, args).await,
        Capability::GetDiagnostics => handlers::get_diagnostics(ctx).await,
        Capability::ReportGeometry => handlers::report_geometry(ctx, args),
        Capability::Ping => handlers::ping(ctx),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_capability_resolves_by_wire_name() {
        for cap in ALL {
            assert_eq!(Capability::resolve(cap.wire_name()), Some(*cap));
        }
    }

    #[test]
    fn test_unknown_name_does_not_resolve() {
        assert_eq!(Capability::resolve("formatDisk"), None);
        assert_eq!(Capability::resolve(""), None);
        // Wire names are case-sensitive.
        assert_eq!(Capability::resolve("showpopup"), None);
    }

    #[test]
    fn test_protection_covers_exactly_the_mutating_set() {
        let protected: Vec<_> = ALL
            .iter()
            .filter(|cap| cap.is_protected())
            .map(|cap| cap.wire_name())
            .collect();
        assert_eq!(
            protected,
            vec!["installApp", "uninstallApp", "setStorage", "setWallpaper"]
        );
    }
}
