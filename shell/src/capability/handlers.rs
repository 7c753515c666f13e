//! Capability handler implementations.
//!
//! Handlers reply to the caller over its channel (never by throwing) and
//! lean on the owning actors for all state. Argument coercion is tolerant
//! where the wire format is loose (scalar text) and strict where it is not
//! (structured records).

use serde_json::Value;

use shell_types::{Geometry, HostReply, InstalledApp};

use crate::actors::apps::{self, AppRegistryError};
use crate::actors::chrome;
use crate::actors::embed::{self, EmbedMsg};
use crate::actors::store::{self, NS_STORAGE, NS_WALLPAPER};

use super::{Capability, CapabilityContext, CapabilityError};

const WALLPAPER_KEY: &str = "current";

fn unavailable<E: std::fmt::Display>(e: E) -> CapabilityError {
    CapabilityError::Unavailable(e.to_string())
}

fn bad_args(capability: Capability, detail: impl Into<String>) -> CapabilityError {
    CapabilityError::BadArguments {
        capability: capability.wire_name(),
        detail: detail.into(),
    }
}

/// First positional argument as text. Strings pass through; other scalars
/// are rendered; missing or null is an error.
fn text_arg(capability: Capability, args: &[Value], index: usize) -> Result<String, CapabilityError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(bad_args(
            capability,
            format!("missing argument {index}"),
        )),
        Some(other) => Ok(other.to_string()),
    }
}

// ============================================================================
// Presentation
// ============================================================================

pub fn show_popup(ctx: &CapabilityContext<'_>, args: Vec<Value>) -> Result<(), CapabilityError> {
    let text = text_arg(Capability::ShowPopup, &args, 0)?;
    chrome::notify(ctx.chrome, text);
    Ok(())
}

pub fn show_notification(
    ctx: &CapabilityContext<'_>,
    args: Vec<Value>,
) -> Result<(), CapabilityError> {
    let text = text_arg(Capability::ShowNotification, &args, 0)?;
    chrome::notify(ctx.chrome, text);
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

pub async fn minimize_app(ctx: &CapabilityContext<'_>) -> Result<(), CapabilityError> {
    embed::minimize(ctx.embed).await.map_err(unavailable)?;
    Ok(())
}

pub async fn launch_app(
    ctx: &CapabilityContext<'_>,
    args: Vec<Value>,
) -> Result<(), CapabilityError> {
    let name = text_arg(Capability::LaunchApp, &args, 0)?;
    let app = apps::get(ctx.apps, name.clone())
        .await
        .map_err(unavailable)?
        .ok_or(AppRegistryError::NotInstalled(name))?;

    // The capability caller is not the guest being launched; the fresh
    // context channel, if any, belongs to the lifecycle surface and is
    // dropped here. Sends into it then no-op like any closed channel.
    embed::launch(ctx.embed, app.launch_url)
        .await
        .map_err(unavailable)??;
    Ok(())
}

// ============================================================================
// Registry (protected)
// ============================================================================

pub async fn install_app(
    ctx: &CapabilityContext<'_>,
    args: Vec<Value>,
) -> Result<(), CapabilityError> {
    let app: InstalledApp = match args.into_iter().next() {
        Some(raw) => serde_json::from_value(raw)
            .map_err(|e| bad_args(Capability::InstallApp, e.to_string()))?,
        None => return Err(bad_args(Capability::InstallApp, "missing app record")),
    };
    apps::install(ctx.apps, app).await.map_err(unavailable)??;
    Ok(())
}

pub async fn uninstall_app(
    ctx: &CapabilityContext<'_>,
    args: Vec<Value>,
) -> Result<(), CapabilityError> {
    let name = text_arg(Capability::UninstallApp, &args, 0)?;
    apps::uninstall(ctx.apps, name).await.map_err(unavailable)??;
    Ok(())
}

// ============================================================================
// Storage Accessors
// ============================================================================

pub async fn get_storage(
    ctx: &CapabilityContext<'_>,
    args: Vec<Value>,
) -> Result<(), CapabilityError> {
    let key = text_arg(Capability::GetStorage, &args, 0)?;
    let value = store::get(ctx.store, NS_STORAGE, key.clone())
        .await
        .map_err(unavailable)??;
    ctx.caller.send(HostReply::StorageValue { key, value }.to_wire());
    Ok(())
}

pub async fn set_storage(
    ctx: &CapabilityContext<'_>,
    args: Vec<Value>,
) -> Result<(), CapabilityError> {
    let key = text_arg(Capability::SetStorage, &args, 0)?;
    let value = args.get(1).cloned().unwrap_or(Value::Null);
    store::put(ctx.store, NS_STORAGE, key, value)
        .await
        .map_err(unavailable)??;
    Ok(())
}

pub async fn get_wallpaper(ctx: &CapabilityContext<'_>) -> Result<(), CapabilityError> {
    let wallpaper = store::get(ctx.store, NS_WALLPAPER, WALLPAPER_KEY)
        .await
        .map_err(unavailable)??;
    ctx.caller.send(HostReply::WallpaperState { wallpaper }.to_wire());
    Ok(())
}

pub async fn set_wallpaper(
    ctx: &CapabilityContext<'_>,
    args: Vec<Value>,
) -> Result<(), CapabilityError> {
    let wallpaper = args
        .into_iter()
        .next()
        .ok_or_else(|| bad_args(Capability::SetWallpaper, "missing wallpaper value"))?;
    store::put(ctx.store, NS_WALLPAPER, WALLPAPER_KEY, wallpaper)
        .await
        .map_err(unavailable)??;
    Ok(())
}

// ============================================================================
// Introspection
// ============================================================================

pub async fn get_diagnostics(ctx: &CapabilityContext<'_>) -> Result<(), CapabilityError> {
    let snapshot = embed::snapshot(ctx.embed).await.map_err(unavailable)?;
    let installed = apps::list(ctx.apps).await.map_err(unavailable)?;
    ctx.caller.send(
        HostReply::DiagnosticsReport {
            mounted: snapshot.mounted,
            contexts: snapshot.contexts,
            apps: installed.len(),
        }
        .to_wire(),
    );
    Ok(())
}

pub fn report_geometry(
    ctx: &CapabilityContext<'_>,
    args: Vec<Value>,
) -> Result<(), CapabilityError> {
    // Geometry is tied to the caller's own context; a channel without one
    // (e.g. a chrome page) has nothing to report against.
    let url = ctx
        .caller
        .context_url
        .clone()
        .ok_or_else(|| bad_args(Capability::ReportGeometry, "caller has no guest context"))?;
    let geometry: Geometry = match args.into_iter().next() {
        Some(raw) => serde_json::from_value(raw)
            .map_err(|e| bad_args(Capability::ReportGeometry, e.to_string()))?,
        None => return Err(bad_args(Capability::ReportGeometry, "missing geometry")),
    };
    ctx.embed
        .cast(EmbedMsg::ReportGeometry { url, geometry })
        .map_err(unavailable)?;
    Ok(())
}

pub fn ping(ctx: &CapabilityContext<'_>) -> Result<(), CapabilityError> {
    ctx.caller.send(HostReply::Pong.to_wire());
    Ok(())
}
