//! Shared types between the host shell and guest apps
//!
//! Everything in this crate crosses the host/guest channel boundary, so it is
//! restricted to portable structured values: serde-serializable records with
//! no handles, actor refs, or platform types.

use serde::{Deserialize, Serialize};

// ============================================================================
// Wire Constants
// ============================================================================

/// Key carrying the implicit discriminant of an inbound record.
pub const ACTION_KEY: &str = "action";

/// Action value for a host-function invocation.
pub const ACTION_CALL_FUNC: &str = "callGurasuraisuFunc";

/// Action value for the fixed installed-apps introspection request.
pub const ACTION_REQUEST_INSTALLED_APPS: &str = "requestInstalledApps";

/// Key whose presence marks an envelope as a guest-to-guest relay.
pub const TARGET_APP_KEY: &str = "targetApp";

const FUNCTION_NAME_KEY: &str = "functionName";
const ARGS_KEY: &str = "args";

// ============================================================================
// Trust
// ============================================================================

/// Trust token assigned once when a channel or guest context is created.
///
/// Protected capabilities require `TrustedSystem`; everything else runs as
/// `Guest`. An unreadable source fails closed to `Guest`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    TrustedSystem,
    Guest,
}

// ============================================================================
// Guest Context
// ============================================================================

/// Visibility states of a guest context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuestVisibility {
    Mounted,
    Minimized,
}

/// Last known geometry of a guest context's frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

// ============================================================================
// App Registry
// ============================================================================

/// One installed app: unique name plus where to load it from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledApp {
    pub name: String,
    #[serde(rename = "url")]
    pub launch_url: String,
    #[serde(rename = "iconUrl")]
    pub icon_url: String,
}

// ============================================================================
// Inbound Envelopes
// ============================================================================

/// Classified inbound envelope.
///
/// The wire shape is a flat record with an implicit discriminant: presence of
/// `targetApp` always wins over any `action` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `{action:"callGurasuraisuFunc", functionName, args:[...]}`
    ApiCall {
        function_name: String,
        args: Vec<serde_json::Value>,
    },
    /// `{targetApp, ...payload}` — forwarded verbatim (minus `targetApp`).
    Relay {
        target_app: String,
        payload: serde_json::Value,
    },
    /// `{action:"requestInstalledApps"}` — always honored.
    RequestInstalledApps,
}

impl Envelope {
    /// Classify a raw channel value. Returns `None` for anything that is not
    /// one of the known shapes; callers drop unclassifiable bodies.
    pub fn classify(body: &serde_json::Value) -> Option<Envelope> {
        let obj = body.as_object()?;

        if let Some(target) = obj.get(TARGET_APP_KEY).and_then(|v| v.as_str()) {
            let mut payload = obj.clone();
            payload.remove(TARGET_APP_KEY);
            return Some(Envelope::Relay {
                target_app: target.to_string(),
                payload: serde_json::Value::Object(payload),
            });
        }

        match obj.get(ACTION_KEY).and_then(|v| v.as_str()) {
            Some(ACTION_CALL_FUNC) => {
                let function_name = obj.get(FUNCTION_NAME_KEY)?.as_str()?.to_string();
                let args = match obj.get(ARGS_KEY) {
                    Some(serde_json::Value::Array(items)) => items.clone(),
                    Some(serde_json::Value::Null) | None => Vec::new(),
                    // A bare scalar/object argument is coerced to a one-element list.
                    Some(other) => vec![other.clone()],
                };
                Some(Envelope::ApiCall {
                    function_name,
                    args,
                })
            }
            Some(ACTION_REQUEST_INSTALLED_APPS) => Some(Envelope::RequestInstalledApps),
            _ => None,
        }
    }
}

// ============================================================================
// Host Replies
// ============================================================================

/// Every host→guest reply shape under one tagged union.
///
/// Each variant serializes to its flat wire record, e.g.
/// `{type:"installed-apps-list", apps:[...]}`. Handlers address their own
/// replies; there is no request/response correlation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostReply {
    InstalledAppsList {
        apps: Vec<InstalledApp>,
    },
    StorageValue {
        key: String,
        value: Option<serde_json::Value>,
    },
    WallpaperState {
        wallpaper: Option<serde_json::Value>,
    },
    DiagnosticsReport {
        mounted: Option<String>,
        contexts: usize,
        apps: usize,
    },
    /// Host asking a guest to report its current geometry.
    GeometryRequest,
    Pong,
}

impl HostReply {
    /// Serialize for the channel. These variants contain only plain data, so
    /// serialization cannot fail in practice; a failure degrades to `Null`
    /// rather than crossing the boundary as an error.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// Tests
// ============================================================================
