//! EmbedActor - guest context lifecycle (launch / minimize / restore).
//!
//! Owns every GuestContext and the single "currently mounted" slot. States
//! per application url: ABSENT -> MOUNTED -> MINIMIZED -> MOUNTED -> ... ->
//! ABSENT (destroyed only on explicit app removal). Because this is one actor
//! processing one message at a time, the one-MOUNTED invariant holds across a
//! whole turn: launching B while A is mounted minimizes A and mounts B inside
//! a single `handle` call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use shell_types::{Geometry, GuestVisibility, HostReply};

use crate::actors::apps::AppRegistryMsg;
use crate::actors::chrome::{self, ChromeBusMsg, ChromeSignal};

/// Budget for a guest to answer a host-side geometry request. The only
/// completion signal is another inbound message, so the host self-times-out.
const GEOMETRY_REPLY_TIMEOUT: Duration = Duration::from_secs(3);

/// Actor that manages guest context state.
#[derive(Debug, Default)]
pub struct EmbedActor;

/// Arguments for spawning EmbedActor.
pub struct EmbedArguments {
    pub embedding_enabled: bool,
    pub apps: ActorRef<AppRegistryMsg>,
    pub chrome: ActorRef<ChromeBusMsg>,
}

/// One isolated guest execution context, keyed by url. Trust lives on the
/// channel peer, not here: capability gating consults the token assigned at
/// connect time.
struct GuestContext {
    id: String,
    url: String,
    visibility: GuestVisibility,
    last_geometry: Geometry,
    outbound: mpsc::UnboundedSender<serde_json::Value>,
    created_at: DateTime<Utc>,
}

pub struct EmbedState {
    embedding_enabled: bool,
    apps: ActorRef<AppRegistryMsg>,
    chrome: ActorRef<ChromeBusMsg>,
    contexts: HashMap<String, GuestContext>,
    mounted: Option<String>,
    /// How many contexts were ever created per url. Restoring a minimized
    /// context must not bump this.
    creation_counts: HashMap<String, u32>,
    /// Outstanding geometry requests, keyed by url -> request seq.
    pending_geometry: HashMap<String, u64>,
    geometry_seq: u64,
}

// ============================================================================
// Messages
// ============================================================================

/// Result of a launch: the context identity plus, for a fresh mount, the
/// guest-side end of its message channel.
#[derive(Debug)]
pub struct LaunchOutcome {
    pub context_id: String,
    /// True when an existing minimized context was restored in place.
    pub restored: bool,
    pub channel: Option<mpsc::UnboundedReceiver<serde_json::Value>>,
}

/// Introspection view of one context.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextInfo {
    pub id: String,
    pub url: String,
    pub visibility: GuestVisibility,
    pub last_geometry: Geometry,
    pub creation_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Diagnostic snapshot of the lifecycle manager.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedSnapshot {
    pub mounted: Option<String>,
    pub contexts: usize,
}

#[derive(Debug)]
pub enum EmbedMsg {
    /// Launch (or restore) the app at `url`.
    Launch {
        url: String,
        reply: RpcReplyPort<Result<LaunchOutcome, EmbedError>>,
    },
    /// Minimize the single mounted context, if any. Replies with its url.
    Minimize {
        reply: RpcReplyPort<Option<String>>,
    },
    /// Forward a relay payload verbatim to the context for `url`.
    /// Replies false when no such context exists.
    Forward {
        url: String,
        payload: serde_json::Value,
        reply: RpcReplyPort<bool>,
    },
    /// A guest refused to render inline; degrade, do not crash.
    ReportLoadFailure { url: String },
    /// Guest answering a geometry request (or volunteering geometry).
    ReportGeometry { url: String, geometry: Geometry },
    /// Internal watchdog: geometry request `seq` for `url` got no answer.
    GeometryTimedOut { url: String, seq: u64 },
    /// Destroy the context for `url` (explicit app removal).
    Remove { url: String },
    GetContext {
        url: String,
        reply: RpcReplyPort<Option<ContextInfo>>,
    },
    GetMounted {
        reply: RpcReplyPort<Option<String>>,
    },
    Snapshot {
        reply: RpcReplyPort<EmbedSnapshot>,
    },
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum EmbedError {
    #[error("App embedding is disabled")]
    EmbeddingDisabled,

    #[error("Not an installed app: {0}")]
    UnknownApp(String),

    #[error("App registry unavailable: {0}")]
    Registry(String),
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for EmbedActor {
    type Msg = EmbedMsg;
    type State = EmbedState;
    type Arguments = EmbedArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            embedding_enabled = args.embedding_enabled,
            "EmbedActor starting"
        );

        Ok(EmbedState {
            embedding_enabled: args.embedding_enabled,
            apps: args.apps,
            chrome: args.chrome,
            contexts: HashMap::new(),
            mounted: None,
            creation_counts: HashMap::new(),
            pending_geometry: HashMap::new(),
            geometry_seq: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            EmbedMsg::Launch { url, reply } => {
                let result = self.handle_launch(&myself, url, state).await;
                let _ = reply.send(result);
            }
            EmbedMsg::Minimize { reply } => {
                let result = self.handle_minimize(&myself, state);
                let _ = reply.send(result);
            }
            EmbedMsg::Forward {
                url,
                payload,
                reply,
            } => {
                let _ = reply.send(self.handle_forward(&url, payload, state));
            }
            EmbedMsg::ReportLoadFailure { url } => {
                self.handle_load_failure(&url, state);
            }
            EmbedMsg::ReportGeometry { url, geometry } => {
                if let Some(ctx) = state.contexts.get_mut(&url) {
                    ctx.last_geometry = geometry;
                    state.pending_geometry.remove(&url);
                } else {
                    tracing::debug!(url = %url, "Geometry report for unknown context ignored");
                }
            }
            EmbedMsg::GeometryTimedOut { url, seq } => {
                if state.pending_geometry.get(&url) == Some(&seq) {
                    state.pending_geometry.remove(&url);
                    tracing::debug!(
                        url = %url,
                        "No geometry report within budget; keeping last known geometry"
                    );
                }
            }
            EmbedMsg::Remove { url } => {
                self.handle_remove(&url, state);
            }
            EmbedMsg::GetContext { url, reply } => {
                let info = state.contexts.get(&url).map(|ctx| ContextInfo {
                    id: ctx.id.clone(),
                    url: ctx.url.clone(),
                    visibility: ctx.visibility,
                    last_geometry: ctx.last_geometry,
                    creation_count: state.creation_counts.get(&url).copied().unwrap_or(0),
                    created_at: ctx.created_at,
                });
                let _ = reply.send(info);
            }
            EmbedMsg::GetMounted { reply } => {
                let _ = reply.send(state.mounted.clone());
            }
            EmbedMsg::Snapshot { reply } => {
                let _ = reply.send(EmbedSnapshot {
                    mounted: state.mounted.clone(),
                    contexts: state.contexts.len(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl EmbedActor {
    /// Broadcast the presentational side effects of the current slot state:
    /// chrome visibility is the inverse of "anything mounted", dimming tracks
    /// it directly. Called once per transition turn, after state settles.
    fn broadcast_slot_signals(&self, state: &EmbedState) {
        let mounted = state.mounted.is_some();
        chrome::publish(
            &state.chrome,
            ChromeSignal::ChromeVisibility { visible: !mounted },
        );
        chrome::publish(&state.chrome, ChromeSignal::Dimming { active: mounted });
    }

    /// Move the currently mounted context (if any) to MINIMIZED and start the
    /// geometry capture watchdog. Does not broadcast; callers do that once
    /// their whole transition has settled.
    fn minimize_mounted(&self, myself: &ActorRef<EmbedMsg>, state: &mut EmbedState) -> Option<String> {
        let url = state.mounted.take()?;
        if let Some(ctx) = state.contexts.get_mut(&url) {
            ctx.visibility = GuestVisibility::Minimized;

            // Ask the guest for its final geometry; answer arrives, if ever,
            // as an independent inbound message.
            if ctx.outbound.send(HostReply::GeometryRequest.to_wire()).is_err() {
                tracing::debug!(url = %url, "Guest channel closed; geometry request dropped");
            } else {
                state.geometry_seq += 1;
                let seq = state.geometry_seq;
                state.pending_geometry.insert(url.clone(), seq);
                let watchdog = myself.clone();
                let watchdog_url = url.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(GEOMETRY_REPLY_TIMEOUT).await;
                    let _ = watchdog.cast(EmbedMsg::GeometryTimedOut {
                        url: watchdog_url,
                        seq,
                    });
                });
            }
            tracing::info!(url = %url, "Guest context minimized");
        }
        Some(url)
    }

    async fn handle_launch(
        &self,
        myself: &ActorRef<EmbedMsg>,
        url: String,
        state: &mut EmbedState,
    ) -> Result<LaunchOutcome, EmbedError> {
        if !state.embedding_enabled {
            chrome::notify(&state.chrome, "App embedding is disabled");
            return Err(EmbedError::EmbeddingDisabled);
        }

        // Only known installed apps may be embedded.
        let app = ractor::call!(state.apps, |reply| AppRegistryMsg::FindByUrl {
            url: url.clone(),
            reply,
        })
        .map_err(|e| EmbedError::Registry(e.to_string()))?;
        if app.is_none() {
            chrome::notify(&state.chrome, format!("{url} is not an installed app"));
            return Err(EmbedError::UnknownApp(url));
        }

        // One-MOUNTED invariant: park whatever currently holds the slot
        // before the new mount, inside this same turn.
        if state.mounted.as_deref() == Some(url.as_str()) {
            // Already mounted; nothing to do.
            if let Some(ctx) = state.contexts.get(&url) {
                return Ok(LaunchOutcome {
                    context_id: ctx.id.clone(),
                    restored: true,
                    channel: None,
                });
            }
        }
        // Same MOUNTED→MINIMIZED transition as an explicit minimize, geometry
        // capture included.
        if state.mounted.is_some() {
            self.minimize_mounted(myself, state);
        }

        let outcome = if let Some(ctx) = state.contexts.get_mut(&url) {
            // Restore in place: same context, internal guest state preserved.
            ctx.visibility = GuestVisibility::Mounted;
            tracing::info!(url = %url, context_id = %ctx.id, "Guest context restored");
            LaunchOutcome {
                context_id: ctx.id.clone(),
                restored: true,
                channel: None,
            }
        } else {
            let (outbound, inbox) = mpsc::unbounded_channel();
            let ctx = GuestContext {
                id: ulid::Ulid::new().to_string(),
                url: url.clone(),
                visibility: GuestVisibility::Mounted,
                last_geometry: Geometry::default(),
                outbound,
                created_at: Utc::now(),
            };
            tracing::info!(url = %url, context_id = %ctx.id, "Guest context created");
            let outcome = LaunchOutcome {
                context_id: ctx.id.clone(),
                restored: false,
                channel: Some(inbox),
            };
            state.contexts.insert(url.clone(), ctx);
            *state.creation_counts.entry(url.clone()).or_insert(0) += 1;
            outcome
        };

        state.mounted = Some(url);
        self.broadcast_slot_signals(state);
        Ok(outcome)
    }

    fn handle_minimize(
        &self,
        myself: &ActorRef<EmbedMsg>,
        state: &mut EmbedState,
    ) -> Option<String> {
        let minimized = self.minimize_mounted(myself, state)?;
        self.broadcast_slot_signals(state);
        Some(minimized)
    }

    fn handle_forward(
        &self,
        url: &str,
        payload: serde_json::Value,
        state: &EmbedState,
    ) -> bool {
        match state.contexts.get(url) {
            Some(ctx) => {
                // Send against a closed channel is a no-op by design.
                if ctx.outbound.send(payload).is_err() {
                    tracing::debug!(url = %url, "Guest channel closed; relay dropped");
                }
                true
            }
            None => false,
        }
    }

    fn handle_load_failure(&self, url: &str, state: &EmbedState) {
        if state.contexts.contains_key(url) {
            // Degraded terminal outcome for this attempt; the context
            // registration is unaffected.
            tracing::warn!(url = %url, "Guest refused inline render; redirecting out-of-band");
            chrome::publish(
                &state.chrome,
                ChromeSignal::FallbackRedirect {
                    url: url.to_string(),
                },
            );
        } else {
            tracing::debug!(url = %url, "Load failure report for unknown context ignored");
        }
    }

    fn handle_remove(&self, url: &str, state: &mut EmbedState) {
        if state.contexts.remove(url).is_none() {
            return;
        }
        state.pending_geometry.remove(url);
        if state.mounted.as_deref() == Some(url) {
            state.mounted = None;
            self.broadcast_slot_signals(state);
        }
        tracing::info!(url = %url, "Guest context destroyed");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convenience function to launch (or restore) an app.
pub async fn launch(
    embed: &ActorRef<EmbedMsg>,
    url: impl Into<String>,
) -> Result<Result<LaunchOutcome, EmbedError>, ractor::RactorErr<EmbedMsg>> {
    ractor::call!(embed, |reply| EmbedMsg::Launch {
        url: url.into(),
        reply,
    })
}

/// Convenience function to minimize the mounted context.
pub async fn minimize(
    embed: &ActorRef<EmbedMsg>,
) -> Result<Option<String>, ractor::RactorErr<EmbedMsg>> {
    ractor::call!(embed, |reply| EmbedMsg::Minimize { reply })
}

/// Convenience function to inspect one context.
pub async fn get_context(
    embed: &ActorRef<EmbedMsg>,
    url: impl Into<String>,
) -> Result<Option<ContextInfo>, ractor::RactorErr<EmbedMsg>> {
    ractor::call!(embed, |reply| EmbedMsg::GetContext {
        url: url.into(),
        reply,
    })
}

/// Convenience function to read the mounted slot.
pub async fn get_mounted(
    embed: &ActorRef<EmbedMsg>,
) -> Result<Option<String>, ractor::RactorErr<EmbedMsg>> {
    ractor::call!(embed, |reply| EmbedMsg::GetMounted { reply })
}

/// Convenience function to snapshot the lifecycle manager.
pub async fn snapshot(
    embed: &ActorRef<EmbedMsg>,
) -> Result<EmbedSnapshot, ractor::RactorErr<EmbedMsg>> {
    ractor::call!(embed, |reply| EmbedMsg::Snapshot { reply })
}

// ============================================================================
// Tests
// ============================================================================
