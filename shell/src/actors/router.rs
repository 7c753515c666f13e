//! RouterActor - single choke point for every inbound channel message.
//!
//! Routing order per message: transport origin check, envelope
//! classification, then dispatch (introspection / capability call / relay).
//! Nothing on this path replies with an error: a message that fails any gate
//! is logged and dropped, and the sending guest observes silence.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde_json::Value;
use tokio::sync::mpsc;

use shell_types::{Envelope, HostReply, TrustLevel};

use crate::actors::apps::{self, AppRegistryMsg};
use crate::actors::chrome::ChromeBusMsg;
use crate::actors::embed::EmbedMsg;
use crate::actors::store::StoreMsg;
use crate::capability::{self, Capability, CapabilityContext};

// ============================================================================
// Channel Peer
// ============================================================================

/// The sending side of one guest channel, as the router sees it.
///
/// The trust token is assigned when the channel is created and never
/// re-derived per message; a guest that navigates after connect keeps the
/// trust it connected with.
#[derive(Debug, Clone)]
pub struct ChannelPeer {
    /// Transport origin the channel was opened from.
    pub origin: String,
    pub trust: TrustLevel,
    /// Set when the peer is a managed guest context; chrome pages have none.
    pub context_url: Option<String>,
    /// Host-to-guest reply channel. `None` for one-way peers.
    pub reply: Option<mpsc::UnboundedSender<Value>>,
}

impl ChannelPeer {
    /// Best-effort reply. A closed or absent channel is a no-op.
    pub fn send(&self, value: Value) {
        match &self.reply {
            Some(tx) => {
                if tx.send(value).is_err() {
                    tracing::debug!(origin = %self.origin, "Peer channel closed; reply dropped");
                }
            }
            None => {
                tracing::debug!(origin = %self.origin, "Peer has no reply channel; reply dropped");
            }
        }
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Actor that routes classified envelopes to their handlers.
#[derive(Debug, Default)]
pub struct RouterActor;

/// Arguments for spawning RouterActor.
pub struct RouterArguments {
    /// The shell's own transport origin; everything else is foreign.
    pub host_origin: String,
    pub embed: ActorRef<EmbedMsg>,
    pub apps: ActorRef<AppRegistryMsg>,
    pub store: ActorRef<StoreMsg>,
    pub chrome: ActorRef<ChromeBusMsg>,
}

pub struct RouterState {
    host_origin: String,
    embed: ActorRef<EmbedMsg>,
    apps: ActorRef<AppRegistryMsg>,
    store: ActorRef<StoreMsg>,
    chrome: ActorRef<ChromeBusMsg>,
}

#[derive(Debug)]
pub enum RouterMsg {
    /// One raw message from one peer.
    Deliver { peer: ChannelPeer, body: Value },
}

#[async_trait]
impl Actor for RouterActor {
    type Msg = RouterMsg;
    type State = RouterState;
    type Arguments = RouterArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            host_origin = %args.host_origin,
            "RouterActor starting"
        );
        Ok(RouterState {
            host_origin: args.host_origin,
            embed: args.embed,
            apps: args.apps,
            store: args.store,
            chrome: args.chrome,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            RouterMsg::Deliver { peer, body } => {
                self.route(peer, body, state).await;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Routing
// ============================================================================

impl RouterActor {
    async fn route(&self, peer: ChannelPeer, body: Value, state: &RouterState) {
        // Gate 1: transport origin. Same-origin only; foreign senders get
        // silence, not an error.
        if peer.origin != state.host_origin {
            tracing::warn!(
                origin = %peer.origin,
                expected = %state.host_origin,
                "Message from foreign origin dropped"
            );
            return;
        }

        // Gate 2: shape. Unclassifiable bodies are dropped.
        let envelope = match Envelope::classify(&body) {
            Some(envelope) => envelope,
            None => {
                tracing::warn!(origin = %peer.origin, "Unclassifiable message dropped");
                return;
            }
        };

        match envelope {
            Envelope::RequestInstalledApps => {
                self.handle_installed_apps_request(&peer, state).await;
            }
            Envelope::ApiCall {
                function_name,
                args,
            } => {
                self.handle_api_call(&peer, &function_name, args, state).await;
            }
            Envelope::Relay {
                target_app,
                payload,
            } => {
                self.handle_relay(&peer, &target_app, payload, state).await;
            }
        }
    }

    /// Fixed introspection: always answered, regardless of trust.
    async fn handle_installed_apps_request(&self, peer: &ChannelPeer, state: &RouterState) {
        match apps::list(&state.apps).await {
            Ok(installed) => {
                peer.send(HostReply::InstalledAppsList { apps: installed }.to_wire());
            }
            Err(e) => {
                tracing::warn!(error = %e, "App registry unavailable; introspection dropped");
            }
        }
    }

    async fn handle_api_call(
        &self,
        peer: &ChannelPeer,
        function_name: &str,
        args: Vec<Value>,
        state: &RouterState,
    ) {
        let capability = match Capability::resolve(function_name) {
            Some(capability) => capability,
            None => {
                tracing::warn!(
                    origin = %peer.origin,
                    function = %function_name,
                    "Unknown capability dropped"
                );
                return;
            }
        };

        // Trust gate: the token carried by the channel, not a fresh
        // derivation from whatever the guest claims now.
        if capability.is_protected() && peer.trust != TrustLevel::TrustedSystem {
            tracing::warn!(
                origin = %peer.origin,
                context_url = ?peer.context_url,
                function = %function_name,
                "Protected capability denied for untrusted caller"
            );
            return;
        }

        let ctx = CapabilityContext {
            caller: peer,
            embed: &state.embed,
            apps: &state.apps,
            store: &state.store,
            chrome: &state.chrome,
        };
        if let Err(e) = capability::invoke(capability, &ctx, args).await {
            tracing::warn!(
                origin = %peer.origin,
                function = %function_name,
                error = %e,
                "Capability call failed; dropped"
            );
        }
    }

    /// Guest-to-guest relay: resolve the target name, then forward the
    /// payload verbatim into its live context.
    async fn handle_relay(
        &self,
        peer: &ChannelPeer,
        target_app: &str,
        payload: Value,
        state: &RouterState,
    ) {
        let app = match apps::get(&state.apps, target_app).await {
            Ok(Some(app)) => app,
            Ok(None) => {
                tracing::warn!(
                    origin = %peer.origin,
                    target = %target_app,
                    "Relay to unknown app dropped"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "App registry unavailable; relay dropped");
                return;
            }
        };

        let delivered = ractor::call!(state.embed, |reply| EmbedMsg::Forward {
            url: app.launch_url.clone(),
            payload,
            reply,
        });
        match delivered {
            Ok(true) => {
                tracing::debug!(target = %target_app, "Relay forwarded");
            }
            Ok(false) => {
                // Installed but never launched: no context, nothing to tell
                // the sender.
                tracing::warn!(target = %target_app, "Relay target has no live context; dropped");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Lifecycle manager unavailable; relay dropped");
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Hand one raw peer message to the router.
pub fn deliver(
    router: &ActorRef<RouterMsg>,
    peer: ChannelPeer,
    body: Value,
) -> Result<(), ractor::RactorErr<RouterMsg>> {
    Ok(router.cast(RouterMsg::Deliver { peer, body })?)
}
