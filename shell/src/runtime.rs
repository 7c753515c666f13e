//! ShellRuntime - spawn order, wiring, and the channel-facing surface.
//!
//! Spawn order matters: store first (everything persists through it), then
//! the chrome bus, the app registry, the lifecycle manager, and finally the
//! router. The registry and the lifecycle manager reference each other, so
//! the registry gets its embed ref rebound right after the embed spawn.

use ractor::{Actor, ActorRef};
use tokio::sync::mpsc;

use crate::actors::apps::{AppRegistryActor, AppRegistryArguments, AppRegistryMsg};
use crate::actors::chrome::{ChromeBusActor, ChromeBusMsg};
use crate::actors::embed::{EmbedActor, EmbedArguments, EmbedMsg};
use crate::actors::router::{self, ChannelPeer, RouterActor, RouterArguments, RouterMsg};
use crate::actors::store::{StoreActor, StoreArguments, StoreMsg};
use crate::config::ShellConfig;
use crate::origin::OriginValidator;

/// One connected guest: its peer identity plus the host-to-guest inbox.
pub struct GuestChannel {
    pub peer: ChannelPeer,
    pub inbox: mpsc::UnboundedReceiver<serde_json::Value>,
}

/// The running shell: all actors spawned and wired.
pub struct ShellRuntime {
    pub config: ShellConfig,
    validator: OriginValidator,
    pub store: ActorRef<StoreMsg>,
    pub chrome: ActorRef<ChromeBusMsg>,
    pub apps: ActorRef<AppRegistryMsg>,
    pub embed: ActorRef<EmbedMsg>,
    pub router: ActorRef<RouterMsg>,
}

impl ShellRuntime {
    pub async fn start(config: ShellConfig) -> anyhow::Result<Self> {
        tracing::info!(host_origin = %config.host_origin, "Starting shell runtime");

        let validator = OriginValidator::new(config.trusted_suffixes.clone());

        let store_args = match &config.store_path {
            Some(path) => StoreArguments::File(path.clone()),
            None => StoreArguments::InMemory,
        };
        let (store, _store_handle) = Actor::spawn(None, StoreActor, store_args).await?;

        let (chrome, _chrome_handle) = Actor::spawn(None, ChromeBusActor, ()).await?;

        let (apps, _apps_handle) = Actor::spawn(
            None,
            AppRegistryActor,
            AppRegistryArguments {
                store: store.clone(),
                chrome: chrome.clone(),
                builtins: ShellConfig::builtin_apps(),
            },
        )
        .await?;

        let (embed, _embed_handle) = Actor::spawn(
            None,
            EmbedActor,
            EmbedArguments {
                embedding_enabled: config.embedding_enabled,
                apps: apps.clone(),
                chrome: chrome.clone(),
            },
        )
        .await?;
        apps.cast(AppRegistryMsg::SetEmbed {
            embed: embed.clone(),
        })
        .map_err(|e| anyhow::anyhow!("Failed to wire app registry to lifecycle manager: {e}"))?;

        let (router, _router_handle) = Actor::spawn(
            None,
            RouterActor,
            RouterArguments {
                host_origin: config.host_origin.clone(),
                embed: embed.clone(),
                apps: apps.clone(),
                store: store.clone(),
                chrome: chrome.clone(),
            },
        )
        .await?;

        tracing::info!("Shell runtime started");

        Ok(Self {
            config,
            validator,
            store,
            chrome,
            apps,
            embed,
            router,
        })
    }

    /// Open a channel for a peer. The trust token is classified here, once,
    /// from the source the peer presented at connect time.
    pub fn connect_guest(&self, origin: impl Into<String>, source: Option<&str>) -> GuestChannel {
        let (reply, inbox) = mpsc::unbounded_channel();
        let origin = origin.into();
        let trust = self.validator.classify(source);
        tracing::info!(origin = %origin, source = ?source, trust = ?trust, "Guest channel opened");

        GuestChannel {
            peer: ChannelPeer {
                origin,
                trust,
                context_url: source.map(ToString::to_string),
                reply: Some(reply),
            },
            inbox,
        }
    }

    /// Hand one raw message to the router.
    pub fn deliver(
        &self,
        peer: ChannelPeer,
        body: serde_json::Value,
    ) -> Result<(), ractor::RactorErr<RouterMsg>> {
        router::deliver(&self.router, peer, body)
    }

    /// Stop every actor, router first so no new work reaches the rest.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down shell runtime");
        self.router.stop(None);
        self.embed.stop(None);
        self.apps.stop(None);
        self.chrome.stop(None);
        self.store.stop(None);
    }
}
