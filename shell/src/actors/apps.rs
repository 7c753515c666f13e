//! AppRegistryActor - name -> {launchUrl, iconRef} store.
//!
//! Persisted entries are merged with the built-ins at startup; built-ins win
//! for their own names and refuse uninstall. Install triggers a detached
//! cache-priming task whose failure surfaces only as a notice - the registry
//! state change itself is synchronous.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::collections::{HashMap, HashSet};

use shell_types::InstalledApp;

use crate::actors::chrome::{self, ChromeBusMsg};
use crate::actors::embed::EmbedMsg;
use crate::actors::store::{StoreError, StoreMsg, NS_APPS, NS_CACHE};

/// Actor that owns the installed-app table.
#[derive(Debug, Default)]
pub struct AppRegistryActor;

/// Arguments for spawning AppRegistryActor.
pub struct AppRegistryArguments {
    pub store: ActorRef<StoreMsg>,
    pub chrome: ActorRef<ChromeBusMsg>,
    pub builtins: Vec<InstalledApp>,
}

pub struct AppRegistryState {
    apps: HashMap<String, InstalledApp>,
    /// Built-in names that refuse uninstall.
    protected: HashSet<String>,
    store: ActorRef<StoreMsg>,
    chrome: ActorRef<ChromeBusMsg>,
    /// Set after spawn; the lifecycle manager and the registry reference each
    /// other, so one side binds late.
    embed: Option<ActorRef<EmbedMsg>>,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub enum AppRegistryMsg {
    Install {
        app: InstalledApp,
        reply: RpcReplyPort<Result<(), AppRegistryError>>,
    },
    Uninstall {
        name: String,
        reply: RpcReplyPort<Result<(), AppRegistryError>>,
    },
    List {
        reply: RpcReplyPort<Vec<InstalledApp>>,
    },
    Get {
        name: String,
        reply: RpcReplyPort<Option<InstalledApp>>,
    },
    /// Reverse lookup used by launch and relay resolution.
    FindByUrl {
        url: String,
        reply: RpcReplyPort<Option<InstalledApp>>,
    },
    /// Late-bind the lifecycle manager reference.
    SetEmbed { embed: ActorRef<EmbedMsg> },
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum AppRegistryError {
    #[error("{0} is already installed")]
    DuplicateInstall(String),

    #[error("{0} is a built-in app and cannot be removed")]
    ProtectedUninstall(String),

    #[error("{0} is not installed")]
    NotInstalled(String),
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for AppRegistryActor {
    type Msg = AppRegistryMsg;
    type State = AppRegistryState;
    type Arguments = AppRegistryArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(actor_id = %myself.get_id(), "AppRegistryActor starting");

        let mut apps: HashMap<String, InstalledApp> = HashMap::new();

        // Load persisted entries first, then let built-ins claim their names.
        let persisted: Result<Result<Vec<(String, serde_json::Value)>, StoreError>, _> =
            ractor::call!(args.store, |reply| StoreMsg::GetNamespace {
                namespace: NS_APPS.to_string(),
                reply,
            });
        match persisted {
            Ok(Ok(rows)) => {
                for (name, raw) in rows {
                    match serde_json::from_value::<InstalledApp>(raw) {
                        Ok(app) => {
                            apps.insert(name, app);
                        }
                        Err(e) => {
                            tracing::warn!(name = %name, error = %e, "Skipping corrupt registry row");
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Could not load persisted apps; starting with built-ins only");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Store unavailable; starting with built-ins only");
            }
        }

        let mut protected = HashSet::new();
        for app in args.builtins {
            protected.insert(app.name.clone());
            apps.insert(app.name.clone(), app);
        }

        tracing::info!(apps = apps.len(), "App registry loaded");

        Ok(AppRegistryState {
            apps,
            protected,
            store: args.store,
            chrome: args.chrome,
            embed: None,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            AppRegistryMsg::Install { app, reply } => {
                let result = self.handle_install(app, state).await;
                let _ = reply.send(result);
            }
            AppRegistryMsg::Uninstall { name, reply } => {
                let result = self.handle_uninstall(name, state).await;
                let _ = reply.send(result);
            }
            AppRegistryMsg::List { reply } => {
                let mut apps: Vec<_> = state.apps.values().cloned().collect();
                apps.sort_by(|a, b| a.name.cmp(&b.name));
                let _ = reply.send(apps);
            }
            AppRegistryMsg::Get { name, reply } => {
                let _ = reply.send(state.apps.get(&name).cloned());
            }
            AppRegistryMsg::FindByUrl { url, reply } => {
                let app = state
                    .apps
                    .values()
                    .find(|app| app.launch_url == url)
                    .cloned();
                let _ = reply.send(app);
            }
            AppRegistryMsg::SetEmbed { embed } => {
                state.embed = Some(embed);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl AppRegistryActor {
    async fn handle_install(
        &self,
        app: InstalledApp,
        state: &mut AppRegistryState,
    ) -> Result<(), AppRegistryError> {
        if state.apps.contains_key(&app.name) {
            chrome::notify(&state.chrome, format!("{} is already installed", app.name));
            return Err(AppRegistryError::DuplicateInstall(app.name));
        }

        let name = app.name.clone();
        state.apps.insert(name.clone(), app.clone());

        // Persistence failures are absorbed: the in-memory registry stays
        // authoritative for this session.
        match serde_json::to_value(&app) {
            Ok(raw) => {
                let persisted = ractor::call!(state.store, |reply| StoreMsg::Put {
                    namespace: NS_APPS.to_string(),
                    key: name.clone(),
                    value: raw,
                    reply,
                });
                if let Ok(Err(e)) = persisted {
                    tracing::warn!(name = %name, error = %e, "Failed to persist app entry");
                } else if let Err(e) = persisted {
                    tracing::warn!(name = %name, error = %e, "Store unavailable while persisting app entry");
                }
            }
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Failed to serialize app entry");
            }
        }

        chrome::notify(&state.chrome, format!("Installing {name}..."));
        tracing::info!(name = %name, url = %app.launch_url, "App installed");

        // Fire-and-forget cache priming. Not part of the state transition;
        // failure is reported through the notice channel only.
        let store = state.store.clone();
        let chrome_bus = state.chrome.clone();
        tokio::spawn(async move {
            let cached = ractor::call!(store, |reply| StoreMsg::Put {
                namespace: NS_CACHE.to_string(),
                key: app.name.clone(),
                value: serde_json::json!({
                    "url": app.launch_url,
                    "iconUrl": app.icon_url,
                    "primed_at": chrono::Utc::now().to_rfc3339(),
                }),
                reply,
            });
            match cached {
                Ok(Ok(())) => {
                    tracing::debug!(name = %app.name, "App cache primed");
                }
                Ok(Err(e)) => {
                    tracing::warn!(name = %app.name, error = %e, "App cache priming failed");
                    chrome::notify(&chrome_bus, format!("Could not cache {} for offline use", app.name));
                }
                Err(e) => {
                    tracing::warn!(name = %app.name, error = %e, "Store unavailable during cache priming");
                }
            }
        });

        Ok(())
    }

    async fn handle_uninstall(
        &self,
        name: String,
        state: &mut AppRegistryState,
    ) -> Result<(), AppRegistryError> {
        if state.protected.contains(&name) {
            chrome::notify(
                &state.chrome,
                format!("{name} is a built-in app and cannot be removed"),
            );
            return Err(AppRegistryError::ProtectedUninstall(name));
        }

        let app = match state.apps.remove(&name) {
            Some(app) => app,
            None => {
                chrome::notify(&state.chrome, format!("{name} is not installed"));
                return Err(AppRegistryError::NotInstalled(name));
            }
        };

        // Companion purge: persisted row, cached assets, live context.
        for namespace in [NS_APPS, NS_CACHE] {
            let deleted = ractor::call!(state.store, |reply| StoreMsg::Delete {
                namespace: namespace.to_string(),
                key: name.clone(),
                reply,
            });
            if let Ok(Err(e)) = deleted {
                tracing::warn!(name = %name, namespace, error = %e, "Purge failed");
            } else if let Err(e) = deleted {
                tracing::warn!(name = %name, namespace, error = %e, "Store unavailable during purge");
            }
        }

        if let Some(embed) = &state.embed {
            if let Err(e) = embed.cast(EmbedMsg::Remove {
                url: app.launch_url.clone(),
            }) {
                tracing::warn!(name = %name, error = %e, "Could not destroy guest context");
            }
        }

        chrome::notify(&state.chrome, format!("{name} removed"));
        tracing::info!(name = %name, url = %app.launch_url, "App uninstalled");
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convenience function to install an app.
pub async fn install(
    apps: &ActorRef<AppRegistryMsg>,
    app: InstalledApp,
) -> Result<Result<(), AppRegistryError>, ractor::RactorErr<AppRegistryMsg>> {
    ractor::call!(apps, |reply| AppRegistryMsg::Install { app, reply })
}

/// Convenience function to uninstall an app.
pub async fn uninstall(
    apps: &ActorRef<AppRegistryMsg>,
    name: impl Into<String>,
) -> Result<Result<(), AppRegistryError>, ractor::RactorErr<AppRegistryMsg>> {
    ractor::call!(apps, |reply| AppRegistryMsg::Uninstall {
        name: name.into(),
        reply,
    })
}

/// Convenience function to list installed apps.
pub async fn list(
    apps: &ActorRef<AppRegistryMsg>,
) -> Result<Vec<InstalledApp>, ractor::RactorErr<AppRegistryMsg>> {
    ractor::call!(apps, |reply| AppRegistryMsg::List { reply })
}

/// Convenience function to look up one app by name.
pub async fn get(
    apps: &ActorRef<AppRegistryMsg>,
    name: impl Into<String>,
) -> Result<Option<InstalledApp>, ractor::RactorErr<AppRegistryMsg>> {
    ractor::call!(apps, |reply| AppRegistryMsg::Get {
        name: name.into(),
        reply,
    })
}

// ============================================================================
// Tests
// ============================================================================
