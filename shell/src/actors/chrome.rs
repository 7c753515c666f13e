//! ChromeBusActor - broadcast bus for presentational shell signals.
//!
//! Lifecycle transitions broadcast chrome visibility and background-dimming
//! signals here so purely presentational layers can react without being part
//! of the state machine. Notices (transient user-facing text) travel the same
//! way. The bus is delivery-only: no subscriber is required for the runtime
//! to make progress, and a failed delivery is logged and forgotten.

use async_trait::async_trait;
use ractor::{cast, Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::{Deserialize, Serialize};

/// Process-group prefix; each bus instance scopes its own group so parallel
/// runtimes (tests) do not cross-deliver.
const CHROME_GROUP_PREFIX: &str = "chrome.signals";

// ============================================================================
// Signals
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ChromeSignal {
    /// Transient user-facing notice (popup / notification text).
    Notice { text: String },
    /// Host chrome visibility, inverse of "is anything mounted".
    ChromeVisibility { visible: bool },
    /// Background dimming while a guest is mounted.
    Dimming { active: bool },
    /// A guest refused inline render; the attempt is redirected out-of-band.
    FallbackRedirect { url: String },
}

// ============================================================================
// Actor
// ============================================================================

#[derive(Debug)]
pub enum ChromeBusMsg {
    Publish {
        signal: ChromeSignal,
    },
    Subscribe {
        subscriber: ActorRef<ChromeSignal>,
    },
    Unsubscribe {
        subscriber: ActorRef<ChromeSignal>,
    },
    /// Subscriber count, for diagnostics.
    GetSubscriberCount {
        reply: RpcReplyPort<usize>,
    },
}

#[derive(Debug, Default)]
pub struct ChromeBusActor;

pub struct ChromeBusState {
    group: String,
}

#[async_trait]
impl Actor for ChromeBusActor {
    type Msg = ChromeBusMsg;
    type State = ChromeBusState;
    type Arguments = ();

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(actor_id = %myself.get_id(), "ChromeBusActor starting");
        Ok(ChromeBusState {
            group: format!("{CHROME_GROUP_PREFIX}.{}", myself.get_id()),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ChromeBusMsg::Publish { signal } => {
                tracing::debug!(signal = ?signal, "Broadcasting chrome signal");
                for member in ractor::pg::get_members(&state.group) {
                    let subscriber: ActorRef<ChromeSignal> = member.into();
                    if let Err(e) = cast!(subscriber, signal.clone()) {
                        tracing::warn!(error = %e, "Failed to deliver chrome signal");
                    }
                }
            }
            ChromeBusMsg::Subscribe { subscriber } => {
                ractor::pg::join(state.group.clone(), vec![subscriber.get_cell()]);
            }
            ChromeBusMsg::Unsubscribe { subscriber } => {
                ractor::pg::leave(state.group.clone(), vec![subscriber.get_cell()]);
            }
            ChromeBusMsg::GetSubscriberCount { reply } => {
                let _ = reply.send(ractor::pg::get_members(&state.group).len());
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Publish a signal; delivery is best-effort.
pub fn publish(chrome: &ActorRef<ChromeBusMsg>, signal: ChromeSignal) {
    if let Err(e) = cast!(chrome, ChromeBusMsg::Publish { signal }) {
        tracing::warn!(error = %e, "Chrome bus unavailable; signal dropped");
    }
}

/// Publish a user-facing notice.
pub fn notify(chrome: &ActorRef<ChromeBusMsg>, text: impl Into<String>) {
    publish(chrome, ChromeSignal::Notice { text: text.into() });
}

/// Convenience function to subscribe a presentational actor.
pub fn subscribe(
    chrome: &ActorRef<ChromeBusMsg>,
    subscriber: ActorRef<ChromeSignal>,
) -> Result<(), ractor::RactorErr<ChromeBusMsg>> {
    cast!(chrome, ChromeBusMsg::Subscribe { subscriber })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[derive(Debug, Default)]
    struct CollectorActor;

    #[async_trait]
    impl Actor for CollectorActor {
        type Msg = ChromeSignal;
        type State = mpsc::UnboundedSender<ChromeSignal>;
        type Arguments = mpsc::UnboundedSender<ChromeSignal>;

        async fn pre_start(
            &self,
            _myself: ActorRef<Self::Msg>,
            args: Self::Arguments,
        ) -> Result<Self::State, ActorProcessingErr> {
            Ok(args)
        }

        async fn handle(
            &self,
            _myself: ActorRef<Self::Msg>,
            message: Self::Msg,
            state: &mut Self::State,
        ) -> Result<(), ActorProcessingErr> {
            let _ = state.send(message);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let (chrome, _handle) = Actor::spawn(None, ChromeBusActor, ()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (collector, _collector_handle) = Actor::spawn(None, CollectorActor, tx).await.unwrap();

        subscribe(&chrome, collector).unwrap();
        // pg join is processed by the bus actor; give it a turn.
        tokio::task::yield_now().await;

        notify(&chrome, "hello");

        let signal = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            signal,
            ChromeSignal::Notice {
                text: "hello".to_string()
            }
        );

        chrome.stop(None);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let (chrome, _handle) = Actor::spawn(None, ChromeBusActor, ()).await.unwrap();
        publish(&chrome, ChromeSignal::Dimming { active: true });

        let count = ractor::call!(chrome, |reply| ChromeBusMsg::GetSubscriberCount { reply })
            .unwrap();
        assert_eq!(count, 0);

        chrome.stop(None);
    }
}
