use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde_json::json;
use tokio::sync::mpsc;

use shell::actors::chrome::{self, ChromeSignal};
use shell::actors::{apps, embed};
use shell::config::ShellConfig;
use shell::runtime::ShellRuntime;
use shell_types::InstalledApp;

const HOST: &str = "https://gurasuraisu.github.io";
const GUEST_SOURCE: &str = "https://gurasuraisu.github.io/music/index.html";

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

fn music() -> InstalledApp {
    InstalledApp {
        name: "Music".to_string(),
        launch_url: "/music/index.html".to_string(),
        icon_url: "/music/icon.png".to_string(),
    }
}

#[tokio::test]
async fn test_unknown_capability_is_dropped_without_reply() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");
    let mut channel = runtime.connect_guest(HOST, Some(GUEST_SOURCE));

    runtime
        .deliver(
            channel.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "formatDisk",
                "args": [],
            }),
        )
        .expect("deliver");

    // No error reply, no reply at all.
    let silence =
        tokio::time::timeout(std::time::Duration::from_millis(200), channel.inbox.recv()).await;
    assert!(silence.is_err(), "unknown capability must get silence");

    // The runtime is still alive and routing afterwards.
    runtime
        .deliver(
            channel.peer.clone(),
            json!({"action": "requestInstalledApps"}),
        )
        .expect("deliver introspection");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), channel.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("type"), Some(&json!("installed-apps-list")));

    runtime.shutdown();
}

#[tokio::test]
async fn test_foreign_origin_is_dropped() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");
    let mut channel = runtime.connect_guest("https://evil.example", Some(GUEST_SOURCE));

    runtime
        .deliver(
            channel.peer.clone(),
            json!({"action": "requestInstalledApps"}),
        )
        .expect("deliver");

    let silence =
        tokio::time::timeout(std::time::Duration::from_millis(200), channel.inbox.recv()).await;
    assert!(silence.is_err(), "foreign-origin sender must get silence");

    runtime.shutdown();
}

#[tokio::test]
async fn test_show_popup_executes_for_untrusted_caller() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (collector, _collector_handle) = Actor::spawn(None, CollectorActor, tx)
        .await
        .expect("spawn collector");
    chrome::subscribe(&runtime.chrome, collector).expect("subscribe");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let channel = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(
            channel.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "showPopup",
                "args": ["hello"],
            }),
        )
        .expect("deliver");

    let signal = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .expect("signal in time")
        .expect("signal present");
    assert_eq!(
        signal,
        ChromeSignal::Notice {
            text: "hello".to_string()
        }
    );

    runtime.shutdown();
}

#[tokio::test]
async fn test_introspection_succeeds_regardless_of_trust() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    // Even a channel whose source was unreadable at connect time.
    let mut channel = runtime.connect_guest(HOST, None);
    runtime
        .deliver(
            channel.peer.clone(),
            json!({"action": "requestInstalledApps"}),
        )
        .expect("deliver");

    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), channel.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("type"), Some(&json!("installed-apps-list")));
    let names: Vec<&str> = reply["apps"]
        .as_array()
        .expect("apps array")
        .iter()
        .map(|app| app["name"].as_str().expect("name"))
        .collect();
    assert!(names.contains(&"App Store"));
    assert!(names.contains(&"Terminal"));

    runtime.shutdown();
}

#[tokio::test]
async fn test_relay_without_live_context_is_dropped() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");
    apps::install(&runtime.apps, music())
        .await
        .expect("install rpc")
        .expect("install");

    let mut channel = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(
            channel.peer.clone(),
            json!({"targetApp": "Music", "note": "anyone home?"}),
        )
        .expect("deliver");

    // Installed but never launched: silently dropped for the sender.
    let silence =
        tokio::time::timeout(std::time::Duration::from_millis(200), channel.inbox.recv()).await;
    assert!(silence.is_err());

    runtime.shutdown();
}

#[tokio::test]
async fn test_relay_reaches_live_context_verbatim() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");
    apps::install(&runtime.apps, music())
        .await
        .expect("install rpc")
        .expect("install");

    let outcome = embed::launch(&runtime.embed, "/music/index.html")
        .await
        .expect("launch rpc")
        .expect("launch");
    let mut guest_inbox = outcome.channel.expect("fresh context channel");

    let sender = runtime.connect_guest(HOST, Some("https://gurasuraisu.github.io/clock/index.html"));
    runtime
        .deliver(
            sender.peer.clone(),
            json!({"targetApp": "Music", "command": "play", "track": 7}),
        )
        .expect("deliver");

    let payload = tokio::time::timeout(std::time::Duration::from_secs(1), guest_inbox.recv())
        .await
        .expect("payload in time")
        .expect("payload present");
    // Forwarded verbatim, minus the routing key.
    assert_eq!(payload.get("command"), Some(&json!("play")));
    assert_eq!(payload.get("track"), Some(&json!(7)));
    assert!(payload.get("targetApp").is_none());

    runtime.shutdown();
}

#[tokio::test]
async fn test_relay_to_unknown_app_is_dropped() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    let mut channel = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(
            channel.peer.clone(),
            json!({"targetApp": "NoSuchApp", "note": "hi"}),
        )
        .expect("deliver");

    let silence =
        tokio::time::timeout(std::time::Duration::from_millis(200), channel.inbox.recv()).await;
    assert!(silence.is_err());

    runtime.shutdown();
}

#[tokio::test]
async fn test_show_notification_surfaces_a_notice() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (collector, _collector_handle) = Actor::spawn(None, CollectorActor, tx)
        .await
        .expect("spawn collector");
    chrome::subscribe(&runtime.chrome, collector).expect("subscribe");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let channel = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(
            channel.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "showNotification",
                "args": ["update ready"],
            }),
        )
        .expect("deliver");

    let signal = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .expect("signal in time")
        .expect("signal present");
    assert_eq!(
        signal,
        ChromeSignal::Notice {
            text: "update ready".to_string()
        }
    );

    runtime.shutdown();
}

#[tokio::test]
async fn test_launch_and_minimize_capabilities_flip_the_mounted_slot() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");
    apps::install(&runtime.apps, music())
        .await
        .expect("install rpc")
        .expect("install");

    let channel = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(
            channel.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "launchApp",
                "args": ["Music"],
            }),
        )
        .expect("deliver");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(
        embed::get_mounted(&runtime.embed).await.expect("mounted"),
        Some("/music/index.html".to_string())
    );

    runtime
        .deliver(
            channel.peer.clone(),
            json!({"action": "callGurasuraisuFunc", "functionName": "minimizeApp"}),
        )
        .expect("deliver");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(embed::get_mounted(&runtime.embed).await.expect("mounted"), None);

    runtime.shutdown();
}

#[tokio::test]
async fn test_get_diagnostics_reports_runtime_state() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");
    apps::install(&runtime.apps, music())
        .await
        .expect("install rpc")
        .expect("install");
    embed::launch(&runtime.embed, "/music/index.html")
        .await
        .expect("launch rpc")
        .expect("launch");

    let mut channel = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(
            channel.peer.clone(),
            json!({"action": "callGurasuraisuFunc", "functionName": "getDiagnostics"}),
        )
        .expect("deliver");

    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), channel.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("type"), Some(&json!("diagnostics-report")));
    assert_eq!(reply.get("mounted"), Some(&json!("/music/index.html")));
    assert_eq!(reply.get("contexts"), Some(&json!(1)));
    // Two built-ins plus Music.
    assert_eq!(reply.get("apps"), Some(&json!(3)));

    runtime.shutdown();
}

#[tokio::test]
async fn test_ping_round_trip() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");
    let mut channel = runtime.connect_guest(HOST, Some(GUEST_SOURCE));

    runtime
        .deliver(
            channel.peer.clone(),
            json!({"action": "callGurasuraisuFunc", "functionName": "ping"}),
        )
        .expect("deliver");

    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), channel.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("type"), Some(&json!("pong")));

    runtime.shutdown();
}
