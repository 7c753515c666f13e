use serde_json::json;

use shell::config::ShellConfig;
use shell::runtime::ShellRuntime;

const HOST: &str = "https://gurasuraisu.github.io";
const TRUSTED_SOURCE: &str = "https://gurasuraisu.github.io/appstore/index.html";
const GUEST_SOURCE: &str = "https://gurasuraisu.github.io/music/index.html";

fn set_wallpaper_call() -> serde_json::Value {
    json!({
        "action": "callGurasuraisuFunc",
        "functionName": "setWallpaper",
        "args": [{"ref": "sunset.png"}],
    })
}

fn get_wallpaper_call() -> serde_json::Value {
    json!({"action": "callGurasuraisuFunc", "functionName": "getWallpaper"})
}

#[tokio::test]
async fn test_protected_call_denied_for_guest_but_honored_for_trusted() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    // Identical payload from a guest channel: denied, state untouched.
    let mut guest = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(guest.peer.clone(), set_wallpaper_call())
        .expect("deliver");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    runtime
        .deliver(guest.peer.clone(), get_wallpaper_call())
        .expect("deliver");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), guest.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("type"), Some(&json!("wallpaper-state")));
    assert_eq!(reply.get("wallpaper"), Some(&json!(null)));

    // Same payload from an allow-listed channel: honored.
    let trusted = runtime.connect_guest(HOST, Some(TRUSTED_SOURCE));
    runtime
        .deliver(trusted.peer.clone(), set_wallpaper_call())
        .expect("deliver");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    runtime
        .deliver(guest.peer.clone(), get_wallpaper_call())
        .expect("deliver");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), guest.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("wallpaper"), Some(&json!({"ref": "sunset.png"})));

    runtime.shutdown();
}

#[tokio::test]
async fn test_sub_path_source_does_not_gain_trust() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    // Trusted path with anything appended is not a suffix match.
    for source in [
        "https://gurasuraisu.github.io/appstore/index.html?next=x",
        "https://evil.example/appstore/index.html/phish",
    ] {
        let channel = runtime.connect_guest(HOST, Some(source));
        runtime
            .deliver(channel.peer.clone(), set_wallpaper_call())
            .expect("deliver");
    }
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let mut probe = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(probe.peer.clone(), get_wallpaper_call())
        .expect("deliver");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), probe.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("wallpaper"), Some(&json!(null)));

    runtime.shutdown();
}

#[tokio::test]
async fn test_untrusted_install_leaves_no_registry_entry() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    let mut guest = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(
            guest.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "installApp",
                "args": [{"name": "Sneaky", "url": "/sneaky/index.html", "iconUrl": "/sneaky/icon.png"}],
            }),
        )
        .expect("deliver");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    runtime
        .deliver(
            guest.peer.clone(),
            json!({"action": "requestInstalledApps"}),
        )
        .expect("deliver");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), guest.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    let names: Vec<&str> = reply["apps"]
        .as_array()
        .expect("apps array")
        .iter()
        .map(|app| app["name"].as_str().expect("name"))
        .collect();
    assert!(!names.contains(&"Sneaky"));

    runtime.shutdown();
}

#[tokio::test]
async fn test_trusted_install_takes_effect() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    let mut trusted = runtime.connect_guest(HOST, Some(TRUSTED_SOURCE));
    runtime
        .deliver(
            trusted.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "installApp",
                "args": [{"name": "Music", "url": "/music/index.html", "iconUrl": "/music/icon.png"}],
            }),
        )
        .expect("deliver");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    runtime
        .deliver(
            trusted.peer.clone(),
            json!({"action": "requestInstalledApps"}),
        )
        .expect("deliver");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), trusted.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    let names: Vec<&str> = reply["apps"]
        .as_array()
        .expect("apps array")
        .iter()
        .map(|app| app["name"].as_str().expect("name"))
        .collect();
    assert!(names.contains(&"Music"));

    runtime.shutdown();
}

#[tokio::test]
async fn test_storage_read_open_but_write_protected() {
    let runtime = ShellRuntime::start(ShellConfig::default())
        .await
        .expect("start runtime");

    let trusted = runtime.connect_guest(HOST, Some(TRUSTED_SOURCE));
    runtime
        .deliver(
            trusted.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "setStorage",
                "args": ["theme", "dark"],
            }),
        )
        .expect("deliver");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // Guest may read...
    let mut guest = runtime.connect_guest(HOST, Some(GUEST_SOURCE));
    runtime
        .deliver(
            guest.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "getStorage",
                "args": ["theme"],
            }),
        )
        .expect("deliver");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), guest.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("type"), Some(&json!("storage-value")));
    assert_eq!(reply.get("value"), Some(&json!("dark")));

    // ...but not write.
    runtime
        .deliver(
            guest.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "setStorage",
                "args": ["theme", "light"],
            }),
        )
        .expect("deliver");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    runtime
        .deliver(
            guest.peer.clone(),
            json!({
                "action": "callGurasuraisuFunc",
                "functionName": "getStorage",
                "args": ["theme"],
            }),
        )
        .expect("deliver");
    let reply = tokio::time::timeout(std::time::Duration::from_secs(1), guest.inbox.recv())
        .await
        .expect("reply in time")
        .expect("reply present");
    assert_eq!(reply.get("value"), Some(&json!("dark")));

    runtime.shutdown();
}
