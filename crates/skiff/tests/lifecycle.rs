//! Container lifecycle integration tests.
//!
//! The privileged tests at the bottom exercise the real mount, cgroup
//! and network paths. They are ignored by default: run them as root on
//! a host with the `ip`/`iptables` tools and a busybox image tarball
//! at `<root>/images/busybox.tar`.

use skiff::cgroup::ResourceConfig;
use skiff::runtime::{run, RecordStore, RunOptions, Status};
use skiff_common::{ResourceQuantity, SkiffPaths};
use tempfile::TempDir;

fn options(command: &[&str]) -> RunOptions {
    RunOptions {
        tty: false,
        command: command.iter().map(|s| (*s).to_string()).collect(),
        image: "busybox".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn run_rejects_an_empty_command() {
    let temp = TempDir::new().unwrap();
    let paths = SkiffPaths::with_root(temp.path());

    let result = run(&paths, options(&[])).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn run_rejects_a_taken_name() {
    let temp = TempDir::new().unwrap();
    let paths = SkiffPaths::with_root(temp.path());

    let record = skiff::runtime::ContainerRecord {
        pid: "100".to_string(),
        id: "1a2b3c4d5e6f".to_string(),
        name: "web".to_string(),
        command: "top".to_string(),
        created_time: "2026/08/07 12:00:00".to_string(),
        status: Status::Running,
        volume: String::new(),
        network: String::new(),
        ipaddress: String::new(),
        portmapping: Vec::new(),
    };
    RecordStore::new(&paths).save(&record).unwrap();

    let mut opts = options(&["top"]);
    opts.name = Some("web".to_string());
    let result = run(&paths, opts).await;
    assert!(result.is_err());
}

#[tokio::test]
#[ignore = "requires root and a busybox image tarball"]
async fn attached_run_cleans_up_after_exit() {
    let paths = SkiffPaths::new();

    let mut opts = options(&["echo", "hi"]);
    opts.tty = true;
    opts.name = Some("skiff-e2e-echo".to_string());
    opts.resources = ResourceConfig {
        memory: Some(ResourceQuantity::parse("100m").unwrap()),
        ..Default::default()
    };

    run(&paths, opts).await.unwrap();

    // The attached run waited for exit and tore everything down.
    assert!(!RecordStore::new(&paths).exists("skiff-e2e-echo"));
    assert!(!paths.container_merged("skiff-e2e-echo").exists());
}

#[tokio::test]
#[ignore = "requires root, a busybox image tarball and the ip/iptables tools"]
async fn connected_container_gets_an_address_in_the_subnet() {
    use std::net::Ipv4Addr;

    let paths = SkiffPaths::new();

    let mut manager = skiff_network::NetworkManager::new(&paths).unwrap();
    manager
        .create_network("bridge", "172.18.0.0/24", "skiff-e2e-net")
        .unwrap();

    let mut opts = options(&["top"]);
    opts.name = Some("skiff-e2e-netc".to_string());
    opts.network = "skiff-e2e-net".to_string();
    run(&paths, opts).await.unwrap();

    let record = RecordStore::new(&paths).load("skiff-e2e-netc").unwrap();
    let ip: Ipv4Addr = record.ipaddress.parse().unwrap();
    let subnet = manager.get("skiff-e2e-net").unwrap().ip_range;
    assert!(subnet.contains(ip));
    assert_ne!(ip, "172.18.0.1".parse::<Ipv4Addr>().unwrap());

    skiff::runtime::stop(&paths, "skiff-e2e-netc").unwrap();
    skiff::runtime::remove(&paths, "skiff-e2e-netc").unwrap();
    manager.delete_network("skiff-e2e-net").unwrap();
}
