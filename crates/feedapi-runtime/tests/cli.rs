use std::process::Command;

fn feedapi() -> Command {
    Command::new(env!("CARGO_BIN_EXE_feedapi"))
}

#[test]
fn help_lists_subcommands() {
    let output = feedapi().arg("--help").output().unwrap();
    assert!(output.status.success());
    let help = String::from_utf8(output.stdout).unwrap();
    for sub in ["serve", "discover", "fetch", "follow"] {
        assert!(help.contains(sub), "missing {sub} in:\n{help}");
    }
}

#[test]
fn fetch_requires_partition() {
    let output = feedapi().arg("fetch").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("--partition"), "{stderr}");
}

#[test]
fn unreachable_feed_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let output = feedapi()
        .args(["follow", "--feed", &format!("http://{addr}/testfeed")])
        .arg("--checkpoint-file")
        .arg(dir.path().join("cp.json"))
        .env("FEEDAPI_LOG", "off")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
