use assert_cmd::prelude::*;
use color_eyre::Result;
use std::process::Command;

#[test]
fn test_link_local_output() -> Result<()> {
    let output = Command::cargo_bin("ipconfd")?
        .args(["link-local", "02:42:ac:11:00:02"])
        .output()?;

    assert!(
        output.status.success(),
        "ipconfd link-local failed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "169.254.221.229/16");

    Ok(())
}

#[test]
fn test_link_local_rejects_garbage() -> Result<()> {
    let output = Command::cargo_bin("ipconfd")?
        .args(["link-local", "not-a-mac"])
        .output()?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a hardware address"));

    Ok(())
}

#[test]
fn test_help_lists_subcommands() -> Result<()> {
    let output = Command::cargo_bin("ipconfd")?.arg("--help").output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: ipconfd [OPTIONS] [COMMAND]"), "Missing usage text");
    assert!(stdout.contains("run"), "Missing run command");
    assert!(stdout.contains("dhcp"), "Missing dhcp command");
    assert!(stdout.contains("link-local"), "Missing link-local command");

    Ok(())
}

#[test]
fn test_run_with_invalid_config_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ipconfd.yaml");
    std::fs::write(&path, "interface: ''\n")?;

    let output = Command::cargo_bin("ipconfd")?
        .arg("run")
        .arg("--config")
        .arg(&path)
        .output()?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("interface must not be empty"));

    Ok(())
}
