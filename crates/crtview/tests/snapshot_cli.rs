use std::fs;
use std::process::Command;

use tempfile::TempDir;

#[test]
fn snapshot_cli_writes_png_at_upscaled_size() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("shots/frame.png");

    let status = Command::new(env!("CARGO_BIN_EXE_crtview"))
        .env("RUST_LOG", "warn")
        .args(["--preset", "crt", "--field-size", "32x16", "--frames", "6"])
        .arg("--snapshot")
        .arg(&output)
        .status()
        .expect("failed to run crtview --snapshot");

    assert!(status.success());
    let image = image::open(&output).unwrap();
    assert_eq!((image.width(), image.height()), (64, 64));
}

#[test]
fn snapshot_cli_applies_profile() {
    let root = TempDir::new().unwrap();
    let profile = root.path().join("monitor.toml");
    let output = root.path().join("frame.png");
    fs::write(
        &profile,
        r#"
version = 1
preset = "tft"

[effects]
flicker = false
"#,
    )
    .unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_crtview"))
        .env("RUST_LOG", "warn")
        .arg("--profile")
        .arg(&profile)
        .args(["--pattern", "bars", "--field-size", "16x4", "--frames", "2"])
        .arg("--snapshot")
        .arg(&output)
        .status()
        .expect("failed to run crtview with a profile");

    assert!(status.success());
    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.get_pixel(0, 0).0, [235, 235, 235, 255]);
}

#[test]
fn invalid_profile_fails() {
    let root = TempDir::new().unwrap();
    let profile = root.path().join("monitor.toml");
    fs::write(&profile, "version = 1\n[effects]\nbloom_weight = 4000\n").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_crtview"))
        .env("RUST_LOG", "off")
        .arg("--profile")
        .arg(&profile)
        .arg("--snapshot")
        .arg(root.path().join("never.png"))
        .status()
        .expect("failed to run crtview");

    assert!(!status.success());
    assert!(!root.path().join("never.png").exists());
}

#[test]
fn overflowing_field_size_fails() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("frame.png");

    let status = Command::new(env!("CARGO_BIN_EXE_crtview"))
        .env("RUST_LOG", "off")
        .args(["--field-size", "4294967295x2", "--frames", "1"])
        .arg("--snapshot")
        .arg(&output)
        .status()
        .expect("failed to run crtview");

    assert!(!status.success());
    assert!(!output.exists());
}
