//! End-to-end checks for the command-line tools.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use keytone_sign::core::{deobfuscate_str, obfuscate};
use keytone_sign_testkit::InstallationFixture;
use predicates::prelude::*;

fn exported_album(fx: &InstallationFixture) -> PathBuf {
    let album = fx.create_album("Night Drive");
    let dest = fx.path("night-drive.ktalbum");
    fx.kernel.export_album(&album, &dest).unwrap();
    dest
}

// ─────────────────────────────────────────────────────────────────────────────
// key-obfuscator
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_obfuscator_prints_hex_without_newline() {
    let key = "0123456789abcdef0123456789abcdef";
    let output = Command::cargo_bin("key-obfuscator")
        .unwrap()
        .args(["--key", key])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let printed = String::from_utf8(output).unwrap();
    assert_eq!(printed, obfuscate(key));
    assert!(!printed.ends_with('\n'));
    assert_eq!(deobfuscate_str(&printed), key);
}

#[test]
fn test_obfuscator_warns_on_short_key() {
    Command::cargo_bin("key-obfuscator")
        .unwrap()
        .args(["--key", "short"])
        .assert()
        .success()
        .stdout(predicate::eq(obfuscate("short")))
        .stderr(predicate::str::contains("not 32 bytes"));
}

#[test]
fn test_obfuscator_requires_key() {
    Command::cargo_bin("key-obfuscator")
        .unwrap()
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("no key given"));

    Command::cargo_bin("key-obfuscator")
        .unwrap()
        .args(["--key", ""])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// ktalbum-tools
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_info_prints_metadata() {
    let fx = InstallationFixture::new();
    let file = exported_album(&fx);

    Command::cargo_bin("ktalbum-tools")
        .unwrap()
        .arg("info")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Night Drive"))
        .stdout(predicate::str::contains("Album UUID:"))
        .stdout(predicate::str::contains("Export time:"));
}

#[test]
fn test_extract_writes_zip_payload() {
    let fx = InstallationFixture::new();
    let file = exported_album(&fx);
    let out = fx.path("payload.zip");

    Command::cargo_bin("ktalbum-tools")
        .unwrap()
        .arg("extract")
        .arg(&file)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let zip = fs::read(&out).unwrap();
    assert_eq!(&zip[..2], b"PK");
    assert_eq!(zip, fx.kernel.extract_album_zip(&file).unwrap());
}

#[test]
fn test_info_rejects_tampered_file() {
    let fx = InstallationFixture::new();
    let file = exported_album(&fx);
    let mut bytes = fs::read(&file).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&file, bytes).unwrap();

    Command::cargo_bin("ktalbum-tools")
        .unwrap()
        .arg("info")
        .arg(&file)
        .assert()
        .failure();
}

#[test]
fn test_info_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("ktalbum-tools")
        .unwrap()
        .arg("info")
        .arg(dir.path().join("absent.ktalbum"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.ktalbum"));
}
