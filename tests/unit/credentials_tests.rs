//! Unit tests for the on-disk credential store.
//!
//! The authenticity predicate is the load-bearing piece: material on disk
//! is necessary but not sufficient — the identity must be populated.

use std::fs;

use chatwarden::persistence::creds::{CredentialMaterial, CredentialStore};

fn store() -> (CredentialStore, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(tmp.path().join("sessions"));
    store.ensure_root().expect("session root");
    (store, tmp)
}

#[test]
fn absent_session_has_no_valid_credentials() {
    let (store, _tmp) = store();
    assert!(!store.exists("s1"));
    assert!(!store.has_valid("s1"));
    assert!(store.load("s1").expect("load").is_none());
}

#[test]
fn provisioned_material_is_present_but_not_valid() {
    let (store, _tmp) = store();
    store
        .store("s1", &CredentialMaterial::provisioned())
        .expect("store");
    assert!(store.exists("s1"));
    assert!(!store.has_valid("s1"), "identity-less material must not authenticate");
}

#[test]
fn paired_material_is_valid_and_round_trips() {
    let (store, _tmp) = store();
    store
        .store("s1", &CredentialMaterial::paired("5551234".into()))
        .expect("store");
    assert!(store.has_valid("s1"));
    let material = store.load("s1").expect("load").expect("present");
    assert_eq!(material.identity.as_deref(), Some("5551234"));
}

#[test]
fn malformed_material_is_treated_as_unauthenticated() {
    let (store, _tmp) = store();
    store.ensure_session_dir("s1").expect("session dir");
    fs::write(store.session_dir("s1").join("creds.json"), "{not json").expect("write");
    assert!(store.exists("s1"));
    assert!(store.load("s1").expect("malformed load must not fail").is_none());
    assert!(!store.has_valid("s1"));
}

#[test]
fn wipe_removes_the_session_directory_and_is_idempotent() {
    let (store, _tmp) = store();
    store
        .store("s1", &CredentialMaterial::paired("5551234".into()))
        .expect("store");
    store.wipe("s1").expect("wipe");
    assert!(!store.exists("s1"));
    assert!(!store.session_dir("s1").exists());
    // Wiping an absent session is a no-op.
    store.wipe("s1").expect("idempotent wipe");
}

#[test]
fn candidates_require_a_credential_file() {
    let (store, _tmp) = store();
    store
        .store("alpha", &CredentialMaterial::paired("111".into()))
        .expect("store");
    store
        .store("beta", &CredentialMaterial::provisioned())
        .expect("store");
    // A bare directory without creds.json is not a candidate.
    store.ensure_session_dir("empty").expect("dir");
    // A stray file directly under the root is skipped too.
    fs::write(store.root().join("README"), "not a session").expect("write");

    let candidates = store.list_candidates().expect("list");
    assert_eq!(candidates, vec!["alpha".to_owned(), "beta".to_owned()]);
}

#[test]
fn listing_a_missing_root_yields_nothing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(tmp.path().join("never-created"));
    assert_eq!(store.list_candidates().expect("list"), Vec::<String>::new());
}
