//! `.ktsign` and `.ktalbum` exchange between installations.

use std::fs;
use std::io::Cursor;

use keytone_sign::core::{obfuscate, KeyRing, KeySlot};
use keytone_sign::exchange::{decode_container, META_ENTRY};
use keytone_sign::{ApplyOptions, ImportMode, ImportResult, SignError};
use keytone_sign_testkit::{multi_party_fixtures, InstallationFixture};

#[test]
fn test_ktsign_conflict_then_confirm() {
    let parties = multi_party_fixtures(2);
    let (alice, other) = (&parties[0], &parties[1]);
    let plain = "shared_identity_00001";
    let exported_id = alice.create_signature_with_id(plain, "Alice (new)");
    let text = alice.kernel.export_signature(&exported_id).unwrap();
    let file = alice.path("alice.ktsign");
    fs::write(&file, &text).unwrap();

    let local_id = other.create_signature_with_id(plain, "Alice (old)");
    let text = fs::read_to_string(&file).unwrap();
    match other.kernel.import_signature(&text).unwrap() {
        ImportResult::Conflict {
            existing_encrypted_id,
            existing_name,
        } => {
            assert_eq!(existing_encrypted_id, local_id);
            assert_eq!(existing_name, "Alice (old)");
        }
        ImportResult::Imported { .. } => panic!("import must not overwrite"),
    }
    assert_eq!(
        other.kernel.decrypt_signature(&local_id).unwrap().name,
        "Alice (old)"
    );

    let id = other.kernel.confirm_import(&text, true).unwrap();
    assert_eq!(id, local_id);
    assert_eq!(other.kernel.decrypt_signature(&id).unwrap().name, "Alice (new)");
    assert_eq!(other.kernel.list_signatures().unwrap().len(), 1);
}

#[test]
fn test_ktsign_import_into_empty_installation() {
    let parties = multi_party_fixtures(2);
    let id = parties[0].create_signature("Carol");
    let text = parties[0].kernel.export_signature(&id).unwrap();
    let imported = parties[1].kernel.confirm_import(&text, false).unwrap();
    assert_eq!(
        parties[1].kernel.qualification_code_of(&imported).unwrap(),
        parties[0].kernel.qualification_code_of(&id).unwrap()
    );
}

#[test]
fn test_ktalbum_round_trip_between_installations() {
    let parties = multi_party_fixtures(2);
    let (author, receiver) = (&parties[0], &parties[1]);
    let album = author.create_album("Piano");
    let id = author.create_signature("Alice");
    author
        .kernel
        .apply_signature_to_album(&album, &id, &ApplyOptions::default())
        .unwrap();

    let file = author.path("piano.ktalbum");
    let exported = author.kernel.export_album(&album, &file).unwrap();

    let info = receiver.kernel.album_info(&file).unwrap();
    assert_eq!(info.name, "Piano");
    assert_eq!(info.album_uuid, exported.meta.album_uuid);

    let zip = receiver.kernel.extract_album_zip(&file).unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(zip)).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    assert!(names.contains(&META_ENTRY));

    let imported = receiver
        .kernel
        .import_album(&file, receiver.albums_root(), ImportMode::FailIfExists)
        .unwrap();
    assert_eq!(imported.album_id, exported.meta.album_uuid);
    let signatures = receiver.kernel.album_signature_info(&imported.album_dir).unwrap();
    assert_eq!(
        signatures.original_author.map(|(code, _)| code),
        Some(author.kernel.qualification_code_of(&id).unwrap())
    );
    let copied = fs::read(imported.album_dir.join("audioFiles").join("click.wav")).unwrap();
    assert_eq!(copied, b"RIFF....WAVE");
}

#[test]
fn test_injected_build_reads_public_containers() {
    let public = InstallationFixture::new();
    let album = public.create_album("Piano");
    let file = public.path("piano.ktalbum");
    public.kernel.export_album(&album, &file).unwrap();

    let keys = KeyRing::public_defaults()
        .with_override(KeySlot::ContainerV2, obfuscate("PrivateBuildContainerKey_V2_0001"));
    let private = InstallationFixture::with_keys(keys.clone());
    let decoded = decode_container(&fs::read(&file).unwrap(), &keys).unwrap();
    assert!(!decoded.injected_key);
    assert_eq!(private.kernel.album_info(&file).unwrap().name, "Piano");

    let album = private.create_album("Private");
    let file = private.path("private.ktalbum");
    private.kernel.export_album(&album, &file).unwrap();
    let decoded = decode_container(&fs::read(&file).unwrap(), &keys).unwrap();
    assert!(decoded.injected_key);
    assert!(matches!(
        public.kernel.album_info(&file),
        Err(SignError::InvalidFormat(_))
    ));
}

#[test]
fn test_tampered_container_rejected() {
    let fixture = InstallationFixture::new();
    let album = fixture.create_album("Piano");
    let file = fixture.path("piano.ktalbum");
    fixture.kernel.export_album(&album, &file).unwrap();

    let mut bytes = fs::read(&file).unwrap();
    bytes[60] ^= 0x01;
    fs::write(&file, &bytes).unwrap();
    assert!(matches!(
        fixture
            .kernel
            .import_album(&file, fixture.albums_root(), ImportMode::Overwrite),
        Err(SignError::InvalidFormat(_))
    ));
}
