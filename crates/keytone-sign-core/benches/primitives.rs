use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keytone_sign_core::{qualification_code, KeyRing, SymmetricKey};

fn bench_aead(c: &mut Criterion) {
    let key = SymmetricKey::from_bytes([0x42; 32]);
    let payload = vec![0u8; 4096];
    c.bench_function("encrypt_4k", |b| b.iter(|| key.encrypt(black_box(&payload))));

    let blob = key.encrypt(&payload).expect("encrypt");
    c.bench_function("decrypt_4k", |b| b.iter(|| key.decrypt(black_box(&blob))));
}

fn bench_derivations(c: &mut Criterion) {
    let ring = KeyRing::public_defaults();
    let encrypted = ring
        .encrypt_identifier("V1StGXR8_Z5jdHi6B-myT")
        .expect("encrypt identifier");

    c.bench_function("dynamic_key", |b| {
        b.iter(|| ring.dynamic_key(black_box(&encrypted)))
    });
    c.bench_function("album_key", |b| b.iter(|| ring.album_key(black_box("V1StGXR8_Z5jdHi6B-myT"))));
    c.bench_function("qualification_code", |b| {
        b.iter(|| qualification_code(black_box("V1StGXR8_Z5jdHi6B-myT")).fingerprint())
    });
}

criterion_group!(benches, bench_aead, bench_derivations);
criterion_main!(benches);
