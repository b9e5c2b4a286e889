use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dodopass_vault::crypto::aead::{aead_decrypt, aead_encrypt};
use dodopass_vault::crypto::kdf::{SALT_LEN, derive_master_key, derive_sub_key};
use dodopass_vault::secret::Key32;
use std::hint::black_box;
use std::time::Duration;

fn bench_key_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_generation");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("random_key", |b| {
        b.iter(|| black_box(Key32::random()));
    });

    group.finish();
}

fn bench_master_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("master_key_derivation");
    group.measurement_time(Duration::from_secs(30)); // 600k PBKDF2 rounds is slow by design

    let salt = [7u8; SALT_LEN];
    let passwords = [
        "short",
        "medium_length_password",
        "very_long_password_that_might_be_used_by_someone",
    ];

    for password in &passwords {
        group.bench_with_input(BenchmarkId::new("pbkdf2", password.len()), password, |b, password| {
            b.iter(|| black_box(derive_master_key(password, &salt)));
        });
    }

    group.finish();
}

fn bench_sub_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sub_key_derivation");
    group.measurement_time(Duration::from_secs(10));

    let master_key = derive_master_key("pw", &[0u8; SALT_LEN]);
    group.bench_function("hkdf_expand", |b| {
        b.iter(|| black_box(derive_sub_key(&master_key, b"dodopass-vault-key")));
    });

    group.finish();
}

fn bench_aead_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("aead_operations");
    group.measurement_time(Duration::from_secs(10));

    let key = Key32::random();
    let aad = b"test associated data";

    let data_sizes = [16, 256, 1024, 8192, 65536]; // 16B to 64KB

    for &size in &data_sizes {
        let plaintext = vec![0u8; size];

        group.bench_with_input(BenchmarkId::new("encrypt", size), &plaintext, |b, plaintext| {
            b.iter(|| black_box(aead_encrypt(&key, plaintext, aad).unwrap()));
        });

        let blob = aead_encrypt(&key, &plaintext, aad).unwrap();
        group.bench_with_input(BenchmarkId::new("decrypt", size), &blob, |b, blob| {
            b.iter(|| black_box(aead_decrypt(&key, blob, aad).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_key_generation,
    bench_master_key_derivation,
    bench_sub_key_derivation,
    bench_aead_operations
);
criterion_main!(benches);
