use divan::{black_box, Bencher};
use webhook_hmac::SharedKey;

#[global_allocator]
static GLOBAL: divan::AllocProfiler = divan::AllocProfiler::system();

#[divan::bench(args = [0, 1024, 64 * 1024])]
fn sign(bencher: Bencher<'_, '_>, len: usize) {
    let key = SharedKey::from("secret");
    let body = vec![b'a'; len];

    bencher.bench(|| webhook_hmac::sign(black_box(&key), black_box(&body)));
}

#[divan::bench]
fn verify(bencher: Bencher<'_, '_>) {
    let key = SharedKey::from("secret");
    let body = br#"{"event":"document_state_changed"}"#;
    let signature = webhook_hmac::sign(&key, body);

    bencher.bench(|| {
        webhook_hmac::verify(black_box(&key), black_box(body), black_box(signature.as_str()))
    });
}

fn main() {
    divan::main();
}
