use criterion::{criterion_group, criterion_main, Criterion};
use rtform_collab::{PatchRequest, PeerInfo, Relay, RelayConfig, RelayMessage, TextPatcher};
use rtform_core::{validate, DiffEngine, EditOperation, PrefixSuffixDiff};
use std::hint::black_box;
use uuid::Uuid;

fn document(fields: usize, suffix: &str) -> String {
    let parts: Vec<String> = (0..fields)
        .map(|i| format!("\"f{i:04}\":\"value {i}{suffix}\""))
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn bench_update_encode(c: &mut Criterion) {
    let msg = RelayMessage::Update {
        channel: Uuid::new_v4().simple().to_string(),
        author: Uuid::new_v4(),
        version: 1,
        document: document(50, ""),
    };

    c.bench_function("update_encode_50_fields", |b| {
        b.iter(|| black_box(msg.encode().unwrap()))
    });

    let encoded = msg.encode().unwrap();
    c.bench_function("update_decode_50_fields", |b| {
        b.iter(|| black_box(RelayMessage::decode(black_box(&encoded)).unwrap()))
    });
}

fn bench_snapshot_diff(c: &mut Criterion) {
    let before = document(200, "");
    let after = before.replacen("value 100", "value 100 edited", 1);

    c.bench_function("diff_200_field_snapshot", |b| {
        b.iter(|| black_box(PrefixSuffixDiff.diff(black_box(&before), black_box(&after))))
    });
}

fn bench_patcher_merge(c: &mut Criterion) {
    let base = document(200, "");
    let local = base.replacen("value 10\"", "value 10 mine\"", 1);
    let remote = base.replacen("value 190", "value 190 theirs", 1);

    c.bench_function("patcher_merge_remote_over_local", |b| {
        b.iter(|| {
            let mut patcher = TextPatcher::new(base.clone(), 0, validate);
            patcher.local(&local);
            black_box(patcher.remote(black_box(&remote), 1));
        })
    });
}

fn bench_relay_submit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("relay_submit_10_peers", |b| {
        b.iter(|| {
            rt.block_on(async {
                let relay = Relay::new(RelayConfig::default());
                let author = PeerInfo::new("author");
                let joined = relay.join(author.clone(), "", "{\"a\":\"\"}").await.unwrap();
                let mut receivers = vec![joined.receiver];
                for i in 0..9 {
                    let peer = PeerInfo::new(format!("Peer{i}"));
                    receivers.push(relay.join(peer, &joined.channel, "{}").await.unwrap().receiver);
                }

                for v in 0..10u64 {
                    let request = PatchRequest {
                        peer_id: author.peer_id,
                        base_version: v,
                        op: EditOperation::new(6, 0, "x"),
                    };
                    black_box(relay.submit(&joined.channel, request).await.unwrap());
                }
                black_box(receivers.len());
            });
        })
    });
}

criterion_group!(
    benches,
    bench_update_encode,
    bench_snapshot_diff,
    bench_patcher_merge,
    bench_relay_submit,
);
criterion_main!(benches);
