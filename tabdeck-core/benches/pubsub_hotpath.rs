use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tabdeck_core::{subscriber, PubSub, PubSubEvent};

fn bench_publish_fanout(c: &mut Criterion) {
    let hub = PubSub::<u64>::new();
    let total = Arc::new(AtomicU64::new(0));
    for _ in 0..16 {
        let total = Arc::clone(&total);
        hub.subscribe(subscriber(move |v: &u64| {
            total.fetch_add(*v, Ordering::Relaxed);
        }))
        .expect("subscribe");
    }

    c.bench_function("pubsub/publish_16_subscribers", |b| {
        b.iter(|| hub.publish(black_box(&1)));
    });
}

fn bench_subscribe_unsubscribe(c: &mut Criterion) {
    let hub = PubSub::<u64>::new();
    c.bench_function("pubsub/subscribe_unsubscribe", |b| {
        b.iter(|| {
            let sub = subscriber(|_: &u64| {});
            hub.subscribe(Arc::clone(&sub)).expect("subscribe");
            hub.unsubscribe(black_box(&sub));
        });
    });
}

criterion_group!(benches, bench_publish_fanout, bench_subscribe_unsubscribe);
criterion_main!(benches);
