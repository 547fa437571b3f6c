use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use recourse::{
    muffle, notify, raise_error, signal, suppress_messages, CallingHandlers, Condition,
    MemoryEmitter, TryCatch,
};

fn nested_calling(depth: usize, body: &mut dyn FnMut()) {
    if depth == 0 {
        return body();
    }
    CallingHandlers::new()
        .on("unrelated", |_| {})
        .run(|| nested_calling(depth - 1, body))
}

fn bench_signal_through_scopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_through_scopes");
    for depth in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let cnd = Condition::custom(["progress"], "tick").finish();
            nested_calling(depth, &mut || b.iter(|| black_box(signal(&cnd))));
        });
    }
    group.finish();
}

fn bench_exiting_catch(c: &mut Criterion) {
    c.bench_function("exiting_catch", |b| {
        b.iter(|| {
            TryCatch::new()
                .on("error", |cnd| cnd.text().len())
                .run(|| raise_error(black_box("boom")))
        })
    });
}

fn bench_muffled_message(c: &mut Criterion) {
    recourse::set_emitter(MemoryEmitter::new());
    c.bench_function("muffled_message", |b| {
        b.iter(|| suppress_messages(|| notify(black_box("quiet"))))
    });
    c.bench_function("muffle_in_handler", |b| {
        b.iter(|| {
            CallingHandlers::new()
                .on("message", |cnd| {
                    let _ = muffle(cnd);
                })
                .run(|| notify(black_box("quiet")))
        })
    });
}

criterion_group!(
    benches,
    bench_signal_through_scopes,
    bench_exiting_catch,
    bench_muffled_message
);
criterion_main!(benches);
