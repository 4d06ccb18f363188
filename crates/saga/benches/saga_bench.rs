use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use saga::{
    ActivityOptions, RetryingGateway, SimulatedActivities, SimulatedDelays, TransferOrchestrator,
    TransferRequest,
};

fn bench_successful_transfer(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let gateway = RetryingGateway::new(
        SimulatedActivities::with_delays(SimulatedDelays::none()),
        ActivityOptions::default(),
    );
    let orchestrator = TransferOrchestrator::new(Arc::new(gateway));

    c.bench_function("saga/successful_transfer", |b| {
        b.iter(|| {
            rt.block_on(async {
                let run = orchestrator
                    .run(TransferRequest::new("A1", "B1", 100))
                    .await;
                assert!(run.outcome.is_success());
            });
        });
    });
}

criterion_group!(benches, bench_successful_transfer);
criterion_main!(benches);
