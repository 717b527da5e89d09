use std::sync::Arc;

use centralino::{
    AdapterResponse, BudgetScope, Centralino, CentralinoError, CostEstimate, EnforcementMode,
    EstimateSource, QueryFilter, RecordKind, TimeWindow, TokenUsage,
};
use centralino_mock::{MockAdapter, RecordingSink};
use rust_decimal::Decimal;

use crate::helpers;

/// Adapter whose every request estimates and bills a flat 0.30.
fn flat_cost_adapter() -> MockAdapter {
    MockAdapter::new("p1")
        .with_estimate_fn(|_| {
            Ok(CostEstimate {
                amount: Decimal::new(30, 2),
                adapter_amount: Decimal::new(30, 2),
                input_tokens: 10,
                output_tokens: 20,
                source: EstimateSource::Adapter,
            })
        })
        .with_execute_fn(|intent| {
            Ok(AdapterResponse {
                content: "ok".to_string(),
                model: intent.model.clone(),
                usage: TokenUsage {
                    input: 10,
                    output: 20,
                },
                cost: Some(Decimal::new(30, 2)),
            })
        })
}

async fn router_with_daily_budget() -> (Centralino, Arc<MockAdapter>, Arc<RecordingSink>) {
    let adapter = Arc::new(flat_cost_adapter());
    let sink = Arc::new(RecordingSink::new());
    let router = Centralino::builder()
        .with_adapter(adapter.clone())
        .event_sink(sink.clone())
        .with_budget(
            BudgetScope::Global,
            Decimal::new(50, 2),
            TimeWindow::Daily,
            EnforcementMode::Hard,
        )
        .build()
        .unwrap();
    helpers::register(&router, "k1", "p1", &[]).await;
    (router, adapter, sink)
}

#[tokio::test]
async fn hard_budget_blocks_the_second_request() {
    let (router, adapter, _sink) = router_with_daily_budget().await;

    // First request fits: 0.30 of 0.50.
    let receipt = router.route(&helpers::intent("p1")).await.unwrap();
    assert_eq!(receipt.cost, Decimal::new(30, 2));
    let budgets = router.budgets();
    assert_eq!(budgets[0].spent, Decimal::new(30, 2));

    // Second request would hit 0.60: blocked before any dispatch.
    let err = router.route(&helpers::intent("p1")).await.unwrap_err();
    assert!(
        matches!(err, CentralinoError::BudgetExceeded { .. }),
        "expected BudgetExceeded, got {err:?}"
    );
    assert_eq!(adapter.calls().len(), 1, "no adapter call for the blocked route");

    // No transition was recorded; the credential is healthy, just broke.
    let transitions = router
        .query(&QueryFilter::new(RecordKind::Transition))
        .await
        .unwrap();
    assert!(transitions.is_empty());
    assert_eq!(router.budgets()[0].spent, Decimal::new(30, 2));
}

#[tokio::test]
async fn soft_budget_flags_but_allows() {
    let adapter = Arc::new(flat_cost_adapter());
    let sink = Arc::new(RecordingSink::new());
    let router = Centralino::builder()
        .with_adapter(adapter)
        .event_sink(sink.clone())
        .with_budget(
            BudgetScope::Global,
            Decimal::new(50, 2),
            TimeWindow::Daily,
            EnforcementMode::Soft,
        )
        .build()
        .unwrap();
    helpers::register(&router, "k1", "p1", &[]).await;

    // Both requests are allowed under soft enforcement; the breach emits
    // an event instead of blocking.
    router.route(&helpers::intent("p1")).await.unwrap();
    router.route(&helpers::intent("p1")).await.unwrap();

    assert_eq!(router.budgets()[0].spent, Decimal::new(60, 2));
    assert!(sink.names().contains(&"budget_breached"));
}
