//! Store Gateway scenarios: surrogate-key resolution idempotency, scan
//! result ranking, news dedup-on-ingest, the delayed price-impact sweep's
//! attempt cap, and the order -> position -> close P&L path.

use catalyst_orchestrator::models::{
    CatalystType, CycleMode, CycleStatus, NewsEvent, Order, OrderSide, OrderStatus, OrderType, Position,
    PositionSide, PositionStatus, RiskParamKind, RiskParameter, ScanResult, ScanScores, Sentiment, TimeInForce,
    TradingCycle,
};
use catalyst_orchestrator::store::{StoreGateway, StorePool};
use chrono::Utc;
use std::sync::Arc;

fn fresh_store() -> (Arc<StoreGateway>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalyst.db");
    let pool = StorePool::open(db_path.to_str().unwrap(), 4).unwrap();
    (Arc::new(StoreGateway::new(pool)), dir)
}

#[tokio::test]
async fn resolve_security_is_idempotent() {
    let (store, _dir) = fresh_store();
    let a = store.resolve_security("aapl").await.unwrap();
    let b = store.resolve_security("AAPL").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(store.symbol_for(a).await.unwrap(), "AAPL");
}

#[tokio::test]
async fn scan_results_rank_by_composite_score_descending() {
    let (store, _dir) = fresh_store();
    let cycle = TradingCycle::new("cycle_test_rank".into(), CycleMode::Normal, 900, 5, 1.0);
    store.create_cycle(&cycle).await.unwrap();

    let sec_a = store.resolve_security("AAA").await.unwrap();
    let sec_b = store.resolve_security("BBB").await.unwrap();
    let scan_time = Utc::now();
    let scan_time_id = store.resolve_time(scan_time).await.unwrap();

    let results = vec![
        ScanResult {
            id: 0,
            cycle_id: cycle.id.clone(),
            security_id: sec_a,
            symbol: "AAA".into(),
            scan_time_id,
            scan_time,
            scores: ScanScores { momentum: 0.5, volume: 0.5, catalyst: 0.5, technical: 0.5, composite: 0.9 },
            price: 10.0,
            volume: 1000.0,
            change_pct: 2.0,
            selected: false,
            rank: None,
        },
        ScanResult {
            id: 0,
            cycle_id: cycle.id.clone(),
            security_id: sec_b,
            symbol: "BBB".into(),
            scan_time_id,
            scan_time,
            scores: ScanScores { momentum: 0.1, volume: 0.1, catalyst: 0.1, technical: 0.1, composite: 0.3 },
            price: 20.0,
            volume: 500.0,
            change_pct: -1.0,
            selected: false,
            rank: None,
        },
    ];
    store.insert_scan_results(&results).await.unwrap();

    let top = store.top_n_by_composite(&cycle.id, scan_time_id, 10).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].symbol, "AAA");
    assert_eq!(top[1].symbol, "BBB");
}

fn sample_news_event(security_id: i64, time_id: i64, symbol: &str) -> NewsEvent {
    NewsEvent {
        id: 0,
        security_id,
        symbol: symbol.to_string(),
        time_id,
        published_at: Utc::now(),
        headline: "Company beats earnings, raises guidance".into(),
        source: "wire".into(),
        url: Some("https://example/1".into()),
        sentiment: Sentiment::Positive,
        sentiment_score: 0.6,
        relevance: 0.8,
        catalyst_type: CatalystType::Earnings,
        observed_impact_pct: None,
        source_reliability: 0.9,
        impact_attempts: 0,
    }
}

#[tokio::test]
async fn duplicate_news_ingest_is_a_no_op() {
    let (store, _dir) = fresh_store();
    let security_id = store.resolve_security("DUPE").await.unwrap();
    let time_id = store.resolve_time(Utc::now()).await.unwrap();
    let event = sample_news_event(security_id, time_id, "DUPE");

    let first_id = store.insert_news_event(&event, "article-key-1").await.unwrap();
    let second_id = store.insert_news_event(&event, "article-key-1").await.unwrap();
    assert_eq!(first_id, second_id);

    let since = Utc::now() - chrono::Duration::hours(1);
    let news = store.news_for_security_since(security_id, since).await.unwrap();
    assert_eq!(news.len(), 1);
}

#[tokio::test]
async fn unprocessed_news_respects_delay_and_attempt_cap() {
    let (store, _dir) = fresh_store();
    let security_id = store.resolve_security("IMPACT").await.unwrap();
    let old_time = Utc::now() - chrono::Duration::minutes(20);
    let time_id = store.resolve_time(old_time).await.unwrap();
    let mut event = sample_news_event(security_id, time_id, "IMPACT");
    event.published_at = old_time;
    store.insert_news_event(&event, "impact-key-1").await.unwrap();

    let cutoff = Utc::now() - chrono::Duration::minutes(5);
    let pending = store.unprocessed_news(cutoff, 5, 50).await.unwrap();
    assert_eq!(pending.len(), 1);

    let id = pending[0].id;
    for _ in 0..5 {
        store.increment_news_attempt(id).await.unwrap();
    }
    let still_pending = store.unprocessed_news(cutoff, 5, 50).await.unwrap();
    assert!(still_pending.is_empty(), "event should drop out once attempts reach the cap");
}

#[tokio::test]
async fn order_to_position_to_close_tracks_realized_pnl() {
    let (store, _dir) = fresh_store();
    let cycle = TradingCycle::new("cycle_test_pnl".into(), CycleMode::Normal, 900, 5, 1.0);
    store.create_cycle(&cycle).await.unwrap();
    let security_id = store.resolve_security("PNL").await.unwrap();

    let entry_order = Order {
        id: "order-entry-1".into(),
        cycle_id: cycle.id.clone(),
        security_id,
        symbol: "PNL".into(),
        side: OrderSide::Buy,
        order_type: OrderType::Market,
        quantity: 100.0,
        limit_price: None,
        stop_price: None,
        time_in_force: TimeInForce::Day,
        status: OrderStatus::Pending,
        submitted_at: None,
        fill_price: None,
        fill_quantity: None,
        fees: 0.0,
        reject_reason: None,
        position_id: None,
    };
    store.insert_order(&entry_order).await.unwrap();
    store
        .update_order_status(&entry_order.id, OrderStatus::Filled, Some(50.0), Some(100.0), Some(1.0), None)
        .await
        .unwrap();

    let position = Position {
        id: "position-1".into(),
        cycle_id: cycle.id.clone(),
        security_id,
        symbol: "PNL".into(),
        side: PositionSide::Long,
        quantity: 100.0,
        entry_price: 50.0,
        exit_price: None,
        stop_loss: 45.0,
        take_profit: 60.0,
        status: PositionStatus::Open,
        opened_at: Utc::now(),
        closed_at: None,
        realized_pnl: 0.0,
        unrealized_pnl: 0.0,
        mfe: 0.0,
        mae: 0.0,
        close_reason: None,
        entry_order_id: entry_order.id.clone(),
        exit_order_id: None,
    };
    store.open_position(&position).await.unwrap();

    let open = store.list_open_positions(&cycle.id).await.unwrap();
    assert_eq!(open.len(), 1);

    store
        .update_unrealized_pnl_bulk(&[(position.id.clone(), 500.0, 500.0, -50.0)])
        .await
        .unwrap();

    store
        .close_position(&position.id, "order-exit-1", 55.0, 500.0, "take_profit")
        .await
        .unwrap();

    let still_open = store.list_open_positions(&cycle.id).await.unwrap();
    assert!(still_open.is_empty());

    let cycle_after = store.get_cycle(&cycle.id).await.unwrap();
    assert_eq!(cycle_after.positions_opened, 1);
    assert_eq!(cycle_after.positions_closed, 1);
    assert_eq!(cycle_after.status, CycleStatus::Active);
}

#[tokio::test]
async fn seed_default_risk_parameters_is_idempotent_and_never_overrides() {
    let (store, _dir) = fresh_store();
    let now = Utc::now();

    let operator_override = RiskParameter {
        name: "max_position_pct".into(),
        kind: RiskParamKind::Percentage,
        value: 2.5,
        effective_from: now - chrono::Duration::minutes(1),
        effective_until: None,
        origin: "risk-manager".into(),
    };
    store.upsert_risk_parameter(&operator_override).await.unwrap();

    store.seed_default_risk_parameters().await.unwrap();
    store.seed_default_risk_parameters().await.unwrap();

    let effective = store.effective_risk_parameters(Utc::now()).await.unwrap();
    assert_eq!(effective.get("max_position_pct").unwrap().value, 2.5);
    assert_eq!(effective.get("weight_catalyst").unwrap().value, 0.35);
    assert_eq!(effective.get("weight_catalyst").unwrap().origin, "default");
}

#[tokio::test]
async fn effective_risk_parameters_respects_time_window() {
    let (store, _dir) = fresh_store();
    let now = Utc::now();

    let superseded = RiskParameter {
        name: "max_position_pct".into(),
        kind: RiskParamKind::Percentage,
        value: 5.0,
        effective_from: now - chrono::Duration::days(10),
        effective_until: Some(now - chrono::Duration::days(1)),
        origin: "default".into(),
    };
    let current = RiskParameter {
        name: "max_position_pct".into(),
        kind: RiskParamKind::Percentage,
        value: 3.0,
        effective_from: now - chrono::Duration::days(1),
        effective_until: None,
        origin: "risk-manager".into(),
    };
    store.upsert_risk_parameter(&superseded).await.unwrap();
    store.upsert_risk_parameter(&current).await.unwrap();

    let effective = store.effective_risk_parameters(now).await.unwrap();
    assert_eq!(effective.get("max_position_pct").unwrap().value, 3.0);
}
