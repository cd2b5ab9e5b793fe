//! Store Gateway — the only way the rest of the system touches
//! persistence (spec §4.1). Every multi-row write runs inside a
//! transaction; every operation acquires a connection from the pool,
//! uses it, and releases it within one async step.

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::pool::StorePool;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

pub struct StoreGateway {
    pool: Arc<StorePool>,
}

fn ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(v: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(v, 0).single().unwrap_or_else(Utc::now)
}

fn map_store_err(e: rusqlite::Error) -> AppError {
    AppError::StoreUnavailable(e.to_string())
}

impl StoreGateway {
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }

    // ---- Resolution -----------------------------------------------------

    /// Idempotent: returns the existing security_id for `symbol` or
    /// creates the row. The only place a raw ticker becomes a surrogate key.
    pub async fn resolve_security(&self, symbol: &str) -> AppResult<SecurityId> {
        let conn = self.pool.acquire().await?;
        let symbol = symbol.to_uppercase();
        conn.execute(
            "INSERT OR IGNORE INTO securities (symbol) VALUES (?1)",
            params![symbol],
        )
        .map_err(map_store_err)?;
        conn.query_row(
            "SELECT security_id FROM securities WHERE symbol = ?1",
            params![symbol],
            |row| row.get(0),
        )
        .map_err(map_store_err)
    }

    pub async fn symbol_for(&self, security_id: SecurityId) -> AppResult<String> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT symbol FROM securities WHERE security_id = ?1",
            params![security_id],
            |row| row.get(0),
        )
        .map_err(map_store_err)
    }

    /// Idempotent: returns the existing time_id for `instant` or creates it.
    pub async fn resolve_time(&self, instant: DateTime<Utc>) -> AppResult<TimeId> {
        let conn = self.pool.acquire().await?;
        let t = ts(instant);
        conn.execute("INSERT OR IGNORE INTO time_points (ts) VALUES (?1)", params![t])
            .map_err(map_store_err)?;
        conn.query_row(
            "SELECT time_id FROM time_points WHERE ts = ?1",
            params![t],
            |row| row.get(0),
        )
        .map_err(map_store_err)
    }

    // ---- Cycle ops --------------------------------------------------------

    /// Creates `cycle` as the active cycle. Caller must have already
    /// checked `load_active` — this call additionally re-checks inside the
    /// same connection acquisition to narrow (not eliminate, sqlite has no
    /// cross-connection serializable isolation here) the race, and fails
    /// with `DataIntegrity` if another active cycle appeared concurrently.
    pub async fn create_cycle(&self, cycle: &TradingCycle) -> AppResult<()> {
        let conn = self.pool.acquire().await?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT cycle_id FROM trading_cycles WHERE status IN ('active','paused','stopping') LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_store_err)?;
        if existing.is_some() {
            return Err(AppError::DataIntegrity(
                "another cycle is already active".into(),
            ));
        }
        conn.execute(
            "INSERT INTO trading_cycles
                (cycle_id, mode, status, scan_cadence_secs, max_positions, risk_level,
                 started_at, configuration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                cycle.id,
                mode_str(cycle.mode),
                status_str(cycle.status),
                cycle.scan_cadence_secs,
                cycle.max_positions,
                cycle.risk_level,
                ts(cycle.started_at),
                cycle.configuration.to_string(),
            ],
        )
        .map_err(map_store_err)?;
        Ok(())
    }

    /// Guarded status transition. Returns `DataIntegrity` if `from` states
    /// don't match what's actually stored (lost update / stale caller).
    pub async fn transition_cycle_status(
        &self,
        cycle_id: &str,
        allowed_from: &[CycleStatus],
        to: CycleStatus,
        stop_reason: Option<&str>,
    ) -> AppResult<()> {
        let conn = self.pool.acquire().await?;
        let current: String = conn
            .query_row(
                "SELECT status FROM trading_cycles WHERE cycle_id = ?1",
                params![cycle_id],
                |row| row.get(0),
            )
            .map_err(map_store_err)?;
        let current = parse_status(&current)
            .ok_or_else(|| AppError::DataIntegrity(format!("unknown stored status: {current}")))?;
        if !allowed_from.contains(&current) {
            return Err(AppError::DataIntegrity(format!(
                "illegal transition for {cycle_id}: {current:?} -> {to:?}"
            )));
        }
        let stopped_at = matches!(
            to,
            CycleStatus::Stopped | CycleStatus::EmergencyStopped | CycleStatus::Completed
        )
        .then(|| ts(Utc::now()));
        conn.execute(
            "UPDATE trading_cycles SET status = ?1, stopped_at = COALESCE(?2, stopped_at), stop_reason = COALESCE(?3, stop_reason) WHERE cycle_id = ?4",
            params![status_str(to), stopped_at, stop_reason, cycle_id],
        )
        .map_err(map_store_err)?;
        Ok(())
    }

    pub async fn load_active(&self) -> AppResult<Option<TradingCycle>> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT cycle_id, mode, status, scan_cadence_secs, max_positions, risk_level,
                    started_at, stopped_at, stop_reason, configuration,
                    positions_opened, positions_closed, risk_events
             FROM trading_cycles WHERE status IN ('active','paused','stopping') LIMIT 1",
            [],
            row_to_cycle,
        )
        .optional()
        .map_err(map_store_err)
    }

    pub async fn get_cycle(&self, cycle_id: &str) -> AppResult<TradingCycle> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT cycle_id, mode, status, scan_cadence_secs, max_positions, risk_level,
                    started_at, stopped_at, stop_reason, configuration,
                    positions_opened, positions_closed, risk_events
             FROM trading_cycles WHERE cycle_id = ?1",
            params![cycle_id],
            row_to_cycle,
        )
        .map_err(map_store_err)
    }

    pub async fn append_cycle_metric(
        &self,
        cycle_id: &str,
        positions_opened_delta: i64,
        positions_closed_delta: i64,
        risk_events_delta: i64,
    ) -> AppResult<()> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "UPDATE trading_cycles SET
                positions_opened = positions_opened + ?1,
                positions_closed = positions_closed + ?2,
                risk_events = risk_events + ?3
             WHERE cycle_id = ?4",
            params![positions_opened_delta, positions_closed_delta, risk_events_delta, cycle_id],
        )
        .map_err(map_store_err)?;
        Ok(())
    }

    pub async fn count_open_positions(&self, cycle_id: &str) -> AppResult<u32> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT COUNT(*) FROM positions WHERE cycle_id = ?1 AND status IN ('open','partial')",
            params![cycle_id],
            |row| row.get(0),
        )
        .map_err(map_store_err)
    }

    // ---- Scan ops -----------------------------------------------------

    pub async fn insert_scan_results(&self, results: &[ScanResult]) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(map_store_err)?;
        for r in results {
            tx.execute(
                "INSERT OR REPLACE INTO scan_results
                    (cycle_id, security_id, scan_time_id, momentum_score, volume_score,
                     catalyst_score, technical_score, composite_score, price, volume,
                     change_pct, selected, rank)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
                params![
                    r.cycle_id,
                    r.security_id,
                    r.scan_time_id,
                    r.scores.momentum,
                    r.scores.volume,
                    r.scores.catalyst,
                    r.scores.technical,
                    r.scores.composite,
                    r.price,
                    r.volume,
                    r.change_pct,
                    r.selected as i64,
                    r.rank,
                ],
            )
            .map_err(map_store_err)?;
        }
        tx.commit().map_err(map_store_err)?;
        Ok(())
    }

    /// Marks `ranked` (security_id, rank) pairs selected for (cycle, scan_time).
    pub async fn mark_selected(
        &self,
        cycle_id: &str,
        scan_time_id: TimeId,
        ranked: &[(SecurityId, u32)],
    ) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(map_store_err)?;
        for (security_id, rank) in ranked {
            tx.execute(
                "UPDATE scan_results SET selected = 1, rank = ?1
                 WHERE cycle_id = ?2 AND scan_time_id = ?3 AND security_id = ?4",
                params![rank, cycle_id, scan_time_id, security_id],
            )
            .map_err(map_store_err)?;
        }
        tx.commit().map_err(map_store_err)?;
        Ok(())
    }

    pub async fn top_n_by_composite(
        &self,
        cycle_id: &str,
        scan_time_id: TimeId,
        n: usize,
    ) -> AppResult<Vec<ScanResult>> {
        let conn = self.pool.acquire().await?;
        let mut stmt = conn
            .prepare(
                "SELECT sr.id, sr.cycle_id, sr.security_id, s.symbol, sr.scan_time_id,
                        t.ts, sr.momentum_score, sr.volume_score, sr.catalyst_score,
                        sr.technical_score, sr.composite_score, sr.price, sr.volume,
                        sr.change_pct, sr.selected, sr.rank
                 FROM scan_results sr
                 JOIN securities s ON s.security_id = sr.security_id
                 JOIN time_points t ON t.time_id = sr.scan_time_id
                 WHERE sr.cycle_id = ?1 AND sr.scan_time_id = ?2
                 ORDER BY sr.composite_score DESC, t.ts DESC
                 LIMIT ?3",
            )
            .map_err(map_store_err)?;
        let rows = stmt
            .query_map(params![cycle_id, scan_time_id, n as i64], row_to_scan_result)
            .map_err(map_store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_store_err)
    }

    // ---- News ops -----------------------------------------------------

    /// Upserts on the (source, dedup_key) constraint: re-ingesting the
    /// same article is a no-op, returning the existing row's id.
    pub async fn insert_news_event(&self, ev: &NewsEvent, dedup_key: &str) -> AppResult<i64> {
        let conn = self.pool.acquire().await?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM news_events WHERE source = ?1 AND dedup_key = ?2",
                params![ev.source, dedup_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_store_err)?;
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO news_events
                (security_id, time_id, headline, source, url, dedup_key, sentiment,
                 sentiment_score, relevance, catalyst_type, observed_impact_pct,
                 source_reliability, impact_attempts, published_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,0,?13)",
            params![
                ev.security_id,
                ev.time_id,
                ev.headline,
                ev.source,
                ev.url,
                dedup_key,
                sentiment_str(ev.sentiment),
                ev.sentiment_score,
                ev.relevance,
                catalyst_str(ev.catalyst_type),
                ev.observed_impact_pct,
                ev.source_reliability,
                ts(ev.published_at),
            ],
        )
        .map_err(map_store_err)?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn news_for_security_since(
        &self,
        security_id: SecurityId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<NewsEvent>> {
        let conn = self.pool.acquire().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, security_id, s.symbol, time_id, published_at, headline, source, url,
                        sentiment, sentiment_score, relevance, catalyst_type,
                        observed_impact_pct, source_reliability, impact_attempts
                 FROM news_events n JOIN securities s ON s.security_id = n.security_id
                 WHERE n.security_id = ?1 AND published_at >= ?2
                 ORDER BY published_at DESC",
            )
            .map_err(map_store_err)?;
        let rows = stmt
            .query_map(params![security_id, ts(since)], row_to_news_event)
            .map_err(map_store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_store_err)
    }

    pub async fn unprocessed_news(
        &self,
        older_than: DateTime<Utc>,
        max_attempts: u32,
        batch: usize,
    ) -> AppResult<Vec<NewsEvent>> {
        let conn = self.pool.acquire().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, security_id, s.symbol, time_id, published_at, headline, source, url,
                        sentiment, sentiment_score, relevance, catalyst_type,
                        observed_impact_pct, source_reliability, impact_attempts
                 FROM news_events n JOIN securities s ON s.security_id = n.security_id
                 WHERE observed_impact_pct IS NULL AND published_at <= ?1 AND impact_attempts < ?2
                 ORDER BY published_at ASC
                 LIMIT ?3",
            )
            .map_err(map_store_err)?;
        let rows = stmt
            .query_map(params![ts(older_than), max_attempts, batch as i64], row_to_news_event)
            .map_err(map_store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_store_err)
    }

    pub async fn update_news_impact(&self, id: i64, impact_pct: f64) -> AppResult<()> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "UPDATE news_events SET observed_impact_pct = ?1 WHERE id = ?2",
            params![impact_pct, id],
        )
        .map_err(map_store_err)?;
        Ok(())
    }

    pub async fn increment_news_attempt(&self, id: i64) -> AppResult<u32> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "UPDATE news_events SET impact_attempts = impact_attempts + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(map_store_err)?;
        conn.query_row(
            "SELECT impact_attempts FROM news_events WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .map_err(map_store_err)
    }

    // ---- Order / Position ops -----------------------------------------

    pub async fn insert_order(&self, order: &Order) -> AppResult<()> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "INSERT INTO orders
                (id, cycle_id, security_id, side, order_type, quantity, limit_price,
                 stop_price, time_in_force, status, submitted_at, fill_price,
                 fill_quantity, fees, reject_reason, position_id)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
            params![
                order.id,
                order.cycle_id,
                order.security_id,
                side_str(order.side),
                order_type_str(order.order_type),
                order.quantity,
                order.limit_price,
                order.stop_price,
                tif_str(order.time_in_force),
                order_status_str(order.status),
                order.submitted_at.map(ts),
                order.fill_price,
                order.fill_quantity,
                order.fees,
                order.reject_reason,
                order.position_id,
            ],
        )
        .map_err(map_store_err)?;
        Ok(())
    }

    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        fill_price: Option<f64>,
        fill_quantity: Option<f64>,
        fees: Option<f64>,
        reject_reason: Option<&str>,
    ) -> AppResult<()> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "UPDATE orders SET status = ?1,
                fill_price = COALESCE(?2, fill_price),
                fill_quantity = COALESCE(?3, fill_quantity),
                fees = COALESCE(?4, fees),
                reject_reason = COALESCE(?5, reject_reason),
                submitted_at = COALESCE(submitted_at, ?6)
             WHERE id = ?7",
            params![
                order_status_str(status),
                fill_price,
                fill_quantity,
                fees,
                reject_reason,
                ts(Utc::now()),
                order_id,
            ],
        )
        .map_err(map_store_err)?;
        Ok(())
    }

    pub async fn get_order(&self, order_id: &str) -> AppResult<Order> {
        let conn = self.pool.acquire().await?;
        conn.query_row(
            "SELECT o.id, o.cycle_id, o.security_id, s.symbol, o.side, o.order_type,
                    o.quantity, o.limit_price, o.stop_price, o.time_in_force, o.status,
                    o.submitted_at, o.fill_price, o.fill_quantity, o.fees,
                    o.reject_reason, o.position_id
             FROM orders o JOIN securities s ON s.security_id = o.security_id
             WHERE o.id = ?1",
            params![order_id],
            row_to_order,
        )
        .map_err(map_store_err)
    }

    /// Links `entry_order_id` to a freshly opened position in one
    /// transaction and stamps the order's `position_id`.
    pub async fn open_position(&self, position: &Position) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(map_store_err)?;
        tx.execute(
            "INSERT INTO positions
                (id, cycle_id, security_id, side, quantity, entry_price, stop_loss,
                 take_profit, status, opened_at, realized_pnl, unrealized_pnl, mfe, mae,
                 entry_order_id)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,0,0,0,0,?11)",
            params![
                position.id,
                position.cycle_id,
                position.security_id,
                side_pos_str(position.side),
                position.quantity,
                position.entry_price,
                position.stop_loss,
                position.take_profit,
                position_status_str(position.status),
                ts(position.opened_at),
                position.entry_order_id,
            ],
        )
        .map_err(map_store_err)?;
        tx.execute(
            "UPDATE orders SET position_id = ?1 WHERE id = ?2",
            params![position.id, position.entry_order_id],
        )
        .map_err(map_store_err)?;
        tx.execute(
            "UPDATE trading_cycles SET positions_opened = positions_opened + 1 WHERE cycle_id = ?1",
            params![position.cycle_id],
        )
        .map_err(map_store_err)?;
        tx.commit().map_err(map_store_err)?;
        Ok(())
    }

    /// Bulk unrealized P&L update: one statement per cycle, as spec §4.1
    /// requires, executed inside a single transaction across positions.
    pub async fn update_unrealized_pnl_bulk(
        &self,
        updates: &[(String, f64, f64, f64)], // (position_id, unrealized_pnl, mfe, mae)
    ) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(map_store_err)?;
        for (position_id, pnl, mfe, mae) in updates {
            tx.execute(
                "UPDATE positions SET unrealized_pnl = ?1,
                    mfe = MAX(mfe, ?2), mae = MIN(mae, ?3)
                 WHERE id = ?4",
                params![pnl, mfe, mae, position_id],
            )
            .map_err(map_store_err)?;
        }
        tx.commit().map_err(map_store_err)?;
        Ok(())
    }

    pub async fn close_position(
        &self,
        position_id: &str,
        exit_order_id: &str,
        exit_price: f64,
        realized_pnl: f64,
        close_reason: &str,
    ) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        let tx = conn.transaction().map_err(map_store_err)?;
        let cycle_id: String = tx
            .query_row(
                "SELECT cycle_id FROM positions WHERE id = ?1",
                params![position_id],
                |row| row.get(0),
            )
            .map_err(map_store_err)?;
        tx.execute(
            "UPDATE positions SET status = 'closed', exit_price = ?1, realized_pnl = ?2,
                close_reason = ?3, closed_at = ?4, exit_order_id = ?5
             WHERE id = ?6",
            params![exit_price, realized_pnl, close_reason, ts(Utc::now()), exit_order_id, position_id],
        )
        .map_err(map_store_err)?;
        tx.execute(
            "UPDATE orders SET position_id = ?1 WHERE id = ?2",
            params![position_id, exit_order_id],
        )
        .map_err(map_store_err)?;
        tx.execute(
            "UPDATE trading_cycles SET positions_closed = positions_closed + 1 WHERE cycle_id = ?1",
            params![cycle_id],
        )
        .map_err(map_store_err)?;
        tx.commit().map_err(map_store_err)?;
        Ok(())
    }

    pub async fn list_open_positions(&self, cycle_id: &str) -> AppResult<Vec<Position>> {
        let conn = self.pool.acquire().await?;
        let mut stmt = conn
            .prepare(
                "SELECT p.id, p.cycle_id, p.security_id, s.symbol, p.side, p.quantity,
                        p.entry_price, p.exit_price, p.stop_loss, p.take_profit, p.status,
                        p.opened_at, p.closed_at, p.realized_pnl, p.unrealized_pnl, p.mfe,
                        p.mae, p.close_reason, p.entry_order_id, p.exit_order_id
                 FROM positions p JOIN securities s ON s.security_id = p.security_id
                 WHERE p.cycle_id = ?1 AND p.status IN ('open', 'partial')",
            )
            .map_err(map_store_err)?;
        let rows = stmt
            .query_map(params![cycle_id], row_to_position)
            .map_err(map_store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_store_err)
    }

    // ---- Risk ops -------------------------------------------------------

    /// Seeds the reducer's tunables (composite weights, sizing multipliers)
    /// as `origin = "default"` rows on first boot, so the pipeline is never
    /// unweighted (spec §9 open question, resolved in SPEC_FULL §11). Each
    /// name is inserted only if no row for it exists yet.
    pub async fn seed_default_risk_parameters(&self) -> AppResult<()> {
        const DEFAULTS: &[(&str, RiskParamKind, f64)] = &[
            ("weight_momentum", RiskParamKind::Ratio, 0.15),
            ("weight_volume", RiskParamKind::Ratio, 0.15),
            ("weight_catalyst", RiskParamKind::Ratio, 0.35),
            ("weight_technical", RiskParamKind::Ratio, 0.35),
            ("max_position_pct", RiskParamKind::Percentage, 5.0),
            ("max_daily_loss_pct", RiskParamKind::Percentage, 3.0),
            ("atr_stop_multiplier", RiskParamKind::Multiplier, 2.0),
            ("min_reward_risk_ratio", RiskParamKind::Ratio, 2.0),
        ];

        let existing = self.effective_risk_parameters(Utc::now()).await?;
        for (name, kind, value) in DEFAULTS {
            if existing.contains_key(*name) {
                continue;
            }
            let param = RiskParameter {
                name: name.to_string(),
                kind: *kind,
                value: *value,
                effective_from: Utc::now(),
                effective_until: None,
                origin: "default".to_string(),
            };
            self.upsert_risk_parameter(&param).await?;
        }
        Ok(())
    }

    pub async fn effective_risk_parameters(
        &self,
        at: DateTime<Utc>,
    ) -> AppResult<std::collections::HashMap<String, RiskParameter>> {
        let conn = self.pool.acquire().await?;
        let mut stmt = conn
            .prepare(
                "SELECT name, kind, value, effective_from, effective_until, origin
                 FROM risk_parameters
                 WHERE effective_from <= ?1 AND (effective_until IS NULL OR effective_until > ?1)",
            )
            .map_err(map_store_err)?;
        let rows = stmt
            .query_map(params![ts(at)], row_to_risk_parameter)
            .map_err(map_store_err)?;
        let mut out = std::collections::HashMap::new();
        for r in rows {
            let p = r.map_err(map_store_err)?;
            out.insert(p.name.clone(), p);
        }
        Ok(out)
    }

    pub async fn upsert_risk_parameter(&self, p: &RiskParameter) -> AppResult<()> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "INSERT INTO risk_parameters (name, kind, value, effective_from, effective_until, origin)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(name, effective_from) DO UPDATE SET value = excluded.value, origin = excluded.origin",
            params![
                p.name,
                risk_kind_str(p.kind),
                p.value,
                ts(p.effective_from),
                p.effective_until.map(ts),
                p.origin,
            ],
        )
        .map_err(map_store_err)?;
        Ok(())
    }

    pub async fn append_risk_event(&self, event: &RiskEvent) -> AppResult<i64> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "INSERT INTO risk_events
                (event_type, severity, cycle_id, security_id, message, data, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                event.event_type,
                severity_str(event.severity),
                event.cycle_id,
                event.security_id,
                event.message,
                event.data.to_string(),
                ts(event.created_at),
            ],
        )
        .map_err(map_store_err)?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn upsert_daily_metric(&self, date: &str, metric: &DailyRiskMetric, cycle_id: &str) -> AppResult<()> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "INSERT INTO daily_risk_metrics
                (date, cycle_id, pnl, trades, win_rate, exposure_peak, drawdown, sharpe,
                 loss_limit_hit, emergency_stop_triggered)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)
             ON CONFLICT(date, cycle_id) DO UPDATE SET
                pnl = excluded.pnl, trades = excluded.trades, win_rate = excluded.win_rate,
                exposure_peak = excluded.exposure_peak, drawdown = excluded.drawdown,
                sharpe = excluded.sharpe, loss_limit_hit = excluded.loss_limit_hit,
                emergency_stop_triggered = excluded.emergency_stop_triggered",
            params![
                date,
                cycle_id,
                metric.pnl,
                metric.trades,
                metric.win_rate,
                metric.exposure_peak,
                metric.drawdown,
                metric.sharpe,
                metric.loss_limit_hit as i64,
                metric.emergency_stop_triggered as i64,
            ],
        )
        .map_err(map_store_err)?;
        Ok(())
    }
}

// ---- enum <-> string mapping ---------------------------------------------

fn mode_str(m: CycleMode) -> &'static str {
    match m {
        CycleMode::Aggressive => "aggressive",
        CycleMode::Normal => "normal",
        CycleMode::Conservative => "conservative",
    }
}

fn status_str(s: CycleStatus) -> &'static str {
    match s {
        CycleStatus::Idle => "idle",
        CycleStatus::Active => "active",
        CycleStatus::Paused => "paused",
        CycleStatus::Stopping => "stopping",
        CycleStatus::Stopped => "stopped",
        CycleStatus::EmergencyStopped => "emergency_stopped",
        CycleStatus::Completed => "completed",
    }
}

fn parse_status(s: &str) -> Option<CycleStatus> {
    Some(match s {
        "idle" => CycleStatus::Idle,
        "active" => CycleStatus::Active,
        "paused" => CycleStatus::Paused,
        "stopping" => CycleStatus::Stopping,
        "stopped" => CycleStatus::Stopped,
        "emergency_stopped" => CycleStatus::EmergencyStopped,
        "completed" => CycleStatus::Completed,
        _ => return None,
    })
}

fn parse_mode(s: &str) -> CycleMode {
    match s {
        "aggressive" => CycleMode::Aggressive,
        "conservative" => CycleMode::Conservative,
        _ => CycleMode::Normal,
    }
}

fn sentiment_str(s: Sentiment) -> &'static str {
    match s {
        Sentiment::Positive => "positive",
        Sentiment::Negative => "negative",
        Sentiment::Neutral => "neutral",
    }
}

fn parse_sentiment(s: &str) -> Sentiment {
    match s {
        "positive" => Sentiment::Positive,
        "negative" => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

fn catalyst_str(c: CatalystType) -> &'static str {
    match c {
        CatalystType::Earnings => "earnings",
        CatalystType::FdaApproval => "fda_approval",
        CatalystType::MergerAcquisition => "merger_acquisition",
        CatalystType::ProductLaunch => "product_launch",
        CatalystType::Partnership => "partnership",
        CatalystType::Regulatory => "regulatory",
        CatalystType::Lawsuit => "lawsuit",
        CatalystType::ManagementChange => "management_change",
        CatalystType::AnalystUpgrade => "analyst_upgrade",
        CatalystType::AnalystDowngrade => "analyst_downgrade",
        CatalystType::InsiderTrading => "insider_trading",
        CatalystType::General => "general",
    }
}

fn parse_catalyst(s: &str) -> CatalystType {
    match s {
        "earnings" => CatalystType::Earnings,
        "fda_approval" => CatalystType::FdaApproval,
        "merger_acquisition" => CatalystType::MergerAcquisition,
        "product_launch" => CatalystType::ProductLaunch,
        "partnership" => CatalystType::Partnership,
        "regulatory" => CatalystType::Regulatory,
        "lawsuit" => CatalystType::Lawsuit,
        "management_change" => CatalystType::ManagementChange,
        "analyst_upgrade" => CatalystType::AnalystUpgrade,
        "analyst_downgrade" => CatalystType::AnalystDowngrade,
        "insider_trading" => CatalystType::InsiderTrading,
        _ => CatalystType::General,
    }
}

fn side_str(s: OrderSide) -> &'static str {
    match s {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

fn parse_side(s: &str) -> OrderSide {
    if s == "sell" {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    }
}

fn order_type_str(t: OrderType) -> &'static str {
    match t {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::Stop => "stop",
        OrderType::StopLimit => "stop_limit",
    }
}

fn parse_order_type(s: &str) -> OrderType {
    match s {
        "limit" => OrderType::Limit,
        "stop" => OrderType::Stop,
        "stop_limit" => OrderType::StopLimit,
        _ => OrderType::Market,
    }
}

fn tif_str(t: TimeInForce) -> &'static str {
    match t {
        TimeInForce::Day => "day",
        TimeInForce::Gtc => "gtc",
        TimeInForce::Ioc => "ioc",
        TimeInForce::Fok => "fok",
    }
}

fn parse_tif(s: &str) -> TimeInForce {
    match s {
        "gtc" => TimeInForce::Gtc,
        "ioc" => TimeInForce::Ioc,
        "fok" => TimeInForce::Fok,
        _ => TimeInForce::Day,
    }
}

fn order_status_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Pending => "pending",
        OrderStatus::Submitted => "submitted",
        OrderStatus::Filled => "filled",
        OrderStatus::Partial => "partial",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Rejected => "rejected",
    }
}

fn parse_order_status(s: &str) -> OrderStatus {
    match s {
        "submitted" => OrderStatus::Submitted,
        "filled" => OrderStatus::Filled,
        "partial" => OrderStatus::Partial,
        "cancelled" => OrderStatus::Cancelled,
        "rejected" => OrderStatus::Rejected,
        _ => OrderStatus::Pending,
    }
}

fn side_pos_str(s: PositionSide) -> &'static str {
    match s {
        PositionSide::Long => "long",
        PositionSide::Short => "short",
    }
}

fn parse_position_side(s: &str) -> PositionSide {
    if s == "short" {
        PositionSide::Short
    } else {
        PositionSide::Long
    }
}

fn position_status_str(s: PositionStatus) -> &'static str {
    match s {
        PositionStatus::Open => "open",
        PositionStatus::Partial => "partial",
        PositionStatus::Closed => "closed",
        PositionStatus::RiskReduced => "risk_reduced",
    }
}

fn parse_position_status(s: &str) -> PositionStatus {
    match s {
        "partial" => PositionStatus::Partial,
        "closed" => PositionStatus::Closed,
        "risk_reduced" => PositionStatus::RiskReduced,
        _ => PositionStatus::Open,
    }
}

fn risk_kind_str(k: RiskParamKind) -> &'static str {
    match k {
        RiskParamKind::Currency => "currency",
        RiskParamKind::Percentage => "percentage",
        RiskParamKind::Count => "count",
        RiskParamKind::Multiplier => "multiplier",
        RiskParamKind::Ratio => "ratio",
    }
}

fn parse_risk_kind(s: &str) -> RiskParamKind {
    match s {
        "percentage" => RiskParamKind::Percentage,
        "count" => RiskParamKind::Count,
        "multiplier" => RiskParamKind::Multiplier,
        "ratio" => RiskParamKind::Ratio,
        _ => RiskParamKind::Currency,
    }
}

fn severity_str(s: RiskSeverity) -> &'static str {
    match s {
        RiskSeverity::Info => "info",
        RiskSeverity::Warning => "warning",
        RiskSeverity::Critical => "critical",
        RiskSeverity::Emergency => "emergency",
    }
}

fn parse_severity(s: &str) -> RiskSeverity {
    match s {
        "warning" => RiskSeverity::Warning,
        "critical" => RiskSeverity::Critical,
        "emergency" => RiskSeverity::Emergency,
        _ => RiskSeverity::Info,
    }
}

// ---- row mappers -----------------------------------------------------

fn row_to_cycle(row: &Row) -> rusqlite::Result<TradingCycle> {
    let status: String = row.get(2)?;
    let mode: String = row.get(1)?;
    let config_raw: String = row.get(9)?;
    Ok(TradingCycle {
        id: row.get(0)?,
        mode: parse_mode(&mode),
        status: parse_status(&status).unwrap_or(CycleStatus::Idle),
        scan_cadence_secs: row.get(3)?,
        max_positions: row.get(4)?,
        risk_level: row.get(5)?,
        started_at: from_ts(row.get(6)?),
        stopped_at: row.get::<_, Option<i64>>(7)?.map(from_ts),
        stop_reason: row.get(8)?,
        configuration: serde_json::from_str(&config_raw).unwrap_or(serde_json::Value::Null),
        positions_opened: row.get(10)?,
        positions_closed: row.get(11)?,
        risk_events: row.get(12)?,
    })
}

fn row_to_scan_result(row: &Row) -> rusqlite::Result<ScanResult> {
    Ok(ScanResult {
        id: row.get(0)?,
        cycle_id: row.get(1)?,
        security_id: row.get(2)?,
        symbol: row.get(3)?,
        scan_time_id: row.get(4)?,
        scan_time: from_ts(row.get(5)?),
        scores: ScanScores {
            momentum: row.get(6)?,
            volume: row.get(7)?,
            catalyst: row.get(8)?,
            technical: row.get(9)?,
            composite: row.get(10)?,
        },
        price: row.get(11)?,
        volume: row.get(12)?,
        change_pct: row.get(13)?,
        selected: row.get::<_, i64>(14)? != 0,
        rank: row.get(15)?,
    })
}

fn row_to_news_event(row: &Row) -> rusqlite::Result<NewsEvent> {
    let sentiment: String = row.get(8)?;
    let catalyst: String = row.get(11)?;
    Ok(NewsEvent {
        id: row.get(0)?,
        security_id: row.get(1)?,
        symbol: row.get(2)?,
        time_id: row.get(3)?,
        published_at: from_ts(row.get(4)?),
        headline: row.get(5)?,
        source: row.get(6)?,
        url: row.get(7)?,
        sentiment: parse_sentiment(&sentiment),
        sentiment_score: row.get(9)?,
        relevance: row.get(10)?,
        catalyst_type: parse_catalyst(&catalyst),
        observed_impact_pct: row.get(12)?,
        source_reliability: row.get(13)?,
        impact_attempts: row.get(14)?,
    })
}

fn row_to_order(row: &Row) -> rusqlite::Result<Order> {
    let side: String = row.get(4)?;
    let order_type: String = row.get(5)?;
    let tif: String = row.get(9)?;
    let status: String = row.get(10)?;
    Ok(Order {
        id: row.get(0)?,
        cycle_id: row.get(1)?,
        security_id: row.get(2)?,
        symbol: row.get(3)?,
        side: parse_side(&side),
        order_type: parse_order_type(&order_type),
        quantity: row.get(6)?,
        limit_price: row.get(7)?,
        stop_price: row.get(8)?,
        time_in_force: parse_tif(&tif),
        status: parse_order_status(&status),
        submitted_at: row.get::<_, Option<i64>>(11)?.map(from_ts),
        fill_price: row.get(12)?,
        fill_quantity: row.get(13)?,
        fees: row.get(14)?,
        reject_reason: row.get(15)?,
        position_id: row.get(16)?,
    })
}

fn row_to_position(row: &Row) -> rusqlite::Result<Position> {
    let side: String = row.get(4)?;
    let status: String = row.get(10)?;
    Ok(Position {
        id: row.get(0)?,
        cycle_id: row.get(1)?,
        security_id: row.get(2)?,
        symbol: row.get(3)?,
        side: parse_position_side(&side),
        quantity: row.get(5)?,
        entry_price: row.get(6)?,
        exit_price: row.get(7)?,
        stop_loss: row.get(8)?,
        take_profit: row.get(9)?,
        status: parse_position_status(&status),
        opened_at: from_ts(row.get(11)?),
        closed_at: row.get::<_, Option<i64>>(12)?.map(from_ts),
        realized_pnl: row.get(13)?,
        unrealized_pnl: row.get(14)?,
        mfe: row.get(15)?,
        mae: row.get(16)?,
        close_reason: row.get(17)?,
        entry_order_id: row.get(18)?,
        exit_order_id: row.get(19)?,
    })
}

fn row_to_risk_parameter(row: &Row) -> rusqlite::Result<RiskParameter> {
    let kind: String = row.get(1)?;
    Ok(RiskParameter {
        name: row.get(0)?,
        kind: parse_risk_kind(&kind),
        value: row.get(2)?,
        effective_from: from_ts(row.get(3)?),
        effective_until: row.get::<_, Option<i64>>(4)?.map(from_ts),
        origin: row.get(5)?,
    })
}

#[allow(dead_code)]
fn row_to_risk_event(row: &Row) -> rusqlite::Result<RiskEvent> {
    let severity: String = row.get(2)?;
    let data_raw: String = row.get(6)?;
    Ok(RiskEvent {
        id: row.get(0)?,
        event_type: row.get(1)?,
        severity: parse_severity(&severity),
        cycle_id: row.get(3)?,
        security_id: row.get(4)?,
        message: row.get(5)?,
        data: serde_json::from_str(&data_raw).unwrap_or(serde_json::Value::Null),
        created_at: from_ts(row.get(7)?),
        acknowledged: row.get::<_, i64>(8)? != 0,
        acknowledged_at: row.get::<_, Option<i64>>(9)?.map(from_ts),
    })
}
