//! Table definitions for the relational store (spec §3). Surrogate keys
//! (`security_id`, `time_id`) are the only way a row references a ticker
//! or a timestamp instant; see `gateway::resolve_security` /
//! `gateway::resolve_time`.

use anyhow::Result;
use rusqlite::Connection;

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS securities (
            security_id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT NOT NULL UNIQUE,
            sector TEXT
        );

        CREATE TABLE IF NOT EXISTS time_points (
            time_id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts INTEGER NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS trading_cycles (
            cycle_id TEXT PRIMARY KEY,
            mode TEXT NOT NULL,
            status TEXT NOT NULL,
            scan_cadence_secs INTEGER NOT NULL,
            max_positions INTEGER NOT NULL,
            risk_level REAL NOT NULL,
            started_at INTEGER NOT NULL,
            stopped_at INTEGER,
            stop_reason TEXT,
            configuration TEXT NOT NULL DEFAULT '{}',
            positions_opened INTEGER NOT NULL DEFAULT 0,
            positions_closed INTEGER NOT NULL DEFAULT 0,
            risk_events INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_cycles_status ON trading_cycles(status);

        CREATE TABLE IF NOT EXISTS scan_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cycle_id TEXT NOT NULL REFERENCES trading_cycles(cycle_id),
            security_id INTEGER NOT NULL REFERENCES securities(security_id),
            scan_time_id INTEGER NOT NULL REFERENCES time_points(time_id),
            momentum_score REAL NOT NULL,
            volume_score REAL NOT NULL,
            catalyst_score REAL NOT NULL,
            technical_score REAL NOT NULL,
            composite_score REAL NOT NULL,
            price REAL NOT NULL,
            volume REAL NOT NULL,
            change_pct REAL NOT NULL,
            selected INTEGER NOT NULL DEFAULT 0,
            rank INTEGER,
            UNIQUE(cycle_id, scan_time_id, security_id)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_scan_rank
            ON scan_results(cycle_id, scan_time_id, rank)
            WHERE rank IS NOT NULL;

        CREATE TABLE IF NOT EXISTS news_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            security_id INTEGER NOT NULL REFERENCES securities(security_id),
            time_id INTEGER NOT NULL REFERENCES time_points(time_id),
            headline TEXT NOT NULL,
            source TEXT NOT NULL,
            url TEXT,
            dedup_key TEXT NOT NULL,
            sentiment TEXT NOT NULL,
            sentiment_score REAL NOT NULL,
            relevance REAL NOT NULL,
            catalyst_type TEXT NOT NULL,
            observed_impact_pct REAL,
            source_reliability REAL NOT NULL,
            impact_attempts INTEGER NOT NULL DEFAULT 0,
            published_at INTEGER NOT NULL,
            UNIQUE(source, dedup_key)
        );

        CREATE INDEX IF NOT EXISTS idx_news_security_time ON news_events(security_id, published_at DESC);
        CREATE INDEX IF NOT EXISTS idx_news_unprocessed ON news_events(observed_impact_pct, published_at);

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            cycle_id TEXT NOT NULL REFERENCES trading_cycles(cycle_id),
            security_id INTEGER NOT NULL REFERENCES securities(security_id),
            side TEXT NOT NULL,
            order_type TEXT NOT NULL,
            quantity REAL NOT NULL,
            limit_price REAL,
            stop_price REAL,
            time_in_force TEXT NOT NULL,
            status TEXT NOT NULL,
            submitted_at INTEGER,
            fill_price REAL,
            fill_quantity REAL,
            fees REAL NOT NULL DEFAULT 0,
            reject_reason TEXT,
            position_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_orders_cycle ON orders(cycle_id);
        CREATE INDEX IF NOT EXISTS idx_orders_position ON orders(position_id);

        CREATE TABLE IF NOT EXISTS positions (
            id TEXT PRIMARY KEY,
            cycle_id TEXT NOT NULL REFERENCES trading_cycles(cycle_id),
            security_id INTEGER NOT NULL REFERENCES securities(security_id),
            side TEXT NOT NULL,
            quantity REAL NOT NULL,
            entry_price REAL NOT NULL,
            exit_price REAL,
            stop_loss REAL NOT NULL,
            take_profit REAL NOT NULL,
            status TEXT NOT NULL,
            opened_at INTEGER NOT NULL,
            closed_at INTEGER,
            realized_pnl REAL NOT NULL DEFAULT 0,
            unrealized_pnl REAL NOT NULL DEFAULT 0,
            mfe REAL NOT NULL DEFAULT 0,
            mae REAL NOT NULL DEFAULT 0,
            close_reason TEXT,
            entry_order_id TEXT NOT NULL,
            exit_order_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_positions_cycle_status ON positions(cycle_id, status);

        CREATE TABLE IF NOT EXISTS risk_parameters (
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            value REAL NOT NULL,
            effective_from INTEGER NOT NULL,
            effective_until INTEGER,
            origin TEXT NOT NULL,
            PRIMARY KEY (name, effective_from)
        );

        CREATE TABLE IF NOT EXISTS daily_risk_metrics (
            date TEXT NOT NULL,
            cycle_id TEXT NOT NULL,
            pnl REAL NOT NULL DEFAULT 0,
            trades INTEGER NOT NULL DEFAULT 0,
            win_rate REAL NOT NULL DEFAULT 0,
            exposure_peak REAL NOT NULL DEFAULT 0,
            drawdown REAL NOT NULL DEFAULT 0,
            sharpe REAL NOT NULL DEFAULT 0,
            loss_limit_hit INTEGER NOT NULL DEFAULT 0,
            emergency_stop_triggered INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (date, cycle_id)
        );

        CREATE TABLE IF NOT EXISTS risk_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            cycle_id TEXT,
            security_id INTEGER,
            message TEXT NOT NULL,
            data TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            acknowledged INTEGER NOT NULL DEFAULT 0,
            acknowledged_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_risk_events_severity ON risk_events(severity, created_at DESC);
        "#,
    )?;
    Ok(())
}
