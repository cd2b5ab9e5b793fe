//! Domain model shared by every component: trading cycles, scan results,
//! news events, orders, positions, and the risk audit trail.
//!
//! All persistent entities reference a `Security` and a `TimePoint` through
//! surrogate integer keys (`security_id`, `time_id`). Raw ticker strings and
//! timestamps are only ever translated into those keys by the Store
//! Gateway's resolve-or-create operations (`store::gateway`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SecurityId = i64;
pub type TimeId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleMode {
    Aggressive,
    Normal,
    Conservative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Idle,
    Active,
    Paused,
    Stopping,
    Stopped,
    EmergencyStopped,
    Completed,
}

impl CycleStatus {
    /// Statuses that count toward the "at most one active cycle" invariant.
    pub fn is_live(self) -> bool {
        matches!(self, CycleStatus::Active | CycleStatus::Paused | CycleStatus::Stopping)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingCycle {
    pub id: String,
    pub mode: CycleMode,
    pub status: CycleStatus,
    pub scan_cadence_secs: u32,
    pub max_positions: u32,
    pub risk_level: f64,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub stop_reason: Option<String>,
    pub configuration: serde_json::Value,
    pub positions_opened: u32,
    pub positions_closed: u32,
    pub risk_events: u32,
}

impl TradingCycle {
    pub fn new(id: String, mode: CycleMode, scan_cadence_secs: u32, max_positions: u32, risk_level: f64) -> Self {
        Self {
            id,
            mode,
            status: CycleStatus::Active,
            scan_cadence_secs,
            max_positions,
            risk_level,
            started_at: Utc::now(),
            stopped_at: None,
            stop_reason: None,
            configuration: serde_json::Value::Null,
            positions_opened: 0,
            positions_closed: 0,
            risk_events: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ScanScores {
    pub momentum: f64,
    pub volume: f64,
    pub catalyst: f64,
    pub technical: f64,
    pub composite: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: i64,
    pub cycle_id: String,
    pub security_id: SecurityId,
    pub symbol: String,
    pub scan_time_id: TimeId,
    pub scan_time: DateTime<Utc>,
    pub scores: ScanScores,
    pub price: f64,
    pub volume: f64,
    pub change_pct: f64,
    pub selected: bool,
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalystType {
    Earnings,
    FdaApproval,
    MergerAcquisition,
    ProductLaunch,
    Partnership,
    Regulatory,
    Lawsuit,
    ManagementChange,
    AnalystUpgrade,
    AnalystDowngrade,
    InsiderTrading,
    General,
}

impl CatalystType {
    pub const ALL: [CatalystType; 12] = [
        CatalystType::Earnings,
        CatalystType::FdaApproval,
        CatalystType::MergerAcquisition,
        CatalystType::ProductLaunch,
        CatalystType::Partnership,
        CatalystType::Regulatory,
        CatalystType::Lawsuit,
        CatalystType::ManagementChange,
        CatalystType::AnalystUpgrade,
        CatalystType::AnalystDowngrade,
        CatalystType::InsiderTrading,
        CatalystType::General,
    ];

    /// Keyword set used by `news::catalyst` to classify a headline. Closed
    /// set per spec §6 — never extended at runtime.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            CatalystType::Earnings => &["earnings", "revenue", "profit", "eps", "guidance", "forecast"],
            CatalystType::FdaApproval => &["fda", "approval", "clinical", "trial", "drug", "phase"],
            CatalystType::MergerAcquisition => &["merger", "acquisition", "buyout", "takeover", "deal"],
            CatalystType::ProductLaunch => &["launch", "release", "unveil", "announce", "introduce"],
            CatalystType::Partnership => &["partnership", "collaboration", "agreement", "contract", "joint"],
            CatalystType::Regulatory => &["sec", "investigation", "probe", "compliance", "regulation"],
            CatalystType::Lawsuit => &["lawsuit", "litigation", "court", "legal", "settlement"],
            CatalystType::ManagementChange => &["ceo", "cfo", "resign", "appoint", "hire", "fire"],
            CatalystType::AnalystUpgrade => &["upgrade", "buy", "outperform", "overweight", "raise"],
            CatalystType::AnalystDowngrade => &["downgrade", "sell", "underperform", "underweight", "cut"],
            CatalystType::InsiderTrading => &["insider", "buying", "selling", "transaction", "filing"],
            CatalystType::General => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub id: i64,
    pub security_id: SecurityId,
    pub symbol: String,
    pub time_id: TimeId,
    pub published_at: DateTime<Utc>,
    pub headline: String,
    pub source: String,
    pub url: Option<String>,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub relevance: f64,
    pub catalyst_type: CatalystType,
    pub observed_impact_pct: Option<f64>,
    pub source_reliability: f64,
    pub impact_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Submitted,
    Filled,
    Partial,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub cycle_id: String,
    pub security_id: SecurityId,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub fill_price: Option<f64>,
    pub fill_quantity: Option<f64>,
    pub fees: f64,
    pub reject_reason: Option<String>,
    pub position_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Partial,
    Closed,
    RiskReduced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub cycle_id: String,
    pub security_id: SecurityId,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub mfe: f64,
    pub mae: f64,
    pub close_reason: Option<String>,
    pub entry_order_id: String,
    pub exit_order_id: Option<String>,
}

impl Position {
    pub fn current_value(&self, live_price: f64) -> f64 {
        live_price * self.quantity
    }

    pub fn unrealized_pnl_at(&self, live_price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (live_price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - live_price) * self.quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskParamKind {
    Currency,
    Percentage,
    Count,
    Multiplier,
    Ratio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParameter {
    pub name: String,
    pub kind: RiskParamKind,
    pub value: f64,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
    pub origin: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyRiskMetric {
    pub cycle_id_hash: i64,
    pub pnl: f64,
    pub trades: u32,
    pub win_rate: f64,
    pub exposure_peak: f64,
    pub drawdown: f64,
    pub sharpe: f64,
    pub loss_limit_hit: bool,
    pub emergency_stop_triggered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: i64,
    pub event_type: String,
    pub severity: RiskSeverity,
    pub cycle_id: Option<String>,
    pub security_id: Option<SecurityId>,
    pub message: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}
