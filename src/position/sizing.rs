//! Position sizing and exit-level calculation (spec §4.7, §9 Open
//! Questions resolved in SPEC_FULL §11): quantity scales with mode and risk
//! level, stops derive from ATR, targets from a minimum reward:risk ratio.

use crate::models::CycleMode;

pub const BASE_POSITION_SIZE: f64 = 10_000.0;
pub const ATR_STOP_MULTIPLIER: f64 = 2.0;
pub const MIN_REWARD_RISK_RATIO: f64 = 2.0;

fn mode_multiplier(mode: CycleMode) -> f64 {
    match mode {
        CycleMode::Aggressive => 1.5,
        CycleMode::Normal => 1.0,
        CycleMode::Conservative => 0.6,
    }
}

/// Dollar notional for a new position, before converting to share quantity.
pub fn position_notional(mode: CycleMode, risk_level: f64) -> f64 {
    BASE_POSITION_SIZE * mode_multiplier(mode) * risk_level.clamp(0.1, 3.0)
}

pub fn quantity_for(mode: CycleMode, risk_level: f64, price: f64) -> f64 {
    if price <= 0.0 {
        return 0.0;
    }
    (position_notional(mode, risk_level) / price).floor().max(0.0)
}

/// `atr` is the security's average true range in price units.
pub fn stop_loss_for(entry_price: f64, atr: f64, is_long: bool) -> f64 {
    let offset = atr * ATR_STOP_MULTIPLIER;
    if is_long {
        entry_price - offset
    } else {
        entry_price + offset
    }
}

pub fn take_profit_for(entry_price: f64, stop_loss: f64, is_long: bool) -> f64 {
    let risk = (entry_price - stop_loss).abs();
    let reward = risk * MIN_REWARD_RISK_RATIO;
    if is_long {
        entry_price + reward
    } else {
        entry_price - reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggressive_mode_sizes_larger_than_conservative() {
        let aggressive = quantity_for(CycleMode::Aggressive, 1.0, 50.0);
        let conservative = quantity_for(CycleMode::Conservative, 1.0, 50.0);
        assert!(aggressive > conservative);
    }

    #[test]
    fn stop_loss_below_entry_for_long_above_for_short() {
        assert!(stop_loss_for(100.0, 2.0, true) < 100.0);
        assert!(stop_loss_for(100.0, 2.0, false) > 100.0);
    }

    #[test]
    fn take_profit_respects_minimum_reward_risk_ratio() {
        let entry = 100.0;
        let stop = stop_loss_for(entry, 2.0, true);
        let target = take_profit_for(entry, stop, true);
        let risk = entry - stop;
        let reward = target - entry;
        assert!(reward >= risk * MIN_REWARD_RISK_RATIO - 1e-9);
    }
}
