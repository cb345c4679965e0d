use super::types::TierSchedule;

// Losses are not refunded: non-positive income pays nothing.
pub fn tiered_tax(income: f64, schedule: &TierSchedule) -> f64 {
    let base = income.max(0.0);
    let threshold = schedule.threshold.max(0.0);
    if base > threshold {
        threshold * schedule.lower_rate + (base - threshold) * schedule.upper_rate
    } else {
        base * schedule.lower_rate
    }
}

/// Tax on an unrealized gain stacked on top of income already earned in the
/// same period. The gain only gets the lower rate for whatever headroom the
/// current income leaves below the threshold. A negative gain yields a
/// negative (deferred tax asset) amount at the lower rate.
pub fn deferred_tax(gain: f64, current_income: f64, schedule: &TierSchedule) -> f64 {
    let threshold = schedule.threshold.max(0.0);
    let stacked_on = current_income.max(0.0);

    if gain > threshold {
        gain * schedule.upper_rate
    } else if stacked_on + gain < threshold {
        gain * schedule.lower_rate
    } else {
        let headroom = (threshold - stacked_on).max(0.0);
        headroom * schedule.lower_rate + (gain - headroom) * schedule.upper_rate
    }
}

// Fiscal partners share the box 2 lower bracket, so the threshold doubles.
pub fn scaled_for_joint_filing(schedule: &TierSchedule, partners: bool) -> TierSchedule {
    if partners {
        TierSchedule {
            threshold: schedule.threshold * 2.0,
            ..*schedule
        }
    } else {
        *schedule
    }
}
