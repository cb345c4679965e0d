use tracing::{debug, info, warn};

use super::error::ProjectionError;
use super::tax::{deferred_tax, scaled_for_joint_filing, tiered_tax};
use super::types::{Projection, ProjectionParams, TaxRegime, TierSchedule, YearRecord};

#[derive(Debug, Clone, Copy)]
struct OpeningBalances {
    equity: f64,
    bonds: f64,
    property: f64,
    cash: f64,
}

#[derive(Debug, Clone, Copy)]
struct PeriodIncome {
    equity_return: f64,
    dividends: f64,
    coupon: f64,
    rent: f64,
    fees: f64,
}

impl PeriodIncome {
    fn cash_yield(self) -> f64 {
        self.dividends + self.coupon + self.rent - self.fees
    }
}

#[derive(Debug)]
pub struct Projector {
    params: ProjectionParams,
    regime: TaxRegime,
    box2_schedule: TierSchedule,
    ledger: Vec<YearRecord>,
}

impl Projector {
    pub fn new(params: ProjectionParams, regime: TaxRegime) -> Result<Self, ProjectionError> {
        validate_params(&params).inspect_err(|e| warn!(error = %e, "rejected projection parameters"))?;
        validate_regime(&regime).inspect_err(|e| warn!(error = %e, "rejected tax regime"))?;

        let box2_schedule = scaled_for_joint_filing(&regime.substantial_interest, params.partners);
        Ok(Self {
            params,
            regime,
            box2_schedule,
            ledger: Vec::new(),
        })
    }

    pub fn run(mut self, num_years: u32) -> Result<Projection, ProjectionError> {
        if num_years == 0 {
            return Err(ProjectionError::InvalidHorizon(num_years));
        }

        self.ledger.reserve_exact(num_years as usize);
        for year in 0..num_years {
            self.compute_year(year);
        }

        if let Some(last) = self.ledger.last() {
            info!(
                years = num_years,
                investment_value = last.investment_value,
                exit_tax = last.exit_tax,
                net_value = last.net_value,
                "projection finished"
            );
        }
        Ok(Projection::new(self.ledger))
    }

    fn opening_balances(&self) -> OpeningBalances {
        match self.ledger.last() {
            Some(prev) => OpeningBalances {
                equity: prev.equity_fv,
                bonds: prev.bonds_fv,
                property: prev.property_fv,
                cash: prev.cash_balance,
            },
            None => OpeningBalances {
                equity: self.params.initial_equity,
                bonds: self.params.initial_bonds,
                property: self.params.initial_property,
                cash: 0.0,
            },
        }
    }

    // Only reachable from `run`, which walks years in order, so the last
    // ledger entry is always the previous year.
    fn compute_year(&mut self, year: u32) {
        debug_assert_eq!(self.ledger.len(), year as usize);

        let p = &self.params;
        let corporate = &self.regime.corporate;
        let open = self.opening_balances();

        let income = PeriodIncome {
            equity_return: open.equity * p.market_return_rate,
            dividends: open.equity * p.dividend_yield,
            coupon: open.bonds * p.coupon_rate,
            rent: open.property * p.rental_yield,
            fees: p.fee_amount,
        };

        let taxable_income_current = if p.mark_to_market {
            income.equity_return + income.cash_yield()
        } else {
            income.cash_yield()
        };
        let current_period_tax = tiered_tax(taxable_income_current, corporate);
        let cash_balance = open.cash + income.cash_yield() - current_period_tax;

        let equity_fv = open.equity + income.equity_return;
        let bonds_fv = open.bonds;
        let property_fv = open.property * (1.0 + p.inflation_rate);

        let equity_bv = if p.mark_to_market {
            equity_fv
        } else {
            p.initial_equity
        };
        let bonds_bv = p.initial_bonds;
        let property_bv = p.initial_property;

        let fair_value = equity_fv + bonds_fv + property_fv;
        let unrealized_gain = fair_value - (equity_bv + bonds_bv + property_bv);
        let deferred = deferred_tax(unrealized_gain, taxable_income_current, corporate);

        let portfolio_revenue = fair_value + cash_balance - deferred;
        let portfolio_basis = p.initial_total();
        let portfolio_income = portfolio_revenue - portfolio_basis;
        let portfolio_tax = tiered_tax(portfolio_income, &self.box2_schedule);

        let investment_value = cash_balance + fair_value;
        let record = YearRecord {
            year,
            equity_start: open.equity,
            bonds_start: open.bonds,
            property_start: open.property,
            equity_return: income.equity_return,
            dividend_yield_amount: income.dividends,
            bond_coupon: income.coupon,
            net_rent: income.rent,
            fees: income.fees,
            taxable_income_current,
            current_period_tax,
            cash_balance,
            equity_fv,
            bonds_fv,
            property_fv,
            equity_bv,
            bonds_bv,
            property_bv,
            unrealized_gain,
            deferred_tax: deferred,
            portfolio_revenue,
            portfolio_basis,
            portfolio_income,
            portfolio_tax,
            investment_value,
            exit_tax: portfolio_tax,
            net_value: investment_value - portfolio_tax,
        };

        debug!(
            year,
            taxable_income = record.taxable_income_current,
            current_tax = record.current_period_tax,
            cash = record.cash_balance,
            deferred_tax = record.deferred_tax,
            net_value = record.net_value,
            "computed year"
        );

        self.ledger.push(record);
    }
}

pub fn run_projection(
    params: ProjectionParams,
    regime: TaxRegime,
    num_years: u32,
) -> Result<Projection, ProjectionError> {
    Projector::new(params, regime)?.run(num_years)
}

fn validate_params(p: &ProjectionParams) -> Result<(), ProjectionError> {
    for (name, value) in [
        ("initial_equity", p.initial_equity),
        ("initial_bonds", p.initial_bonds),
        ("initial_property", p.initial_property),
        ("dividend_yield", p.dividend_yield),
        ("coupon_rate", p.coupon_rate),
        ("rental_yield", p.rental_yield),
        ("fee_amount", p.fee_amount),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ProjectionError::InvalidParameter {
                name,
                value,
                reason: "must be finite and >= 0",
            });
        }
    }

    for (name, value) in [
        ("market_return_rate", p.market_return_rate),
        ("inflation_rate", p.inflation_rate),
    ] {
        if !value.is_finite() || value <= -1.0 {
            return Err(ProjectionError::InvalidParameter {
                name,
                value,
                reason: "must be finite and > -1",
            });
        }
    }

    Ok(())
}

fn validate_regime(regime: &TaxRegime) -> Result<(), ProjectionError> {
    for (prefix, schedule) in [
        ("corporate", &regime.corporate),
        ("substantial_interest", &regime.substantial_interest),
    ] {
        for (name, rate) in [
            (rate_name(prefix, false), schedule.lower_rate),
            (rate_name(prefix, true), schedule.upper_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ProjectionError::InvalidRegime {
                    name,
                    value: rate,
                    reason: "rate must be between 0 and 1",
                });
            }
        }
        if !schedule.threshold.is_finite() || schedule.threshold < 0.0 {
            return Err(ProjectionError::InvalidRegime {
                name: threshold_name(prefix),
                value: schedule.threshold,
                reason: "threshold must be finite and >= 0",
            });
        }
    }
    Ok(())
}

fn rate_name(prefix: &str, upper: bool) -> &'static str {
    match (prefix, upper) {
        ("corporate", false) => "corporate.lower_rate",
        ("corporate", true) => "corporate.upper_rate",
        (_, false) => "substantial_interest.lower_rate",
        (_, true) => "substantial_interest.upper_rate",
    }
}

fn threshold_name(prefix: &str) -> &'static str {
    if prefix == "corporate" {
        "corporate.threshold"
    } else {
        "substantial_interest.threshold"
    }
}
