use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum TaxYear {
    Y2024,
    Y2025,
}

impl TaxYear {
    pub const ALL: [TaxYear; 2] = [TaxYear::Y2024, TaxYear::Y2025];

    pub fn year(self) -> u16 {
        match self {
            TaxYear::Y2024 => 2024,
            TaxYear::Y2025 => 2025,
        }
    }

    pub fn from_year(year: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|y| y.year() == year)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSchedule {
    pub lower_rate: f64,
    pub upper_rate: f64,
    pub threshold: f64,
}

// `corporate` is vpb inside the holding, `substantial_interest` is box 2 on exit.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRegime {
    pub corporate: TierSchedule,
    pub substantial_interest: TierSchedule,
}

impl TaxRegime {
    pub fn for_year(year: TaxYear) -> Self {
        let corporate = TierSchedule {
            lower_rate: 0.19,
            upper_rate: 0.258,
            threshold: 200_000.0,
        };
        let box2_threshold = match year {
            TaxYear::Y2024 => 67_000.0,
            TaxYear::Y2025 => 67_804.0,
        };
        Self {
            corporate,
            substantial_interest: TierSchedule {
                lower_rate: 0.245,
                upper_rate: 0.31,
                threshold: box2_threshold,
            },
        }
    }
}

impl Default for TaxRegime {
    fn default() -> Self {
        Self::for_year(TaxYear::Y2024)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionParams {
    pub initial_equity: f64,
    pub initial_bonds: f64,
    pub initial_property: f64,
    pub market_return_rate: f64,
    pub dividend_yield: f64,
    pub coupon_rate: f64,
    pub rental_yield: f64,
    pub fee_amount: f64,
    pub inflation_rate: f64,
    pub partners: bool,
    pub mark_to_market: bool,
}

impl ProjectionParams {
    pub fn initial_total(&self) -> f64 {
        self.initial_equity + self.initial_bonds + self.initial_property
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub equity_start: f64,
    pub bonds_start: f64,
    pub property_start: f64,
    pub equity_return: f64,
    pub dividend_yield_amount: f64,
    pub bond_coupon: f64,
    pub net_rent: f64,
    pub fees: f64,
    pub taxable_income_current: f64,
    pub current_period_tax: f64,
    pub cash_balance: f64,
    pub equity_fv: f64,
    pub bonds_fv: f64,
    pub property_fv: f64,
    pub equity_bv: f64,
    pub bonds_bv: f64,
    pub property_bv: f64,
    pub unrealized_gain: f64,
    pub deferred_tax: f64,
    pub portfolio_revenue: f64,
    pub portfolio_basis: f64,
    pub portfolio_income: f64,
    pub portfolio_tax: f64,
    pub investment_value: f64,
    pub exit_tax: f64,
    pub net_value: f64,
}

impl YearRecord {
    pub fn net_cash_flow(&self) -> f64 {
        self.dividend_yield_amount + self.bond_coupon + self.net_rent
            - self.fees
            - self.current_period_tax
    }

    pub fn to_integer(&self) -> IntegerYearRecord {
        IntegerYearRecord {
            year: self.year,
            equity_start: truncate(self.equity_start),
            bonds_start: truncate(self.bonds_start),
            property_start: truncate(self.property_start),
            equity_return: truncate(self.equity_return),
            dividend_yield_amount: truncate(self.dividend_yield_amount),
            bond_coupon: truncate(self.bond_coupon),
            net_rent: truncate(self.net_rent),
            fees: truncate(self.fees),
            taxable_income_current: truncate(self.taxable_income_current),
            current_period_tax: truncate(self.current_period_tax),
            cash_balance: truncate(self.cash_balance),
            equity_fv: truncate(self.equity_fv),
            bonds_fv: truncate(self.bonds_fv),
            property_fv: truncate(self.property_fv),
            equity_bv: truncate(self.equity_bv),
            bonds_bv: truncate(self.bonds_bv),
            property_bv: truncate(self.property_bv),
            unrealized_gain: truncate(self.unrealized_gain),
            deferred_tax: truncate(self.deferred_tax),
            portfolio_revenue: truncate(self.portfolio_revenue),
            portfolio_basis: truncate(self.portfolio_basis),
            portfolio_income: truncate(self.portfolio_income),
            portfolio_tax: truncate(self.portfolio_tax),
            investment_value: truncate(self.investment_value),
            exit_tax: truncate(self.exit_tax),
            net_value: truncate(self.net_value),
        }
    }

    pub fn chart_row(&self) -> ChartRow {
        ChartRow {
            year: self.year,
            investment_value: truncate(self.investment_value),
            exit_tax: truncate(self.exit_tax),
            net_value: truncate(self.net_value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegerYearRecord {
    pub year: u32,
    pub equity_start: i64,
    pub bonds_start: i64,
    pub property_start: i64,
    pub equity_return: i64,
    pub dividend_yield_amount: i64,
    pub bond_coupon: i64,
    pub net_rent: i64,
    pub fees: i64,
    pub taxable_income_current: i64,
    pub current_period_tax: i64,
    pub cash_balance: i64,
    pub equity_fv: i64,
    pub bonds_fv: i64,
    pub property_fv: i64,
    pub equity_bv: i64,
    pub bonds_bv: i64,
    pub property_bv: i64,
    pub unrealized_gain: i64,
    pub deferred_tax: i64,
    pub portfolio_revenue: i64,
    pub portfolio_basis: i64,
    pub portfolio_income: i64,
    pub portfolio_tax: i64,
    pub investment_value: i64,
    pub exit_tax: i64,
    pub net_value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRow {
    pub year: u32,
    pub investment_value: i64,
    pub exit_tax: i64,
    pub net_value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    records: Vec<YearRecord>,
}

impl Projection {
    pub(crate) fn new(records: Vec<YearRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[YearRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&YearRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_integer_records(&self) -> Vec<IntegerYearRecord> {
        self.records.iter().map(YearRecord::to_integer).collect()
    }

    pub fn chart_rows(&self) -> Vec<ChartRow> {
        self.records.iter().map(YearRecord::chart_row).collect()
    }
}

// `as` truncates toward zero and saturates at the i64 bounds.
fn truncate(value: f64) -> i64 {
    value as i64
}
