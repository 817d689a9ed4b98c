//! Payroll distributions and employment contracts.

use chrono::NaiveDate;
use peopledesk_store::{RecordId, Result, StoreError};
use serde::{Deserialize, Serialize};

use crate::record::{Record, Validate};
use crate::validate;

/// One payment to one employee for one pay period. Amounts are minor units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollDistribution {
    /// Paid employee.
    pub employee_id: RecordId,
    /// Pay period, `YYYY-MM`.
    pub period: String,
    /// Gross amount.
    pub gross_cents: i64,
    /// Net amount after deductions.
    pub net_cents: i64,
    /// Currency code.
    pub currency: String,
    /// Payment date, once paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_on: Option<NaiveDate>,
}

impl Validate for PayrollDistribution {
    fn validate(&self) -> Result<()> {
        validate::period(Self::COLLECTION, "period", &self.period)?;
        validate::currency(Self::COLLECTION, "currency", &self.currency)?;
        validate::in_range(Self::COLLECTION, "grossCents", self.gross_cents, 0, i64::MAX)?;
        validate::in_range(Self::COLLECTION, "netCents", self.net_cents, 0, self.gross_cents)
    }
}

impl Record for PayrollDistribution {
    const COLLECTION: &'static str = "payroll_distributions";
}

/// Kind of employment contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// Open-ended employment.
    Permanent,
    /// Employment with an end date.
    FixedTerm,
    /// External contractor.
    Contractor,
}

/// An employment contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    /// Contracted employee.
    pub employee_id: RecordId,
    /// Contract kind.
    pub kind: ContractKind,
    /// First day covered.
    pub start_date: NaiveDate,
    /// Last day covered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Annual salary in minor units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_cents: Option<i64>,
}

impl Validate for Contract {
    fn validate(&self) -> Result<()> {
        validate::date_order(Self::COLLECTION, "endDate", self.start_date, self.end_date)?;
        if self.kind == ContractKind::FixedTerm && self.end_date.is_none() {
            return Err(StoreError::validation(
                Some(Self::COLLECTION),
                "endDate",
                "fixed-term contracts need an end date",
            ));
        }
        if let Some(salary) = self.salary_cents {
            validate::in_range(Self::COLLECTION, "salaryCents", salary, 0, i64::MAX)?;
        }
        Ok(())
    }
}

impl Record for Contract {
    const COLLECTION: &'static str = "contracts";
}
