use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GymError, Result};

/// One row of the member table.
///
/// `key` is both the member's identity and the literal QR payload.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MembershipRecord {
    pub key: String,
    pub check_in_count: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_paid: f64,
    pub amount_remaining: f64,
    pub phone: String,
    pub tier: MembershipTier,
}

impl MembershipRecord {
    /// A member is active through the end date inclusive.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        today <= self.end_date
    }

    pub fn is_paid_in_full(&self) -> bool {
        self.amount_remaining == 0.0
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum MembershipTier {
    #[default]
    Regular,
    Premium,
    #[serde(rename = "VIP")]
    Vip,
}

impl MembershipTier {
    pub const ALL: [MembershipTier; 3] = [
        MembershipTier::Regular,
        MembershipTier::Premium,
        MembershipTier::Vip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Regular => "Regular",
            MembershipTier::Premium => "Premium",
            MembershipTier::Vip => "VIP",
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipTier {
    type Err = GymError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "regular" => Ok(MembershipTier::Regular),
            "premium" => Ok(MembershipTier::Premium),
            "vip" => Ok(MembershipTier::Vip),
            other => Err(GymError::Validation(format!(
                "unknown membership tier '{}'",
                other
            ))),
        }
    }
}

/// Subscription length. Only four lengths are sold.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(try_from = "u32", into = "u32")]
pub enum SubscriptionPeriod {
    OneMonth,
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl SubscriptionPeriod {
    pub const ALL: [SubscriptionPeriod; 4] = [
        SubscriptionPeriod::OneMonth,
        SubscriptionPeriod::ThreeMonths,
        SubscriptionPeriod::SixMonths,
        SubscriptionPeriod::TwelveMonths,
    ];

    pub fn months(&self) -> u32 {
        match self {
            SubscriptionPeriod::OneMonth => 1,
            SubscriptionPeriod::ThreeMonths => 3,
            SubscriptionPeriod::SixMonths => 6,
            SubscriptionPeriod::TwelveMonths => 12,
        }
    }

    /// Adds this period to `date` using calendar months.
    ///
    /// The day of month is kept where it exists and clamped to the last day
    /// of the target month otherwise, so Jan 31 + 1 month is Feb 28 or 29.
    pub fn add_to(&self, date: NaiveDate) -> Result<NaiveDate> {
        date.checked_add_months(Months::new(self.months()))
            .ok_or_else(|| {
                GymError::Validation(format!(
                    "{} plus {} months is out of range",
                    date,
                    self.months()
                ))
            })
    }
}

impl TryFrom<u32> for SubscriptionPeriod {
    type Error = GymError;

    fn try_from(months: u32) -> Result<Self> {
        match months {
            1 => Ok(SubscriptionPeriod::OneMonth),
            3 => Ok(SubscriptionPeriod::ThreeMonths),
            6 => Ok(SubscriptionPeriod::SixMonths),
            12 => Ok(SubscriptionPeriod::TwelveMonths),
            other => Err(GymError::Validation(format!(
                "subscription period must be 1, 3, 6 or 12 months, got {}",
                other
            ))),
        }
    }
}

impl From<SubscriptionPeriod> for u32 {
    fn from(period: SubscriptionPeriod) -> u32 {
        period.months()
    }
}

impl fmt::Display for SubscriptionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let months = self.months();
        write!(f, "{} Month{}", months, if months > 1 { "s" } else { "" })
    }
}
