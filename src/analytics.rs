use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::member::{MembershipRecord, MembershipTier};

/// Headline figures for the dashboard.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub total_members: usize,
    pub active_members: usize,
    pub expired_members: usize,
    pub total_revenue: f64,
    pub outstanding: f64,
    pub average_check_ins: f64,
}

/// New enrollments in one calendar month, keyed `YYYY-MM`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    pub month: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberCheckIns {
    pub key: String,
    pub check_in_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PaymentStatus {
    pub paid_in_full: usize,
    pub partial: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TierCount {
    pub tier: MembershipTier,
    pub count: usize,
}

/// Everything the analytics page shows, computed in one pass per figure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub signups_by_month: Vec<MonthlyCount>,
    pub top_check_ins: Vec<MemberCheckIns>,
    pub payment_status: PaymentStatus,
    pub tiers: Vec<TierCount>,
}

pub const TOP_CHECK_INS: usize = 10;

pub fn summary(records: &[MembershipRecord], today: NaiveDate) -> Summary {
    let total_members = records.len();
    let active_members = records.iter().filter(|r| r.is_active(today)).count();
    let total_check_ins: u64 = records.iter().map(|r| u64::from(r.check_in_count)).sum();
    let average_check_ins = if total_members == 0 {
        0.0
    } else {
        total_check_ins as f64 / total_members as f64
    };

    Summary {
        total_members,
        active_members,
        expired_members: total_members - active_members,
        total_revenue: records.iter().map(|r| r.amount_paid).sum(),
        outstanding: records.iter().map(|r| r.amount_remaining).sum(),
        average_check_ins,
    }
}

pub fn signups_by_month(records: &[MembershipRecord]) -> Vec<MonthlyCount> {
    let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for record in records {
        *months
            .entry((record.start_date.year(), record.start_date.month()))
            .or_default() += 1;
    }
    months
        .into_iter()
        .map(|((year, month), count)| MonthlyCount {
            month: format!("{:04}-{:02}", year, month),
            count,
        })
        .collect()
}

/// Up to `limit` members with the most check-ins. Ties keep table order.
pub fn top_check_ins(records: &[MembershipRecord], limit: usize) -> Vec<MemberCheckIns> {
    let mut ranked: Vec<&MembershipRecord> = records.iter().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.check_in_count.cmp(&a.check_in_count));
    ranked
        .into_iter()
        .take(limit)
        .map(|r| MemberCheckIns {
            key: r.key.clone(),
            check_in_count: r.check_in_count,
        })
        .collect()
}

pub fn payment_status(records: &[MembershipRecord]) -> PaymentStatus {
    let paid_in_full = records.iter().filter(|r| r.is_paid_in_full()).count();
    PaymentStatus {
        paid_in_full,
        partial: records.len() - paid_in_full,
    }
}

/// Member count per tier, listing every tier even when empty.
pub fn tier_breakdown(records: &[MembershipRecord]) -> Vec<TierCount> {
    MembershipTier::ALL
        .iter()
        .map(|tier| TierCount {
            tier: *tier,
            count: records.iter().filter(|r| r.tier == *tier).count(),
        })
        .collect()
}

pub fn report(records: &[MembershipRecord], today: NaiveDate) -> Report {
    Report {
        summary: summary(records, today),
        signups_by_month: signups_by_month(records),
        top_check_ins: top_check_ins(records, TOP_CHECK_INS),
        payment_status: payment_status(records),
        tiers: tier_breakdown(records),
    }
}
