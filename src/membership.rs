use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{GymError, Result};
use crate::member::{MembershipRecord, MembershipTier, SubscriptionPeriod};
use crate::qr;
use crate::store::{self, FieldChanges, MemberStore};

/// Enrollment form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewMember {
    pub key: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub tier: MembershipTier,
    pub period: SubscriptionPeriod,
    pub amount_paid: f64,
    #[serde(default)]
    pub amount_remaining: f64,
}

/// Renewal form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Renewal {
    pub period: SubscriptionPeriod,
    pub amount_paid: f64,
    #[serde(default)]
    pub amount_remaining: f64,
}

/// Outcome of presenting a member key at the door.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckInResult {
    /// No member has this key.
    InvalidCode,
    /// The subscription ended before today.
    Expired { end_date: NaiveDate },
    /// Entry granted; `record` already carries the incremented count.
    Accepted {
        record: MembershipRecord,
        end_date: NaiveDate,
    },
}

impl CheckInResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CheckInResult::Accepted { .. })
    }
}

fn validate_amounts(paid: f64, remaining: f64) -> Result<()> {
    for (name, value) in [("amount paid", paid), ("remaining amount", remaining)] {
        if !value.is_finite() || value < 0.0 {
            return Err(GymError::Validation(format!(
                "{} must be a non-negative number, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

/// Builds the record for a new member starting today.
///
/// The key is trimmed so it matches what the scanner reads back from the
/// printed code. Fails with `DuplicateKey` if `records` already holds it.
pub fn create_member(
    records: &[MembershipRecord],
    input: &NewMember,
    today: NaiveDate,
) -> Result<MembershipRecord> {
    let key = input.key.trim();
    if key.is_empty() {
        return Err(GymError::Validation("member name cannot be empty".to_string()));
    }
    if key.chars().any(char::is_control) {
        return Err(GymError::Validation(
            "member name cannot contain control characters".to_string(),
        ));
    }
    validate_amounts(input.amount_paid, input.amount_remaining)?;
    if store::find_by_key(records, key).is_some() {
        return Err(GymError::DuplicateKey(key.to_string()));
    }

    Ok(MembershipRecord {
        key: key.to_string(),
        check_in_count: 0,
        start_date: today,
        end_date: input.period.add_to(today)?,
        amount_paid: input.amount_paid,
        amount_remaining: input.amount_remaining,
        phone: input.phone.trim().to_string(),
        tier: input.tier,
    })
}

/// Decides whether `key` may enter today.
///
/// The end date itself is still a valid day. On acceptance the returned
/// record has its counter incremented; persisting it is up to the caller.
pub fn validate_check_in(records: &[MembershipRecord], key: &str, today: NaiveDate) -> CheckInResult {
    match store::find_by_key(records, key) {
        None => CheckInResult::InvalidCode,
        Some(record) if !record.is_active(today) => CheckInResult::Expired {
            end_date: record.end_date,
        },
        Some(record) => {
            let mut record = record.clone();
            record.check_in_count = record.check_in_count.saturating_add(1);
            CheckInResult::Accepted {
                end_date: record.end_date,
                record,
            }
        }
    }
}

/// Computes the renewed record for `key`.
///
/// The new window runs from the later of today and the current end date, so
/// an early renewal stacks onto the remaining time while a lapsed member
/// starts again from today. Payment fields are replaced, not added to.
pub fn renew_membership(
    records: &[MembershipRecord],
    key: &str,
    renewal: &Renewal,
    today: NaiveDate,
) -> Result<MembershipRecord> {
    validate_amounts(renewal.amount_paid, renewal.amount_remaining)?;
    let current = store::find_by_key(records, key).ok_or_else(|| GymError::NotFound(key.to_string()))?;

    let anchor = today.max(current.end_date);
    let mut renewed = current.clone();
    renewed.end_date = renewal.period.add_to(anchor)?;
    renewed.amount_paid = renewal.amount_paid;
    renewed.amount_remaining = renewal.amount_remaining;
    Ok(renewed)
}

/// Front-desk session: the store handle plus the last durable table.
///
/// Every mutating call computes a new table, saves it, and only then swaps
/// it in. A failed save leaves the session on the previous table.
#[derive(Debug)]
pub struct Session {
    store: MemberStore,
    records: Vec<MembershipRecord>,
}

impl Session {
    pub fn open(store: MemberStore) -> Result<Self> {
        let records = store.load_all()?;
        info!(
            "opened {} with {} members",
            store.path().display(),
            records.len()
        );
        Ok(Session { store, records })
    }

    pub fn store(&self) -> &MemberStore {
        &self.store
    }

    pub fn records(&self) -> &[MembershipRecord] {
        &self.records
    }

    pub fn find(&self, key: &str) -> Option<&MembershipRecord> {
        store::find_by_key(&self.records, key)
    }

    /// Re-reads the file, picking up edits made outside this session.
    pub fn reload(&mut self) -> Result<()> {
        self.records = self.store.load_all()?;
        Ok(())
    }

    fn commit(&mut self, records: Vec<MembershipRecord>) -> Result<()> {
        self.store.save_all(&records)?;
        self.records = records;
        Ok(())
    }

    pub fn create_member(&mut self, input: &NewMember, today: NaiveDate) -> Result<MembershipRecord> {
        let record = create_member(&self.records, input, today)?;
        let records = store::upsert(self.records.clone(), record.clone())?;
        self.commit(records)?;
        info!(
            "enrolled '{}' ({}, {}) until {}",
            record.key, record.tier, input.period, record.end_date
        );
        Ok(record)
    }

    pub fn check_in(&mut self, key: &str, today: NaiveDate) -> Result<CheckInResult> {
        let result = validate_check_in(&self.records, key, today);
        match &result {
            CheckInResult::Accepted { record, end_date } => {
                let changes = FieldChanges {
                    check_in_count: Some(record.check_in_count),
                    ..FieldChanges::default()
                };
                let records = store::update_fields(self.records.clone(), key, &changes)?;
                self.commit(records)?;
                info!(
                    "check-in accepted for '{}' (visit {}, valid until {})",
                    key, record.check_in_count, end_date
                );
            }
            CheckInResult::Expired { end_date } => {
                info!("check-in refused for '{}': expired on {}", key, end_date);
            }
            CheckInResult::InvalidCode => {
                info!("check-in refused: unknown code '{}'", key);
            }
        }
        Ok(result)
    }

    /// Checks in every payload decoded from one camera frame, in order.
    ///
    /// A frame without any readable code yields an empty list.
    pub fn scan_frame(
        &mut self,
        frame: &[u8],
        today: NaiveDate,
    ) -> Result<Vec<(String, CheckInResult)>> {
        let payloads = qr::decode_frame(frame)?;
        let mut results = Vec::with_capacity(payloads.len());
        for key in payloads {
            let result = self.check_in(&key, today)?;
            results.push((key, result));
        }
        Ok(results)
    }

    pub fn renew(&mut self, key: &str, renewal: &Renewal, today: NaiveDate) -> Result<MembershipRecord> {
        let renewed = renew_membership(&self.records, key, renewal, today)?;
        let changes = FieldChanges {
            end_date: Some(renewed.end_date),
            amount_paid: Some(renewed.amount_paid),
            amount_remaining: Some(renewed.amount_remaining),
            ..FieldChanges::default()
        };
        let records = store::update_fields(self.records.clone(), key, &changes)?;
        if let Err(e) = self.commit(records) {
            warn!("renewal of '{}' not saved: {}", key, e);
            return Err(e);
        }
        info!(
            "renewed '{}' by {} until {}",
            key, renewal.period, renewed.end_date
        );
        Ok(renewed)
    }
}
