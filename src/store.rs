use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::{Days, NaiveDate};
use log::{debug, warn};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{GymError, Result};
use crate::member::{MembershipRecord, MembershipTier};

/// Header names of the member table, in the order they are written.
///
/// These match the data files already in use at the front desk, so an
/// existing `gym_data.xlsx` loads without conversion.
pub const COLUMNS: [&str; 8] = [
    "QR Code",
    "Count",
    "Start Date",
    "End Date",
    "Paid",
    "remaining",
    "Phone",
    "Membership Type",
];

const KEY: usize = 0;
const COUNT: usize = 1;
const START: usize = 2;
const END: usize = 3;
const PAID: usize = 4;
const REMAINING: usize = 5;
const PHONE: usize = 6;
const TIER: usize = 7;

const SHEET_NAME: &str = "Members";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Handle on the spreadsheet file that is the system of record.
///
/// The store keeps no rows in memory. Every load reads the whole file and
/// every save replaces it.
#[derive(Clone, Debug)]
pub struct MemberStore {
    path: PathBuf,
}

impl MemberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MemberStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole table in file order.
    ///
    /// A missing file is an empty table. Anything that cannot be read or
    /// parsed is `StorageUnavailable`.
    pub fn load_all(&self) -> Result<Vec<MembershipRecord>> {
        if !self.path.exists() {
            debug!("{} does not exist yet, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.path)
            .map_err(|e: calamine::XlsxError| self.unavailable(e.to_string()))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| self.unavailable("workbook has no sheets"))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| self.unavailable(e.to_string()))?;

        let records = parse_rows(range.rows()).map_err(|reason| self.unavailable(reason))?;

        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.key.as_str()) {
                warn!(
                    "duplicate member key '{}' in {}; lookups use the first row",
                    record.key,
                    self.path.display()
                );
            }
        }

        debug!("loaded {} members from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Replaces the persisted table with `records`.
    ///
    /// The workbook is written to a temporary file next to the target and
    /// renamed over it, so readers see either the old or the new table.
    pub fn save_all(&self, records: &[MembershipRecord]) -> Result<()> {
        let buffer = write_workbook(records).map_err(|e| self.write_failed(e))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.write_failed(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_failed(e))?;
        tmp.write_all(&buffer).map_err(|e| self.write_failed(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_failed(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_failed(e.error))?;

        debug!("saved {} members to {}", records.len(), self.path.display());
        Ok(())
    }

    fn unavailable(&self, reason: impl Into<String>) -> GymError {
        GymError::StorageUnavailable {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn write_failed(&self, reason: impl ToString) -> GymError {
        GymError::StorageWriteFailed {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// First record whose key matches exactly.
pub fn find_by_key<'a>(records: &'a [MembershipRecord], key: &str) -> Option<&'a MembershipRecord> {
    records.iter().find(|record| record.key == key)
}

/// Appends `record` to the table.
///
/// Keys are unique, so a record whose key is already present is rejected
/// rather than added as a second row.
pub fn upsert(
    mut records: Vec<MembershipRecord>,
    record: MembershipRecord,
) -> Result<Vec<MembershipRecord>> {
    if find_by_key(&records, &record.key).is_some() {
        return Err(GymError::DuplicateKey(record.key));
    }
    records.push(record);
    Ok(records)
}

/// Field replacements for [`update_fields`]. `None` leaves a field as is.
///
/// Key and start date are deliberately absent: neither changes after
/// enrollment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldChanges {
    pub check_in_count: Option<u32>,
    pub end_date: Option<NaiveDate>,
    pub amount_paid: Option<f64>,
    pub amount_remaining: Option<f64>,
    pub phone: Option<String>,
    pub tier: Option<MembershipTier>,
}

impl FieldChanges {
    pub fn apply_to(&self, record: &mut MembershipRecord) {
        if let Some(count) = self.check_in_count {
            record.check_in_count = count;
        }
        if let Some(end) = self.end_date {
            record.end_date = end;
        }
        if let Some(paid) = self.amount_paid {
            record.amount_paid = paid;
        }
        if let Some(remaining) = self.amount_remaining {
            record.amount_remaining = remaining;
        }
        if let Some(phone) = &self.phone {
            record.phone = phone.clone();
        }
        if let Some(tier) = self.tier {
            record.tier = tier;
        }
    }
}

/// Returns the table with the first record matching `key` changed.
pub fn update_fields(
    mut records: Vec<MembershipRecord>,
    key: &str,
    changes: &FieldChanges,
) -> Result<Vec<MembershipRecord>> {
    let record = records
        .iter_mut()
        .find(|record| record.key == key)
        .ok_or_else(|| GymError::NotFound(key.to_string()))?;
    changes.apply_to(record);
    Ok(records)
}

/// Serialises the table as an xlsx workbook held in memory.
pub fn write_workbook(records: &[MembershipRecord]) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *name)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, KEY as u16, record.key.as_str())?;
        worksheet.write_number(row, COUNT as u16, f64::from(record.check_in_count))?;
        worksheet.write_string(
            row,
            START as u16,
            record.start_date.format(DATE_FORMAT).to_string().as_str(),
        )?;
        worksheet.write_string(
            row,
            END as u16,
            record.end_date.format(DATE_FORMAT).to_string().as_str(),
        )?;
        worksheet.write_number(row, PAID as u16, record.amount_paid)?;
        worksheet.write_number(row, REMAINING as u16, record.amount_remaining)?;
        worksheet.write_string(row, PHONE as u16, record.phone.as_str())?;
        worksheet.write_string(row, TIER as u16, record.tier.as_str())?;
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer()
}

// Maps each known column to its position in the header row.
fn locate_columns(header: &[Data]) -> std::result::Result<[Option<usize>; 8], String> {
    let mut positions = [None; 8];
    for (pos, cell) in header.iter().enumerate() {
        if let Data::String(name) = cell {
            if let Some(idx) = COLUMNS.iter().position(|c| *c == name.trim()) {
                if positions[idx].is_none() {
                    positions[idx] = Some(pos);
                }
            }
        }
    }

    for required in [KEY, COUNT, START, END] {
        if positions[required].is_none() {
            return Err(format!("missing column '{}'", COLUMNS[required]));
        }
    }
    Ok(positions)
}

fn parse_rows<'a>(
    mut rows: impl Iterator<Item = &'a [Data]>,
) -> std::result::Result<Vec<MembershipRecord>, String> {
    let header = match rows.next() {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };
    let columns = locate_columns(header)?;

    let mut records = Vec::new();
    for (i, row) in rows.enumerate() {
        // Spreadsheet row number, counting the header as row 1.
        let line = i + 2;
        if row.iter().all(is_blank) {
            continue;
        }
        let cell = |idx: usize| columns[idx].and_then(|pos| row.get(pos));
        let at_row = |e: String| format!("row {}: {}", line, e);

        let key = text(cell(KEY));
        if key.is_empty() {
            return Err(at_row("empty member key".to_string()));
        }

        let tier_text = text(cell(TIER));
        let tier = if tier_text.is_empty() {
            MembershipTier::default()
        } else {
            tier_text.parse().map_err(|e: GymError| at_row(e.to_string()))?
        };

        records.push(MembershipRecord {
            key,
            check_in_count: parse_count(cell(COUNT)).map_err(at_row)?,
            start_date: parse_date(cell(START)).map_err(at_row)?,
            end_date: parse_date(cell(END)).map_err(at_row)?,
            amount_paid: parse_amount(cell(PAID)).map_err(at_row)?,
            amount_remaining: parse_amount(cell(REMAINING)).map_err(at_row)?,
            phone: text(cell(PHONE)),
            tier,
        });
    }
    Ok(records)
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn text(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) | Some(Data::DateTimeIso(s)) => s.trim().to_string(),
        // Phone numbers typed into Excel come back as numbers.
        Some(Data::Float(f)) if f.fract() == 0.0 => format!("{:.0}", f),
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn parse_count(cell: Option<&Data>) -> std::result::Result<u32, String> {
    match cell {
        None | Some(Data::Empty) => Ok(0),
        Some(Data::Int(i)) => u32::try_from(*i).map_err(|_| format!("invalid count {}", i)),
        Some(Data::Float(f)) if *f >= 0.0 && f.fract() == 0.0 && *f <= f64::from(u32::MAX) => {
            Ok(*f as u32)
        }
        Some(Data::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| format!("invalid count '{}'", s)),
        Some(other) => Err(format!("invalid count {:?}", other)),
    }
}

fn parse_amount(cell: Option<&Data>) -> std::result::Result<f64, String> {
    let amount = match cell {
        None | Some(Data::Empty) => return Ok(0.0),
        Some(Data::Int(i)) => *i as f64,
        Some(Data::Float(f)) => *f,
        Some(Data::String(s)) if s.trim().is_empty() => return Ok(0.0),
        Some(Data::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| format!("invalid amount '{}'", s))?,
        Some(other) => return Err(format!("invalid amount {:?}", other)),
    };
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("invalid amount {}", amount));
    }
    Ok(amount)
}

fn parse_date(cell: Option<&Data>) -> std::result::Result<NaiveDate, String> {
    match cell {
        Some(Data::String(s)) | Some(Data::DateTimeIso(s)) => {
            let s = s.trim();
            // Accept "2024-01-31" as well as "2024-01-31 00:00:00".
            let day = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(day, DATE_FORMAT).map_err(|_| format!("invalid date '{}'", s))
        }
        Some(Data::Float(f)) if *f >= 0.0 => excel_serial_date(*f as u64),
        Some(Data::Int(i)) if *i >= 0 => excel_serial_date(*i as u64),
        Some(other) => Err(format!("invalid date {:?}", other)),
        None => Err("missing date".to_string()),
    }
}

// Excel day numbers count from 1899-12-30.
fn excel_serial_date(days: u64) -> std::result::Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_days(Days::new(days)))
        .ok_or_else(|| format!("invalid date serial {}", days))
}
