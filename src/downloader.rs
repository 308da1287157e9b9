use crate::error::{GymError, Result};
use crate::member::MembershipRecord;
use crate::store::{self, COLUMNS};

/// Convert the member table to CSV format
///
/// Produces a UTF-8 document with a header row followed by one row per member
/// in table order. Columns and header names are the same as the stored
/// workbook, and fields containing commas, quotes or newlines are quoted.
///
/// # Arguments
/// * `records` - The member table to export
///
/// # Returns
/// * `Result<Vec<u8>>` - CSV content as bytes or an export error
///
/// # Examples
/// ```
/// use gymdesk::downloader::to_csv;
///
/// let csv = to_csv(&[]).unwrap();
/// assert!(String::from_utf8(csv).unwrap().starts_with("QR Code,Count"));
/// ```
pub fn to_csv(records: &[MembershipRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS).map_err(export_error)?;

    for record in records {
        writer
            .write_record([
                record.key.clone(),
                record.check_in_count.to_string(),
                record.start_date.to_string(),
                record.end_date.to_string(),
                record.amount_paid.to_string(),
                record.amount_remaining.to_string(),
                record.phone.clone(),
                record.tier.to_string(),
            ])
            .map_err(export_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| GymError::Export(e.to_string()))
}

/// Convert the member table to XLSX format
///
/// The workbook is identical to the one the store writes, so a downloaded
/// export can be dropped in as a data file.
///
/// # Arguments
/// * `records` - The member table to export
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes or an export error
pub fn to_xlsx(records: &[MembershipRecord]) -> Result<Vec<u8>> {
    store::write_workbook(records).map_err(|e| GymError::Export(e.to_string()))
}

fn export_error(e: csv::Error) -> GymError {
    GymError::Export(e.to_string())
}
