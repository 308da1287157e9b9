use chrono::NaiveDate;
use gymdesk::analytics::{self, MonthlyCount, PaymentStatus};
use gymdesk::downloader;
use gymdesk::{MembershipRecord, MembershipTier};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn record(key: &str, count: u32, start: NaiveDate, end: NaiveDate, paid: f64, remaining: f64) -> MembershipRecord {
    MembershipRecord {
        key: key.to_string(),
        check_in_count: count,
        start_date: start,
        end_date: end,
        amount_paid: paid,
        amount_remaining: remaining,
        phone: String::new(),
        tier: MembershipTier::Regular,
    }
}

fn table() -> Vec<MembershipRecord> {
    let mut vip = record("Rana", 20, date(2024, 2, 3), date(2024, 8, 3), 1500.0, 0.0);
    vip.tier = MembershipTier::Vip;
    vec![
        record("Ali", 4, date(2024, 1, 5), date(2024, 2, 5), 300.0, 0.0),
        record("Bassem", 9, date(2024, 1, 20), date(2024, 4, 20), 800.0, 100.0),
        vip,
        record("Dalia", 9, date(2023, 11, 30), date(2024, 3, 1), 300.0, 0.0),
    ]
}

#[test]
fn summary_counts_active_through_end_date() {
    let s = analytics::summary(&table(), date(2024, 3, 1));
    assert_eq!(s.total_members, 4);
    // Dalia ends today and still counts as active; Ali has lapsed.
    assert_eq!(s.active_members, 3);
    assert_eq!(s.expired_members, 1);
    assert_eq!(s.total_revenue, 2900.0);
    assert_eq!(s.outstanding, 100.0);
    assert_eq!(s.average_check_ins, 10.5);
}

#[test]
fn summary_of_empty_table_is_zero() {
    let s = analytics::summary(&[], date(2024, 3, 1));
    assert_eq!(s.total_members, 0);
    assert_eq!(s.average_check_ins, 0.0);
}

#[test]
fn signups_grouped_by_start_month_in_order() {
    assert_eq!(
        analytics::signups_by_month(&table()),
        vec![
            MonthlyCount { month: "2023-11".to_string(), count: 1 },
            MonthlyCount { month: "2024-01".to_string(), count: 2 },
            MonthlyCount { month: "2024-02".to_string(), count: 1 },
        ]
    );
}

#[test]
fn top_check_ins_sorted_with_stable_ties() {
    let top = analytics::top_check_ins(&table(), 3);
    let keys: Vec<&str> = top.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(keys, vec!["Rana", "Bassem", "Dalia"]);
    assert_eq!(analytics::top_check_ins(&table(), 10).len(), 4);
}

#[test]
fn payment_status_and_tiers() {
    assert_eq!(
        analytics::payment_status(&table()),
        PaymentStatus { paid_in_full: 3, partial: 1 }
    );

    let tiers = analytics::tier_breakdown(&table());
    let counts: Vec<(MembershipTier, usize)> = tiers.iter().map(|t| (t.tier, t.count)).collect();
    assert_eq!(
        counts,
        vec![
            (MembershipTier::Regular, 3),
            (MembershipTier::Premium, 0),
            (MembershipTier::Vip, 1),
        ]
    );
}

#[test]
fn csv_export_has_header_and_rows_in_table_order() {
    let mut records = table();
    records[0].key = "Ali, Jr.".to_string();
    let csv = String::from_utf8(downloader::to_csv(&records).unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(
        lines[0],
        "QR Code,Count,Start Date,End Date,Paid,remaining,Phone,Membership Type"
    );
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1], "\"Ali, Jr.\",4,2024-01-05,2024-02-05,300,0,,Regular");
    assert!(lines[3].starts_with("Rana,20,"));
    assert!(lines[3].ends_with(",VIP"));
}

#[test]
fn xlsx_export_is_a_zip_workbook() {
    let bytes = downloader::to_xlsx(&table()).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}
