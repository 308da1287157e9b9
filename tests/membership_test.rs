use chrono::NaiveDate;
use gymdesk::{
    CheckInResult, GymError, MemberStore, MembershipRecord, MembershipTier, NewMember, Renewal,
    Session, SubscriptionPeriod, create_member, renew_membership, validate_check_in,
};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_member(key: &str, months: u32) -> NewMember {
    NewMember {
        key: key.to_string(),
        phone: "01012345678".to_string(),
        tier: MembershipTier::Premium,
        period: SubscriptionPeriod::try_from(months).unwrap(),
        amount_paid: 300.0,
        amount_remaining: 50.0,
    }
}

fn member(key: &str, start: NaiveDate, end: NaiveDate) -> MembershipRecord {
    MembershipRecord {
        key: key.to_string(),
        check_in_count: 3,
        start_date: start,
        end_date: end,
        amount_paid: 300.0,
        amount_remaining: 100.0,
        phone: String::new(),
        tier: MembershipTier::Regular,
    }
}

// Session over a fresh file in its own temp dir
fn session() -> (TempDir, Session) {
    let dir = tempfile::tempdir().unwrap();
    let store = MemberStore::new(dir.path().join("gym_data.xlsx"));
    let session = Session::open(store).unwrap();
    (dir, session)
}

#[test]
fn create_sets_window_from_today() {
    let record = create_member(&[], &new_member("Alice", 3), date(2024, 3, 15)).unwrap();
    assert_eq!(record.key, "Alice");
    assert_eq!(record.check_in_count, 0);
    assert_eq!(record.start_date, date(2024, 3, 15));
    assert_eq!(record.end_date, date(2024, 6, 15));
    assert_eq!(record.amount_paid, 300.0);
    assert_eq!(record.amount_remaining, 50.0);
    assert_eq!(record.tier, MembershipTier::Premium);
}

#[test]
fn create_clamps_to_end_of_february() {
    let leap = create_member(&[], &new_member("Alice", 1), date(2024, 1, 31)).unwrap();
    assert_eq!(leap.end_date, date(2024, 2, 29));

    let plain = create_member(&[], &new_member("Alice", 1), date(2023, 1, 31)).unwrap();
    assert_eq!(plain.end_date, date(2023, 2, 28));
}

#[test]
fn create_trims_key_and_rejects_blank_names() {
    let record = create_member(&[], &new_member("  Bob \n", 1), date(2024, 1, 1)).unwrap();
    assert_eq!(record.key, "Bob");

    let err = create_member(&[], &new_member("   ", 1), date(2024, 1, 1)).unwrap_err();
    assert!(matches!(err, GymError::Validation(_)));
}

#[test]
fn create_rejects_control_characters_inside_names() {
    for key in ["Omar\r\nSet-Cookie: x", "Nour\tHassan", "Ali\u{0}"] {
        let err = create_member(&[], &new_member(key, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, GymError::Validation(_)), "{:?}", key);
    }

    let (_dir, mut session) = session();
    assert!(session.create_member(&new_member("Omar\nKhaled", 1), date(2024, 1, 1)).is_err());
    assert!(session.records().is_empty());

    for key in ["سارة", "Zoë Müller"] {
        let record = session.create_member(&new_member(key, 1), date(2024, 1, 1)).unwrap();
        assert_eq!(record.key, key);
    }
}

#[test]
fn create_rejects_negative_or_non_finite_amounts() {
    let mut input = new_member("Carl", 1);
    input.amount_paid = -1.0;
    assert!(matches!(
        create_member(&[], &input, date(2024, 1, 1)),
        Err(GymError::Validation(_))
    ));

    let mut input = new_member("Carl", 1);
    input.amount_remaining = f64::NAN;
    assert!(matches!(
        create_member(&[], &input, date(2024, 1, 1)),
        Err(GymError::Validation(_))
    ));
}

#[test]
fn create_rejects_existing_key() {
    let existing = vec![member("Alice", date(2024, 1, 1), date(2024, 2, 1))];
    let err = create_member(&existing, &new_member("Alice", 1), date(2024, 1, 5)).unwrap_err();
    assert!(matches!(err, GymError::DuplicateKey(ref k) if k == "Alice"));
}

#[test]
fn check_in_outcomes() {
    let records = vec![member("Dina", date(2024, 1, 1), date(2024, 2, 1))];

    assert_eq!(
        validate_check_in(&records, "Nobody", date(2024, 1, 15)),
        CheckInResult::InvalidCode
    );

    assert_eq!(
        validate_check_in(&records, "Dina", date(2024, 2, 2)),
        CheckInResult::Expired {
            end_date: date(2024, 2, 1)
        }
    );

    match validate_check_in(&records, "Dina", date(2024, 1, 15)) {
        CheckInResult::Accepted { record, end_date } => {
            assert_eq!(record.check_in_count, 4);
            assert_eq!(end_date, date(2024, 2, 1));
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
    // The input table is not touched by the decision itself.
    assert_eq!(records[0].check_in_count, 3);
}

#[test]
fn check_in_on_end_date_is_accepted() {
    let records = vec![member("Eve", date(2024, 1, 1), date(2024, 2, 1))];
    assert!(validate_check_in(&records, "Eve", date(2024, 2, 1)).is_accepted());
}

#[test]
fn renew_early_extends_from_current_end() {
    let records = vec![member("Fady", date(2024, 5, 15), date(2024, 6, 15))];
    let renewal = Renewal {
        period: SubscriptionPeriod::OneMonth,
        amount_paid: 250.0,
        amount_remaining: 0.0,
    };
    let renewed = renew_membership(&records, "Fady", &renewal, date(2024, 6, 1)).unwrap();
    assert_eq!(renewed.end_date, date(2024, 7, 15));
    assert_eq!(renewed.start_date, date(2024, 5, 15));
    assert_eq!(renewed.check_in_count, 3);
    assert_eq!(renewed.amount_paid, 250.0);
    assert_eq!(renewed.amount_remaining, 0.0);
}

#[test]
fn renew_after_lapse_restarts_from_today() {
    let records = vec![member("Gina", date(2023, 12, 1), date(2024, 1, 1))];
    let renewal = Renewal {
        period: SubscriptionPeriod::ThreeMonths,
        amount_paid: 700.0,
        amount_remaining: 200.0,
    };
    let renewed = renew_membership(&records, "Gina", &renewal, date(2024, 6, 1)).unwrap();
    assert_eq!(renewed.end_date, date(2024, 9, 1));
}

#[test]
fn renew_unknown_member_is_not_found() {
    let renewal = Renewal {
        period: SubscriptionPeriod::OneMonth,
        amount_paid: 1.0,
        amount_remaining: 0.0,
    };
    let err = renew_membership(&[], "Ghost", &renewal, date(2024, 1, 1)).unwrap_err();
    assert!(matches!(err, GymError::NotFound(_)));
}

#[test]
fn session_counts_every_accepted_check_in() {
    let (_dir, mut session) = session();
    let today = date(2024, 3, 1);
    session.create_member(&new_member("Hana", 1), today).unwrap();

    for _ in 0..5 {
        assert!(session.check_in("Hana", today).unwrap().is_accepted());
    }
    assert_eq!(session.find("Hana").unwrap().check_in_count, 5);

    // Refused check-ins leave the counter alone.
    let later = date(2024, 4, 2);
    assert!(!session.check_in("Hana", later).unwrap().is_accepted());
    assert!(!session.check_in("Nobody", today).unwrap().is_accepted());

    // Each accepted check-in is already on disk.
    let reopened = Session::open(session.store().clone()).unwrap();
    assert_eq!(reopened.find("Hana").unwrap().check_in_count, 5);
}

#[test]
fn session_persists_creation_and_renewal() {
    let (_dir, mut session) = session();
    session
        .create_member(&new_member("Ivan", 1), date(2024, 1, 10))
        .unwrap();
    let renewed = session
        .renew(
            "Ivan",
            &Renewal {
                period: SubscriptionPeriod::SixMonths,
                amount_paid: 1200.0,
                amount_remaining: 0.0,
            },
            date(2024, 1, 20),
        )
        .unwrap();
    assert_eq!(renewed.end_date, date(2024, 8, 10));

    let reopened = Session::open(session.store().clone()).unwrap();
    let ivan = reopened.find("Ivan").unwrap();
    assert_eq!(ivan.end_date, date(2024, 8, 10));
    assert_eq!(ivan.start_date, date(2024, 1, 10));
    assert_eq!(ivan.amount_paid, 1200.0);
}

#[test]
fn session_rejects_duplicate_enrollment() {
    let (_dir, mut session) = session();
    let today = date(2024, 1, 1);
    session.create_member(&new_member("Jana", 1), today).unwrap();
    let err = session.create_member(&new_member("Jana", 3), today).unwrap_err();
    assert!(matches!(err, GymError::DuplicateKey(_)));
    assert_eq!(session.records().len(), 1);
}

#[test]
fn failed_save_keeps_last_durable_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gym_data.xlsx");
    let mut session = Session::open(MemberStore::new(&path)).unwrap();

    // A directory in place of the data file makes the final rename fail.
    std::fs::create_dir(&path).unwrap();

    let err = session
        .create_member(&new_member("Karim", 1), date(2024, 1, 1))
        .unwrap_err();
    assert!(matches!(err, GymError::StorageWriteFailed { .. }), "{}", err);
    assert!(session.records().is_empty());
    assert!(session.find("Karim").is_none());
}

#[test]
fn reload_picks_up_edits_made_outside_the_session() {
    let (dir, mut session) = session();
    session.create_member(&new_member("Hana", 1), date(2024, 1, 1)).unwrap();

    let other = MemberStore::new(dir.path().join("gym_data.xlsx"));
    let mut records = other.load_all().unwrap();
    records.push(member("Youssef", date(2024, 1, 2), date(2024, 2, 2)));
    other.save_all(&records).unwrap();

    assert!(session.find("Youssef").is_none());
    session.reload().unwrap();
    assert_eq!(session.records().len(), 2);
    assert_eq!(session.find("Youssef").unwrap().check_in_count, 3);
}
