#![cfg(not(tarpaulin_include))]

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use gymdesk::analytics;
use gymdesk::config::{Config, init_logging};
use gymdesk::downloader;
use gymdesk::{CheckInResult, MembershipRecord, MembershipTier, NewMember, Renewal, Session, SubscriptionPeriod};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gymdesk", about = "Gym membership front desk")]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enroll a new member and write their QR code
    Create {
        /// Member name, also the QR payload
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "regular")]
        tier: MembershipTier,
        /// Subscription length in months (1, 3, 6 or 12)
        #[arg(long, default_value_t = 1)]
        months: u32,
        #[arg(long, default_value_t = 0.0)]
        paid: f64,
        #[arg(long, default_value_t = 0.0)]
        remaining: f64,
        /// Where to write the PNG; defaults to member_<name>.png
        #[arg(long)]
        qr_out: Option<PathBuf>,
    },
    /// Check a member in by key
    CheckIn { key: String },
    /// Check in every member whose code appears in an image
    Scan { image: PathBuf },
    /// Renew a subscription
    Renew {
        key: String,
        #[arg(long, default_value_t = 1)]
        months: u32,
        #[arg(long)]
        paid: f64,
        #[arg(long, default_value_t = 0.0)]
        remaining: f64,
    },
    /// Show one member
    Show { key: String },
    /// List all members
    List,
    /// Write the QR code of an existing member
    Qr {
        key: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print dashboard figures
    Stats,
    /// Export the member table
    Export {
        #[arg(long, conflicts_with = "xlsx", required_unless_present = "xlsx")]
        csv: Option<PathBuf>,
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },
}

fn print_member(record: &MembershipRecord) {
    println!("Member:          {}", record.key);
    println!("Phone:           {}", record.phone);
    println!("Membership Type: {}", record.tier);
    println!("Start Date:      {}", record.start_date);
    println!("End Date:        {}", record.end_date);
    println!("Check-ins:       {}", record.check_in_count);
    println!("Paid:            {}", record.amount_paid);
    println!("Remaining:       {}", record.amount_remaining);
}

// Returns false when the member was refused entry.
fn print_check_in(key: &str, result: &CheckInResult) -> bool {
    match result {
        CheckInResult::Accepted { end_date, .. } => {
            println!("Welcome {}! Valid until {}", key, end_date);
            true
        }
        CheckInResult::Expired { end_date } => {
            println!("{}: subscription has expired ({})", key, end_date);
            false
        }
        CheckInResult::InvalidCode => {
            println!("{}: invalid QR code", key);
            false
        }
    }
}

fn qr_path(out: Option<PathBuf>, key: &str) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from(format!("member_{}.png", key)))
}

fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let qr_options = cli.config.qr_options();
    let mut session = Session::open(cli.config.store())?;

    match cli.command {
        Command::Create {
            name,
            phone,
            tier,
            months,
            paid,
            remaining,
            qr_out,
        } => {
            let input = NewMember {
                key: name,
                phone,
                tier,
                period: SubscriptionPeriod::try_from(months)?,
                amount_paid: paid,
                amount_remaining: remaining,
            };
            let record = session.create_member(&input, today)?;
            let path = qr_path(qr_out, &record.key);
            fs::write(&path, gymdesk::qr::png(&record.key, &qr_options)?)?;
            println!("Membership created successfully!");
            print_member(&record);
            println!("QR code written to {}", path.display());
        }
        Command::CheckIn { key } => {
            let key = key.trim();
            let result = session.check_in(key, today)?;
            return Ok(print_check_in(key, &result));
        }
        Command::Scan { image } => {
            let frame = fs::read(&image)?;
            let results = session.scan_frame(&frame, today)?;
            if results.is_empty() {
                println!("No QR code found in {}", image.display());
            }
            let mut all_accepted = true;
            for (key, result) in &results {
                all_accepted &= print_check_in(key, result);
            }
            return Ok(all_accepted);
        }
        Command::Renew {
            key,
            months,
            paid,
            remaining,
        } => {
            let renewal = Renewal {
                period: SubscriptionPeriod::try_from(months)?,
                amount_paid: paid,
                amount_remaining: remaining,
            };
            let record = session.renew(&key, &renewal, today)?;
            println!("Membership for {} renewed successfully!", record.key);
            println!("New end date: {}", record.end_date);
        }
        Command::Show { key } => match session.find(&key) {
            Some(record) => print_member(record),
            None => return Err(gymdesk::GymError::NotFound(key).into()),
        },
        Command::List => {
            for record in session.records() {
                let status = if record.is_active(today) { "active" } else { "expired" };
                println!(
                    "{:<24} {:<8} {:>5} check-ins  until {}  ({})",
                    record.key, record.tier, record.check_in_count, record.end_date, status
                );
            }
        }
        Command::Qr { key, out } => {
            if session.find(&key).is_none() {
                return Err(gymdesk::GymError::NotFound(key).into());
            }
            let path = qr_path(out, &key);
            fs::write(&path, gymdesk::qr::png(&key, &qr_options)?)?;
            println!("QR code written to {}", path.display());
        }
        Command::Stats => {
            let report = analytics::report(session.records(), today);
            let s = &report.summary;
            println!("Total Members:   {}", s.total_members);
            println!("Active Members:  {}", s.active_members);
            println!("Expired Members: {}", s.expired_members);
            println!("Total Revenue:   {}", s.total_revenue);
            println!("Outstanding:     {}", s.outstanding);
            println!("Avg Check-ins:   {:.1}", s.average_check_ins);
            println!();
            println!("New memberships by month:");
            for month in &report.signups_by_month {
                println!("  {}  {}", month.month, month.count);
            }
            println!("Top members by check-ins:");
            for member in &report.top_check_ins {
                println!("  {:<24} {}", member.key, member.check_in_count);
            }
            println!(
                "Payment status: {} paid in full, {} partial",
                report.payment_status.paid_in_full, report.payment_status.partial
            );
            for tier in &report.tiers {
                println!("  {:<8} {}", tier.tier, tier.count);
            }
        }
        Command::Export { csv, xlsx } => {
            let (path, bytes) = match (csv, xlsx) {
                (Some(path), _) => (path, downloader::to_csv(session.records())?),
                (None, Some(path)) => (path, downloader::to_xlsx(session.records())?),
                (None, None) => return Err("either --csv or --xlsx is required".into()),
            };
            fs::write(&path, bytes)?;
            println!("Exported {} members to {}", session.records().len(), path.display());
        }
    }

    Ok(true)
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
