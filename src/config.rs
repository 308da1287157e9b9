use clap::Args;
use std::path::PathBuf;

use crate::qr::QrOptions;
use crate::store::MemberStore;

/// Settings shared by the command-line and web front ends.
///
/// Each flag falls back to an environment variable, then to the default.
#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Spreadsheet holding the member table
    #[arg(long, env = "GYM_DATA_FILE", default_value = "gym_data.xlsx")]
    pub data_file: PathBuf,

    /// Pixels per QR module
    #[arg(long, env = "GYM_QR_BOX_SIZE", default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=50))]
    pub qr_box_size: u32,

    /// Quiet zone around the QR symbol, in modules
    #[arg(long, env = "GYM_QR_BORDER", default_value_t = 4, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub qr_border: u32,
}

impl Config {
    pub fn store(&self) -> MemberStore {
        MemberStore::new(&self.data_file)
    }

    pub fn qr_options(&self) -> QrOptions {
        QrOptions {
            box_size: self.qr_box_size,
            border: self.qr_border,
        }
    }
}

/// Starts `env_logger` at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn qr_flags_are_bounded() {
        let cli = Cli::try_parse_from(["gymdesk", "--qr-border", "6", "--qr-box-size", "12"]).unwrap();
        assert_eq!(cli.config.qr_options(), QrOptions { box_size: 12, border: 6 });

        assert!(Cli::try_parse_from(["gymdesk", "--qr-border", "300000000"]).is_err());
        assert!(Cli::try_parse_from(["gymdesk", "--qr-box-size", "0"]).is_err());
    }
}
