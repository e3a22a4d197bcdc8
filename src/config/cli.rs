//! Command-line arguments: `coin-ticker [NUM] [PAIR ...]`

use std::ffi::OsString;

use clap::Parser;

use crate::error::AppError;

const BIN_NAME: &str = "coin-ticker";

/// What the user asked to display
#[derive(Debug, Clone, PartialEq, Eq, Default, Parser)]
#[command(name = BIN_NAME, version, about = "Live cryptocurrency ticker board", long_about = None)]
pub struct CliArgs {
    /// Number of volume leaders to show when no pairs are given.
    /// Taken from a leading all-digit argument.
    #[arg(skip)]
    pub count: Option<usize>,

    /// Optional leading count, then pairs such as eth/btc, BCH-USD or ETHBTC
    #[arg(value_name = "NUM|PAIR")]
    pub pairs: Vec<String>,
}

impl CliArgs {
    /// Parse the arguments following the program name
    pub fn try_from_args<I, S>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let argv = std::iter::once(OsString::from(BIN_NAME)).chain(args.into_iter().map(Into::into));
        Self::try_parse_from(argv)
            .map_err(|e| AppError::Config(e.to_string()))?
            .split_count()
    }

    /// Parse the process arguments; usage errors and `--help` exit here
    pub fn from_env() -> Result<Self, AppError> {
        Self::parse().split_count()
    }

    /// Move a leading all-digit argument into `count`
    fn split_count(mut self) -> Result<Self, AppError> {
        self.pairs = self
            .pairs
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let leading = match self.pairs.first() {
            Some(first) if first.chars().all(|c| c.is_ascii_digit()) => self.pairs.remove(0),
            _ => return Ok(self),
        };
        let count: usize = leading
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid count '{}'", leading)))?;
        if count == 0 {
            return Err(AppError::Config("Count must be at least 1".to_string()));
        }
        self.count = Some(count);
        Ok(self)
    }
}
