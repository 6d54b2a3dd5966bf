//! `jmap` command-line tool
//!
//! Converts BCSV/JMap tables to CSV and back.
//!
//! # Example
//!
//! ```bash
//! jmap tocsv smg scenariodata.bcsv scenariodata.csv --lookup hashtable_smg.txt
//! jmap tojmap smg scenariodata.csv scenariodata.bcsv --lookup hashtable_smg.txt
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use jmap_codec::{
    CsvOptions, Encoding, Game, IoOptions, NameRegistry, Result, from_csv, from_file,
    to_buffer_with_report, to_csv,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// BCSV/JMap table converter
#[derive(Parser, Debug)]
#[command(name = "jmap")]
#[command(about = "Convert BCSV/JMap tables to CSV and back")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a binary table and write it as CSV
    Tocsv {
        /// Game the table comes from (lm, lm3ds, sms, dkjb, smg, smg2, 3das)
        game: Game,
        /// Input BCSV file
        input: PathBuf,
        /// Output CSV file
        output: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Read a CSV file and encode it as a binary table
    Tojmap {
        /// Game the table is meant for (lm, lm3ds, sms, dkjb, smg, smg2, 3das)
        game: Game,
        /// Input CSV file
        input: PathBuf,
        /// Output BCSV file
        output: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// File with known field names, one per line
    #[arg(long)]
    lookup: Option<PathBuf>,

    /// Force little-endian byte order
    #[arg(long, conflicts_with = "big_endian")]
    little_endian: bool,

    /// Force big-endian byte order
    #[arg(long)]
    big_endian: bool,

    /// String encoding inside the binary table (shift_jis, utf-8)
    #[arg(long)]
    encoding: Option<Encoding>,

    /// Encoding of the CSV file
    #[arg(long, default_value = "utf-8")]
    csv_encoding: Encoding,
}

impl CommonArgs {
    fn registry(&self, game: Game) -> Result<NameRegistry> {
        match &self.lookup {
            Some(path) => game.registry_with_lookup(path),
            None => Ok(game.registry()),
        }
    }

    fn io_options(&self, game: Game) -> IoOptions {
        let mut options = game.io_options();
        if self.little_endian {
            options.big_endian = false;
        } else if self.big_endian {
            options.big_endian = true;
        }
        if let Some(encoding) = self.encoding {
            options.encoding = encoding;
        }
        options
    }

    fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            encoding: self.csv_encoding,
            ..CsvOptions::default()
        }
    }
}

fn to_csv_command(game: Game, input: &Path, output: &Path, common: &CommonArgs) -> Result<()> {
    let registry = common.registry(game)?;
    let jmap = from_file(registry, input, &common.io_options(game))?;
    to_csv(&jmap, output, &common.csv_options())?;

    info!(
        input = %input.display(),
        output = %output.display(),
        entries = jmap.len(),
        fields = jmap.num_fields(),
        "wrote CSV"
    );
    Ok(())
}

fn to_jmap_command(game: Game, input: &Path, output: &Path, common: &CommonArgs) -> Result<()> {
    let registry = common.registry(game)?;
    let jmap = from_csv(registry, input, &common.csv_options())?;
    let (data, report) = to_buffer_with_report(&jmap, &common.io_options(game))?;
    std::fs::write(output, &data)?;

    if report.truncated_strings > 0 {
        warn!(count = report.truncated_strings, "embedded strings were truncated");
    }
    info!(
        input = %input.display(),
        output = %output.display(),
        entries = jmap.len(),
        bytes = data.len(),
        "wrote BCSV"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Tocsv {
            game,
            input,
            output,
            common,
        } => to_csv_command(*game, input, output, common),
        Command::Tojmap {
            game,
            input,
            output,
            common,
        } => to_jmap_command(*game, input, output, common),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
