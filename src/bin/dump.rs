use std::io::stdout;
use std::path::PathBuf;

use clap::Parser;
use vecwal::dump;
use vecwal::Config;
use vecwal::WalError;

#[derive(Clone, Debug, PartialEq, Eq, clap::Parser)]
#[clap(about = "dump the records of a wal segment directory", author)]
pub struct Args {
    /// Directory holding the `.wal` segment files.
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Dump only this segment file number.
    #[arg(long)]
    file_no: Option<u32>,
}

fn main() -> Result<(), WalError> {
    let args = Args::parse();

    let config = Config::new(args.path.display());

    match args.file_no {
        Some(file_no) => {
            let segment = dump::SegmentDump::read(&config, file_no)?;
            segment.write_to(&mut stdout())?;
        }
        None => dump::write_dir_to(&config, &mut stdout())?,
    }

    Ok(())
}
