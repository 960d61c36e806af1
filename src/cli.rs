use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "glance",
    version,
    about = "A thin overlay reader for plain-text books that hides when the pointer leaves it.",
    long_about = None
)]
pub struct Cli {
    /// Print the shelf of previously opened books
    #[clap(short = 'r', long)]
    pub history: bool,

    /// Print the chapters detected in FILE and exit
    #[clap(short, long)]
    pub dump: bool,

    /// Print reading-time statistics
    #[clap(short, long)]
    pub stats: bool,

    /// Use a specific store database file
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Enable debug output
    #[clap(long)]
    pub debug: bool,

    /// Plain-text file to open; defaults to the last book read
    #[clap(name = "FILE")]
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["glance", "-vv", "--dump", "book.txt"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.dump);
        assert_eq!(cli.file, Some(PathBuf::from("book.txt")));
        assert!(!cli.history);
    }

    #[test]
    fn test_parse_store_override() {
        let cli = Cli::parse_from(["glance", "-c", "/tmp/x.db", "--stats"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.db")));
        assert!(cli.stats);
        assert!(cli.file.is_none());
    }
}
