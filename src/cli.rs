use clap::{ArgAction, Parser};
use eyre::{Result, eyre};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "quire",
    version,
    about = "Paginated EPUB reading and markdown notes from the command line.",
    long_about = None
)]
pub struct Cli {
    /// Print metadata, spine and table of contents
    #[clap(short, long)]
    pub dump: bool,

    /// Print the href of the cover image
    #[clap(long)]
    pub cover: bool,

    /// Open the book at a CFI and print the resulting location
    #[clap(long, value_name = "CFI")]
    pub cfi: Option<String>,

    /// Page through the whole book, printing each location
    #[clap(long)]
    pub pages: bool,

    /// Viewport size used for pagination
    #[clap(long, value_name = "WxH", default_value = "800x600", value_parser = parse_size)]
    pub size: (f64, f64),

    /// Render a markdown note as HTML
    #[clap(long, value_name = "FILE")]
    pub note: Option<PathBuf>,

    /// Use a specific configuration file
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Enable debug output
    #[clap(long)]
    pub debug: bool,

    /// EPUB file
    #[clap(name = "FILE")]
    pub file: Option<PathBuf>,
}

pub fn parse_size(value: &str) -> Result<(f64, f64)> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| eyre!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let width: f64 = width.trim().parse()?;
    let height: f64 = height.trim().parse()?;
    if width <= 0.0 || height <= 0.0 {
        return Err(eyre!("viewport must be larger than zero, got {value:?}"));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("800x600").unwrap(), (800.0, 600.0));
        assert_eq!(parse_size("1024X768").unwrap(), (1024.0, 768.0));
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x600").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["quire", "book.epub"]);
        assert_eq!(cli.size, (800.0, 600.0));
        assert_eq!(cli.file, Some(PathBuf::from("book.epub")));
        assert!(!cli.dump && !cli.pages && cli.cfi.is_none());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["quire", "-vv", "--debug"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.debug);
    }
}
