use quire::{
    cli::Cli,
    config::Config,
    epub::{DisplayTarget, EpubParser, EpubRenderer, FlowSurface, Location},
    logging::{self, LogLevel},
    markdown::render_markdown,
    settings::ReaderSettings,
};

use clap::Parser;
use eyre::{Result, WrapErr, eyre};
use log::{info, warn};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogLevel::from_flags(cli.verbose, cli.debug));

    if let Some(note) = &cli.note {
        return print_note(note);
    }

    let Some(file) = &cli.file else {
        return Err(eyre!("No EPUB file given, see --help"));
    };
    let settings = load_settings(&cli);
    let bytes = std::fs::read(file).wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let mut parser = EpubParser::new(bytes)?;
    let package = parser.load();
    info!(
        "Opened {:?}: {} spine items",
        package.metadata.title,
        package.spine.len()
    );

    if cli.dump {
        println!("{}", serde_json::to_string_pretty(&package)?);
        return Ok(());
    }
    if cli.cover {
        match parser.cover_image_href() {
            Some(href) => println!("{href}"),
            None => println!("No cover image"),
        }
        return Ok(());
    }

    let (width, height) = cli.size;
    let surface = FlowSurface::new(width, height);
    let mut renderer = EpubRenderer::new(parser, package, settings, surface);

    let target = match &cli.cfi {
        Some(cfi) => DisplayTarget::Cfi(cfi.clone()),
        None => DisplayTarget::Start,
    };
    if !renderer.display(target) {
        return Err(eyre!("Nothing to display"));
    }
    print_location(renderer.current_location(false))?;

    if cli.pages {
        while renderer.next() {
            print_location(renderer.current_location(false))?;
        }
    }
    renderer.destroy();
    Ok(())
}

fn load_settings(cli: &Cli) -> ReaderSettings {
    let config = match &cli.config {
        Some(path) => Config::load_from(path.clone()),
        None => Config::new(),
    };
    match config {
        Ok(config) => config.reader,
        Err(err) => {
            warn!("Could not load configuration, using defaults: {err}");
            ReaderSettings::default()
        }
    }
}

fn print_note(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    println!("{}", render_markdown(&text).to_html());
    Ok(())
}

fn print_location(location: Option<Location>) -> Result<()> {
    let location = location.ok_or_else(|| eyre!("No location for the current page"))?;
    let displayed = location.start.displayed;
    println!(
        "chapter {}/{} page {}/{} {:.2}% {}",
        displayed.spine_index + 1,
        displayed.spine_total,
        displayed.page,
        displayed.total,
        displayed.percentage,
        location.start.cfi.as_deref().unwrap_or("-")
    );
    Ok(())
}
