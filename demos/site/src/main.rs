use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use guillemot::SiteConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Loads a site config and prints what each built-in shortcode renders.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The site's `site.toml`.
    #[arg(default_value = "demos/site/site/site.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SiteConfig::from_path(&args.config)
        .with_context(|| format!("failed to load {:?}", args.config))?;

    config.validate()?;

    for file in config.resolve_passthrough()? {
        info!(
            source = %file.source.display(),
            destination = %file.destination.display(),
            "passthrough"
        );
    }

    let shortcodes = &config.shortcodes;

    println!("{}", shortcodes.invoke("home", &["Home"])?);
    println!("{}", shortcodes.invoke("page", &["intro"])?);
    println!("{}", shortcodes.invoke("page", &["intro", "Introduction"])?);
    println!(
        "{}",
        shortcodes.invoke("improved", &["intro-v2", "the rewritten introduction"])?
    );
    println!(
        "{}",
        shortcodes.invoke_paired(
            "original",
            "<p>This is where it all started.</p>",
            &["intro", "the first introduction"],
        )?
    );

    Ok(())
}
