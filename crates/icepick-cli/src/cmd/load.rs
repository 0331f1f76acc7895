//! Load command

use anyhow::{Context, Result, bail};
use icepick_core::io::UrlFetcher;
use icepick_core::{
    Loader, MAIN_ATTRIBUTE, RecordingHost, Reporter, Session, StaticPage, bootstrap,
};
use std::sync::Arc;
use url::Url;

use crate::ui::ConsoleReporter;

fn default_base() -> Result<Url> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Url::from_directory_path(&cwd)
        .map_err(|()| anyhow::anyhow!("Cannot express {} as a URL", cwd.display()))
}

/// Load each bundle in turn into one session and list what was instantiated.
pub async fn load(urls: &[String], base: Option<&str>, quiet: bool) -> Result<()> {
    let base = match base {
        Some(b) => Url::parse(b).with_context(|| format!("Invalid base URL '{b}'"))?,
        None => default_base()?,
    };

    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(quiet));
    let host = Arc::new(RecordingHost::new());
    let loader = Loader::new(
        Arc::new(UrlFetcher::new()),
        Arc::clone(&host),
        Arc::clone(&reporter),
    );
    let session = Session::new();

    for url in urls {
        let page = StaticPage::new(base.clone()).with_attribute(MAIN_ATTRIBUTE, url.as_str());
        let Some(loaded) = bootstrap(&page, &loader, &session)
            .await
            .with_context(|| format!("Failed to load '{url}'"))?
        else {
            bail!("Empty bundle URL");
        };

        println!(
            "{url}: {} instantiated, {} reused",
            loaded.instantiated.len(),
            loaded.reused.len()
        );
        for (kind, name) in &loaded.instantiated {
            println!("  + {kind:<10} {name}");
        }
        for (name, version) in &loaded.reused {
            println!("  = {:<10} {name}@{version}", "resident");
        }
    }

    let residents: Vec<String> = session
        .residents()
        .into_iter()
        .map(|(name, version)| format!("{name}@{version}"))
        .collect();
    reporter.info(&format!("Resident: {}", residents.join(", ")));
    println!("{} module(s) instantiated in total", host.total());
    Ok(())
}
