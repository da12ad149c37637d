use crate::{server, watch};
use squatch::{BuildReport, Settings, SiteBuilder, SquatchConfig, list_output};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tower_livereload::LiveReloadLayer;

fn site_builder(src_dir: &Path, output: Option<&Path>) -> SiteBuilder {
    let builder = SiteBuilder::new(src_dir);
    match output {
        Some(output) => builder.output_dir(output),
        None => builder,
    }
}

fn run_build(builder: &SiteBuilder) -> squatch::Result<BuildReport> {
    log::info!("Building site from {}...", builder.source_dir().display());
    let start = Instant::now();

    let report = builder.build()?;

    log::info!(
        "Built {} pages to {} in {:.2?} ({} skipped, {} documents without metadata, {} assets copied)",
        report.pages_written,
        report.output_dir.display(),
        start.elapsed(),
        report.pages_skipped,
        report.documents_rejected,
        report.assets_copied
    );

    Ok(report)
}

pub fn build_site(src_dir: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let builder = site_builder(src_dir, output);
    let report = run_build(&builder)?;

    log::info!("Build complete! Output:");
    for path in list_output(&report.output_dir)? {
        log::info!("  {}", path.display());
    }

    Ok(())
}

/// Output directory for serve mode. A broken `.squatch` is logged and the
/// defaults stand in until a rebuild succeeds.
fn serve_output_dir(builder: &SiteBuilder, output: Option<&Path>) -> PathBuf {
    match builder.settings() {
        Ok(settings) => settings.output_dir,
        Err(error) => {
            log::error!("Config error: {error}");
            Settings::resolve(builder.source_dir(), SquatchConfig::default(), output).output_dir
        }
    }
}

pub async fn serve_site(
    src_dir: &Path,
    output: Option<&Path>,
    port: u16,
    static_dir: &Path,
    open_browser: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let builder = site_builder(src_dir, output);
    let output_dir = serve_output_dir(&builder, output);

    if let Err(error) = run_build(&builder) {
        log::error!("Build error: {error}");
    }

    let livereload = LiveReloadLayer::new();
    let reloader = livereload.reloader();

    let source_dir = builder.source_dir().to_path_buf();
    let exclude = vec![std::path::absolute(&output_dir)?];
    let _watcher = watch::watch_source(&source_dir, exclude, move |paths| {
        log::info!("Changes detected in {} path(s), rebuilding...", paths.len());
        match run_build(&builder) {
            Ok(_) => reloader.reload(),
            Err(error) => log::error!("Rebuild error: {error}"),
        }
    })?;

    if open_browser {
        let url = format!("http://localhost:{port}");
        if let Err(error) = open::that(&url) {
            log::warn!("Failed to open browser: {error}");
        }
    }

    let app = server::router(output_dir, static_dir.to_path_buf()).layer(livereload);
    server::serve(app, port).await?;

    Ok(())
}
