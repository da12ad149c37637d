use crate::compose::Composer;
use crate::config::{Settings, SquatchConfig};
use crate::error::{IoContext, Result, SquatchError};
use crate::parsing::{MarkdownRenderer, parse_page};
use crate::theme::ThemeRenderer;
use crate::types::{Asset, BuildReport, SourceTree, Template};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name of the outermost template.
pub const SITE_TEMPLATE: &str = "layout.html";
const LAYOUT_PREFIX: &str = "layout_";
const LAYOUT_EXTENSION: &str = ".html";
const DOCUMENT_EXTENSION: &str = "md";

pub struct SiteBuilder {
    source_dir: PathBuf,
    output_override: Option<PathBuf>,
}

impl SiteBuilder {
    pub fn new(source_dir: impl AsRef<Path>) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            output_override: None,
        }
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_override = Some(output_dir.into());
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Loads the configuration and resolves it into build settings.
    pub fn settings(&self) -> Result<Settings> {
        let config = SquatchConfig::load(&self.source_dir)?;
        Ok(Settings::resolve(
            &self.source_dir,
            config,
            self.output_override.as_deref(),
        ))
    }

    /// Runs a full build: wipe the output, classify the source tree, then
    /// compose every page.
    pub fn build(&self) -> Result<BuildReport> {
        let settings = self.settings()?;
        check_output_dir(&settings)?;

        clean_output_dir(&settings.output_dir)?;
        fs::create_dir_all(&settings.output_dir)
            .io_context("creating output directory", &settings.output_dir)?;

        let SourceTree {
            site_template,
            layouts,
            pages,
            assets,
            rejected,
        } = classify(&settings)?;

        log::debug!(
            "Classified {} pages, {} layouts, {} assets",
            pages.len(),
            layouts.len(),
            assets.len()
        );

        let composer = Composer::new(
            &settings.source_dir,
            &settings.output_dir,
            site_template.as_ref(),
            &layouts,
        );

        let mut report = BuildReport {
            output_dir: settings.output_dir.clone(),
            documents_rejected: rejected,
            assets_copied: assets.len(),
            ..BuildReport::default()
        };

        for page in pages {
            match composer.write_page(page)? {
                Some(path) => {
                    log::debug!("Wrote {}", path.display());
                    report.pages_written += 1;
                }
                None => report.pages_skipped += 1,
            }
        }

        Ok(report)
    }
}

/// Walks the source tree once, sorting files into the site template,
/// layouts, pages and assets. Assets are copied into the output directory
/// as they are found.
pub fn classify(settings: &Settings) -> Result<SourceTree> {
    let renderer = MarkdownRenderer::new(ThemeRenderer::new(settings.theme.clone()));
    let mut tree = SourceTree::default();

    let walker = WalkDir::new(&settings.source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                !settings.ignore.skips_folder(&name)
            } else {
                !settings.ignore.skips_file(&name)
            }
        });

    for entry in walker {
        let entry = entry.map_err(|error| SquatchError::WalkDir {
            path: settings.source_dir.clone(),
            message: error.to_string(),
        })?;

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();

        if name == SITE_TEMPLATE {
            let source = fs::read_to_string(path).io_context("reading site template", path)?;
            if let Some(previous) = &tree.site_template {
                log::warn!(
                    "Multiple site templates found: {} replaces {}",
                    path.display(),
                    previous.path.display()
                );
            }
            tree.site_template = Some(Template {
                path: path.to_path_buf(),
                source,
            });
        } else if let Some(layout_name) = layout_name(&name) {
            let source = fs::read_to_string(path).io_context("reading layout", path)?;
            log::debug!("Registered layout '{}' from {}", layout_name, path.display());
            tree.layouts.insert(
                layout_name.to_string(),
                Template {
                    path: path.to_path_buf(),
                    source,
                },
            );
        } else if path
            .extension()
            .is_some_and(|extension| extension == DOCUMENT_EXTENSION)
        {
            match parse_page(path, &renderer) {
                Ok(page) => tree.pages.push(page),
                Err(error) if error.is_recoverable() => {
                    log::debug!("Skipping {}: {}", path.display(), error);
                    tree.rejected += 1;
                }
                Err(error) => return Err(error),
            }
        } else {
            let asset = copy_asset(path, settings)?;
            log::debug!(
                "Copied {} to {}",
                asset.source.display(),
                asset.dest.display()
            );
            tree.assets.push(asset);
        }
    }

    Ok(tree)
}

fn layout_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(LAYOUT_PREFIX)?
        .strip_suffix(LAYOUT_EXTENSION)
}

fn copy_asset(path: &Path, settings: &Settings) -> Result<Asset> {
    let relative =
        path.strip_prefix(&settings.source_dir)
            .map_err(|_| SquatchError::InvalidPath {
                path: path.to_path_buf(),
            })?;
    let dest = settings.output_dir.join(relative);

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).io_context("creating directory", parent)?;
    }
    fs::copy(path, &dest).io_context("copying asset", path)?;

    Ok(Asset {
        source: path.to_path_buf(),
        dest,
    })
}

/// Refuses output directories that would delete the source tree when wiped.
fn check_output_dir(settings: &Settings) -> Result<()> {
    let output = std::path::absolute(&settings.output_dir)
        .io_context("resolving output directory", &settings.output_dir)?;
    let source = std::path::absolute(&settings.source_dir)
        .io_context("resolving source directory", &settings.source_dir)?;

    if source.starts_with(&output) {
        return Err(SquatchError::InvalidOutputDir {
            path: settings.output_dir.clone(),
        });
    }
    Ok(())
}

pub fn clean_output_dir(output_dir: &Path) -> Result<()> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).io_context("removing output directory", output_dir)?;
    }
    Ok(())
}

/// Every file under `output_dir`, in walk order.
pub fn list_output(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(output_dir).sort_by_file_name() {
        let entry = entry.map_err(|error| SquatchError::WalkDir {
            path: output_dir.to_path_buf(),
            message: error.to_string(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}
