use crate::error::{IoContext, Result, SquatchError};
use crate::types::{Layouts, Page, Template};
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

/// Wraps pages in their inner layout and then in the site template.
pub struct Composer<'a> {
    source_dir: &'a Path,
    output_dir: &'a Path,
    site_template: Option<&'a Template>,
    layouts: &'a Layouts,
}

impl<'a> Composer<'a> {
    pub fn new(
        source_dir: &'a Path,
        output_dir: &'a Path,
        site_template: Option<&'a Template>,
        layouts: &'a Layouts,
    ) -> Self {
        Self {
            source_dir,
            output_dir,
            site_template,
            layouts,
        }
    }

    /// Returns the written path, or `None` when the page names a layout
    /// that does not exist.
    pub fn write_page(&self, page: Page) -> Result<Option<PathBuf>> {
        let Some(rendered) = self.render(page)? else {
            return Ok(None);
        };
        let (page, document) = rendered;

        let output_path = self.output_path(&page.source_path)?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).io_context("creating directory", parent)?;
        }
        fs::write(&output_path, document).io_context("writing page", &output_path)?;

        Ok(Some(output_path))
    }

    /// Expands the inner layout into `page.body`, then the site template
    /// around the updated page.
    pub fn render(&self, mut page: Page) -> Result<Option<(Page, String)>> {
        let Some(inner_layout) = self.layouts.get(&page.layout) else {
            log::warn!(
                "Could not find layout '{}' for page {}, skipping",
                page.layout,
                page.source_path.display()
            );
            return Ok(None);
        };

        let site_template = self
            .site_template
            .ok_or_else(|| SquatchError::MissingSiteTemplate {
                path: self.source_dir.to_path_buf(),
            })?;

        page.body = expand(inner_layout, &page)?;

        let document = expand(site_template, &page)?;

        Ok(Some((page, document)))
    }

    /// `<output>/<relative source path>` with the extension swapped for `.html`.
    pub fn output_path(&self, source_path: &Path) -> Result<PathBuf> {
        let relative =
            source_path
                .strip_prefix(self.source_dir)
                .map_err(|_| SquatchError::InvalidPath {
                    path: source_path.to_path_buf(),
                })?;
        Ok(self.output_dir.join(relative.with_extension("html")))
    }
}

fn expand(template: &Template, page: &Page) -> Result<String> {
    let context = Context::from_serialize(page)
        .map_err(|error| SquatchError::template(&template.path, &error))?;
    Tera::one_off(&template.source, &context, false)
        .map_err(|error| SquatchError::template(&template.path, &error))
}
