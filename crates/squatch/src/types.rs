use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A content document bound for output.
///
/// Serialized field names are the placeholders templates refer to:
/// `Title`, `Body`, `Layout` and `Filepath`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "Layout")]
    pub layout: String,
    #[serde(rename = "Filepath")]
    pub source_path: PathBuf,
}

/// Layout name (without `layout_` prefix and extension) to its template.
pub type Layouts = BTreeMap<String, Template>;

/// Raw template text and the file it was read from.
#[derive(Debug, Clone)]
pub struct Template {
    pub path: PathBuf,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// Everything the classifier found in one walk of the source tree.
#[derive(Debug, Default)]
pub struct SourceTree {
    pub site_template: Option<Template>,
    pub layouts: Layouts,
    pub pages: Vec<Page>,
    pub assets: Vec<Asset>,
    pub rejected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub output_dir: PathBuf,
    pub pages_written: usize,
    pub pages_skipped: usize,
    pub documents_rejected: usize,
    pub assets_copied: usize,
}
