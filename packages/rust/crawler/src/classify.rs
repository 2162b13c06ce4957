//! Include/exclude rules deciding which files become documents.

use std::path::Path;

use trawl_shared::CrawlConfig;

/// Split a file name into `(name, extension)`.
///
/// The extension is the text after the last `.`, lower-cased. A name without
/// a dot, or whose only leading dot is the first character (`.project`), has
/// an empty extension and keeps the full file name as its name.
pub fn split_file_name(file_name: &str) -> (&str, String) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], file_name[pos + 1..].to_lowercase()),
        _ => (file_name, String::new()),
    }
}

/// Decides whether a discovered path is indexed.
pub struct PathClassifier<'a> {
    config: &'a CrawlConfig,
}

impl<'a> PathClassifier<'a> {
    pub fn new(config: &'a CrawlConfig) -> Self {
        Self { config }
    }

    /// Whether `path` should become a document.
    ///
    /// An explicitly included file name wins over every exclusion rule.
    pub fn accepts(&self, path: &Path) -> bool {
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };

        if self.config.files_to_include.contains(file_name.as_ref()) {
            return true;
        }

        let full_path = path.to_string_lossy();
        if self
            .config
            .directories_to_exclude
            .iter()
            .any(|token| full_path.contains(token.as_str()))
        {
            return false;
        }

        if self.config.files_to_exclude.contains(file_name.as_ref()) {
            return false;
        }

        // editor backups
        if file_name.ends_with('~') {
            return false;
        }

        let (_, extension) = split_file_name(&file_name);
        !self.config.extensions_to_exclude.contains(&extension)
    }
}
