//! Turns an accepted path into a [`DocumentRecord`].

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tracing::trace;

use trawl_shared::{CrawlConfig, DocumentRecord, Result, TrawlError, new_document_id};

use crate::classify::split_file_name;
use crate::identity::resolve_identity;

/// Read metadata (and content, when eligible) for one file.
///
/// Content is read only for readable extensions under the size ceiling and is
/// decoded as ISO-8859-1 whatever the file's real encoding.
pub async fn build_document(path: &Path, config: &CrawlConfig) -> Result<DocumentRecord> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| TrawlError::io(path, e))?;

    let size = metadata.len();
    let modified = metadata.modified().map_err(|e| TrawlError::io(path, e))?;
    // Not every filesystem records a birth time.
    let created = metadata.created().unwrap_or(modified);

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TrawlError::validation(format!("no file name in {}", path.display())))?;
    let (name, extension) = split_file_name(&file_name);

    let path_str = path.to_string_lossy().into_owned();
    let identity = resolve_identity(&path_str);

    let content = if is_content_eligible(&extension, size, config) {
        read_content(path, config.max_content_bytes).await?
    } else {
        trace!(path = %path_str, size, "indexing name only");
        None
    };

    Ok(DocumentRecord {
        id: new_document_id(),
        name: name.to_string(),
        extension,
        path: path_str,
        content,
        project: identity.project,
        version: identity.version,
        size,
        created_at: to_utc(created),
        last_modified: to_utc(modified),
    })
}

/// Whether a file's text is stored alongside its metadata.
pub fn is_content_eligible(extension: &str, size: u64, config: &CrawlConfig) -> bool {
    config.extensions_to_read.contains(extension) && size <= config.max_content_bytes
}

/// Read at most `limit` bytes. `None` if the file has grown past the limit
/// since its metadata was taken.
async fn read_content(path: &Path, limit: u64) -> Result<Option<String>> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| TrawlError::io(path, e))?;

    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| TrawlError::io(path, e))?;

    if bytes.len() as u64 > limit {
        trace!(path = %path.display(), limit, "file grew past content limit, indexing name only");
        return Ok(None);
    }
    Ok(Some(decode_latin1(&bytes)))
}

/// ISO-8859-1: every byte is the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use trawl_shared::CrawlerSettings;
    use uuid::Uuid;

    fn config(max_content_bytes: u64) -> CrawlConfig {
        let settings = CrawlerSettings {
            extensions_to_read: vec!["txt".into(), "JAVA".into()],
            max_content_bytes,
            ..CrawlerSettings::default()
        };
        CrawlConfig::try_from(&settings).unwrap()
    }

    fn temp_tree() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trawl-build-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn latin1_maps_high_bytes() {
        assert_eq!(decode_latin1(b"caf\xe9"), "café");
        assert_eq!(decode_latin1(&[0x41, 0xff]), "Aÿ");
    }

    #[tokio::test]
    async fn readable_file_gets_content() {
        let root = temp_tree();
        let dir = root.join("app").join("trunk");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("Notes.TXT");
        std::fs::write(&file, b"hello").unwrap();

        let doc = build_document(&file, &config(1024)).await.unwrap();
        assert_eq!(doc.name, "Notes");
        assert_eq!(doc.extension, "txt");
        assert_eq!(doc.content.as_deref(), Some("hello"));
        assert_eq!(doc.size, 5);
        assert_eq!(doc.project.as_deref(), Some("app"));
        assert_eq!(doc.version, "trunk");
        assert_eq!(doc.path, file.to_string_lossy());
        assert!(doc.created_at <= Utc::now());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn unreadable_extension_has_no_content() {
        let root = temp_tree();
        let file = root.join("image.png");
        std::fs::write(&file, [0u8, 1, 2]).unwrap();

        let doc = build_document(&file, &config(1024)).await.unwrap();
        assert_eq!(doc.content, None);
        assert_eq!(doc.extension, "png");
        assert_eq!(doc.size, 3);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn oversized_file_has_no_content() {
        let root = temp_tree();
        let at_limit = root.join("small.java");
        let over_limit = root.join("big.java");
        std::fs::write(&at_limit, "0123456789").unwrap();
        std::fs::write(&over_limit, "0123456789X").unwrap();

        let cfg = config(10);
        let small = build_document(&at_limit, &cfg).await.unwrap();
        let big = build_document(&over_limit, &cfg).await.unwrap();

        assert_eq!(small.content.as_deref(), Some("0123456789"));
        assert_eq!(big.content, None);
        assert_eq!(big.size, 11);
        assert_eq!(big.name, "big");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn content_read_stops_at_the_limit() {
        let root = temp_tree();
        let file = root.join("growing.txt");
        std::fs::write(&file, "0123456789").unwrap();

        // Metadata said the file fit; by read time it holds more than the limit.
        assert_eq!(read_content(&file, 10).await.unwrap().as_deref(), Some("0123456789"));
        assert_eq!(read_content(&file, 4).await.unwrap(), None);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = build_document(Path::new("/nonexistent/trawl/file.txt"), &config(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TrawlError::Io { .. }));
    }

    #[tokio::test]
    async fn each_build_gets_a_fresh_id() {
        let root = temp_tree();
        let file = root.join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let cfg = config(10);
        let first = build_document(&file, &cfg).await.unwrap();
        let second = build_document(&file, &cfg).await.unwrap();
        assert_ne!(first.id, second.id);

        let _ = std::fs::remove_dir_all(&root);
    }
}
