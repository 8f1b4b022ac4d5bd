//! One logical XML source added to a builder.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;

use crate::builder::node::BuilderNode;
use crate::error::Result;
use crate::guid;

/// A single XML input: in-memory text or a file, optionally gzip-compressed.
///
/// Every import carries a GUID used in the silo's identity fingerprint: the
/// absolute path for files, a content checksum for in-memory XML. The
/// underlying stream is materialized when the compile reads it and released
/// when the parse finishes or errors, so a builder stays reusable.
#[derive(Debug)]
pub(crate) struct Import {
    source: ImportSource,
    info: Option<BuilderNode>,
    guid: String,
}

#[derive(Debug)]
enum ImportSource {
    Memory(Arc<[u8]>),
    File { path: std::path::PathBuf, gzip: bool },
}

impl Import {
    /// Wrap in-memory XML text. The GUID is `origin` when given, otherwise
    /// a checksum of the content.
    pub(crate) fn from_xml(xml: &str, origin: Option<&str>) -> Self {
        let guid = match origin {
            Some(origin) => origin.to_string(),
            None => guid::content_checksum(xml.as_bytes()),
        };
        Self {
            source: ImportSource::Memory(Arc::from(xml.as_bytes())),
            info: None,
            guid,
        }
    }

    /// Reference a file, decompressing transparently when the name ends in
    /// `.xml.gz`. The GUID is the absolute path.
    pub(crate) fn from_file(path: &Path, info: Option<BuilderNode>) -> Result<Self> {
        // Fail now if the file cannot be opened; the compile re-opens it.
        drop(File::open(path)?);
        let abs = std::path::absolute(path)?;
        let gzip = abs
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".xml.gz"));
        Ok(Self {
            source: ImportSource::File { path: abs.clone(), gzip },
            info,
            guid: abs.to_string_lossy().into_owned(),
        })
    }

    /// Open the input stream for parsing.
    pub(crate) fn open(&self) -> Result<Box<dyn Read>> {
        match &self.source {
            ImportSource::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
            ImportSource::File { path, gzip } => {
                let file = File::open(path)?;
                if *gzip {
                    Ok(Box::new(GzDecoder::new(file)))
                } else {
                    Ok(Box::new(file))
                }
            },
        }
    }

    pub(crate) fn guid(&self) -> &str {
        &self.guid
    }

    pub(crate) fn info(&self) -> Option<&BuilderNode> {
        self.info.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_xml_guid_is_content_checksum() {
        let a = Import::from_xml("<a/>", None);
        let b = Import::from_xml("<a/>", None);
        let c = Import::from_xml("<b/>", None);
        assert_eq!(a.guid(), b.guid());
        assert_ne!(a.guid(), c.guid());
        assert_eq!(Import::from_xml("<a/>", Some("tag")).guid(), "tag");
    }

    #[test]
    fn test_file_guid_is_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xml");
        std::fs::write(&path, "<a/>").unwrap();
        let import = Import::from_file(&path, None).unwrap();
        assert!(Path::new(import.guid()).is_absolute());
        let mut xml = String::new();
        import.open().unwrap().read_to_string(&mut xml).unwrap();
        assert_eq!(xml, "<a/>");
    }

    #[test]
    fn test_missing_file_errors_at_import() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Import::from_file(&dir.path().join("absent.xml"), None).is_err());
    }

    #[test]
    fn test_gzip_stream_is_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xml.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"<compressed/>").unwrap();
        encoder.finish().unwrap();

        let import = Import::from_file(&path, None).unwrap();
        let mut xml = String::new();
        import.open().unwrap().read_to_string(&mut xml).unwrap();
        assert_eq!(xml, "<compressed/>");
    }
}
