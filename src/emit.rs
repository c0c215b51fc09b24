use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::models::PageContext;

/// Receiver of finished `(path, context)` pairs.
pub trait PageEmitter {
    fn emit(&mut self, path: &str, context: &PageContext) -> Result<()>;

    /// Called once after the last page.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub path: String,
    pub file: String,
    pub bytes: usize,
    pub digest: String,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    generated_at: String,
    pages: &'a [ManifestEntry],
}

/// Writes each context to `<root>/<path>/context.json` and a manifest on finish.
pub struct JsonDirEmitter {
    root: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl JsonDirEmitter {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("create {:?}", root))?;
        Ok(Self {
            root,
            entries: Vec::new(),
        })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    fn page_dir(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .fold(self.root.clone(), |dir, seg| dir.join(seg))
    }
}

impl PageEmitter for JsonDirEmitter {
    fn emit(&mut self, path: &str, context: &PageContext) -> Result<()> {
        let dir = self.page_dir(path);
        fs::create_dir_all(&dir).with_context(|| format!("create {:?}", dir))?;
        let file = dir.join("context.json");
        let bytes = serde_json::to_vec(context)?;
        fs::write(&file, &bytes).with_context(|| format!("write {:?}", file))?;

        let relative = file
            .strip_prefix(&self.root)
            .unwrap_or(&file)
            .to_string_lossy()
            .into_owned();
        self.entries.push(ManifestEntry {
            path: path.to_string(),
            file: relative,
            bytes: bytes.len(),
            digest: format!("{:016x}", xxh3_64(&bytes)),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let manifest = Manifest {
            generated_at: chrono::Utc::now().to_rfc3339(),
            pages: &self.entries,
        };
        write_json(self.root.join("pages.manifest.json"), &manifest)?;
        debug!("Wrote pages.manifest.json - pages={}", self.entries.len());
        Ok(())
    }
}

pub fn write_json<P: AsRef<Path>, T: ?Sized + Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_vec_pretty(value)?).with_context(|| format!("write {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::tests::incident;
    use std::sync::Arc;

    fn context(id: i64) -> PageContext {
        PageContext {
            incident: incident(id, vec![]),
            incident_reports: Arc::new(vec![]),
            taxonomies: vec![],
            next_incident: None,
            prev_incident: None,
            spatial_incidents: Arc::new(vec![]),
            nlp_similar_incidents: vec![],
            editor_similar_incidents: vec![],
            editor_dissimilar_incidents: vec![],
            flagged_dissimilar_incidents: None,
        }
    }

    #[test]
    fn writes_pages_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter = JsonDirEmitter::new(dir.path()).unwrap();
        emitter.emit("/cite/1", &context(1)).unwrap();
        emitter.emit("/es/cite/1", &context(1)).unwrap();
        emitter.finish().unwrap();

        let page: serde_json::Value = serde_json::from_slice(
            &fs::read(dir.path().join("es/cite/1/context.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(page["incident"]["incident_id"], 1);
        assert!(page.get("incidentReports").is_some());
        assert!(page.get("flagged_dissimilar_incidents").is_none());

        let manifest: serde_json::Value = serde_json::from_slice(
            &fs::read(dir.path().join("pages.manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["pages"].as_array().unwrap().len(), 2);
        assert_eq!(emitter.entries()[0].digest, emitter.entries()[1].digest);
    }

    #[test]
    fn parent_segments_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = JsonDirEmitter::new(dir.path()).unwrap();
        assert_eq!(emitter.page_dir("/../x/./cite"), dir.path().join("x").join("cite"));
    }
}
