//! Container record persistence.

use skiff_common::{SkiffError, SkiffPaths, SkiffResult};

use super::record::ContainerRecord;

/// Reads and writes container records under the runtime directory.
#[derive(Debug)]
pub struct RecordStore {
    paths: SkiffPaths,
}

impl RecordStore {
    /// Create a store over the given paths.
    #[must_use]
    pub fn new(paths: &SkiffPaths) -> Self {
        Self {
            paths: paths.clone(),
        }
    }

    /// Persist a container record, creating its directory if needed.
    pub fn save(&self, record: &ContainerRecord) -> SkiffResult<()> {
        let path = self.paths.container_record(&record.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json)?;

        tracing::debug!(name = %record.name, path = %path.display(), "Saved container record");
        Ok(())
    }

    /// Load the record of a named container.
    pub fn load(&self, name: &str) -> SkiffResult<ContainerRecord> {
        let path = self.paths.container_record(name);
        if !path.exists() {
            return Err(SkiffError::ContainerNotFound {
                name: name.to_string(),
            });
        }

        let json = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Delete a container's runtime directory (record and log).
    pub fn delete(&self, name: &str) -> SkiffResult<()> {
        let dir = self.paths.container_dir(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            tracing::debug!(name, dir = %dir.display(), "Deleted container record");
        }
        Ok(())
    }

    /// Whether a record exists for the name.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.paths.container_record(name).exists()
    }

    /// Load every container record, sorted by name. Unreadable entries
    /// are logged and skipped.
    pub fn list(&self) -> SkiffResult<Vec<ContainerRecord>> {
        let mut records = Vec::new();
        if !self.paths.runtime.exists() {
            return Ok(records);
        }

        for entry in std::fs::read_dir(&self.paths.runtime)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !self.exists(&name) {
                continue;
            }
            match self.load(&name) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::error!(name = %name, %err, "Skipping unreadable container record");
                }
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::record::Status;

    fn record(name: &str) -> ContainerRecord {
        ContainerRecord {
            pid: "100".to_string(),
            id: "1a2b3c4d5e6f".to_string(),
            name: name.to_string(),
            command: "top".to_string(),
            created_time: "2026/08/07 12:00:00".to_string(),
            status: Status::Running,
            volume: String::new(),
            network: String::new(),
            ipaddress: String::new(),
            portmapping: Vec::new(),
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(&SkiffPaths::with_root(dir.path()));

        store.save(&record("web")).unwrap();
        let loaded = store.load("web").unwrap();
        assert_eq!(loaded.name, "web");
        assert_eq!(loaded.status, Status::Running);
    }

    #[test]
    fn load_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(&SkiffPaths::with_root(dir.path()));

        assert!(matches!(
            store.load("ghost"),
            Err(SkiffError::ContainerNotFound { .. })
        ));
    }

    #[test]
    fn list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(&SkiffPaths::with_root(dir.path()));

        store.save(&record("b")).unwrap();
        store.save(&record("a")).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        store.delete("a").unwrap();
        assert!(!store.exists("a"));
        assert!(store.exists("b"));
    }
}
