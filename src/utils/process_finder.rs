use crate::error::{OskError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Поиск процессов по имени через /proc
pub struct ProcessFinder {
    proc_root: PathBuf,
}

impl Default for ProcessFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessFinder {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Найти все PID, у которых comm начинается с `name`. Результат отсортирован по возрастанию.
    pub fn find_by_name(&self, name: &str) -> Result<Vec<i32>> {
        let entries = fs::read_dir(&self.proc_root).map_err(|e| {
            OskError::ServiceUnavailable(format!("Нет доступа к {:?}: {}", self.proc_root, e))
        })?;

        let mut pids = Vec::new();

        for entry in entries {
            let entry = entry.map_err(OskError::Io)?;
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<i32>().ok()) else {
                continue;
            };

            if Self::comm_matches(&entry.path(), name) {
                debug!("Найден процесс {} (pid {})", name, pid);
                pids.push(pid);
            }
        }

        pids.sort_unstable();
        Ok(pids)
    }

    fn comm_matches(process_dir: &Path, name: &str) -> bool {
        // Процесс мог завершиться между readdir и чтением comm
        match fs::read_to_string(process_dir.join("comm")) {
            Ok(comm) => comm.trim_end().starts_with(name),
            Err(e) => {
                debug!("Не удалось прочитать comm в {:?}: {}", process_dir, e);
                false
            }
        }
    }
}
