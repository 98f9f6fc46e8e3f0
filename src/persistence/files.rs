use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const DATA_DIR_NAME: &str = ".dayplan";

/// Get the data directory - checks for local .dayplan first, then falls back to global ~/.dayplan
pub fn get_data_dir() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;

    if let Some(local_dir) = find_local_data_dir(&current_dir) {
        return Ok(local_dir);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DATA_DIR_NAME))
}

/// Find local .dayplan directory by walking up the directory tree
fn find_local_data_dir(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let data_dir = current.join(DATA_DIR_NAME);
        if data_dir.is_dir() {
            return Some(data_dir);
        }

        current = current.parent()?;
    }
}

/// Ensure the data directory exists
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = get_data_dir()?;
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(dir)
}

/// Initialize a local .dayplan directory in the current directory
pub fn init_local_data_dir() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    let data_dir = current_dir.join(DATA_DIR_NAME);

    if data_dir.exists() {
        anyhow::bail!("Data directory already exists: {}", data_dir.display());
    }

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create directory: {}", data_dir.display()))?;

    Ok(data_dir)
}

/// Path of the task file for a specific date (tasks-YYYY-MM-DD.json)
pub fn day_file(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("tasks-{}.json", date.format("%Y-%m-%d")))
}

/// Path of the planner settings file
pub fn config_file(dir: &Path) -> PathBuf {
    dir.join("config.json")
}

/// Path of the pending reminder registry
pub fn reminders_file(dir: &Path) -> PathBuf {
    dir.join("reminders.json")
}

/// Atomically write content to a file using temp file + rename
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .context("File path has no parent directory")?;

    let mut temp_file = NamedTempFile::new_in(dir)
        .context("Failed to create temporary file")?;

    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .context("Failed to sync temporary file")?;

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file: {}", path.display()))?;

    Ok(())
}

/// Read file content, return empty string if file doesn't exist
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir() {
        let dir = get_data_dir().unwrap();
        assert!(dir.to_string_lossy().contains(".dayplan"));
    }

    #[test]
    fn test_find_local_data_dir_walks_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let local = temp_dir.path().join(".dayplan");
        let nested = temp_dir.path().join("projects").join("garden");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_local_data_dir(&nested), Some(local));
    }

    #[test]
    fn test_day_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        let path = day_file(Path::new("/tmp/plan"), date);
        assert_eq!(path, PathBuf::from("/tmp/plan/tasks-2026-02-03.json"));
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.json");

        let content = "{\"hello\": \"world\"}";
        atomic_write(&test_file, content).unwrap();

        let read_content = read_file(&test_file).unwrap();
        assert_eq!(read_content, content);
    }

    #[test]
    fn test_read_nonexistent_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("nonexistent.json");

        let content = read_file(&test_file).unwrap();
        assert_eq!(content, "");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("tasks.json");

        atomic_write(&test_file, "first").unwrap();
        atomic_write(&test_file, "second").unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(read_file(&test_file).unwrap(), "second");
    }
}
