//! LanceDB connection and build-directory housekeeping.
//!
//! Each full build lives in its own database under `root/builds/<build-id>/`.
//! `root/ACTIVE` names the build readers should open; it is replaced with a
//! rename so it always holds a complete id.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use lancedb::{connect, Connection};
use tracing::{debug, warn};

use ragpipe_core::Result;

use crate::storage_err;

pub const ACTIVE_FILE: &str = "ACTIVE";
pub const BUILDS_DIR: &str = "builds";

pub async fn open_db(dir: &Path) -> Result<Connection> {
	connect(dir.to_string_lossy().as_ref()).execute().await.map_err(storage_err)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	let names = conn.table_names().execute().await.map_err(storage_err)?;
	Ok(names.iter().any(|n| n == name))
}

pub fn build_dir(root: &Path, build_id: &str) -> PathBuf { root.join(BUILDS_DIR).join(build_id) }

/// Timestamped id for a new build, suffixed if a directory with that name
/// already exists.
pub fn new_build_id(root: &Path) -> String {
	let base = format!("build-{}", Utc::now().format("%Y%m%d-%H%M%S-%3f"));
	let mut id = base.clone();
	let mut n = 1;
	while build_dir(root, &id).exists() {
		id = format!("{base}-{n}");
		n += 1;
	}
	id
}

pub fn read_active(root: &Path) -> Result<Option<String>> {
	let path = root.join(ACTIVE_FILE);
	match fs::read_to_string(&path) {
		Ok(s) => {
			let id = s.trim();
			Ok((!id.is_empty()).then(|| id.to_string()))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e.into()),
	}
}

pub fn write_active(root: &Path, build_id: &str) -> Result<()> {
	fs::create_dir_all(root)?;
	let mut tmp = tempfile::NamedTempFile::new_in(root)?;
	tmp.write_all(build_id.as_bytes())?;
	tmp.as_file().sync_all()?;
	tmp.persist(root.join(ACTIVE_FILE)).map_err(|e| e.error)?;
	debug!(build_id, "active build pointer updated");
	Ok(())
}

/// Deletes every build directory not named in `keep`. Failures are logged,
/// not returned: the active pointer is already correct at this point.
pub fn remove_stale_builds(root: &Path, keep: &[&str]) -> usize {
	let Ok(entries) = fs::read_dir(root.join(BUILDS_DIR)) else { return 0 };
	let mut removed = 0;
	for entry in entries.filter_map(|e| e.ok()) {
		let name = entry.file_name();
		if keep.iter().any(|k| name.to_string_lossy() == *k) {
			continue;
		}
		match fs::remove_dir_all(entry.path()) {
			Ok(()) => removed += 1,
			Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove stale build"),
		}
	}
	removed
}
