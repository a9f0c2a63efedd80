//! Build and open the collection.
//!
//! Flow of a fresh build:
//! 1) Embed every chunk (nothing on disk changes if this fails)
//! 2) Write rows into a new database under `builds/<build-id>/`
//! 3) Swap `ACTIVE` to the new build, then drop every build except the new
//!    one and the one it replaced
//!
//! The replaced build survives until the next full build so handles opened
//! on it keep working.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use ragpipe_core::config::Settings;
use ragpipe_core::traits::Embedder;
use ragpipe_core::types::Chunk;
use ragpipe_core::{Error, Result};

use crate::search::IndexHandle;
use crate::storage_err;
use crate::table::{build_dir, new_build_id, open_db, read_active, remove_stale_builds, table_exists, write_active};
use crate::writer::write_rows;

pub const DEFAULT_MMR_LAMBDA: f32 = 0.5;

pub struct VectorIndex {
	root: PathBuf,
	collection: String,
	embedder: Arc<dyn Embedder>,
	mmr_lambda: f32,
	build_lock: Mutex<()>,
}

impl VectorIndex {
	pub fn new(root: impl Into<PathBuf>, collection: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
		Self { root: root.into(), collection: collection.into(), embedder, mmr_lambda: DEFAULT_MMR_LAMBDA, build_lock: Mutex::new(()) }
	}

	pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>) -> Self {
		Self::new(settings.index_dir(), settings.index.collection.clone(), embedder).with_mmr_lambda(settings.index.mmr_lambda)
	}

	pub fn with_mmr_lambda(mut self, lambda: f32) -> Self {
		self.mmr_lambda = lambda.clamp(0.0, 1.0);
		self
	}

	pub fn root(&self) -> &Path { &self.root }

	/// Embeds and stores `chunks`. With `force_rebuild == false` and an
	/// existing active collection, rows are appended to it; otherwise a new
	/// build replaces whatever was active.
	pub async fn build_index(&self, chunks: &[Chunk], force_rebuild: bool) -> Result<IndexHandle> {
		let _guard = self.build_lock.lock().await;
		if chunks.is_empty() {
			return Err(Error::index_build("no chunks to index"));
		}

		let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
		info!(chunks = chunks.len(), embedder = self.embedder.embedder_id(), "embedding chunks");
		let vectors = self.embedder.embed_documents(&texts).await.map_err(|e| Error::index_build_from("embedding chunks", e))?;
		if vectors.len() != chunks.len() {
			return Err(Error::index_build(format!(
				"embedder returned {} vectors for {} chunks (empty chunk text?)",
				vectors.len(),
				chunks.len()
			)));
		}

		if !force_rebuild {
			if let Some(build_id) = self.active_build().await? {
				let conn = open_db(&build_dir(&self.root, &build_id)).await?;
				write_rows(&conn, &self.collection, chunks, &vectors)
					.await
					.map_err(|e| Error::index_build_from(format!("appending to build {build_id}"), e))?;
				info!(build_id = %build_id, rows = chunks.len(), "appended to active build");
				return self.open_index().await;
			}
		}

		let previous = read_active(&self.root)?;
		let build_id = new_build_id(&self.root);
		let dir = build_dir(&self.root, &build_id);
		let written: Result<()> = async {
			std::fs::create_dir_all(&dir)?;
			let conn = open_db(&dir).await?;
			write_rows(&conn, &self.collection, chunks, &vectors).await?;
			write_active(&self.root, &build_id)
		}
		.await;
		if let Err(e) = written {
			if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
				warn!(path = %dir.display(), error = %cleanup, "failed to remove partial build");
			}
			return Err(Error::index_build_from(format!("writing build {build_id}"), e));
		}

		let keep: Vec<&str> = std::iter::once(build_id.as_str()).chain(previous.as_deref()).collect();
		let removed = remove_stale_builds(&self.root, &keep);
		info!(build_id = %build_id, rows = chunks.len(), removed_builds = removed, "index build complete");
		self.open_index().await
	}

	pub async fn open_index(&self) -> Result<IndexHandle> {
		let Some(build_id) = self.active_build().await? else {
			return Err(Error::IndexNotFound(self.root.clone()));
		};
		let conn = open_db(&build_dir(&self.root, &build_id)).await?;
		let table = conn.open_table(&self.collection).execute().await.map_err(storage_err)?;
		Ok(IndexHandle::new(table, self.embedder.clone(), build_id, self.mmr_lambda))
	}

	/// The active build id, if it points at a build that holds the collection.
	async fn active_build(&self) -> Result<Option<String>> {
		let Some(build_id) = read_active(&self.root)? else { return Ok(None) };
		let dir = build_dir(&self.root, &build_id);
		if !dir.is_dir() {
			warn!(build_id = %build_id, "active pointer names a missing build");
			return Ok(None);
		}
		let conn = open_db(&dir).await?;
		Ok(table_exists(&conn, &self.collection).await?.then_some(build_id))
	}
}
