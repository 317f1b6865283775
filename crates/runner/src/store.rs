// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{
	fs,
	io,
	path::{Path, PathBuf},
};

use corral_core::Snapshot;
use uuid::Uuid;

/// A directory of immutable `<uuid>.json` snapshots.
pub struct SnapshotStore {
	dir: PathBuf,
}

impl SnapshotStore {
	pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
		let dir = dir.into();
		fs::create_dir_all(&dir)?;
		Ok(Self {
			dir,
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path(&self, uuid: Uuid) -> PathBuf {
		self.dir.join(format!("{uuid}.json"))
	}

	/// Write atomically: a snapshot file either exists completely or not
	/// at all.
	pub fn save(&self, snapshot: &Snapshot) -> io::Result<PathBuf> {
		let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
		serde_json::to_writer_pretty(&mut tmp, snapshot).map_err(io::Error::other)?;
		let path = self.path(snapshot.uuid);
		tmp.persist(&path).map_err(|e| e.error)?;
		Ok(path)
	}

	pub fn load(&self, uuid: Uuid) -> io::Result<Snapshot> {
		let bytes = fs::read(self.path(uuid))?;
		serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
	}

	/// Every stored snapshot id; files that are not `<uuid>.json` are
	/// ignored.
	pub fn list(&self) -> io::Result<Vec<Uuid>> {
		let mut ids = Vec::new();
		for entry in fs::read_dir(&self.dir)? {
			let path = entry?.path();
			if path.extension().is_some_and(|ext| ext == "json")
				&& let Some(stem) = path.file_stem().and_then(|s| s.to_str())
				&& let Ok(uuid) = stem.parse()
			{
				ids.push(uuid);
			}
		}
		ids.sort();
		Ok(ids)
	}
}
