// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{
	fs,
	io,
	path::PathBuf,
	sync::Arc,
	time::Duration,
};

use corral_core::{Event, Fingerprint};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

/// How long a cached result stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// On-disk result cache keyed by execution fingerprint.
///
/// Reads and writes never fail the caller: a broken entry is treated as a
/// miss and the run happens live (the write is retried next time). Writes
/// go through a temp file and rename, so readers only ever see complete
/// entries. Concurrent misses on one fingerprint coalesce on a per-key
/// lock so exactly one producer spawns the child.
pub struct Cache {
	dir: PathBuf,
	ttl: Duration,
	flights: DashMap<u64, Arc<Mutex<()>>>,
}

impl Cache {
	pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
		Self::with_ttl(dir, DEFAULT_TTL)
	}

	pub fn with_ttl(dir: impl Into<PathBuf>, ttl: Duration) -> io::Result<Self> {
		let dir = dir.into();
		fs::create_dir_all(&dir)?;
		Ok(Self {
			dir,
			ttl,
			flights: DashMap::new(),
		})
	}

	fn entry_path(&self, fingerprint: Fingerprint) -> PathBuf {
		self.dir.join(format!("{fingerprint}.json"))
	}

	/// A fresh entry for `fingerprint`, if one exists.
	pub fn load(&self, fingerprint: Fingerprint) -> Option<Event> {
		let path = self.entry_path(fingerprint);
		let modified = fs::metadata(&path).ok()?.modified().ok()?;
		if modified.elapsed().map_or(false, |age| age > self.ttl) {
			return None;
		}
		match fs::read(&path) {
			Ok(bytes) => match serde_json::from_slice(&bytes) {
				Ok(event) => Some(event),
				Err(error) => {
					warn!(%fingerprint, %error, "discarding unreadable cache entry");
					None
				}
			},
			Err(_) => None,
		}
	}

	/// Record `event` under `fingerprint`; failures are logged, not returned.
	pub fn store(&self, fingerprint: Fingerprint, event: &Event) {
		if let Err(error) = self.try_store(fingerprint, event) {
			warn!(%fingerprint, %error, "failed to write cache entry");
		}
	}

	fn try_store(&self, fingerprint: Fingerprint, event: &Event) -> io::Result<()> {
		let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
		serde_json::to_writer(&mut tmp, event).map_err(io::Error::other)?;
		tmp.persist(self.entry_path(fingerprint)).map_err(|e| e.error)?;
		Ok(())
	}

	/// The single-flight lock for `fingerprint`.
	pub(crate) fn flight(&self, fingerprint: Fingerprint) -> Arc<Mutex<()>> {
		self.flights.entry(fingerprint.as_u64()).or_default().clone()
	}

	/// Drop the flight entry once the result is on disk, so the table does
	/// not grow with every fingerprint ever seen.
	pub(crate) fn finish_flight(&self, fingerprint: Fingerprint) {
		self.flights.remove(&fingerprint.as_u64());
	}
}

#[cfg(test)]
mod tests {
	use corral_core::{Classification, FingerprintBuilder, Problem, Prover, RawOutput};

	use super::*;

	fn fingerprint(tag: &str) -> Fingerprint {
		let mut fp = FingerprintBuilder::new();
		fp.text(tag);
		fp.finish()
	}

	fn event() -> Event {
		Event {
			program: Prover {
				name: "p".into(),
				binary: "p".into(),
				cmd: "$binary $file".into(),
				sat: "sat".into(),
				unsat: "unsat".into(),
				unknown: None,
				timeout: None,
				memory: None,
			},
			problem: Problem::new("x.smt2", Classification::Sat),
			res: Classification::Sat,
			raw: RawOutput::default(),
		}
	}

	#[test]
	fn store_then_load() {
		let dir = tempfile::tempdir().unwrap();
		let cache = Cache::open(dir.path()).unwrap();
		let fp = fingerprint("a");
		assert!(cache.load(fp).is_none());
		cache.store(fp, &event());
		assert_eq!(cache.load(fp), Some(event()));
	}

	#[test]
	fn expired_entries_are_misses() {
		let dir = tempfile::tempdir().unwrap();
		let cache = Cache::with_ttl(dir.path(), Duration::ZERO).unwrap();
		let fp = fingerprint("b");
		cache.store(fp, &event());
		std::thread::sleep(Duration::from_millis(20));
		assert!(cache.load(fp).is_none());
	}

	#[test]
	fn corrupt_entries_are_misses() {
		let dir = tempfile::tempdir().unwrap();
		let cache = Cache::open(dir.path()).unwrap();
		let fp = fingerprint("c");
		fs::write(cache.entry_path(fp), b"not json").unwrap();
		assert!(cache.load(fp).is_none());
	}
}
