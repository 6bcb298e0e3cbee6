// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

//! The top-level storage engine: owns the index and the optional log,
//! enforces the locking discipline (index lock acquired before log lock,
//! never the reverse), and exposes the public key-value operations.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::aof::AofWriter;
use crate::compactor::CompactionWorker;
use crate::error::{Error, Result};
use crate::index::{Index, Record};
use crate::options::Options;
use crate::replay;

pub(crate) fn now_secs() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Top-level key-value store. Constructed from [`Options`]; replays any
/// existing log on open and, if persistence is enabled, spawns a background
/// compaction worker for the lifetime of the engine.
pub struct Engine {
	index: Arc<RwLock<Index>>,
	writer: Option<Arc<AofWriter>>,
	compactor: Option<CompactionWorker>,
	key_max: usize,
	value_max: usize,
	ops_count: AtomicU64,
}

impl Engine {
	/// Open an engine per `options`. If `options.path` is `Some`, replays the
	/// existing log (if any) before returning and starts the compaction
	/// worker; `None` yields a pure in-memory engine with no persistence.
	pub fn open(options: Options) -> Result<Engine> {
		let mut index = Index::new(options.initial_capacity);

		let writer = match &options.path {
			Some(path) => {
				replay::replay(path, &mut index, options.key_max, options.value_max)?;
				Some(Arc::new(AofWriter::open(path, options.flush_policy)?))
			}
			None => None,
		};

		let index = Arc::new(RwLock::new(index));

		let compactor = match (&writer, &options.path) {
			(Some(writer), Some(path)) => Some(CompactionWorker::spawn(
				path.clone(),
				index.clone(),
				writer.clone(),
				Duration::from_secs(options.compaction_interval_secs),
				options.rewrite_threshold_bytes,
			)),
			_ => None,
		};

		log::debug!(target: "nubdb", "Engine opened (persistent={})", writer.is_some());

		Ok(Engine {
			index,
			writer,
			compactor,
			key_max: options.key_max,
			value_max: options.value_max,
			ops_count: AtomicU64::new(0),
		})
	}

	pub fn log_path(&self) -> Option<PathBuf> {
		self.writer.as_ref().map(|w| w.path().to_path_buf())
	}

	fn validate_key(&self, key: &[u8]) -> Result<()> {
		if key.is_empty() {
			return Err(Error::InvalidInput("key must not be empty".into()));
		}
		if key.len() > self.key_max {
			return Err(Error::InvalidInput(format!("key length {} exceeds limit {}", key.len(), self.key_max)));
		}
		Ok(())
	}

	/// Insert or overwrite `key` with `value`. `ttl_seconds > 0` sets an
	/// absolute expiry relative to the current time; `0` means no expiry.
	pub fn set(&self, key: &[u8], value: &[u8], ttl_seconds: i64) -> Result<()> {
		self.validate_key(key)?;
		if value.len() > self.value_max {
			return Err(Error::InvalidInput(format!("value length {} exceeds limit {}", value.len(), self.value_max)));
		}

		let expires_at = if ttl_seconds > 0 { now_secs() + ttl_seconds } else { 0 };

		{
			let mut guard = self.index.write();
			guard.put(key, Record::new(value.to_vec(), expires_at));
			if let Some(writer) = &self.writer {
				writer.append_set(key, value)?;
			}
		}

		self.maybe_cleanup();
		Ok(())
	}

	/// Look up `key`. Returns `None` if absent or logically expired; an
	/// expired entry is left in place (lazy cleanup), not removed here.
	pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
		let guard = self.index.read();
		let record = guard.get(key)?;
		if record.is_expired(now_secs()) {
			return None;
		}
		Some(record.bytes.clone())
	}

	/// Remove `key`. Returns whether a key was actually present (an expired
	/// ghost entry still counts as present for this purpose, matching
	/// `index.remove`'s own semantics).
	pub fn delete(&self, key: &[u8]) -> Result<bool> {
		self.validate_key(key)?;
		let removed = {
			let mut guard = self.index.write();
			let removed = guard.remove(key);
			if removed {
				if let Some(writer) = &self.writer {
					writer.append_delete(key)?;
				}
			}
			removed
		};
		self.maybe_cleanup();
		Ok(removed)
	}

	/// As `get`, but returns only presence; expired entries are absent.
	pub fn exists(&self, key: &[u8]) -> bool {
		self.get(key).is_some()
	}

	fn adjust(&self, key: &[u8], delta: i64) -> Result<i64> {
		self.validate_key(key)?;
		let new_value = {
			let mut guard = self.index.write();
			let current = match guard.get(key) {
				Some(record) if !record.is_expired(now_secs()) => {
					std::str::from_utf8(&record.bytes).ok().and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0)
				}
				_ => 0,
			};
			let new_value = current.wrapping_add(delta);
			let text = new_value.to_string();
			guard.put(key, Record::new(text.clone().into_bytes(), 0));
			if let Some(writer) = &self.writer {
				writer.append_set(key, text.as_bytes())?;
			}
			new_value
		};
		self.maybe_cleanup();
		Ok(new_value)
	}

	/// Parse the current value as a base-10 `i64` (absent or non-numeric
	/// treated as 0), add `delta` with wrapping semantics, store and log the
	/// result as text, and clear any TTL. Returns the new value.
	pub fn increment(&self, key: &[u8], delta: i64) -> Result<i64> {
		self.adjust(key, delta)
	}

	pub fn decrement(&self, key: &[u8], delta: i64) -> Result<i64> {
		self.adjust(key, -delta)
	}

	/// Current key count, which may include ghost-expired entries pending
	/// cleanup.
	pub fn size(&self) -> usize {
		self.index.read().len()
	}

	/// Empty the index. Not logged: after a crash following `clear`, replay
	/// restores every key present beforehand (see design notes).
	pub fn clear(&self) {
		self.index.write().clear();
	}

	/// Remove every entry whose TTL has passed. Returns the number removed.
	/// Not logged.
	pub fn cleanup_expired(&self) -> usize {
		let now = now_secs();
		let mut guard = self.index.write();
		let expired: Vec<Vec<u8>> =
			guard.iter().filter(|(_, record)| record.is_expired(now)).map(|(k, _)| k.to_vec()).collect();
		let count = expired.len();
		for key in expired {
			guard.remove(&key);
		}
		count
	}

	/// Called on the cadence the dispatcher chooses (every 100 operations by
	/// default, per §4.5) to scrub ghost-expired entries opportunistically.
	fn maybe_cleanup(&self) {
		let ops = self.ops_count.fetch_add(1, Ordering::Relaxed) + 1;
		if ops % 100 == 0 {
			let removed = self.cleanup_expired();
			if removed > 0 {
				log::debug!(target: "nubdb", "Lazy cleanup removed {} expired entries", removed);
			}
		}
	}

	/// Force all buffered log bytes to stable storage. A no-op for an
	/// in-memory engine.
	pub fn force_flush(&self) -> Result<()> {
		if let Some(writer) = &self.writer {
			writer.force_flush()?;
		}
		Ok(())
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		self.compactor.take();
		if let Some(writer) = &self.writer {
			if let Err(e) = writer.force_flush() {
				log::warn!(target: "nubdb", "Failed to flush AOF on shutdown: {}", e);
			}
		}
	}
}
