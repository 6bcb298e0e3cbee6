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

//! Append-only log writer: frames mutation intents into the on-disk format
//! and flushes them to stable storage per the configured [`FlushPolicy`].
//!
//! Frame layout: `[timestamp i64 LE][op u8][key_len u32 LE][key][value_len u32 LE][value]`.
//! No per-record checksum; the replayer (`crate::replay`) treats a truncated
//! trailing frame as the end of the usable log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::Result;
use crate::options::FlushPolicy;

pub const OP_SET: u8 = 1;
pub const OP_DELETE: u8 = 2;

pub const HEADER_BYTES: usize = 8 + 1 + 4 + 4;

fn now_secs() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Encode a single frame for `op` over `key`/`value`. `op` must be
/// [`OP_SET`] or [`OP_DELETE`]; callers guarantee `value` is empty for deletes.
pub fn encode_frame(op: u8, key: &[u8], value: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(HEADER_BYTES + key.len() + value.len());
	buf.extend_from_slice(&now_secs().to_le_bytes());
	buf.push(op);
	buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
	buf.extend_from_slice(key);
	buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
	buf.extend_from_slice(value);
	buf
}

struct AppendState {
	file: BufWriter<File>,
}

/// Serializes mutations into the AOF and flushes per [`FlushPolicy`].
///
/// The log mutex is the single exclusive lock that serializes `append` and
/// `force_flush` against each other and against the compactor's swap.
pub struct AofWriter {
	path: PathBuf,
	state: Mutex<AppendState>,
	policy: FlushPolicy,
	ops_since_flush: AtomicU64,
	log_size_bytes: AtomicU64,
	last_flush_time: AtomicU64,
}

impl AofWriter {
	/// Open (creating if absent) the log at `path` for appending, positioned
	/// at the current end of file.
	pub fn open(path: impl AsRef<Path>, policy: FlushPolicy) -> Result<AofWriter> {
		let path = path.as_ref().to_path_buf();
		let file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
		let size = file.metadata()?.len();
		log::debug!(target: "nubdb", "Opened AOF {} ({} bytes)", path.display(), size);
		Ok(AofWriter {
			path,
			state: Mutex::new(AppendState { file: BufWriter::new(file) }),
			policy,
			ops_since_flush: AtomicU64::new(0),
			log_size_bytes: AtomicU64::new(size),
			last_flush_time: AtomicU64::new(now_secs() as u64),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn log_size_bytes(&self) -> u64 {
		self.log_size_bytes.load(Ordering::Relaxed)
	}

	/// Append one SET frame for `key`/`value`, then flush if the policy requires it.
	pub fn append_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
		self.append(OP_SET, key, value)
	}

	/// Append one DELETE frame for `key` (value is always empty).
	pub fn append_delete(&self, key: &[u8]) -> Result<()> {
		self.append(OP_DELETE, key, &[])
	}

	fn append(&self, op: u8, key: &[u8], value: &[u8]) -> Result<()> {
		let frame = encode_frame(op, key, value);
		let mut state = self.state.lock();
		state.file.write_all(&frame)?;
		self.log_size_bytes.fetch_add(frame.len() as u64, Ordering::Relaxed);
		let ops = self.ops_since_flush.fetch_add(1, Ordering::Relaxed) + 1;

		let should_flush = match self.policy {
			FlushPolicy::Always => true,
			FlushPolicy::EveryNOps(n) => ops >= n,
			FlushPolicy::EveryNSeconds(n) => {
				let last = self.last_flush_time.load(Ordering::Relaxed);
				(now_secs() as u64).saturating_sub(last) >= n
			}
		};
		if should_flush {
			self.flush_locked(&mut state)?;
		}
		Ok(())
	}

	fn flush_locked(&self, state: &mut AppendState) -> Result<()> {
		state.file.flush()?;
		state.file.get_ref().sync_data()?;
		self.ops_since_flush.store(0, Ordering::Relaxed);
		self.last_flush_time.store(now_secs() as u64, Ordering::Relaxed);
		Ok(())
	}

	/// Unconditionally flush and reset counters. Called on clean shutdown.
	pub fn force_flush(&self) -> Result<()> {
		let mut state = self.state.lock();
		self.flush_locked(&mut state)
	}

	/// Swap in a freshly-rewritten log file, as the compactor does after the
	/// atomic rename. Must be called while holding whatever lock guards
	/// concurrent appends at a higher level (the engine always pairs this
	/// with the index's exclusive lock already being held by the compactor).
	pub fn reopen_after_rewrite(&self, new_size: u64) -> Result<()> {
		let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
		let mut state = self.state.lock();
		state.file = BufWriter::new(file);
		self.log_size_bytes.store(new_size, Ordering::Relaxed);
		self.ops_since_flush.store(0, Ordering::Relaxed);
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Read;

	struct TempDir(PathBuf);

	impl TempDir {
		fn new(name: &'static str) -> TempDir {
			let mut path = std::env::temp_dir();
			path.push("nubdb-test");
			path.push("aof");
			path.push(name);
			if path.exists() {
				std::fs::remove_dir_all(&path).unwrap();
			}
			std::fs::create_dir_all(&path).unwrap();
			TempDir(path)
		}

		fn log_path(&self) -> PathBuf {
			self.0.join("nubdb.aof")
		}
	}

	impl Drop for TempDir {
		fn drop(&mut self) {
			if self.0.exists() {
				std::fs::remove_dir_all(&self.0).unwrap();
			}
		}
	}

	#[test]
	fn append_writes_frame_bytes() {
		let dir = TempDir::new("append_writes_frame_bytes");
		let writer = AofWriter::open(dir.log_path(), FlushPolicy::Always).unwrap();
		writer.append_set(b"k", b"v").unwrap();
		writer.force_flush().unwrap();

		let mut buf = Vec::new();
		File::open(dir.log_path()).unwrap().read_to_end(&mut buf).unwrap();
		assert_eq!(buf.len(), HEADER_BYTES + 1 + 1);
		assert_eq!(buf[8], OP_SET);
	}

	#[test]
	fn delete_frame_has_zero_value_len() {
		let dir = TempDir::new("delete_frame_has_zero_value_len");
		let writer = AofWriter::open(dir.log_path(), FlushPolicy::Always).unwrap();
		writer.append_delete(b"k").unwrap();
		writer.force_flush().unwrap();

		let mut buf = Vec::new();
		File::open(dir.log_path()).unwrap().read_to_end(&mut buf).unwrap();
		let value_len_offset = 8 + 1 + 4 + 1;
		let value_len = u32::from_le_bytes(buf[value_len_offset..value_len_offset + 4].try_into().unwrap());
		assert_eq!(value_len, 0);
	}

	#[test]
	fn every_n_ops_flushes_after_threshold() {
		let dir = TempDir::new("every_n_ops_flushes_after_threshold");
		let writer = AofWriter::open(dir.log_path(), FlushPolicy::EveryNOps(3)).unwrap();
		writer.append_set(b"a", b"1").unwrap();
		writer.append_set(b"b", b"2").unwrap();
		assert_eq!(writer.ops_since_flush.load(Ordering::Relaxed), 2);
		writer.append_set(b"c", b"3").unwrap();
		assert_eq!(writer.ops_since_flush.load(Ordering::Relaxed), 0);
	}

	#[test]
	fn log_size_bytes_tracks_appends() {
		let dir = TempDir::new("log_size_bytes_tracks_appends");
		let writer = AofWriter::open(dir.log_path(), FlushPolicy::Always).unwrap();
		writer.append_set(b"key", b"value").unwrap();
		assert_eq!(writer.log_size_bytes(), (HEADER_BYTES + 3 + 5) as u64);
	}
}
