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

//! Background compaction: periodically rewrites the AOF into the minimal
//! log equivalent to the live index, then atomically swaps it in.
//!
//! Runs on a dedicated OS thread, not an async task: the core never pulls in
//! an async runtime. A crash at any point during the rewrite leaves either
//! the old complete log or the new complete log on disk; the rename is the
//! linearization point (step 7 of `rewrite_once`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::RwLock;

use crate::aof::{encode_frame, AofWriter, OP_SET};
use crate::error::Result;
use crate::index::Index;

/// Rewrite `path`'s log to contain exactly one SET frame per live, unexpired
/// key in `index`, then atomically rename it over the live log and reopen
/// `writer` against the new file. Returns the new log size in bytes.
///
/// Mutations cannot be observed mid-rewrite: the caller holds `index`'s
/// shared lock for the duration of step 1-3 below, so the iterator sees a
/// single consistent snapshot.
pub fn rewrite_once(path: &Path, index: &Index, writer: &AofWriter, now: i64) -> Result<u64> {
	let tmp_path = tmp_path_for(path);

	let result = (|| -> Result<u64> {
		let mut tmp = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path)?;
		let mut written: u64 = 0;
		for (key, record) in index.iter() {
			if record.is_expired(now) {
				continue;
			}
			let frame = encode_frame(OP_SET, key, &record.bytes);
			tmp.write_all(&frame)?;
			written += frame.len() as u64;
		}
		tmp.flush()?;
		tmp.sync_data()?;
		Ok(written)
	})();

	let written = match result {
		Ok(written) => written,
		Err(e) => {
			let _ = std::fs::remove_file(&tmp_path);
			return Err(e);
		}
	};

	std::fs::rename(&tmp_path, path)?;
	writer.reopen_after_rewrite(written)?;
	Ok(written)
}

fn tmp_path_for(path: &Path) -> PathBuf {
	let mut tmp = path.as_os_str().to_owned();
	tmp.push(".tmp");
	PathBuf::from(tmp)
}

/// Handle to the background compaction worker thread. Dropping it signals
/// the worker to stop and joins it, so tests and embedders never leak a
/// thread.
pub struct CompactionWorker {
	running: Arc<AtomicBool>,
	handle: Option<JoinHandle<()>>,
}

impl CompactionWorker {
	/// Spawn the worker. It wakes every `interval`; whenever
	/// `writer.log_size_bytes() >= rewrite_threshold_bytes` it runs one
	/// rewrite, holding `index`'s read lock only for the snapshot phase.
	pub fn spawn(
		path: PathBuf,
		index: Arc<RwLock<Index>>,
		writer: Arc<AofWriter>,
		interval: Duration,
		rewrite_threshold_bytes: u64,
	) -> CompactionWorker {
		let running = Arc::new(AtomicBool::new(true));
		let worker_running = running.clone();

		let handle = std::thread::spawn(move || {
			while worker_running.load(Ordering::Relaxed) {
				std::thread::sleep(interval);
				if !worker_running.load(Ordering::Relaxed) {
					break;
				}
				if writer.log_size_bytes() < rewrite_threshold_bytes {
					continue;
				}
				let now = crate::engine::now_secs();
				let guard = index.read();
				match rewrite_once(&path, &guard, &writer, now) {
					Ok(bytes) => {
						log::debug!(target: "nubdb", "Compacted AOF {} to {} bytes", path.display(), bytes);
					}
					Err(e) => {
						log::warn!(target: "nubdb", "Compaction of {} failed: {}", path.display(), e);
					}
				}
			}
		});

		CompactionWorker { running, handle: Some(handle) }
	}
}

impl Drop for CompactionWorker {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Relaxed);
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}
