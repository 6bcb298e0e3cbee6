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

use std::path::{Path, PathBuf};

/// Maximum key length accepted by the replayer and the engine (4096 bytes).
pub const KEY_MAX: usize = 4096;
/// Maximum value length accepted by the replayer and the engine (1 MiB).
pub const VALUE_MAX: usize = 1024 * 1024;

/// Initial index capacity. Must be a power of two so that `hash % capacity`
/// stays cheap; the index never shrinks below this floor.
pub const INITIAL_CAPACITY: usize = 1024;

/// Load factor threshold expressed as a percentage (count*100 >= capacity*LOAD_FACTOR_PCT
/// triggers a resize before the insert that would cross it).
pub const LOAD_FACTOR_PCT: usize = 90;

/// Default AOF file name, created in the working directory.
pub const DEFAULT_LOG_FILE: &str = "nubdb.aof";

/// When the log grows at least this large, the compactor rewrites it (64 MiB).
pub const DEFAULT_REWRITE_THRESHOLD_BYTES: u64 = 64 * 1024 * 1024;

/// How often the compaction worker wakes up to check the log size.
pub const DEFAULT_COMPACTION_INTERVAL_SECS: u64 = 10;

/// Durability policy governing when buffered AOF bytes are flushed to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
	/// Flush after every single append. Never loses an acknowledged write.
	Always,
	/// Flush once `ops_since_flush` reaches this many appends.
	EveryNOps(u64),
	/// Flush once at least this many seconds have elapsed since the last flush.
	EveryNSeconds(u64),
}

impl Default for FlushPolicy {
	fn default() -> Self {
		FlushPolicy::EveryNOps(1)
	}
}

/// Configuration for opening a [`crate::engine::Engine`].
#[derive(Debug, Clone)]
pub struct Options {
	/// Path to the append-only log file. `None` disables persistence entirely
	/// (pure in-memory mode).
	pub path: Option<PathBuf>,
	pub initial_capacity: usize,
	pub flush_policy: FlushPolicy,
	pub rewrite_threshold_bytes: u64,
	pub compaction_interval_secs: u64,
	pub key_max: usize,
	pub value_max: usize,
}

impl Options {
	/// Defaults matching the on-disk layout described in the persisted state
	/// layout section: a single `nubdb.aof` file at `path`.
	pub fn new(path: impl AsRef<Path>) -> Options {
		Options {
			path: Some(path.as_ref().to_path_buf()),
			initial_capacity: INITIAL_CAPACITY,
			flush_policy: FlushPolicy::default(),
			rewrite_threshold_bytes: DEFAULT_REWRITE_THRESHOLD_BYTES,
			compaction_interval_secs: DEFAULT_COMPACTION_INTERVAL_SECS,
			key_max: KEY_MAX,
			value_max: VALUE_MAX,
		}
	}

	/// An engine with no backing log: mutations are never persisted.
	pub fn in_memory() -> Options {
		Options {
			path: None,
			initial_capacity: INITIAL_CAPACITY,
			flush_policy: FlushPolicy::default(),
			rewrite_threshold_bytes: DEFAULT_REWRITE_THRESHOLD_BYTES,
			compaction_interval_secs: DEFAULT_COMPACTION_INTERVAL_SECS,
			key_max: KEY_MAX,
			value_max: VALUE_MAX,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn defaults_match_spec() {
		let options = Options::new("nubdb.aof");
		assert_eq!(options.initial_capacity, 1024);
		assert_eq!(options.key_max, 4096);
		assert_eq!(options.value_max, 1024 * 1024);
		assert_eq!(options.rewrite_threshold_bytes, 64 * 1024 * 1024);
	}

	#[test]
	fn in_memory_has_no_path() {
		assert!(Options::in_memory().path.is_none());
	}
}
