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

//! Black-box scenarios against the public `nubdb::Engine` API, mirroring
//! the end-to-end scenarios and boundary cases laid out for this store.

use std::path::PathBuf;
use std::time::Duration;

use nubdb::options::FlushPolicy;
use nubdb::{Engine, Options};

struct TempDir(PathBuf);

impl TempDir {
	fn new(name: &'static str) -> TempDir {
		let mut path = std::env::temp_dir();
		path.push("nubdb-test");
		path.push("e2e");
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
fn basic_round_trip() {
	let dir = TempDir::new("basic_round_trip");
	let engine = Engine::open(Options::new(dir.log_path())).unwrap();
	assert_eq!(nubdb::protocol::dispatch(&engine, "SET name Alice"), "OK");
	assert_eq!(nubdb::protocol::dispatch(&engine, "GET name"), "\"Alice\"");
	assert_eq!(nubdb::protocol::dispatch(&engine, "SIZE"), "1 keys");
	assert_eq!(nubdb::protocol::dispatch(&engine, "DELETE name"), "OK");
	assert_eq!(nubdb::protocol::dispatch(&engine, "GET name"), "(nil)");
}

#[test]
fn counter_scenario() {
	let dir = TempDir::new("counter_scenario");
	let engine = Engine::open(Options::new(dir.log_path())).unwrap();
	assert_eq!(nubdb::protocol::dispatch(&engine, "SET c 100"), "OK");
	assert_eq!(nubdb::protocol::dispatch(&engine, "INCR c"), "101");
	assert_eq!(nubdb::protocol::dispatch(&engine, "INCR c"), "102");
	assert_eq!(nubdb::protocol::dispatch(&engine, "DECR c"), "101");
	assert_eq!(nubdb::protocol::dispatch(&engine, "GET c"), "\"101\"");
}

#[test]
fn ttl_expiry() {
	let dir = TempDir::new("ttl_expiry");
	let engine = Engine::open(Options::new(dir.log_path())).unwrap();
	engine.set(b"s", b"x", 1).unwrap();
	assert_eq!(engine.get(b"s").unwrap(), b"x");
	std::thread::sleep(Duration::from_secs(2));
	assert!(engine.get(b"s").is_none());
}

#[test]
fn crash_recovery_with_many_writes() {
	let dir = TempDir::new("crash_recovery_with_many_writes");
	{
		let mut options = Options::new(dir.log_path());
		options.flush_policy = FlushPolicy::EveryNOps(1000);
		let engine = Engine::open(options).unwrap();
		for i in 0..1000 {
			engine.set(format!("k{}", i).as_bytes(), format!("v{}", i).as_bytes(), 0).unwrap();
		}
		engine.force_flush().unwrap();
	}

	let engine = Engine::open(Options::new(dir.log_path())).unwrap();
	assert_eq!(engine.size(), 1000);
	for i in (0..1000).step_by(97) {
		assert_eq!(engine.get(format!("k{}", i).as_bytes()).unwrap(), format!("v{}", i).into_bytes());
	}
}

#[test]
fn compaction_equivalence_across_restart() {
	let dir = TempDir::new("compaction_equivalence_across_restart");
	let mut expected = std::collections::HashMap::new();

	{
		let mut options = Options::new(dir.log_path());
		options.flush_policy = FlushPolicy::Always;
		options.rewrite_threshold_bytes = 4096;
		options.compaction_interval_secs = 100;
		let engine = Engine::open(options).unwrap();

		for op in 0..100_000u32 {
			let key = format!("key{}", op % 100);
			if op % 37 == 0 {
				engine.delete(key.as_bytes()).unwrap();
				expected.remove(&key);
			} else {
				let value = format!("v{}", op);
				engine.set(key.as_bytes(), value.as_bytes(), 0).unwrap();
				expected.insert(key, value);
			}
		}
		engine.force_flush().unwrap();
	}

	let engine = Engine::open(Options::new(dir.log_path())).unwrap();
	assert_eq!(engine.size(), expected.len());
	for (key, value) in &expected {
		assert_eq!(engine.get(key.as_bytes()).unwrap(), value.as_bytes());
	}
}

#[test]
fn replay_of_empty_log_yields_empty_engine() {
	let dir = TempDir::new("replay_of_empty_log_yields_empty_engine");
	std::fs::write(dir.log_path(), b"").unwrap();
	let engine = Engine::open(Options::new(dir.log_path())).unwrap();
	assert_eq!(engine.size(), 0);
}

#[test]
fn clear_is_not_logged_and_survives_restart() {
	let dir = TempDir::new("clear_is_not_logged_and_survives_restart");
	{
		let engine = Engine::open(Options::new(dir.log_path())).unwrap();
		engine.set(b"a", b"1", 0).unwrap();
		engine.set(b"b", b"2", 0).unwrap();
		engine.force_flush().unwrap();
		engine.clear();
		assert_eq!(engine.size(), 0);
	}

	// `clear` writes no marker to the log, so a fresh replay after the
	// in-memory `clear` still sees the pre-clear writes.
	let engine = Engine::open(Options::new(dir.log_path())).unwrap();
	assert_eq!(engine.size(), 2);
}
