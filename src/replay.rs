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

//! Replays an AOF from offset 0 into a freshly-created [`Index`], run once
//! at engine startup before the engine accepts user operations. Applies
//! records directly to the index; never goes back through [`crate::aof::AofWriter`].

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::aof::{OP_DELETE, OP_SET};
use crate::error::{Error, Result};
use crate::index::{Index, Record};

/// Read `path` from the start and apply every complete frame to `index`.
/// A truncated trailing frame is silently treated as the end of the log,
/// matching the durability guarantee that an unflushed tail may be lost.
pub fn replay(path: &Path, index: &mut Index, key_max: usize, value_max: usize) -> Result<()> {
	let mut file = match File::open(path) {
		Ok(f) => f,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
		Err(e) => return Err(e.into()),
	};

	let mut applied = 0u64;
	loop {
		let mut ts_buf = [0u8; 8];
		match read_exact_or_eof(&mut file, &mut ts_buf)? {
			false => break,
			true => {}
		}

		let mut op_buf = [0u8; 1];
		if !read_exact_or_eof(&mut file, &mut op_buf)? {
			log::warn!(target: "nubdb", "Truncated trailing frame after {} records, ignoring tail", applied);
			break;
		}
		let op = op_buf[0];

		let mut len_buf = [0u8; 4];
		if !read_exact_or_eof(&mut file, &mut len_buf)? {
			log::warn!(target: "nubdb", "Truncated trailing frame after {} records, ignoring tail", applied);
			break;
		}
		let key_len = u32::from_le_bytes(len_buf) as usize;
		if key_len > key_max {
			return Err(Error::Corruption(format!("key length {} exceeds KEY_MAX {}", key_len, key_max)));
		}

		let mut key = vec![0u8; key_len];
		if !read_exact_or_eof(&mut file, &mut key)? {
			log::warn!(target: "nubdb", "Truncated trailing frame after {} records, ignoring tail", applied);
			break;
		}

		if !read_exact_or_eof(&mut file, &mut len_buf)? {
			log::warn!(target: "nubdb", "Truncated trailing frame after {} records, ignoring tail", applied);
			break;
		}
		let value_len = u32::from_le_bytes(len_buf) as usize;
		if value_len > value_max {
			return Err(Error::Corruption(format!("value length {} exceeds VALUE_MAX {}", value_len, value_max)));
		}
		if op == OP_DELETE && value_len != 0 {
			return Err(Error::Corruption("DELETE frame carries a non-empty value".into()));
		}

		let mut value = vec![0u8; value_len];
		if !read_exact_or_eof(&mut file, &mut value)? {
			log::warn!(target: "nubdb", "Truncated trailing frame after {} records, ignoring tail", applied);
			break;
		}

		match op {
			OP_SET => {
				index.put(&key, Record::new(value, 0));
			}
			OP_DELETE => {
				index.remove(&key);
			}
			other => return Err(Error::Corruption(format!("unknown log opcode {}", other))),
		}
		applied += 1;
	}

	log::debug!(target: "nubdb", "Replayed {} records from {}", applied, path.display());
	Ok(())
}

/// Like `Read::read_exact` but returns `Ok(false)` instead of erroring when
/// EOF is reached before any byte of `buf` has been filled (a clean frame
/// boundary), and still errors on a short read in the middle of `buf`
/// (unless it's at the very start, e.g. no previous bytes were consumed).
fn read_exact_or_eof(file: &mut File, buf: &mut [u8]) -> Result<bool> {
	let mut read = 0;
	while read < buf.len() {
		match file.read(&mut buf[read..]) {
			Ok(0) => return Ok(false),
			Ok(n) => read += n,
			Err(e) if e.kind() == ErrorKind::Interrupted => continue,
			Err(e) => return Err(e.into()),
		}
	}
	Ok(true)
}
