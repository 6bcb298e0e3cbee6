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

//! An embeddable key-value store: Robin Hood hashed index, append-only log
//! for crash recovery, and background compaction. This crate never reads
//! environment variables or initializes a logger itself; embedders wire up
//! `log`'s facade (e.g. with `env_logger`, as the bundled binary does).

pub mod aof;
pub mod compactor;
pub mod engine;
pub mod error;
pub mod hash;
pub mod index;
pub mod options;
pub mod protocol;
pub mod replay;

pub use engine::Engine;
pub use error::{Error, Result};
pub use options::{FlushPolicy, Options};
