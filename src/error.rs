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

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	Io(std::io::Error),
	Corruption(String),
	InvalidInput(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::Io(e) => write!(f, "IO Error: {}", e),
			Error::Corruption(s) => write!(f, "Corruption: {}", s),
			Error::InvalidInput(s) => write!(f, "Invalid input: {}", s),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Error {
		Error::Io(e)
	}
}

#[cfg(test)]
mod test {
	use super::Error;

	#[test]
	fn display_variants() {
		let io = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
		assert!(format!("{}", io).starts_with("IO Error"));
		assert_eq!(format!("{}", Error::Corruption("bad frame".into())), "Corruption: bad frame");
		assert_eq!(format!("{}", Error::InvalidInput("empty key".into())), "Invalid input: empty key");
	}
}
