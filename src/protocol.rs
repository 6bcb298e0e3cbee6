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

//! Line-oriented ASCII command protocol shared by stdin mode and the TCP
//! server. One command per line, whitespace-separated tokens; a value
//! token containing whitespace is not representable (known limitation).

use crate::engine::Engine;

/// Parse and execute one command line against `engine`, returning the
/// response line (without trailing newline; callers append it).
pub fn dispatch(engine: &Engine, line: &str) -> String {
	let mut tokens = line.split_whitespace();
	let command = match tokens.next() {
		Some(c) => c.to_ascii_uppercase(),
		None => return "ERROR: Unknown command".to_string(),
	};

	match command.as_str() {
		"SET" => dispatch_set(engine, tokens),
		"GET" => dispatch_get(engine, tokens),
		"DELETE" | "DEL" => dispatch_delete(engine, tokens),
		"EXISTS" => dispatch_exists(engine, tokens),
		"INCR" => dispatch_incr(engine, tokens, 1),
		"DECR" => dispatch_incr(engine, tokens, -1),
		"SIZE" => format!("{} keys", engine.size()),
		"CLEAR" => {
			engine.clear();
			"OK".to_string()
		}
		"QUIT" | "EXIT" => "Goodbye".to_string(),
		_ => "ERROR: Unknown command".to_string(),
	}
}

/// Whether `dispatch`'s response for this line should be followed by
/// closing the connection (stdin EOF or socket shutdown).
pub fn is_quit(line: &str) -> bool {
	match line.split_whitespace().next() {
		Some(t) => {
			let upper = t.to_ascii_uppercase();
			upper == "QUIT" || upper == "EXIT"
		}
		None => false,
	}
}

fn dispatch_set<'a>(engine: &Engine, mut tokens: impl Iterator<Item = &'a str>) -> String {
	let key = match tokens.next() {
		Some(k) => k,
		None => return "ERROR: SET requires a key".to_string(),
	};
	let value = match tokens.next() {
		Some(v) => v,
		None => return "ERROR: SET requires a value".to_string(),
	};
	let ttl = match tokens.next() {
		Some(t) => match t.parse::<i64>() {
			Ok(t) => t,
			Err(_) => return "ERROR: invalid TTL".to_string(),
		},
		None => 0,
	};

	match engine.set(key.as_bytes(), value.as_bytes(), ttl) {
		Ok(()) => "OK".to_string(),
		Err(e) => format!("ERROR: {}", e),
	}
}

fn dispatch_get<'a>(engine: &Engine, mut tokens: impl Iterator<Item = &'a str>) -> String {
	let key = match tokens.next() {
		Some(k) => k,
		None => return "ERROR: GET requires a key".to_string(),
	};
	match engine.get(key.as_bytes()) {
		Some(value) => format!("\"{}\"", String::from_utf8_lossy(&value)),
		None => "(nil)".to_string(),
	}
}

fn dispatch_delete<'a>(engine: &Engine, mut tokens: impl Iterator<Item = &'a str>) -> String {
	let key = match tokens.next() {
		Some(k) => k,
		None => return "ERROR: DELETE requires a key".to_string(),
	};
	match engine.delete(key.as_bytes()) {
		Ok(true) => "OK".to_string(),
		Ok(false) => "(not found)".to_string(),
		Err(e) => format!("ERROR: {}", e),
	}
}

fn dispatch_exists<'a>(engine: &Engine, mut tokens: impl Iterator<Item = &'a str>) -> String {
	let key = match tokens.next() {
		Some(k) => k,
		None => return "ERROR: EXISTS requires a key".to_string(),
	};
	if engine.exists(key.as_bytes()) {
		"1".to_string()
	} else {
		"0".to_string()
	}
}

fn dispatch_incr<'a>(engine: &Engine, mut tokens: impl Iterator<Item = &'a str>, sign: i64) -> String {
	let key = match tokens.next() {
		Some(k) => k,
		None => return "ERROR: INCR/DECR requires a key".to_string(),
	};
	match engine.increment(key.as_bytes(), sign) {
		Ok(value) => value.to_string(),
		Err(e) => format!("ERROR: {}", e),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::options::Options;

	fn engine() -> Engine {
		Engine::open(Options::in_memory()).unwrap()
	}

	#[test]
	fn basic_round_trip_scenario() {
		let e = engine();
		assert_eq!(dispatch(&e, "SET name Alice"), "OK");
		assert_eq!(dispatch(&e, "GET name"), "\"Alice\"");
		assert_eq!(dispatch(&e, "SIZE"), "1 keys");
		assert_eq!(dispatch(&e, "DELETE name"), "OK");
		assert_eq!(dispatch(&e, "GET name"), "(nil)");
	}

	#[test]
	fn counter_scenario() {
		let e = engine();
		assert_eq!(dispatch(&e, "SET c 100"), "OK");
		assert_eq!(dispatch(&e, "INCR c"), "101");
		assert_eq!(dispatch(&e, "INCR c"), "102");
		assert_eq!(dispatch(&e, "DECR c"), "101");
		assert_eq!(dispatch(&e, "GET c"), "\"101\"");
	}

	#[test]
	fn ttl_scenario() {
		let e = engine();
		assert_eq!(dispatch(&e, "SET s x 1"), "OK");
		assert_eq!(dispatch(&e, "GET s"), "\"x\"");
	}

	#[test]
	fn exists_reports_boolean_text() {
		let e = engine();
		dispatch(&e, "SET a 1");
		assert_eq!(dispatch(&e, "EXISTS a"), "1");
		assert_eq!(dispatch(&e, "EXISTS missing"), "0");
	}

	#[test]
	fn delete_missing_key_reports_not_found() {
		let e = engine();
		assert_eq!(dispatch(&e, "DELETE missing"), "(not found)");
	}

	#[test]
	fn unknown_command_reports_error() {
		let e = engine();
		assert_eq!(dispatch(&e, "FROB x"), "ERROR: Unknown command");
	}

	#[test]
	fn set_missing_value_reports_error() {
		let e = engine();
		assert_eq!(dispatch(&e, "SET onlykey"), "ERROR: SET requires a value");
	}

	#[test]
	fn quit_and_exit_are_recognized() {
		assert!(is_quit("QUIT"));
		assert!(is_quit("exit"));
		assert!(!is_quit("GET k"));
	}

	#[test]
	fn clear_empties_store() {
		let e = engine();
		dispatch(&e, "SET a 1");
		dispatch(&e, "SET b 2");
		assert_eq!(dispatch(&e, "CLEAR"), "OK");
		assert_eq!(dispatch(&e, "SIZE"), "0 keys");
	}
}
