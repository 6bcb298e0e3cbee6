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

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::ExitCode;
use std::sync::Arc;

use structopt::StructOpt;

use nubdb::{Engine, Options};

const DEFAULT_PORT: u16 = 6379;

#[derive(StructOpt)]
#[structopt(name = "nubdb", about = "An embeddable key-value store")]
struct Args {
	/// Run as a TCP server instead of reading commands from standard input,
	/// optionally on a specific port (default 6379).
	#[structopt(long)]
	server: Option<Option<u16>>,
}

fn main() -> ExitCode {
	env_logger::init();

	let args = Args::from_args();

	let engine = match Engine::open(Options::new(nubdb::options::DEFAULT_LOG_FILE)) {
		Ok(engine) => Arc::new(engine),
		Err(e) => {
			eprintln!("Failed to open store: {}", e);
			return ExitCode::FAILURE;
		}
	};

	match args.server {
		Some(port) => match run_server(engine, port.unwrap_or(DEFAULT_PORT)) {
			Ok(()) => ExitCode::SUCCESS,
			Err(e) => {
				eprintln!("Server failed: {}", e);
				ExitCode::FAILURE
			}
		},
		None => {
			run_stdin(&engine);
			ExitCode::SUCCESS
		}
	}
}

fn run_stdin(engine: &Engine) {
	let stdin = std::io::stdin();
	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	for line in stdin.lock().lines() {
		let line = match line {
			Ok(l) => l,
			Err(_) => break,
		};
		let response = nubdb::protocol::dispatch(engine, &line);
		let _ = writeln!(out, "{}", response);
		if nubdb::protocol::is_quit(&line) {
			break;
		}
	}
}

fn run_server(engine: Arc<Engine>, port: u16) -> std::io::Result<()> {
	let listener = TcpListener::bind(("0.0.0.0", port))?;
	log::info!(target: "nubdb", "Listening on 0.0.0.0:{}", port);

	for stream in listener.incoming() {
		let stream = stream?;
		let engine = engine.clone();
		std::thread::spawn(move || {
			if let Err(e) = handle_connection(&engine, stream) {
				log::warn!(target: "nubdb", "Connection error: {}", e);
			}
		});
	}
	Ok(())
}

fn handle_connection(engine: &Engine, stream: TcpStream) -> std::io::Result<()> {
	let mut writer = stream.try_clone()?;
	let reader = BufReader::new(stream);
	for line in reader.lines() {
		let line = line?;
		let response = nubdb::protocol::dispatch(engine, &line);
		writeln!(writer, "{}", response)?;
		if nubdb::protocol::is_quit(&line) {
			break;
		}
	}
	Ok(())
}
