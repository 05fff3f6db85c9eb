//! Lumina chat server binary.
//! Run with: cargo run --bin lumina-server

use std::process::ExitCode;

use lumina_chat::start_lumina_chat;

fn main() -> ExitCode {
    start_lumina_chat::run()
}
