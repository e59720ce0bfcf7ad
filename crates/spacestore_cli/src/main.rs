//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `spacestore_core` linkage and schema bootstrap from a shell.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `spacestore_cli [DB_PATH] [ORG_ID]`. Without a path an in-memory
//! database is used. Prints the space count of `ORG_ID` (default `0`).
//! `SPACESTORE_LOG_DIR` (absolute) enables file logging at
//! `SPACESTORE_LOG_LEVEL` or the build default.

use spacestore_core::db::migrations::latest_version;
use spacestore_core::db::{open_db, open_db_in_memory};
use spacestore_core::{
    default_log_level, init_logging, RequestContext, SpaceStore, SqliteSpaceStore,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("SPACESTORE_LOG_DIR") {
        let level = std::env::var("SPACESTORE_LOG_LEVEL")
            .unwrap_or_else(|_| default_log_level().to_string());
        if let Err(err) = init_logging(&level, &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    println!("spacestore_core version={}", spacestore_core::core_version());

    let opened = match std::env::args().nth(1) {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            log::error!("event=cli_open module=cli status=error error={err}");
            eprintln!("failed to open database: {err}");
            return ExitCode::FAILURE;
        }
    };

    let store = match SqliteSpaceStore::try_new(&conn) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("database is not usable: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("spacestore_core schema_version={}", latest_version());

    // Listing an org exercises the space table end to end without writing.
    let org_id = std::env::args().nth(2).unwrap_or_else(|| "0".to_string());
    match store.get_all(&RequestContext::new(org_id.as_str(), "0")) {
        Ok(spaces) => {
            println!("spacestore_core org={} spaces={}", org_id, spaces.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to list spaces: {err}");
            ExitCode::FAILURE
        }
    }
}
