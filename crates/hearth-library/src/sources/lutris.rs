//! Lutris database lookups for shortcuts that launch through Lutris

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};

use super::{expand_home, find_existing};
use crate::LibraryError;

const RUNGAMEID_PREFIX: &str = "lutris:rungameid/";

/// The subset of a Lutris `games` row kept as extension metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LutrisGame {
    pub id: i64,
    pub slug: String,
    pub runner: Option<String>,
}

/// Extract the numeric game id from a `lutris:rungameid/<id>` argument
pub fn lutris_id_from_command(command: &str) -> Option<i64> {
    command
        .split_whitespace()
        .find_map(|arg| arg.trim_matches('"').strip_prefix(RUNGAMEID_PREFIX))
        .and_then(|id| id.parse().ok())
}

/// Read-only handle on Lutris' `pga.db`
#[derive(Debug, Clone)]
pub struct LutrisDb {
    path: PathBuf,
}

impl LutrisDb {
    /// Find the database in the native or flatpak data directory
    pub fn locate() -> Option<Self> {
        let candidates: Vec<PathBuf> = [
            "~/.local/share/lutris/pga.db",
            "~/.var/app/net.lutris.Lutris/data/lutris/pga.db",
        ]
        .iter()
        .filter_map(|p| expand_home(p))
        .collect();
        find_existing(&candidates).map(|path| Self { path })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lookup(&self, id: i64) -> Result<Option<LutrisGame>, LibraryError> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let game = conn
            .query_row(
                "SELECT id, slug, runner FROM games WHERE id = ?1",
                params![id],
                |row| {
                    Ok(LutrisGame {
                        id: row.get(0)?,
                        slug: row.get(1)?,
                        runner: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(game)
    }
}
