//! Game database using SQLite

use crate::LibraryError;
use crate::merge::Library;
use crate::record::{GameRecord, GameSource};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

const COLUMNS: &str = "app_id, name, executable_path, launch_arguments, install_dir, source, \
                       platform_variant, icon_path, hero_path, logo_path, boxart_path, extension";

/// Game database manager
pub struct GameDatabase {
    conn: Connection,
}

impl GameDatabase {
    /// Open or create a database
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        let db = Self { conn };
        db.init_schema()?;

        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory()?;

        let db = Self { conn };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), LibraryError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                app_id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                executable_path TEXT NOT NULL,
                launch_arguments TEXT NOT NULL,
                install_dir TEXT,
                source TEXT NOT NULL,
                platform_variant TEXT NOT NULL,
                icon_path TEXT NOT NULL,
                hero_path TEXT NOT NULL,
                logo_path TEXT NOT NULL,
                boxart_path TEXT NOT NULL,
                extension TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(extension)),
                scanned_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_games_name ON games(name);
            CREATE INDEX IF NOT EXISTS idx_games_source ON games(source);
        "#,
        )?;

        Ok(())
    }

    /// Replace the stored library with `library` in a single transaction.
    /// On failure the previous contents stay intact.
    pub fn replace_all(&mut self, library: &Library) -> Result<usize, LibraryError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM games", [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO games (position, {COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ))?;
            for (position, game) in library.iter().enumerate() {
                let extension = serde_json::to_string(&game.extension_metadata)?;
                stmt.execute(params![
                    position as i64,
                    game.app_id,
                    game.name,
                    game.executable_path,
                    game.launch_arguments,
                    game.install_dir,
                    game.source.as_str(),
                    game.platform_variant.as_str(),
                    game.icon_path,
                    game.hero_path,
                    game.logo_path,
                    game.boxart_path,
                    extension,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Stored {} games", library.len());
        Ok(library.len())
    }

    /// Load the stored library in scan order
    pub fn load_all(&self) -> Result<Library, LibraryError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM games ORDER BY position"))?;

        let games = stmt
            .query_map([], Self::row_to_game)?
            .collect::<Result<Library, _>>()?;

        Ok(games)
    }

    /// Get a game by app id
    pub fn get_game(&self, app_id: &str) -> Result<Option<GameRecord>, LibraryError> {
        let game = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM games WHERE app_id = ?1"),
                params![app_id],
                Self::row_to_game,
            )
            .optional()?;

        Ok(game)
    }

    /// Get games from one source
    pub fn get_games_by_source(&self, source: GameSource) -> Result<Vec<GameRecord>, LibraryError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM games WHERE source = ?1 ORDER BY position"
        ))?;

        let games = stmt
            .query_map(params![source.as_str()], Self::row_to_game)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(games)
    }

    /// Search games by name
    pub fn search_games(&self, query: &str) -> Result<Vec<GameRecord>, LibraryError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM games WHERE name LIKE ?1 ORDER BY name"
        ))?;

        let pattern = format!("%{}%", query);
        let games = stmt
            .query_map(params![pattern], Self::row_to_game)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(games)
    }

    /// Get total game count
    pub fn game_count(&self) -> Result<i64, LibraryError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get list of sources with game counts
    pub fn get_sources(&self) -> Result<Vec<(String, i64)>, LibraryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM games GROUP BY source ORDER BY source")?;

        let sources = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sources)
    }

    /// Convert a row to a GameRecord
    fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
        fn parse_column<T>(row: &rusqlite::Row, index: usize) -> rusqlite::Result<T>
        where
            T: std::str::FromStr<Err = LibraryError>,
        {
            let raw: String = row.get(index)?;
            raw.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
            })
        }

        let extension: String = row.get(11)?;
        let extension_metadata = serde_json::from_str(&extension).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e))
        })?;

        Ok(GameRecord {
            app_id: row.get("app_id")?,
            name: row.get("name")?,
            executable_path: row.get("executable_path")?,
            launch_arguments: row.get("launch_arguments")?,
            install_dir: row.get("install_dir")?,
            source: parse_column(row, 5)?,
            platform_variant: parse_column(row, 6)?,
            icon_path: row.get("icon_path")?,
            hero_path: row.get("hero_path")?,
            logo_path: row.get("logo_path")?,
            boxart_path: row.get("boxart_path")?,
            extension_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PlatformVariant;

    fn sample_library() -> Library {
        let mut tf2 = GameRecord::new("440", "Team Fortress 2", GameSource::NativeCatalog);
        tf2.launch_arguments = "steam://rungameid/440".to_string();
        tf2.install_dir = Some("/lib/steamapps/common/Team Fortress 2".to_string());
        tf2.extension_metadata
            .insert("size_on_disk".to_string(), serde_json::json!(26623479808u64));

        let mut shortcut = GameRecord::new("53021404823552", "MyGame", GameSource::Shortcut);
        shortcut.platform_variant = PlatformVariant::CompatibilityLayer;
        shortcut
            .extension_metadata
            .insert("shortcut_id".to_string(), serde_json::json!(12345));

        [tf2, shortcut].into_iter().collect()
    }

    #[test]
    fn test_database_creation() {
        let db = GameDatabase::in_memory().unwrap();
        assert_eq!(db.game_count().unwrap(), 0);
        assert!(db.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_replace_and_load_round_trip() {
        let mut db = GameDatabase::in_memory().unwrap();
        let library = sample_library();

        assert_eq!(db.replace_all(&library).unwrap(), 2);
        let loaded = db.load_all().unwrap();
        assert_eq!(loaded, library);

        let shortcut = db.get_game("53021404823552").unwrap().unwrap();
        assert_eq!(shortcut.platform_variant, PlatformVariant::CompatibilityLayer);
        assert_eq!(shortcut.extension_metadata["shortcut_id"], 12345);
        assert!(db.get_game("missing").unwrap().is_none());
    }

    #[test]
    fn test_replace_drops_stale_rows() {
        let mut db = GameDatabase::in_memory().unwrap();
        db.replace_all(&sample_library()).unwrap();

        let smaller: Library = [GameRecord::new("620", "Portal 2", GameSource::NativeCatalog)]
            .into_iter()
            .collect();
        db.replace_all(&smaller).unwrap();

        assert_eq!(db.game_count().unwrap(), 1);
        assert!(db.get_game("440").unwrap().is_none());
    }

    #[test]
    fn test_failed_replace_keeps_previous_contents() {
        let mut db = GameDatabase::in_memory().unwrap();
        db.replace_all(&sample_library()).unwrap();
        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON games
                 WHEN NEW.name = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let bad: Library = [
            GameRecord::new("1", "fine", GameSource::LauncherB),
            GameRecord::new("2", "boom", GameSource::LauncherB),
        ]
        .into_iter()
        .collect();
        assert!(db.replace_all(&bad).is_err());

        assert_eq!(db.load_all().unwrap(), sample_library());
    }

    #[test]
    fn test_search_and_sources() {
        let mut db = GameDatabase::in_memory().unwrap();
        db.replace_all(&sample_library()).unwrap();

        let results = db.search_games("fortress").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].app_id, "440");

        let shortcuts = db.get_games_by_source(GameSource::Shortcut).unwrap();
        assert_eq!(shortcuts.len(), 1);

        let sources = db.get_sources().unwrap();
        assert_eq!(
            sources,
            vec![("native-catalog".to_string(), 1), ("shortcut".to_string(), 1)]
        );
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("library.db");
        {
            let mut db = GameDatabase::open(&path).unwrap();
            db.replace_all(&sample_library()).unwrap();
        }
        let db = GameDatabase::open(&path).unwrap();
        assert_eq!(db.game_count().unwrap(), 2);
    }
}
