//! Persistent store of mutant results and baseline timing.
//!
//! Results are kept per `(file, line, index)` together with the tests
//! fingerprint they were obtained under. A result only counts as cached while
//! the fingerprint and the text of its line are unchanged.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::core::file_set::NO_TESTS_FOUND;
use crate::core::Result;
use crate::mutation::{MutantAddress, MutationStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS mutant (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    mutant_index INTEGER NOT NULL,
    line_text TEXT NOT NULL,
    tests_hash TEXT,
    status TEXT NOT NULL DEFAULT 'untested',
    UNIQUE (filename, line_number, mutant_index)
);
CREATE TABLE IF NOT EXISTS baseline (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    tests_hash TEXT NOT NULL,
    seconds REAL NOT NULL
);
";

/// Lookup and storage of mutant statuses.
///
/// Implementations must be safe to call from several checker threads at once.
pub trait ResultCache: Send + Sync {
    /// Terminal status recorded for `address` under `hash_of_tests`, if any.
    fn get(
        &self,
        filename: &Path,
        address: &MutantAddress,
        hash_of_tests: &str,
    ) -> Result<Option<MutationStatus>>;

    /// Record `status` for `address`; the latest write wins.
    fn put(
        &self,
        filename: &Path,
        address: &MutantAddress,
        hash_of_tests: &str,
        status: MutationStatus,
    ) -> Result<()>;
}

/// One mutant row of the cache.
#[derive(Debug, Clone)]
pub struct CachedMutant {
    pub id: i64,
    pub filename: PathBuf,
    pub address: MutantAddress,
    pub status: MutationStatus,
    pub tests_hash: Option<String>,
}

/// SQLite-backed cache, stored in `.mutiny-cache` by default.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    /// A throwaway cache that lives only as long as the value.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record the mutants of a file.
    ///
    /// New addresses start out untested, a changed line resets its mutants,
    /// and rows for addresses that no longer exist are dropped.
    pub fn register_mutants(&self, filename: &Path, addresses: &[MutantAddress]) -> Result<()> {
        let filename = key(filename);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO mutant (filename, line_number, mutant_index, line_text)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (filename, line_number, mutant_index) DO UPDATE SET
                     status = CASE WHEN mutant.line_text = excluded.line_text
                                   THEN mutant.status ELSE 'untested' END,
                     tests_hash = CASE WHEN mutant.line_text = excluded.line_text
                                       THEN mutant.tests_hash ELSE NULL END,
                     line_text = excluded.line_text",
            )?;
            for address in addresses {
                upsert.execute(params![
                    filename,
                    address.line_number as i64,
                    address.index as i64,
                    address.line_text,
                ])?;
            }

            let current: HashSet<(i64, i64)> = addresses
                .iter()
                .map(|a| (a.line_number as i64, a.index as i64))
                .collect();
            let mut existing =
                tx.prepare_cached("SELECT id, line_number, mutant_index FROM mutant WHERE filename = ?1")?;
            let stale: Vec<i64> = existing
                .query_map(params![filename], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
                })?
                .filter_map(|row| row.ok())
                .filter(|(_, line, index)| !current.contains(&(*line, *index)))
                .map(|(id, _, _)| id)
                .collect();
            let mut delete = tx.prepare_cached("DELETE FROM mutant WHERE id = ?1")?;
            for id in stale {
                delete.execute(params![id])?;
            }
        }
        tx.commit()?;
        debug!(file = %filename, mutants = addresses.len(), "registered mutants");
        Ok(())
    }

    /// All known mutants, ordered by file and position.
    pub fn mutants(&self) -> Result<Vec<CachedMutant>> {
        self.query(
            "SELECT id, filename, line_number, mutant_index, line_text, status, tests_hash
             FROM mutant ORDER BY filename, line_number, mutant_index",
            params![],
        )
    }

    /// Ids of the mutants with `status`.
    pub fn ids_with_status(&self, status: MutationStatus) -> Result<Vec<i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT id FROM mutant WHERE status = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![status.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Mutant with the given id.
    pub fn mutant(&self, id: i64) -> Result<Option<CachedMutant>> {
        let mut rows = self.query(
            "SELECT id, filename, line_number, mutant_index, line_text, status, tests_hash
             FROM mutant WHERE id = ?1",
            params![id],
        )?;
        Ok(rows.pop())
    }

    /// Id of the mutant at `address` in `filename`.
    pub fn id_of(&self, filename: &Path, address: &MutantAddress) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let id = conn
            .query_row(
                "SELECT id FROM mutant WHERE filename = ?1 AND line_number = ?2 AND mutant_index = ?3",
                params![key(filename), address.line_number as i64, address.index as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Baseline duration measured under `hash_of_tests`.
    pub fn baseline(&self, hash_of_tests: &str) -> Result<Option<Duration>> {
        if hash_of_tests == NO_TESTS_FOUND {
            return Ok(None);
        }
        let conn = self.conn.lock();
        let seconds: Option<f64> = conn
            .query_row(
                "SELECT seconds FROM baseline WHERE id = 0 AND tests_hash = ?1",
                params![hash_of_tests],
                |row| row.get(0),
            )
            .optional()?;
        Ok(seconds.map(Duration::from_secs_f64))
    }

    /// Store the baseline duration, replacing any earlier one.
    pub fn set_baseline(&self, hash_of_tests: &str, elapsed: Duration) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO baseline (id, tests_hash, seconds) VALUES (0, ?1, ?2)
             ON CONFLICT (id) DO UPDATE SET tests_hash = excluded.tests_hash, seconds = excluded.seconds",
            params![hash_of_tests, elapsed.as_secs_f64()],
        )?;
        Ok(())
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<CachedMutant>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                let filename: String = row.get(1)?;
                let line_number: i64 = row.get(2)?;
                let index: i64 = row.get(3)?;
                let line_text: String = row.get(4)?;
                let status: String = row.get(5)?;
                Ok(CachedMutant {
                    id: row.get(0)?,
                    filename: PathBuf::from(&filename),
                    address: MutantAddress::new(line_number as usize, index as usize, line_text)
                        .with_filename(filename),
                    status: status.parse().unwrap_or(MutationStatus::Untested),
                    tests_hash: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl ResultCache for SqliteCache {
    fn get(
        &self,
        filename: &Path,
        address: &MutantAddress,
        hash_of_tests: &str,
    ) -> Result<Option<MutationStatus>> {
        if hash_of_tests == NO_TESTS_FOUND {
            return Ok(None);
        }
        let conn = self.conn.lock();
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM mutant
                 WHERE filename = ?1 AND line_number = ?2 AND mutant_index = ?3
                   AND line_text = ?4 AND tests_hash = ?5",
                params![
                    key(filename),
                    address.line_number as i64,
                    address.index as i64,
                    address.line_text,
                    hash_of_tests,
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status
            .and_then(|s| s.parse::<MutationStatus>().ok())
            .filter(|s| s.is_terminal()))
    }

    fn put(
        &self,
        filename: &Path,
        address: &MutantAddress,
        hash_of_tests: &str,
        status: MutationStatus,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO mutant (filename, line_number, mutant_index, line_text, tests_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (filename, line_number, mutant_index) DO UPDATE SET
                 line_text = excluded.line_text,
                 tests_hash = excluded.tests_hash,
                 status = excluded.status",
            params![
                key(filename),
                address.line_number as i64,
                address.index as i64,
                address.line_text,
                hash_of_tests,
                status.as_str(),
            ],
        )?;
        Ok(())
    }
}

/// In-memory cache with the same matching rules as [`SqliteCache`].
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(PathBuf, usize, usize), (String, String, MutationStatus)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryCache {
    fn get(
        &self,
        filename: &Path,
        address: &MutantAddress,
        hash_of_tests: &str,
    ) -> Result<Option<MutationStatus>> {
        if hash_of_tests == NO_TESTS_FOUND {
            return Ok(None);
        }
        let entries = self.entries.lock();
        let entry = entries.get(&(filename.to_path_buf(), address.line_number, address.index));
        Ok(entry
            .filter(|(line_text, hash, status)| {
                *line_text == address.line_text && hash == hash_of_tests && status.is_terminal()
            })
            .map(|(_, _, status)| *status))
    }

    fn put(
        &self,
        filename: &Path,
        address: &MutantAddress,
        hash_of_tests: &str,
        status: MutationStatus,
    ) -> Result<()> {
        self.entries.lock().insert(
            (filename.to_path_buf(), address.line_number, address.index),
            (address.line_text.clone(), hash_of_tests.to_string(), status),
        );
        Ok(())
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(line: usize, index: usize, text: &str) -> MutantAddress {
        MutantAddress::new(line, index, text)
    }

    #[test]
    fn test_get_requires_matching_fingerprint() {
        let cache = SqliteCache::in_memory().unwrap();
        let file = Path::new("pkg/mod.py");
        let a = address(0, 0, "x = 1");

        assert_eq!(cache.get(file, &a, "h1").unwrap(), None);
        cache.put(file, &a, "h1", MutationStatus::Killed).unwrap();
        assert_eq!(cache.get(file, &a, "h1").unwrap(), Some(MutationStatus::Killed));
        assert_eq!(cache.get(file, &a, "h2").unwrap(), None);
        assert_eq!(cache.get(Path::new("pkg/other.py"), &a, "h1").unwrap(), None);
    }

    #[test]
    fn test_latest_put_wins() {
        let cache = SqliteCache::in_memory().unwrap();
        let file = Path::new("mod.py");
        let a = address(3, 1, "y = a + b");
        cache.put(file, &a, "h", MutationStatus::Survived).unwrap();
        cache.put(file, &a, "h", MutationStatus::Killed).unwrap();
        assert_eq!(cache.get(file, &a, "h").unwrap(), Some(MutationStatus::Killed));
        assert_eq!(cache.mutants().unwrap().len(), 1);
    }

    #[test]
    fn test_changed_line_is_not_cached() {
        let cache = SqliteCache::in_memory().unwrap();
        let file = Path::new("mod.py");
        cache
            .put(file, &address(0, 0, "x = 1"), "h", MutationStatus::Killed)
            .unwrap();
        assert_eq!(cache.get(file, &address(0, 0, "x = 2"), "h").unwrap(), None);
    }

    #[test]
    fn test_untested_and_no_tests_are_never_hits() {
        let cache = SqliteCache::in_memory().unwrap();
        let file = Path::new("mod.py");
        let a = address(0, 0, "x = 1");
        cache.put(file, &a, "h", MutationStatus::Untested).unwrap();
        assert_eq!(cache.get(file, &a, "h").unwrap(), None);

        cache.put(file, &a, NO_TESTS_FOUND, MutationStatus::Killed).unwrap();
        assert_eq!(cache.get(file, &a, NO_TESTS_FOUND).unwrap(), None);
    }

    #[test]
    fn test_register_mutants() {
        let cache = SqliteCache::in_memory().unwrap();
        let file = Path::new("mod.py");
        let first = vec![address(0, 0, "x = 1"), address(0, 1, "x = 1"), address(1, 0, "y = 2")];
        cache.register_mutants(file, &first).unwrap();
        cache.put(file, &first[0], "h", MutationStatus::Survived).unwrap();
        cache.put(file, &first[2], "h", MutationStatus::Killed).unwrap();

        // Line 1 changed and the second mutant of line 0 disappeared.
        let second = vec![address(0, 0, "x = 1"), address(1, 0, "y = 3")];
        cache.register_mutants(file, &second).unwrap();

        let rows = cache.mutants().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, MutationStatus::Survived);
        assert_eq!(rows[1].status, MutationStatus::Untested);
        assert_eq!(rows[1].address.line_text, "y = 3");
        assert_eq!(rows[1].tests_hash, None);
    }

    #[test]
    fn test_ids_and_lookup() {
        let cache = SqliteCache::in_memory().unwrap();
        let file = Path::new("mod.py");
        let a = address(0, 0, "x = 1");
        let b = address(1, 0, "y = 2");
        cache.register_mutants(file, &[a.clone(), b.clone()]).unwrap();
        cache.put(file, &b, "h", MutationStatus::Survived).unwrap();

        let ids = cache.ids_with_status(MutationStatus::Survived).unwrap();
        assert_eq!(ids.len(), 1);
        let row = cache.mutant(ids[0]).unwrap().unwrap();
        assert_eq!(row.filename, PathBuf::from("mod.py"));
        assert_eq!(row.address, b);
        assert_eq!(cache.id_of(file, &b).unwrap(), Some(ids[0]));
        assert!(cache.mutant(9999).unwrap().is_none());
        assert_eq!(cache.ids_with_status(MutationStatus::Untested).unwrap().len(), 1);
    }

    #[test]
    fn test_baseline() {
        let cache = SqliteCache::in_memory().unwrap();
        assert_eq!(cache.baseline("h").unwrap(), None);
        cache.set_baseline("h", Duration::from_millis(1500)).unwrap();
        assert_eq!(cache.baseline("h").unwrap(), Some(Duration::from_millis(1500)));
        assert_eq!(cache.baseline("other").unwrap(), None);
        cache.set_baseline("other", Duration::from_secs(2)).unwrap();
        assert_eq!(cache.baseline("h").unwrap(), None);
    }

    #[test]
    fn test_cache_persists_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(".mutiny-cache");
        let a = address(0, 0, "x = 1");
        {
            let cache = SqliteCache::open(&path).unwrap();
            cache.put(Path::new("m.py"), &a, "h", MutationStatus::Timeout).unwrap();
        }
        let cache = SqliteCache::open(&path).unwrap();
        assert_eq!(cache.get(Path::new("m.py"), &a, "h").unwrap(), Some(MutationStatus::Timeout));
    }

    #[test]
    fn test_concurrent_puts() {
        let cache = SqliteCache::in_memory().unwrap();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..10 {
                        let a = address(worker, i, "x");
                        cache.put(Path::new("m.py"), &a, "h", MutationStatus::Killed).unwrap();
                    }
                });
            }
        });
        assert_eq!(cache.mutants().unwrap().len(), 40);
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        let a = address(0, 0, "x = 1");
        assert!(cache.is_empty());
        cache.put(Path::new("m.py"), &a, "h", MutationStatus::Killed).unwrap();
        assert_eq!(cache.get(Path::new("m.py"), &a, "h").unwrap(), Some(MutationStatus::Killed));
        assert_eq!(cache.get(Path::new("m.py"), &a, "h2").unwrap(), None);
        assert_eq!(cache.len(), 1);
    }
}
