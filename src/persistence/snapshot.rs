use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::persistence::document::{export_document, import_document, ImportError, WorldDocument};
use crate::world::preset::Preset;
use crate::world::WorldState;

const SNAPSHOT_MAGIC: [u8; 4] = *b"HXWS";
const HEADER_LIMIT: u64 = 64 * 1024;

/// Identity of the world a snapshot holds, readable without decoding the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub world: Uuid,
    pub preset: Preset,
    pub seed_text: String,
    pub tick: u64,
    pub saved_at_ms: u64,
}

impl SnapshotHeader {
    pub fn for_world(world: &WorldState, saved_at_ms: u64) -> Self {
        Self {
            world: world.id,
            preset: world.preset,
            seed_text: world.rng.seed_text().to_string(),
            tick: world.tick,
            saved_at_ms,
        }
    }

    /// `{preset}-{world prefix}-tick{N}.bin`; saving the same world at the same
    /// tick replaces the earlier file.
    pub fn filename(&self) -> String {
        let (hi, _) = self.world.as_u64_pair();
        format!("{}-{:08x}-tick{:08}.bin", self.preset, hi >> 32, self.tick)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub path: PathBuf,
    pub header: SnapshotHeader,
    pub file_size: u64,
}

#[derive(Debug)]
pub enum SnapshotError {
    Io(io::Error),
    Encode(String),
    Decode(String),
    NotASnapshot(PathBuf),
    HeaderMismatch(PathBuf),
    Invalid { path: PathBuf, reason: ImportError },
    NoValidSnapshots,
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "I/O error: {}", e),
            SnapshotError::Encode(e) => write!(f, "Cannot encode snapshot: {}", e),
            SnapshotError::Decode(e) => write!(f, "Cannot decode snapshot: {}", e),
            SnapshotError::NotASnapshot(path) => {
                write!(f, "{} is not a hexworld snapshot", path.display())
            }
            SnapshotError::HeaderMismatch(path) => {
                write!(f, "Snapshot header does not match its world: {}", path.display())
            }
            SnapshotError::Invalid { path, reason } => {
                write!(f, "Snapshot {} holds an invalid world: {}", path.display(), reason)
            }
            SnapshotError::NoValidSnapshots => {
                write!(
                    f,
                    "No valid snapshots found. Generate a new world with: hexworld generate"
                )
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Magic, header, then the world document.
pub fn encode_snapshot(header: &SnapshotHeader, doc: &WorldDocument) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = SNAPSHOT_MAGIC.to_vec();
    codec()
        .serialize_into(&mut buf, header)
        .map_err(|e| SnapshotError::Encode(e.to_string()))?;
    codec()
        .serialize_into(&mut buf, doc)
        .map_err(|e| SnapshotError::Encode(e.to_string()))?;
    Ok(buf)
}

fn decode_header<R: Read>(reader: &mut R, path: &Path) -> Result<SnapshotHeader, SnapshotError> {
    let mut magic = [0u8; 4];
    if reader.read_exact(&mut magic).is_err() || magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::NotASnapshot(path.to_path_buf()));
    }
    codec()
        .with_limit(HEADER_LIMIT)
        .deserialize_from(reader)
        .map_err(|e| SnapshotError::Decode(e.to_string()))
}

/// Read only the header of a snapshot file.
pub fn read_header(path: &Path) -> Result<SnapshotHeader, SnapshotError> {
    let mut reader = BufReader::new(File::open(path)?);
    decode_header(&mut reader, path)
}

/// Write a snapshot atomically: encode into a temp file, then rename it into place.
pub fn save_snapshot(world: &WorldState, snapshot_dir: &Path) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(snapshot_dir)?;

    let header = SnapshotHeader::for_world(world, now_ms());
    let encoded = encode_snapshot(&header, &export_document(world))?;
    let filename = header.filename();
    let target = snapshot_dir.join(&filename);
    let tmp = snapshot_dir.join(format!(".{}.tmp", filename));

    if let Err(e) = fs::write(&tmp, &encoded) {
        let _ = fs::remove_file(&tmp);
        return Err(SnapshotError::Io(e));
    }
    if let Err(e) = fs::rename(&tmp, &target) {
        let _ = fs::remove_file(&tmp);
        return Err(SnapshotError::Io(e));
    }

    debug!(path = %target.display(), tick = world.tick, bytes = encoded.len(), "Snapshot written");
    Ok(target)
}

/// Decode and import a snapshot. The header must describe the document it
/// wraps, and the document must pass import validation.
pub fn load_snapshot(path: &Path) -> Result<WorldState, SnapshotError> {
    let data = fs::read(path)?;
    let mut rest: &[u8] = &data;
    let header = decode_header(&mut rest, path)?;
    let doc: WorldDocument = codec()
        .deserialize_from(&mut rest)
        .map_err(|e| SnapshotError::Decode(e.to_string()))?;
    if doc.id != header.world || doc.tick != header.tick {
        return Err(SnapshotError::HeaderMismatch(path.to_path_buf()));
    }

    import_document(doc).map_err(|reason| {
        warn!(path = %path.display(), error = %reason, "Snapshot failed validation");
        SnapshotError::Invalid {
            path: path.to_path_buf(),
            reason,
        }
    })
}

/// Snapshots in a directory, most recently saved first (higher tick first on ties).
///
/// Files whose header cannot be read are left out.
pub fn list_snapshots(snapshot_dir: &Path) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
    if !snapshot_dir.exists() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in fs::read_dir(snapshot_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_candidate = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.') && n.ends_with(".bin"));
        if !is_candidate {
            continue;
        }
        match read_header(&path) {
            Ok(header) => snapshots.push(SnapshotMetadata {
                file_size: entry.metadata().map(|m| m.len()).unwrap_or(0),
                path,
                header,
            }),
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable snapshot"),
        }
    }

    snapshots.sort_by(|a, b| {
        b.header
            .saved_at_ms
            .cmp(&a.header.saved_at_ms)
            .then(b.header.tick.cmp(&a.header.tick))
            .then(a.path.cmp(&b.path))
    });
    Ok(snapshots)
}

/// Keep the `keep_per_world` newest snapshots of each world and delete the rest.
pub fn prune_snapshots(snapshot_dir: &Path, keep_per_world: usize) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut seen: BTreeMap<Uuid, usize> = BTreeMap::new();
    let mut deleted = Vec::new();
    for snapshot in list_snapshots(snapshot_dir)? {
        let count = seen.entry(snapshot.header.world).or_insert(0);
        *count += 1;
        if *count > keep_per_world {
            fs::remove_file(&snapshot.path)?;
            deleted.push(snapshot.path);
        }
    }
    Ok(deleted)
}

/// Load the newest snapshot that imports cleanly, falling back to older ones.
pub fn load_latest_valid_snapshot(snapshot_dir: &Path) -> Result<WorldState, SnapshotError> {
    for snapshot in list_snapshots(snapshot_dir)? {
        match load_snapshot(&snapshot.path) {
            Ok(world) => return Ok(world),
            Err(e) => warn!(
                path = %snapshot.path.display(),
                error = %e,
                "Unusable snapshot, trying an older one"
            ),
        }
    }
    Err(SnapshotError::NoValidSnapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{execute_tick, run_ticks};
    use crate::world::fixtures::duel_world;
    use crate::world::initialize;
    use tempfile::TempDir;

    fn saved_at(world: &mut WorldState, dir: &Path, ticks: &[u64]) -> Vec<PathBuf> {
        ticks
            .iter()
            .map(|&t| {
                world.tick = t;
                save_snapshot(world, dir).unwrap()
            })
            .collect()
    }

    #[test]
    fn save_and_load_round_trip_identical() {
        let dir = TempDir::new().unwrap();
        let mut world = initialize("bac1200", "papyrus").unwrap();
        run_ticks(&mut world, 25);

        let path = save_snapshot(&world, dir.path()).unwrap();
        let restored = load_snapshot(&path).unwrap();

        assert_eq!(export_document(&restored), export_document(&world));
        assert_eq!(restored.tick, 25);
        assert_eq!(restored.rng, world.rng);
        assert_eq!(restored.map, world.map);
    }

    #[test]
    fn filename_names_preset_world_and_tick() {
        let dir = TempDir::new().unwrap();
        let world = initialize("tess", "harbor").unwrap();
        let path = save_snapshot(&world, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("tess-"));
        assert!(name.ends_with("-tick00000000.bin"));

        // same world, same tick: the file is replaced
        save_snapshot(&world, dir.path()).unwrap();
        assert_eq!(list_snapshots(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn header_describes_the_world_without_loading_it() {
        let dir = TempDir::new().unwrap();
        let mut world = initialize("we1914", "telegraph").unwrap();
        execute_tick(&mut world);
        let path = save_snapshot(&world, dir.path()).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.world, world.id);
        assert_eq!(header.preset, Preset::We1914);
        assert_eq!(header.seed_text, "telegraph");
        assert_eq!(header.tick, 1);
    }

    #[test]
    fn listing_is_newest_first_and_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        let mut world = duel_world();
        saved_at(&mut world, dir.path(), &[0, 5, 10]);
        fs::write(dir.path().join("notes.txt"), "not a snapshot").unwrap();
        fs::write(dir.path().join("garbage.bin"), b"not a header").unwrap();
        fs::write(dir.path().join(".tess-00000000-tick00000099.bin.tmp"), "partial").unwrap();

        let snapshots = list_snapshots(dir.path()).unwrap();
        let ticks: Vec<u64> = snapshots.iter().map(|s| s.header.tick).collect();
        assert_eq!(ticks, vec![10, 5, 0]);
        assert!(snapshots.iter().all(|s| s.file_size > 0));
    }

    #[test]
    fn listing_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_snapshots(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn prune_keeps_newest_of_each_world() {
        let dir = TempDir::new().unwrap();
        let mut duel = duel_world();
        let mut other = initialize("tess", "elsewhere").unwrap();
        saved_at(&mut duel, dir.path(), &[0, 1, 2, 3, 4]);
        saved_at(&mut other, dir.path(), &[0, 7]);

        let deleted = prune_snapshots(dir.path(), 2).unwrap();
        assert_eq!(deleted.len(), 3);

        let remaining = list_snapshots(dir.path()).unwrap();
        let duel_ticks: Vec<u64> = remaining
            .iter()
            .filter(|s| s.header.world == duel.id)
            .map(|s| s.header.tick)
            .collect();
        assert_eq!(duel_ticks, vec![4, 3]);
        assert_eq!(remaining.iter().filter(|s| s.header.world == other.id).count(), 2);
    }

    #[test]
    fn truncated_snapshot_fails_to_decode() {
        let dir = TempDir::new().unwrap();
        let path = save_snapshot(&duel_world(), dir.path()).unwrap();
        let data = fs::read(&path).unwrap();
        fs::write(&path, &data[..data.len() - 16]).unwrap();

        assert!(matches!(load_snapshot(&path), Err(SnapshotError::Decode(_))));
    }

    #[test]
    fn bare_document_is_not_a_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tess-00000000-tick00000000.bin");
        fs::write(&path, bincode::serialize(&export_document(&duel_world())).unwrap()).unwrap();

        assert!(matches!(load_snapshot(&path), Err(SnapshotError::NotASnapshot(_))));
        assert!(list_snapshots(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn header_must_match_the_document() {
        let dir = TempDir::new().unwrap();
        let world = duel_world();
        let mut header = SnapshotHeader::for_world(&world, 0);
        header.tick = 99;

        let path = dir.path().join(header.filename());
        fs::write(&path, encode_snapshot(&header, &export_document(&world)).unwrap()).unwrap();
        assert!(matches!(load_snapshot(&path), Err(SnapshotError::HeaderMismatch(_))));
    }

    #[test]
    fn invalid_world_is_reported_with_its_reason() {
        let dir = TempDir::new().unwrap();
        let world = duel_world();
        let header = SnapshotHeader::for_world(&world, 0);
        let mut doc = export_document(&world);
        doc.hexes.truncate(3);

        let path = dir.path().join(header.filename());
        fs::write(&path, encode_snapshot(&header, &doc).unwrap()).unwrap();
        assert!(matches!(
            load_snapshot(&path),
            Err(SnapshotError::Invalid {
                reason: ImportError::HexCountMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn latest_valid_falls_back_past_a_damaged_save() {
        let dir = TempDir::new().unwrap();
        let mut world = duel_world();
        let paths = saved_at(&mut world, dir.path(), &[10, 20]);
        let data = fs::read(&paths[1]).unwrap();
        fs::write(&paths[1], &data[..data.len() / 2]).unwrap();

        let restored = load_latest_valid_snapshot(dir.path()).unwrap();
        assert_eq!(restored.tick, 10);
        assert_eq!(restored.civ_ids(), world.civ_ids());
    }

    #[test]
    fn latest_valid_reports_when_nothing_loads() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_latest_valid_snapshot(dir.path()).unwrap_err(),
            SnapshotError::NoValidSnapshots
        ));

        let path = save_snapshot(&duel_world(), dir.path()).unwrap();
        let data = fs::read(&path).unwrap();
        fs::write(&path, &data[..40]).unwrap();
        assert!(matches!(
            load_latest_valid_snapshot(dir.path()).unwrap_err(),
            SnapshotError::NoValidSnapshots
        ));
    }

    #[test]
    fn save_leaves_no_temp_files_and_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("deep").join("snapshots");
        let path = save_snapshot(&duel_world(), &nested).unwrap();
        assert!(path.exists());

        let temp_files = fs::read_dir(&nested)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().is_some_and(|n| n.starts_with('.')))
            .count();
        assert_eq!(temp_files, 0);
    }
}
