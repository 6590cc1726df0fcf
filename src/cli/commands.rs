use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::civ::Attribute;
use crate::config::simulation::SimulationConfig;
use crate::persistence;
use crate::simulation::{self, statistics};
use crate::world::hex::{CivId, HexId};
use crate::world::{self, WorldState};

/// Seed text for worlds generated without an explicit seed.
pub fn random_seed() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

fn load_world(config: &SimulationConfig, world_path: Option<&str>) -> Result<WorldState, String> {
    match world_path {
        Some(path) => persistence::load_snapshot(Path::new(path))
            .map_err(|e| format!("Failed to load snapshot: {}", e)),
        None => persistence::load_latest_valid_snapshot(Path::new(&config.snapshot_directory))
            .map_err(|e| format!("Failed to load snapshot: {}", e)),
    }
}

/// Generate a world from the configured preset and seed and save it as the first snapshot.
pub fn generate(
    config: &SimulationConfig,
    preset: Option<&str>,
    seed: Option<&str>,
    output: &Path,
) -> Result<(), String> {
    let preset = preset.unwrap_or(&config.preset);
    let seed = seed.map(str::to_string).unwrap_or_else(|| config.seed.clone());
    let balance = config.load_balance()?;
    let catalog = config.load_event_catalog()?;

    println!("Generating {} world from seed '{}'...", preset, seed);
    let world = world::initialize_with(preset, &seed, balance, catalog).map_err(|e| e.to_string())?;
    print_world_summary(&world);

    let path = persistence::save_snapshot(&world, output).map_err(|e| format!("Cannot save snapshot: {}", e))?;
    println!("\nWorld saved to {}", path.display());
    Ok(())
}

/// Load a world, run ticks as fast as possible with periodic snapshots, then save.
pub fn run_simulation(
    config: &SimulationConfig,
    world_path: Option<&str>,
    ticks: Option<u64>,
) -> Result<(), String> {
    let snapshot_dir = Path::new(&config.snapshot_directory);
    let mut world = load_world(config, world_path)?;
    let ticks = ticks.unwrap_or(config.ticks_per_run);

    info!(
        world = %world.id,
        preset = %world.preset,
        tick = world.tick,
        civs = world.civs.len(),
        "World loaded"
    );

    let started = Instant::now();
    let mut ticks_since_snapshot: u32 = 0;
    let mut last = None;

    for _ in 0..ticks {
        let result = simulation::execute_tick(&mut world);

        ticks_since_snapshot += 1;
        if ticks_since_snapshot >= config.snapshot_interval {
            match persistence::save_snapshot(&world, snapshot_dir) {
                Ok(path) => {
                    ticks_since_snapshot = 0;
                    info!(tick = world.tick, path = %path.display(), "Snapshot saved");
                    if let Err(e) = persistence::prune_snapshots(snapshot_dir, config.max_snapshots as usize) {
                        warn!(error = %e, "Snapshot pruning failed");
                    }
                }
                Err(e) => warn!(error = %e, "Snapshot save failed"),
            }
        }

        if world.tick % 100 == 0 {
            info!(
                tick = world.tick,
                routes = result.statistics.total_routes,
                blocked = result.statistics.blocked_routes,
                wars = result.statistics.active_wars,
                "Tick milestone"
            );
        }
        last = Some(result);
    }

    let elapsed = started.elapsed();
    match persistence::save_snapshot(&world, snapshot_dir) {
        Ok(path) => info!(path = %path.display(), "Final snapshot saved"),
        Err(e) => warn!(error = %e, "Final snapshot save failed"),
    }

    println!(
        "Ran {} ticks in {:.2}s, world now at tick {}",
        ticks,
        elapsed.as_secs_f64(),
        world.tick
    );
    if let Some(result) = last {
        println!("{}", result.statistics.summary_line());
    }
    Ok(())
}

/// Inspect a hex, a civilization or the whole world from a snapshot.
pub fn inspect(
    config: &SimulationConfig,
    world_path: Option<&str>,
    hex: Option<HexId>,
    civ: Option<&str>,
    show_world: bool,
) -> Result<(), String> {
    let world = load_world(config, world_path)?;

    if let Some(id) = hex {
        inspect_hex(&world, id)
    } else if let Some(tag) = civ {
        inspect_civ(&world, &CivId::new(tag))
    } else if show_world {
        print!("{}", statistics::world_report(&world, 10));
        Ok(())
    } else {
        Err("Specify --hex <ID>, --civ <TAG> or --world".to_string())
    }
}

fn inspect_hex(world: &WorldState, id: HexId) -> Result<(), String> {
    let hex = world
        .hex(id)
        .ok_or_else(|| format!("Hex {} not found (world has {} hexes)", id, world.map.len()))?;

    println!("=== Hex {} ===", hex.id);
    println!("Position: ({}, {})", hex.q, hex.r);
    println!("Kind: {:?}", hex.kind);
    println!("Owner: {}", hex.owner.as_ref().map_or("-", |c| c.as_str()));
    println!("Resource: {}", hex.resource.map_or("-", |r| r.name()));
    println!("Capital: {}", hex.capital);
    println!("Strait: {}", hex.strait);
    println!("Neighbors: {:?}", world.map.neighbors(id));

    let through: Vec<_> = world.routes().iter().filter(|r| r.path.contains(&id)).collect();
    println!();
    println!("--- Routes through this hex ({}) ---", through.len());
    for r in through {
        println!(
            "  {:?} {} -> {} {}",
            r.kind,
            r.origin,
            r.destination,
            if r.is_blocked() { "(blocked)" } else { "" }
        );
    }
    Ok(())
}

fn inspect_civ(world: &WorldState, id: &CivId) -> Result<(), String> {
    let civ = world
        .civ(id)
        .ok_or_else(|| format!("Civilization '{}' not found", id))?;

    println!("=== {} {} ===", civ.id, civ.name);
    println!("Motto: {}", civ.motto);
    println!("Capital: {}", world.map.capital_of(id).map_or("-".to_string(), |h| h.to_string()));
    println!("Hexes: {}", world.map.owned_count(id));
    println!();
    println!("--- Attributes ---");
    for attr in Attribute::ALL {
        println!("  {:<18} {:>8.1}", attr.name(), civ.value(attr));
    }
    println!("  {:<18} {:>8.1}", "innovation", civ.innovation);
    println!("  {:<18} {:>8.1}", "soft power", civ.soft_power);
    println!("  {:<18} {:>8.1}", "war exhaustion", civ.war_exhaustion);
    println!("  {:<18} {:>8.2}", "trade volume", civ.last_trade_volume);
    println!("  {:<18} {:>8.2}", "army", world.effective_army(id));
    println!("  {:<18} {:>8.2}", "navy", world.effective_navy(id));
    println!();
    println!("--- Relations ---");
    for other in world.civ_ids() {
        if let Some(state) = world.relation(id, &other) {
            println!("  {:<6} {:?}", other, state);
        }
    }
    let outbound = world.routes().iter().filter(|r| r.origin_owner == *id).count();
    println!();
    println!("Outbound routes: {}", outbound);
    Ok(())
}

/// Write the flat world document as JSON to `output`, or stdout when absent.
pub fn export(config: &SimulationConfig, world_path: Option<&str>, output: Option<&Path>) -> Result<(), String> {
    let world = load_world(config, world_path)?;
    let json = persistence::export_json(&world).map_err(|e| format!("Cannot encode world: {}", e))?;
    match output {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| format!("Cannot write {}: {}", path.display(), e))?;
            println!("World exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub fn print_world_summary(world: &WorldState) {
    let land = world.map.land_count();
    println!("=== World Summary ===");
    println!("ID: {}", world.id);
    println!("Preset: {}", world.preset);
    println!("Seed: {}", world.rng.seed_text());
    println!("Tick: {}", world.tick);
    println!("Grid: {}x{} ({} land hexes)", world.map.width, world.map.height, land);
    println!("Straits: {}", world.map.straits.len());
    println!("Resources: {}", world.map.resource_hexes.len());
    println!("Trade routes: {}", world.routes().len());

    println!("\nCivilizations:");
    for c in &world.civs {
        let hexes = world.map.owned_count(&c.id);
        let pct = hexes as f64 / land.max(1) as f64 * 100.0;
        println!("  {:<6} {:<28} {:>4} hexes ({:.1}%)", c.id, c.name, hexes, pct);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> SimulationConfig {
        SimulationConfig {
            snapshot_directory: dir.to_string_lossy().to_string(),
            ticks_per_run: 12,
            snapshot_interval: 5,
            max_snapshots: 2,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn random_seed_is_usable() {
        let seed = random_seed();
        assert_eq!(seed.len(), 10);
        assert!(world::initialize("tess", &seed).is_ok());
    }

    #[test]
    fn generate_then_run_advances_latest_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        generate(&config, Some("bac1200"), Some("nile"), dir.path()).unwrap();
        run_simulation(&config, None, None).unwrap();

        let snapshots = persistence::list_snapshots(dir.path()).unwrap();
        assert!(snapshots.len() <= 3);
        let latest = persistence::load_latest_valid_snapshot(dir.path()).unwrap();
        assert_eq!(latest.tick, 12);
        assert_eq!(latest.rng.seed_text(), "nile");
    }

    #[test]
    fn generate_rejects_unknown_preset() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let err = generate(&config, Some("atlantis"), None, dir.path()).unwrap_err();
        assert!(err.contains("atlantis"));
    }

    #[test]
    fn inspect_requires_a_target() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        generate(&config, None, None, dir.path()).unwrap();

        assert!(inspect(&config, None, None, None, false).is_err());
        assert!(inspect(&config, None, Some(0), None, false).is_ok());
        assert!(inspect(&config, None, None, Some("SAL"), false).is_ok());
        assert!(inspect(&config, None, None, Some("ZZZ"), false).is_err());
        assert!(inspect(&config, None, Some(u32::MAX), None, false).is_err());
    }

    #[test]
    fn export_writes_importable_json() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        generate(&config, Some("we1914"), Some("sarajevo"), dir.path()).unwrap();

        let out = dir.path().join("world.json");
        export(&config, None, Some(&out)).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        let world = persistence::import_json(&text).unwrap();
        assert_eq!(world.rng.seed_text(), "sarajevo");
    }

    #[test]
    fn missing_snapshot_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir.path().join("empty"));
        let err = run_simulation(&config, None, Some(1)).unwrap_err();
        assert!(err.contains("hexworld generate"));
    }
}
