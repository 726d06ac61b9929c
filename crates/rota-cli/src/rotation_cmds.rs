use anyhow::{Context, Result};
use rota_config::{DirectoryCatalog, TomlRotationStore, paths};
use rota_core::{OutputFormat, Resource};
use rota_scheduler::{CursorRecovery, RotationManager, RotationSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Open the rotations file and map catalog, falling back to the default
/// locations when no explicit path is given.
pub(crate) fn open_manager(file: Option<&Path>, maps_dir: Option<&Path>) -> Result<RotationManager> {
    let file = resolve_path(file, paths::rotations_path, "rotations file")?;
    let maps_dir = resolve_path(maps_dir, paths::maps_dir, "maps directory")?;

    let catalog = DirectoryCatalog::scan(&maps_dir)
        .with_context(|| format!("Pass --maps-dir or set {}", paths::MAPS_DIR_ENV))?;
    let store = TomlRotationStore::open(&file)?;
    tracing::debug!(
        file = %file.display(),
        maps = catalog.len(),
        "Opened rotations"
    );
    RotationManager::load(Arc::new(store), Arc::new(catalog))
}

fn resolve_path(
    explicit: Option<&Path>,
    default: fn() -> Option<PathBuf>,
    what: &str,
) -> Result<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(default)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine default {what} location"))
}

/// Handle `rota status`.
pub(crate) fn handle_status(manager: &RotationManager, format: OutputFormat) -> Result<()> {
    let summaries = manager.summaries()?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Text if summaries.is_empty() => {
            eprintln!("No rotations configured.");
        }
        OutputFormat::Text => print!("{}", render_status_text(&summaries)),
    }
    Ok(())
}

/// Handle `rota peek`.
pub(crate) fn handle_peek(manager: &RotationManager, rotation: &str, format: OutputFormat) -> Result<()> {
    let map = manager.peek_next_map(rotation)?;
    print_map(rotation, "next", &map, format);
    Ok(())
}

/// Handle `rota pop`.
pub(crate) fn handle_pop(manager: &RotationManager, rotation: &str, format: OutputFormat) -> Result<()> {
    let map = manager.pop_next_map(rotation)?;
    print_map(rotation, "served", &map, format);
    Ok(())
}

/// Handle `rota advance`.
pub(crate) fn handle_advance(
    manager: &RotationManager,
    rotation: &str,
    steps: usize,
    format: OutputFormat,
) -> Result<()> {
    let map = manager.advance(rotation, steps)?;
    print_map(rotation, "next", &map, format);
    Ok(())
}

/// Handle `rota set-position`.
pub(crate) fn handle_set_position(
    manager: &RotationManager,
    rotation: &str,
    position: usize,
    format: OutputFormat,
) -> Result<()> {
    let map = manager.set_position(rotation, position)?;
    print_map(rotation, "next", &map, format);
    Ok(())
}

/// Handle `rota set-next`.
pub(crate) fn handle_set_next(
    manager: &RotationManager,
    rotation: &str,
    map: &str,
    format: OutputFormat,
) -> Result<()> {
    let map = manager.set_next_map(rotation, map)?;
    print_map(rotation, "next", &map, format);
    Ok(())
}

/// Handle `rota select`.
pub(crate) fn handle_select(
    manager: &RotationManager,
    players: u32,
    pop: bool,
    format: OutputFormat,
) -> Result<()> {
    if pop {
        let (rotation, map) = manager.pop_for_participants(players)?;
        print_map(&rotation, "served", &map, format);
        return Ok(());
    }

    let selected = manager.select_rotation(players)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&selected)?),
        OutputFormat::Text => println!(
            "{} (players >= {}), next: {}",
            selected.name,
            selected.players,
            selected.next_map.as_deref().unwrap_or("-")
        ),
    }
    Ok(())
}

fn print_map(rotation: &str, label: &str, map: &Resource, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "rotation": rotation, label: map })
        ),
        OutputFormat::Text => println!("{rotation}: {label} {map}"),
    }
}

fn render_status_text(summaries: &[RotationSummary]) -> String {
    let mut out = String::new();
    for summary in summaries {
        let state = if summary.enabled { "enabled" } else { "disabled" };
        out.push_str(&format!(
            "{}: {} [players >= {}]\n",
            summary.name, state, summary.players
        ));
        for (i, map) in summary.maps.iter().enumerate() {
            let marker = if i == summary.position { ">" } else { " " };
            out.push_str(&format!("  {marker} {}. {map}\n", i + 1));
        }
        if summary.maps.is_empty() {
            out.push_str("  (no playable maps)\n");
        }
        if !summary.unresolved_maps.is_empty() {
            out.push_str(&format!(
                "  missing from catalog: {}\n",
                summary.unresolved_maps.join(", ")
            ));
        }
        if let CursorRecovery::FellBack { reason } = &summary.recovery {
            out.push_str(&format!("  cursor reset to start ({reason:?})\n"));
        }
        out.push('\n');
    }
    out
}
