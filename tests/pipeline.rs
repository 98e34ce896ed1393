//! End-to-end runs over two vertically adjacent tiles on disk.

use std::fs;
use std::path::Path;

use burn_events::core::loaders::{load_tile_table, tile_table_exists, TileManifest};
use burn_events::core::tables::EventRow;
use burn_events::core::writers::write_event_table;
use burn_events::processors::pipeline::{build_events, classify_tile};
use burn_events::{ClassificationConfig, PipelineConfig, TileGeometry, TileStitcher};
use tempfile::TempDir;

const NORTH: &str = "h01v01";
const SOUTH: &str = "h01v02";

fn write_tile(dir: &Path, tile_id: &str, y_origin: f64, detections: &[(usize, usize, usize, i32)]) {
    let manifest = TileManifest {
        tile_id: tile_id.to_string(),
        layers: 2,
        geometry: TileGeometry {
            crs: "sinusoidal".to_string(),
            resolution: 2.0,
            x_origin: 0.0,
            y_origin,
            nx: 8,
            ny: 8,
        },
    };
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(format!("{tile_id}.yaml")),
        serde_yaml::to_string(&manifest).unwrap(),
    )
    .unwrap();

    let mut csv = String::from("layer,row,col,day\n");
    for (layer, row, col, day) in detections {
        csv.push_str(&format!("{layer},{row},{col},{day}\n"));
    }
    fs::write(dir.join(format!("{tile_id}.csv")), csv).unwrap();
}

/// A fire crossing the seam (days 100-104), an interior fire in the north
/// tile (day 200) and a late edge fire in the south tile (day 300).
fn seed_tiles(burn_dir: &Path) {
    write_tile(
        burn_dir,
        NORTH,
        16.0,
        &[(0, 3, 3, 200), (0, 6, 3, 100), (0, 7, 3, 101), (1, 7, 4, 102)],
    );
    write_tile(
        burn_dir,
        SOUTH,
        0.0,
        &[(0, 0, 3, 103), (1, 1, 4, 104), (0, 6, 6, 300)],
    );
}

fn test_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.classification = ClassificationConfig::new(3, 11);
    config.paths.burn_dir = root.join("burn_area");
    config.paths.tables_dir = root.join("events");
    config.paths.output = root.join("fired_events.csv");
    config
}

fn read_events(path: &Path) -> Vec<EventRow> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize()
        .collect::<Result<Vec<EventRow>, _>>()
        .unwrap()
}

#[test]
fn test_classify_persist_and_stitch() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    seed_tiles(&config.paths.burn_dir);

    for tile in [NORTH, SOUTH] {
        classify_tile(
            &config.paths.burn_dir,
            &config.paths.tables_dir,
            tile,
            &config.classification,
        )
        .unwrap();
        assert!(tile_table_exists(&config.paths.tables_dir, tile));
    }

    let north = load_tile_table(&config.paths.tables_dir, NORTH).unwrap();
    assert_eq!(north.event_count(), 2);
    let interior: Vec<_> = north.rows.iter().filter(|r| !r.edge).collect();
    assert_eq!(interior.len(), 1);
    assert_eq!(interior[0].date.to_string(), "1970-07-20");

    let tables = vec![north, load_tile_table(&config.paths.tables_dir, SOUTH).unwrap()];
    let stitched = TileStitcher::new(config.classification).stitch(&tables).unwrap();

    assert_eq!(stitched.summary.input_events, 4);
    assert_eq!(stitched.summary.events, 3);
    assert_eq!(stitched.summary.merges, 1);

    write_event_table(&config.paths.output, &stitched.rows).unwrap();
    let rows = read_events(&config.paths.output);
    assert_eq!(rows, stitched.rows);
    assert_eq!(rows.len(), 7);

    let seam: Vec<&EventRow> = rows.iter().filter(|r| r.id == 1).collect();
    assert_eq!(seam.len(), 5);
    assert_eq!(seam.iter().filter(|r| r.tile == NORTH).count(), 3);
    assert_eq!(seam.iter().filter(|r| r.tile == SOUTH).count(), 2);
    assert_eq!(seam[0].date.to_string(), "1970-04-11");

    let later: Vec<(u64, &str)> = rows
        .iter()
        .filter(|r| r.id > 1)
        .map(|r| (r.id, r.tile.as_str()))
        .collect();
    assert_eq!(later, vec![(2, NORTH), (3, SOUTH)]);
}

#[test]
fn test_build_events_reuses_tables() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    seed_tiles(&config.paths.burn_dir);

    let first = build_events(&config).unwrap();
    assert_eq!(first.computed(), 2);
    assert_eq!(first.stitch.events, 3);
    let written = fs::read_to_string(&config.paths.output).unwrap();

    // Changing the input does not matter once a tile has a table
    write_tile(&config.paths.burn_dir, SOUTH, 0.0, &[]);
    let second = build_events(&config).unwrap();
    assert_eq!(second.cached(), 2);
    assert_eq!(second.computed(), 0);
    assert_eq!(fs::read_to_string(&config.paths.output).unwrap(), written);
}

#[test]
fn test_separate_runs_without_seam_contact() {
    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path());
    // Seam fire halves are three weeks apart
    write_tile(&config.paths.burn_dir, NORTH, 16.0, &[(0, 7, 3, 100)]);
    write_tile(&config.paths.burn_dir, SOUTH, 0.0, &[(0, 0, 3, 121)]);
    config.run.tiles = vec![SOUTH.to_string(), NORTH.to_string()];

    let report = build_events(&config).unwrap();

    assert_eq!(report.stitch.merges, 0);
    let rows = read_events(&config.paths.output);
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].id, rows[0].tile.as_str()), (1, NORTH));
    assert_eq!((rows[1].id, rows[1].tile.as_str()), (2, SOUTH));
}
