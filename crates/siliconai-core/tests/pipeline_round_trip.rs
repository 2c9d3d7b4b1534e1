use siliconai_core::config::ValidatorConfig;
use siliconai_core::domain::{ErrorCategory, PRIMARY_BARCODE};
use siliconai_core::export::Exporter;
use siliconai_core::import::{Importer, Side, read_hits_file};
use siliconai_core::scheduling::{ShardPool, first_failure};
use siliconai_core::store::{Artifact, GENERATED_TABLE, HITS_TABLE, REFERENCE_TABLE};
use siliconai_core::validate::Validator;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SECONDARY_BARCODE: u64 = 4_503_599_644_147_713;

struct SimulatedHit {
    event_id: u32,
    geometry_id: u64,
    index: i32,
    position: [f64; 3],
    momentum: [f64; 3],
}

fn primary_hits() -> Vec<SimulatedHit> {
    let hit = |event_id, geometry_id, index, position, momentum| SimulatedHit {
        event_id,
        geometry_id,
        index,
        position,
        momentum,
    };
    vec![
        hit(0, 101, 0, [1.234, 0.5, 100.0], [1.0, 0.0, 5.0]),
        hit(0, 102, 1, [2.5, -1.25, 200.0], [0.98, 0.01, 4.97]),
        hit(0, 103, 2, [-3.75, 2.0, 300.0], [0.96, 0.02, 4.93]),
        hit(1, 101, 0, [4.321, 0.0, 100.0], [2.0, 1.0, 3.0]),
        hit(1, 102, 1, [-0.5, 7.777, 200.0], [1.99, 1.01, 2.95]),
    ]
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directories should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn write_geometry(root: &Path) {
    write_file(
        &root.join("geometry.json"),
        r#"{"surfaces": [
            {"geometry_id": 101, "center": [0.0, 0.0, 100.0], "rotation": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]},
            {"geometry_id": 102, "center": [0.0, 0.0, 200.0], "rotation": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]},
            {"geometry_id": 103, "center": [0.0, 0.0, 300.0], "rotation": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]}
        ]}"#,
    );
}

fn json_list<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    let items: Vec<String> = values.into_iter().map(|value| value.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// Shard 1 holds the primary hits above plus one secondary hit that must be
/// ignored; shard 2 holds a single one-hit event.
fn write_shards(root: &Path) {
    let mut hits = primary_hits();
    let mut barcodes = vec![PRIMARY_BARCODE; hits.len()];
    hits.push(SimulatedHit {
        event_id: 0,
        geometry_id: 102,
        index: 0,
        position: [9.0, 9.0, 200.0],
        momentum: [0.1, 0.1, 0.1],
    });
    barcodes.push(SECONDARY_BARCODE);

    let column = |value: fn(&SimulatedHit) -> f64| json_list(hits.iter().map(value));
    let zeros = json_list(hits.iter().map(|_| 0.0));
    write_file(
        &root.join("hits/1.json"),
        &format!(
            r#"{{"hits": {{"event_id": {}, "geometry_id": {}, "particle_id": {}, "index": {},
                "tx": {}, "ty": {}, "tz": {}, "tpx": {}, "tpy": {}, "tpz": {},
                "deltapx": {zeros}, "deltapy": {zeros}, "deltapz": {zeros}}}}}"#,
            json_list(hits.iter().map(|hit| hit.event_id)),
            json_list(hits.iter().map(|hit| hit.geometry_id)),
            json_list(barcodes),
            json_list(hits.iter().map(|hit| hit.index)),
            column(|hit| hit.position[0]),
            column(|hit| hit.position[1]),
            column(|hit| hit.position[2]),
            column(|hit| hit.momentum[0]),
            column(|hit| hit.momentum[1]),
            column(|hit| hit.momentum[2]),
        ),
    );
    write_file(
        &root.join("particles_simulation/1.json"),
        r#"{"particles": {
            "event_id": [0, 1],
            "particle_type": [[13, 22], [-13]],
            "vx": [[0.0, 1.0], [0.01]],
            "vy": [[0.0, 1.0], [-0.02]],
            "vz": [[1.5, 1.0], [-2.0]],
            "px": [[1.0, 0.1], [2.0]],
            "py": [[0.0, 0.1], [1.0]],
            "pz": [[5.0, 0.1], [3.0]],
            "number_of_hits": [[3, 1], [2]]
        }}"#,
    );

    write_file(
        &root.join("hits/2.json"),
        &format!(
            r#"{{"hits": {{"event_id": [7], "geometry_id": [101], "particle_id": [{PRIMARY_BARCODE}],
                "index": [0], "tx": [0.5], "ty": [0.5], "tz": [100.0],
                "tpx": [1.0], "tpy": [1.0], "tpz": [1.0],
                "deltapx": [-0.25], "deltapy": [0.0], "deltapz": [0.0]}}}}"#
        ),
    );
    write_file(
        &root.join("particles_simulation/2.json"),
        r#"{"particles": {
            "event_id": [7], "particle_type": [[13]],
            "vx": [[0.0]], "vy": [[0.0]], "vz": [[0.0]],
            "px": [[1.0]], "py": [[1.0]], "pz": [[1.0]],
            "number_of_hits": [[1]]
        }}"#,
    );
}

fn config(root: &Path) -> ValidatorConfig {
    ValidatorConfig {
        output_path: root.to_path_buf(),
        geometry_file: Some(root.join("geometry.json")),
        threads: 2,
        ..ValidatorConfig::default()
    }
}

fn export_everything(root: &Path) -> ValidatorConfig {
    write_geometry(root);
    write_shards(root);
    let config = config(root);
    let geometry = config.load_geometry().expect("geometry loads");
    let outcomes = Exporter::new(&config, geometry)
        .export_all(&ShardPool::new(config.threads), None)
        .expect("shards are discovered");
    assert!(first_failure(&outcomes).is_none(), "every shard exports");
    config
}

/// Turn an exported shard into a results file whose generated side copies
/// the reference.
fn results_from_export(root: &Path) -> std::path::PathBuf {
    let exported = Artifact::read(root.join("hits/1.encoded.json")).expect("export is readable");
    let hits = exported.hits_table(HITS_TABLE).expect("hits table");
    let mut results = Artifact::new(exported.header);
    results
        .insert_hits(REFERENCE_TABLE, &hits)
        .expect("reference table");
    results
        .insert_hits(GENERATED_TABLE, &hits)
        .expect("generated table");
    let path = root.join("results.json");
    results.write_atomic(&path).expect("results written");
    path
}

#[test]
fn every_discovered_shard_is_exported() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_geometry(temp.path());
    write_shards(temp.path());
    let config = config(temp.path());
    let geometry = config.load_geometry().expect("geometry loads");

    let outcomes = Exporter::new(&config, geometry)
        .export_all(&ShardPool::new(2), None)
        .expect("shards are discovered");
    assert_eq!(outcomes.len(), 2);

    let first = outcomes[0].result.as_ref().expect("shard 1 exports");
    assert_eq!(first.task_id, 1);
    assert_eq!(first.rows, 9);
    assert_eq!(first.events, 2);
    assert_eq!(first.geometry_failures, 0);

    let second = outcomes[1].result.as_ref().expect("shard 2 exports");
    assert_eq!(second.rows, 3);

    let artifact = Artifact::read(&first.output).expect("artifact reads back");
    let hits = artifact.hits_table(HITS_TABLE).expect("hits table");
    let event_zero: Vec<(i32, u64)> = hits
        .rows()
        .iter()
        .filter(|row| row.event_id == 0)
        .map(|row| (row.index, row.geometry_id))
        .collect();
    assert_eq!(
        event_zero,
        vec![(0, 1_000_000), (1, 101), (2, 102), (3, 103), (4, 1_000_001)]
    );
    assert!(artifact.metadata().is_ok());
}

#[test]
fn single_task_outside_the_shard_range_is_rejected() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_geometry(temp.path());
    write_shards(temp.path());
    let config = config(temp.path());
    let geometry = config.load_geometry().expect("geometry loads");

    let error = Exporter::new(&config, geometry)
        .export_all(&ShardPool::new(1), Some(3))
        .expect_err("only two shards exist");
    assert_eq!(error.category(), ErrorCategory::SchemaMismatch);
    assert_eq!(error.placeholder(), "INPUT.TASK_ID");
}

#[test]
fn export_then_import_recovers_hits_within_quantization() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = export_everything(temp.path());
    let results = results_from_export(temp.path());

    let importer = Importer::new(&config, config.load_geometry().expect("geometry loads"));
    let summary = importer.import_file(&results).expect("results import");
    assert_eq!(summary.sides[0].rows, primary_hits().len());
    assert_eq!(summary.sides[0].dropped_sentinels, 4);

    let imported = read_hits_file(importer.output_file(Side::Reference)).expect("hits read back");
    for original in primary_hits() {
        let row = (0..imported.len())
            .find(|row| {
                imported.event_id[*row] == original.event_id
                    && imported.index[*row] == original.index + 1
            })
            .expect("every primary hit is imported");
        assert_eq!(imported.geometry_id[row], original.geometry_id);
        assert_eq!(imported.barcode[row], PRIMARY_BARCODE);
        let position = [imported.tx[row], imported.ty[row], imported.tz[row]];
        let momentum = [imported.tpx[row], imported.tpy[row], imported.tpz[row]];
        for (decoded, expected) in position.iter().zip(original.position) {
            assert!((f64::from(*decoded) - expected).abs() <= 0.01);
        }
        for (decoded, expected) in momentum.iter().zip(original.momentum) {
            assert!((f64::from(*decoded) - expected).abs() <= 0.01);
        }
    }
}

#[test]
fn identical_sides_validate_without_differences() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = export_everything(temp.path());
    let results = results_from_export(temp.path());

    let validator = Validator::new(&config, config.load_geometry().expect("geometry loads"));
    let (output, validation) = validator
        .validate_file(&results, None)
        .expect("results validate");

    assert_eq!(output, temp.path().join("validation_results.json"));
    assert_eq!(validation.comparison.events, 2);
    assert!(validation.comparison.counts.difference.values().all(|diff| *diff == 0));
    let nhits = &validation.comparison.histograms[0];
    assert_eq!(nhits.variable, "nhits");
    assert_eq!(nhits.reference.counts[3], 1);
    assert_eq!(nhits.reference.counts[2], 1);

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).expect("output readable"))
            .expect("output is JSON");
    assert_eq!(written["histograms"].as_array().map(Vec::len), Some(12));
}
