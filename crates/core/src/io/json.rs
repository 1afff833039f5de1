//! JSON reading and writing

use crate::assessment::FieldAnalysis;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::observation::{BandScene, TemporalObservation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Either a bare array or an object with a named list.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Observations { observations: Vec<T> },
    Scenes { scenes: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(v) => v,
            Listing::Observations { observations } => observations,
            Listing::Scenes { scenes } => scenes,
        }
    }
}

fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(path.as_ref())?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Read observations from `[...]` or `{"observations": [...]}`.
///
/// File order is the ingestion order.
pub fn read_observations<P: AsRef<Path>>(path: P) -> Result<Vec<TemporalObservation>> {
    let listing: Listing<TemporalObservation> = read_json(path.as_ref())?;
    let observations = listing.into_vec();
    debug!(
        "Read {} observations from {}",
        observations.len(),
        path.as_ref().display()
    );
    Ok(observations)
}

/// Read band-level scenes from `[...]` or `{"scenes": [...]}`.
pub fn read_band_scenes<P: AsRef<Path>>(path: P) -> Result<Vec<BandScene>> {
    let listing: Listing<BandScene> = read_json(path.as_ref())?;
    let scenes = listing.into_vec();
    for scene in &scenes {
        scene.validate()?;
    }
    Ok(scenes)
}

/// Read and validate an engine configuration.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let config: EngineConfig = read_json(path)?;
    config.validate()?;
    Ok(config)
}

pub fn read_analysis<P: AsRef<Path>>(path: P) -> Result<FieldAnalysis> {
    read_json(path)
}

/// Pretty-print any serializable value to `path`, creating parent
/// directories.
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn write_analysis<P: AsRef<Path>>(analysis: &FieldAnalysis, path: P) -> Result<()> {
    write_json(analysis, path)
}

/// Sidecar location: `<root>/<field_id>/<run_date>.json`.
///
/// Characters outside `[A-Za-z0-9._-]` in the field id become `_` so an id
/// can never escape `root`.
pub fn sidecar_path<P: AsRef<Path>>(root: P, analysis: &FieldAnalysis) -> PathBuf {
    let safe_id: String = analysis
        .field_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe_id = if safe_id.is_empty() || safe_id.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        safe_id
    };
    root.as_ref()
        .join(safe_id)
        .join(format!("{}.json", analysis.date.format("%Y-%m-%d")))
}

/// Write the analysis sidecar under `root` and return its path.
pub fn write_sidecar<P: AsRef<Path>>(root: P, analysis: &FieldAnalysis) -> Result<PathBuf> {
    let path = sidecar_path(root, analysis);
    write_analysis(analysis, &path)?;
    debug!("Wrote sidecar {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{BaselineSource, StressLabel};
    use chrono::NaiveDate;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("matengine-io-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn analysis(field_id: &str) -> FieldAnalysis {
        let date = NaiveDate::from_ymd_opt(2024, 7, 14).unwrap();
        FieldAnalysis {
            field_id: field_id.to_string(),
            date,
            singular_values: vec![1.5, 0.2],
            explained_variance: vec![0.98, 0.02],
            chosen_rank: 1,
            residual_profile: vec![0.01, 0.02, 0.015],
            stress_label: StressLabel::Healthy,
            confidence: 0.1,
            dates: vec![date; 3],
            z_score: 0.3,
            baseline: BaselineSource::Profile,
            health_score: 0.9,
            requested_rank: None,
            cumulative_variance: 0.98,
            temporal_signature: vec![0.4, 0.5, 0.6],
            trend: None,
            primary_mode: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn test_sidecar_roundtrip() {
        let dir = scratch_dir("sidecar");
        let a = analysis("north-40");
        let path = write_sidecar(&dir, &a).unwrap();
        assert_eq!(path, dir.join("north-40").join("2024-07-14.json"));
        let back = read_analysis(&path).unwrap();
        assert_eq!(back, a);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_sidecar_path_is_sanitized() {
        let a = analysis("../../etc/passwd");
        let path = sidecar_path("/data/out", &a);
        assert_eq!(
            path,
            PathBuf::from("/data/out/.._.._etc_passwd/2024-07-14.json")
        );
        let a = analysis("..");
        assert_eq!(
            sidecar_path("/data/out", &a),
            PathBuf::from("/data/out/_/2024-07-14.json")
        );
    }

    #[test]
    fn test_read_observations_both_shapes() {
        let dir = scratch_dir("obs");
        let bare = dir.join("bare.json");
        fs::write(
            &bare,
            r#"[{"field_id": "a", "date": "2024-06-01", "indices": {"ndvi": 0.5}}]"#,
        )
        .unwrap();
        let wrapped = dir.join("wrapped.json");
        fs::write(
            &wrapped,
            r#"{"observations": [
                {"field_id": "a", "date": "2024-06-01"},
                {"field_id": "b", "date": "2024-06-02"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(read_observations(&bare).unwrap().len(), 1);
        assert_eq!(read_observations(&wrapped).unwrap().len(), 2);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_read_config_rejects_invalid() {
        let dir = scratch_dir("config");
        let path = dir.join("config.json");
        fs::write(&path, r#"{"max_rank": 0}"#).unwrap();
        assert!(read_config(&path).is_err());
        fs::write(&path, r#"{"max_rank": 2, "index": "ndre"}"#).unwrap();
        assert_eq!(read_config(&path).unwrap().rank.max_rank, 2);
        fs::remove_dir_all(&dir).unwrap();
    }
}
