//! Time-bounded on-disk memo for fetched series, stored as Parquet.
//!
//! Layout: `{cache_dir}/series={ID}/{start}_{end}.parquet` plus a
//! `{start}_{end}.meta.json` sidecar per entry.
//!
//! Features:
//! - Freshness window (default one hour); stale entries read as misses
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (schema check, row count matches sidecar)
//! - Quarantine for corrupt files ({filename}.quarantined)

use super::provider::DataError;
use crate::domain::{DataHash, ObservationPoint};
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Sidecar describing one cached (series, range) entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub series_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub point_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: DateTime<Utc>,
}

impl CacheMeta {
    /// Age relative to `now`; entries stamped in the future count as age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Per-series cache summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub series_id: String,
    pub entries: usize,
    pub total_points: usize,
    pub newest: Option<DateTime<Utc>>,
    pub bytes: u64,
}

pub struct SeriesCache {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl SeriesCache {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn series_dir(&self, series_id: &str) -> PathBuf {
        self.cache_dir.join(format!("series={}", sanitize(series_id)))
    }

    fn entry_stem(start: NaiveDate, end: NaiveDate) -> String {
        format!("{}_{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
    }

    fn data_path(&self, series_id: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
        self.series_dir(series_id)
            .join(format!("{}.parquet", Self::entry_stem(start, end)))
    }

    fn meta_path(&self, series_id: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
        self.series_dir(series_id)
            .join(format!("{}.meta.json", Self::entry_stem(start, end)))
    }

    /// Sidecar for an entry, fresh or not.
    pub fn get_meta(&self, series_id: &str, start: NaiveDate, end: NaiveDate) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(series_id, start, end)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn is_fresh(&self, meta: &CacheMeta) -> bool {
        meta.age(Utc::now()) < self.ttl
    }

    /// Cached observations for exactly this range, if present and fresh.
    ///
    /// A corrupt entry is quarantined and reported as a miss.
    pub fn get(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Vec<ObservationPoint>> {
        let meta = self.get_meta(series_id, start, end)?;
        if !self.is_fresh(&meta) {
            tracing::debug!(series_id, %start, %end, "cache entry stale");
            return None;
        }

        let path = self.data_path(series_id, start, end);
        match load_and_validate(&path, &meta) {
            Ok(points) => {
                tracing::debug!(series_id, points = points.len(), "cache hit");
                Some(points)
            }
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "quarantining corrupt cache file"
                );
                let _ = fs::rename(&path, &quarantine);
                let _ = fs::remove_file(self.meta_path(series_id, start, end));
                None
            }
        }
    }

    /// Store observations for a range. Empty results are not cached.
    pub fn put(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        points: &[ObservationPoint],
        source: &str,
    ) -> Result<(), DataError> {
        if points.is_empty() {
            tracing::debug!(series_id, "not caching empty result");
            return Ok(());
        }

        let dir = self.series_dir(series_id);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let df = points_to_dataframe(points)?;
        let path = self.data_path(series_id, start, end);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            series_id: series_id.to_string(),
            start,
            end,
            point_count: points.len(),
            data_hash: hash_points(points)?.0,
            source: source.to_string(),
            cached_at: Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(series_id, start, end), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        Ok(())
    }

    /// All sidecars under the cache root, with the directory they live in.
    fn all_meta(&self) -> Vec<(PathBuf, CacheMeta)> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for dir in entries.flatten() {
            let name = dir.file_name().to_string_lossy().to_string();
            if !name.starts_with("series=") {
                continue;
            }
            let Ok(files) = fs::read_dir(dir.path()) else {
                continue;
            };
            for file in files.flatten() {
                let path = file.path();
                let is_meta = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".meta.json"));
                if !is_meta {
                    continue;
                }
                if let Some(meta) = fs::read_to_string(&path)
                    .ok()
                    .and_then(|c| serde_json::from_str::<CacheMeta>(&c).ok())
                {
                    out.push((dir.path(), meta));
                }
            }
        }
        out
    }

    /// Summary per cached series, sorted by id.
    pub fn status(&self) -> Vec<CacheStatus> {
        let mut by_series: std::collections::BTreeMap<String, CacheStatus> = Default::default();
        for (dir, meta) in self.all_meta() {
            let entry = by_series
                .entry(meta.series_id.clone())
                .or_insert_with(|| CacheStatus {
                    series_id: meta.series_id.clone(),
                    entries: 0,
                    total_points: 0,
                    newest: None,
                    bytes: dir_size(&dir),
                });
            entry.entries += 1;
            entry.total_points += meta.point_count;
            entry.newest = entry.newest.max(Some(meta.cached_at));
        }
        by_series.into_values().collect()
    }

    /// Entries cached longer ago than `older_than`. Deletes them unless `dry_run`.
    pub fn clean(&self, older_than: Duration, dry_run: bool) -> Result<Vec<CacheMeta>, DataError> {
        let now = Utc::now();
        let mut removed = Vec::new();
        for (_, meta) in self.all_meta() {
            if meta.age(now) <= older_than {
                continue;
            }
            if !dry_run {
                let data = self.data_path(&meta.series_id, meta.start, meta.end);
                let sidecar = self.meta_path(&meta.series_id, meta.start, meta.end);
                if data.exists() {
                    fs::remove_file(&data)
                        .map_err(|e| DataError::CacheError(format!("remove {}: {e}", data.display())))?;
                }
                fs::remove_file(&sidecar)
                    .map_err(|e| DataError::CacheError(format!("remove {}: {e}", sidecar.display())))?;
            }
            removed.push(meta);
        }
        Ok(removed)
    }
}

fn sanitize(series_id: &str) -> String {
    series_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn dir_size(path: &Path) -> u64 {
    fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn points_to_dataframe(points: &[ObservationPoint]) -> Result<DataFrame, DataError> {
    let epoch = epoch();
    let dates: Vec<i32> = points
        .iter()
        .map(|p| (p.date - epoch).num_days() as i32)
        .collect();
    let values: Vec<Option<f64>> = points.iter().map(|p| p.value).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("value".into(), values),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn hash_points(points: &[ObservationPoint]) -> Result<DataHash, DataError> {
    let payload = serde_json::to_vec(points)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(DataHash::of_bytes(&payload))
}

/// Read a cached file back, checking it against its sidecar's row count
/// and content hash.
fn load_and_validate(path: &Path, meta: &CacheMeta) -> Result<Vec<ObservationPoint>, DataError> {
    let expected_rows = meta.point_count;
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() != expected_rows {
        return Err(DataError::CacheError(format!(
            "row count {} does not match sidecar {expected_rows}",
            df.height()
        )));
    }

    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));
    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let value_ca = df
        .column("value")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("value column type: {e}")))?;

    let epoch = epoch();
    let points = (0..df.height())
        .map(|i| {
            let days = date_ca
                .get(i)
                .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
            Ok(ObservationPoint {
                date: epoch + chrono::Duration::days(days as i64),
                value: value_ca.get(i),
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    let actual = hash_points(&points)?;
    if actual.0 != meta.data_hash {
        return Err(DataError::CacheError(format!(
            "content hash {actual} does not match sidecar {}",
            meta.data_hash
        )));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_points() -> Vec<ObservationPoint> {
        vec![
            ObservationPoint::new(d(2020, 1, 1), 3.5),
            ObservationPoint::missing(d(2020, 2, 1)),
            ObservationPoint::new(d(2020, 3, 1), 4.4),
        ]
    }

    #[test]
    fn put_then_get_preserves_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path(), DEFAULT_TTL);

        cache
            .put("UNRATE", d(2020, 1, 1), d(2020, 12, 31), &sample_points(), "fred")
            .unwrap();
        let loaded = cache.get("UNRATE", d(2020, 1, 1), d(2020, 12, 31)).unwrap();

        assert_eq!(loaded, sample_points());
    }

    #[test]
    fn different_range_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path(), DEFAULT_TTL);

        cache
            .put("UNRATE", d(2020, 1, 1), d(2020, 12, 31), &sample_points(), "fred")
            .unwrap();
        assert!(cache.get("UNRATE", d(2019, 1, 1), d(2020, 12, 31)).is_none());
        assert!(cache.get("FEDFUNDS", d(2020, 1, 1), d(2020, 12, 31)).is_none());
    }

    #[test]
    fn stale_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path(), Duration::ZERO);

        cache
            .put("UNRATE", d(2020, 1, 1), d(2020, 12, 31), &sample_points(), "fred")
            .unwrap();
        assert!(cache.get_meta("UNRATE", d(2020, 1, 1), d(2020, 12, 31)).is_some());
        assert!(cache.get("UNRATE", d(2020, 1, 1), d(2020, 12, 31)).is_none());
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path(), DEFAULT_TTL);

        cache
            .put("UNRATE", d(2020, 1, 1), d(2020, 12, 31), &sample_points(), "fred")
            .unwrap();
        let path = cache.data_path("UNRATE", d(2020, 1, 1), d(2020, 12, 31));
        fs::write(&path, b"not parquet").unwrap();

        assert!(cache.get("UNRATE", d(2020, 1, 1), d(2020, 12, 31)).is_none());
        assert!(!path.exists());
        assert!(path.with_extension("parquet.quarantined").exists());
    }

    #[test]
    fn rewritten_values_fail_the_hash_check() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path(), DEFAULT_TTL);
        let (start, end) = (d(2020, 1, 1), d(2020, 12, 31));

        cache.put("UNRATE", start, end, &sample_points(), "fred").unwrap();

        // same row count, different content
        let tampered = vec![
            ObservationPoint::new(d(2020, 1, 1), 9.9),
            ObservationPoint::missing(d(2020, 2, 1)),
            ObservationPoint::new(d(2020, 3, 1), 4.4),
        ];
        let path = cache.data_path("UNRATE", start, end);
        write_parquet(&points_to_dataframe(&tampered).unwrap(), &path).unwrap();

        assert!(cache.get("UNRATE", start, end).is_none());
        assert!(path.with_extension("parquet.quarantined").exists());
        assert!(cache.get_meta("UNRATE", start, end).is_none());
    }

    #[test]
    fn empty_result_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path(), DEFAULT_TTL);

        cache
            .put("UNRATE", d(2020, 1, 1), d(2020, 12, 31), &[], "fred")
            .unwrap();
        assert!(cache.get_meta("UNRATE", d(2020, 1, 1), d(2020, 12, 31)).is_none());
    }

    #[test]
    fn status_groups_entries_by_series() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path(), DEFAULT_TTL);

        cache
            .put("UNRATE", d(2020, 1, 1), d(2020, 12, 31), &sample_points(), "fred")
            .unwrap();
        cache
            .put("UNRATE", d(2021, 1, 1), d(2021, 12, 31), &sample_points(), "fred")
            .unwrap();
        cache
            .put("FEDFUNDS", d(2020, 1, 1), d(2020, 12, 31), &sample_points(), "fred")
            .unwrap();

        let status = cache.status();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].series_id, "FEDFUNDS");
        assert_eq!(status[1].series_id, "UNRATE");
        assert_eq!(status[1].entries, 2);
        assert_eq!(status[1].total_points, 6);
        assert!(status[1].newest.is_some());
    }

    #[test]
    fn clean_dry_run_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path(), DEFAULT_TTL);

        cache
            .put("UNRATE", d(2020, 1, 1), d(2020, 12, 31), &sample_points(), "fred")
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let preview = cache.clean(Duration::ZERO, true).unwrap();
        assert_eq!(preview.len(), 1);
        assert!(cache.get("UNRATE", d(2020, 1, 1), d(2020, 12, 31)).is_some());

        let removed = cache.clean(Duration::ZERO, false).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(cache.get_meta("UNRATE", d(2020, 1, 1), d(2020, 12, 31)).is_none());
    }

    #[test]
    fn series_ids_are_sanitized_for_paths() {
        assert_eq!(sanitize("MEHOINUSMOA672N"), "MEHOINUSMOA672N");
        assert_eq!(sanitize("../etc"), "___etc");
    }
}
