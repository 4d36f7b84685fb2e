//! services/api/src/storage/bucket_store.rs
//!
//! Per-session upload buckets on the local filesystem.
//!
//! Each bucket is a directory named after its UUID under the upload root, with
//! exported copies mirrored under the output root. A stored file is named
//! `<32-hex-token>-<pages>__<sanitized original name>`, so a directory scan alone
//! yields every file's id, display name and page count. All methods are
//! blocking; async callers go through `spawn_blocking`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use summarizer_core::{BucketTotals, DocumentKind, FileEntry, Quotas};
use tracing::{info, warn};
use uuid::Uuid;

use crate::documents::count_pages;

const NAME_SEPARATOR: &str = "__";

/// Why an upload was refused. Displayed to the client as-is.
#[derive(Debug, thiserror::Error)]
pub enum UploadRejection {
    #[error("{name}: unsupported file type (allowed: pdf, docx, txt)")]
    DisallowedExtension { name: String },
    #[error("{name}: the limit of {max} files per session has been reached")]
    TooManyFiles { name: String, max: u32 },
    #[error("{name}: the file is larger than {max_mb} MB")]
    FileTooLarge { name: String, max_mb: u64 },
    #[error("{name}: the file is empty or could not be read")]
    Unreadable { name: String },
    #[error("{name}: its {pages} pages would exceed the limit of {max} pages per session")]
    PageLimit { name: String, pages: u32, max: u32 },
    #[error("{name}: the file could not be stored")]
    Storage {
        name: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// What a sweep or quota pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub buckets_removed: usize,
    pub bytes_freed: u64,
}

#[derive(Debug, Clone)]
pub struct BucketStore {
    upload_root: PathBuf,
    output_root: PathBuf,
    quotas: Quotas,
}

impl BucketStore {
    pub fn new(upload_root: PathBuf, output_root: PathBuf, quotas: Quotas) -> Self {
        Self {
            upload_root,
            output_root,
            quotas,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn bucket_dir(&self, bucket_id: Uuid) -> PathBuf {
        self.upload_root.join(bucket_id.to_string())
    }

    /// Creates both roots and the bucket directory if missing.
    pub fn ensure_bucket(&self, bucket_id: Uuid) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.output_root).map_err(io_error(&self.output_root))?;
        let dir = self.bucket_dir(bucket_id);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        Ok(dir)
    }

    //==========================================================================
    // Uploads
    //==========================================================================

    /// Validates and persists one upload. Checks run in order: extension,
    /// file count, size, readability, page budget.
    pub fn store_file(
        &self,
        bucket_id: Uuid,
        bytes: &[u8],
        declared_name: &str,
    ) -> Result<FileEntry, UploadRejection> {
        let name = sanitize_file_name(declared_name);
        let Some(kind) = DocumentKind::from_file_name(&name) else {
            return Err(UploadRejection::DisallowedExtension { name });
        };

        let existing = match self.list_files(bucket_id) {
            Ok(files) => files,
            Err(StorageError::Io { source, .. }) => {
                return Err(UploadRejection::Storage { name, source })
            }
        };
        let totals = BucketTotals::from_entries(&existing);
        if totals.files >= self.quotas.max_files {
            return Err(UploadRejection::TooManyFiles {
                name,
                max: self.quotas.max_files,
            });
        }
        if bytes.len() as u64 > self.quotas.max_file_bytes {
            return Err(UploadRejection::FileTooLarge {
                name,
                max_mb: self.quotas.max_file_bytes / (1024 * 1024),
            });
        }

        let pages = if bytes.is_empty() { 0 } else { count_pages(bytes, kind) };
        if pages == 0 {
            return Err(UploadRejection::Unreadable { name });
        }
        if totals.pages + pages > self.quotas.max_total_pages {
            return Err(UploadRejection::PageLimit {
                name,
                pages,
                max: self.quotas.max_total_pages,
            });
        }

        let dir = match self.ensure_bucket(bucket_id) {
            Ok(dir) => dir,
            Err(StorageError::Io { source, .. }) => {
                return Err(UploadRejection::Storage { name, source })
            }
        };
        let file_id = format!(
            "{}-{}{}{}",
            Uuid::new_v4().simple(),
            pages,
            NAME_SEPARATOR,
            name
        );
        let path = dir.join(&file_id);
        if let Err(source) = fs::write(&path, bytes) {
            return Err(UploadRejection::Storage { name, source });
        }

        info!(
            "Stored a {} file of {} bytes and {} pages in bucket {}.",
            kind.extension(),
            bytes.len(),
            pages,
            bucket_id
        );
        Ok(FileEntry {
            file_id,
            original_name: name,
            kind,
            size_bytes: bytes.len() as u64,
            pages,
            modified_at: Utc::now(),
        })
    }

    /// Removes one file. `Ok(false)` when it does not exist; ids that do not
    /// name a plain entry of the bucket are treated as absent.
    pub fn remove_file(&self, bucket_id: Uuid, file_id: &str) -> Result<bool, StorageError> {
        let Some(path) = self.file_path(bucket_id, file_id) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Path of a stored file, or `None` when the id could escape the bucket.
    pub fn file_path(&self, bucket_id: Uuid, file_id: &str) -> Option<PathBuf> {
        let is_plain = !file_id.is_empty()
            && file_id != "."
            && file_id != ".."
            && !file_id.contains(['/', '\\', '\0']);
        is_plain.then(|| self.bucket_dir(bucket_id).join(file_id))
    }

    /// Scans the bucket directory. A missing bucket has no files.
    pub fn list_files(&self, bucket_id: Uuid) -> Result<Vec<FileEntry>, StorageError> {
        let dir = self.bucket_dir(bucket_id);
        let reader = match fs::read_dir(&dir) {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir)(e)),
        };

        let mut files = Vec::new();
        for item in reader {
            let item = item.map_err(io_error(&dir))?;
            let metadata = match item.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let Some(file_id) = item.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some((pages, original_name)) = parse_storage_name(&file_id) else {
                continue;
            };
            let Some(kind) = DocumentKind::from_file_name(&original_name) else {
                continue;
            };
            let modified_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            files.push(FileEntry {
                file_id,
                original_name,
                kind,
                size_bytes: metadata.len(),
                pages,
                modified_at,
            });
        }
        files.sort_by(|a, b| a.original_name.cmp(&b.original_name));
        Ok(files)
    }

    pub fn totals(&self, bucket_id: Uuid) -> Result<BucketTotals, StorageError> {
        Ok(BucketTotals::from_entries(&self.list_files(bucket_id)?))
    }

    //==========================================================================
    // Cleanup
    //==========================================================================

    /// Deletes the uploads and exported outputs of a bucket. Idempotent.
    pub fn erase_bucket(&self, bucket_id: Uuid) -> Result<(), StorageError> {
        for root in [&self.upload_root, &self.output_root] {
            let dir = root.join(bucket_id.to_string());
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&dir)(e)),
            }
        }
        Ok(())
    }

    /// Deletes every bucket directory, in both roots, not modified within the
    /// retention period.
    pub fn sweep_expired(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        let Some(cutoff) = SystemTime::now().checked_sub(self.quotas.retention) else {
            return report;
        };

        for root in [&self.upload_root, &self.output_root] {
            for bucket in bucket_dirs(root) {
                if bucket.modified < cutoff {
                    match fs::remove_dir_all(&bucket.path) {
                        Ok(()) => {
                            report.buckets_removed += 1;
                            report.bytes_freed += bucket.bytes;
                        }
                        Err(e) => warn!("Could not remove expired bucket: {}", e),
                    }
                }
            }
        }
        if report.buckets_removed > 0 {
            info!(
                "Retention sweep removed {} buckets ({} bytes).",
                report.buckets_removed, report.bytes_freed
            );
        }
        report
    }

    /// Evicts whole buckets, least recently modified first, until the uploads
    /// and exported outputs of all buckets together fit the storage ceiling.
    pub fn enforce_total_quota(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut buckets = bucket_usage(&[self.upload_root.as_path(), self.output_root.as_path()]);
        let mut total: u64 = buckets.iter().map(|b| b.bytes).sum();
        if total <= self.quotas.max_storage_bytes {
            return report;
        }

        buckets.sort_by_key(|b| b.modified);
        for bucket in buckets {
            if total <= self.quotas.max_storage_bytes {
                break;
            }
            let failures: Vec<io::Error> = bucket
                .paths
                .iter()
                .filter_map(|path| fs::remove_dir_all(path).err())
                .filter(|e| e.kind() != io::ErrorKind::NotFound)
                .collect();
            if let Some(e) = failures.first() {
                warn!("Could not evict bucket: {}", e);
                continue;
            }
            total = total.saturating_sub(bucket.bytes);
            report.buckets_removed += 1;
            report.bytes_freed += bucket.bytes;
        }
        warn!(
            "Storage ceiling exceeded; evicted {} buckets ({} bytes).",
            report.buckets_removed, report.bytes_freed
        );
        report
    }
}

struct BucketDir {
    path: PathBuf,
    modified: SystemTime,
    bytes: u64,
}

fn bucket_dirs(root: &Path) -> Vec<BucketDir> {
    let Ok(reader) = fs::read_dir(root) else {
        return Vec::new();
    };
    reader
        .filter_map(Result::ok)
        .filter_map(|item| {
            let metadata = item.metadata().ok()?;
            if !metadata.is_dir() {
                return None;
            }
            let path = item.path();
            Some(BucketDir {
                bytes: dir_size(&path),
                modified: metadata.modified().ok()?,
                path,
            })
        })
        .collect()
}

/// One bucket as seen across several roots: its directories, their combined
/// size and the latest modification among them.
struct BucketUsage {
    paths: Vec<PathBuf>,
    modified: SystemTime,
    bytes: u64,
}

fn bucket_usage(roots: &[&Path]) -> Vec<BucketUsage> {
    let mut by_name: HashMap<OsString, BucketUsage> = HashMap::new();
    for root in roots {
        for dir in bucket_dirs(root) {
            let Some(name) = dir.path.file_name().map(OsString::from) else {
                continue;
            };
            let usage = by_name.entry(name).or_insert_with(|| BucketUsage {
                paths: Vec::new(),
                modified: dir.modified,
                bytes: 0,
            });
            usage.modified = usage.modified.max(dir.modified);
            usage.bytes += dir.bytes;
            usage.paths.push(dir.path);
        }
    }
    by_name.into_values().collect()
}

fn dir_size(dir: &Path) -> u64 {
    let Ok(reader) = fs::read_dir(dir) else {
        return 0;
    };
    reader
        .filter_map(Result::ok)
        .filter_map(|item| item.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

/// Splits a storage name into its page count and original file name.
fn parse_storage_name(file_id: &str) -> Option<(u32, String)> {
    let (prefix, original) = file_id.split_once(NAME_SEPARATOR)?;
    let (_, pages) = prefix.rsplit_once('-')?;
    Some((pages.parse().ok()?, original.to_string()))
}

/// Keeps the final path component and replaces anything but alphanumerics
/// (any script), `.`, `-` and `_` with `_`.
pub fn sanitize_file_name(declared: &str) -> String {
    let base = declared.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quotas() -> Quotas {
        Quotas {
            max_files: 3,
            max_file_bytes: 1024,
            max_total_pages: 2,
            retention: Duration::from_secs(24 * 3600),
            max_storage_bytes: 100,
        }
    }

    fn store(root: &Path, quotas: Quotas) -> BucketStore {
        BucketStore::new(root.join("uploads"), root.join("outputs"), quotas)
    }

    fn set_age(dir: &Path, age: Duration) {
        let when = SystemTime::now() - age;
        fs::File::open(dir).unwrap().set_modified(when).unwrap();
    }

    #[test]
    fn stored_files_are_listed_with_their_pages() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let bucket = Uuid::new_v4();

        let entry = store.store_file(bucket, b"some words here", "../My Notes.txt").unwrap();
        assert_eq!(entry.original_name, "My_Notes.txt");
        assert_eq!(entry.pages, 1);
        assert!(entry.file_id.ends_with("-1__My_Notes.txt"));

        let listed = store.list_files(bucket).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_id, entry.file_id);
        assert_eq!(listed[0].pages, 1);
        assert_eq!(listed[0].size_bytes, 15);
        assert_eq!(
            store.totals(bucket).unwrap(),
            BucketTotals { files: 1, bytes: 15, pages: 1 }
        );
    }

    #[test]
    fn uploads_are_validated() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let bucket = Uuid::new_v4();

        assert!(matches!(
            store.store_file(bucket, b"x", "payload.exe"),
            Err(UploadRejection::DisallowedExtension { .. })
        ));
        assert!(matches!(
            store.store_file(bucket, &[b'a'; 2048], "big.txt"),
            Err(UploadRejection::FileTooLarge { max_mb: 0, .. })
        ));
        assert!(matches!(
            store.store_file(bucket, b"", "empty.txt"),
            Err(UploadRejection::Unreadable { .. })
        ));
        assert!(matches!(
            store.store_file(bucket, b"not a pdf at all", "broken.pdf"),
            Err(UploadRejection::Unreadable { .. })
        ));
        assert!(store.list_files(bucket).unwrap().is_empty());
    }

    #[test]
    fn page_budget_is_enforced() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let bucket = Uuid::new_v4();

        store.store_file(bucket, b"one", "a.txt").unwrap();
        store.store_file(bucket, b"two", "b.txt").unwrap();
        let err = store.store_file(bucket, b"three", "c.txt").unwrap_err();
        assert!(matches!(err, UploadRejection::PageLimit { pages: 1, max: 2, .. }));
        assert!(err.to_string().starts_with("c.txt:"));
        assert_eq!(store.totals(bucket).unwrap().pages, 2);
    }

    #[test]
    fn file_count_is_enforced() {
        let root = tempfile::tempdir().unwrap();
        let mut limits = quotas();
        limits.max_total_pages = 100;
        let store = store(root.path(), limits);
        let bucket = Uuid::new_v4();

        for name in ["a.txt", "b.txt", "c.txt"] {
            store.store_file(bucket, b"text", name).unwrap();
        }
        assert!(matches!(
            store.store_file(bucket, b"text", "d.txt"),
            Err(UploadRejection::TooManyFiles { max: 3, .. })
        ));
    }

    #[test]
    fn removal_reports_absent_files_and_rejects_traversal() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let bucket = Uuid::new_v4();
        let entry = store.store_file(bucket, b"text", "a.txt").unwrap();

        assert!(!store.remove_file(bucket, "missing-1__x.txt").unwrap());
        assert!(!store.remove_file(bucket, "../other/a.txt").unwrap());
        assert!(!store.remove_file(bucket, "..").unwrap());
        assert!(store.remove_file(bucket, &entry.file_id).unwrap());
        assert!(!store.remove_file(bucket, &entry.file_id).unwrap());
    }

    #[test]
    fn erase_is_idempotent_and_covers_outputs() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let bucket = Uuid::new_v4();
        store.store_file(bucket, b"text", "a.txt").unwrap();
        let exported = store.output_root().join(bucket.to_string());
        fs::create_dir_all(&exported).unwrap();
        fs::write(exported.join("Summary_800w_English.pdf"), b"%PDF").unwrap();

        store.erase_bucket(bucket).unwrap();
        assert!(!store.bucket_dir(bucket).exists());
        assert!(!exported.exists());
        store.erase_bucket(bucket).unwrap();
    }

    #[test]
    fn sweep_removes_only_expired_buckets() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let stale_dir = store.ensure_bucket(stale).unwrap();
        let fresh_dir = store.ensure_bucket(fresh).unwrap();
        let stale_output = store.output_root().join(stale.to_string());
        fs::create_dir_all(&stale_output).unwrap();

        set_age(&stale_dir, Duration::from_secs(25 * 3600));
        set_age(&stale_output, Duration::from_secs(25 * 3600));
        set_age(&fresh_dir, Duration::from_secs(23 * 3600));

        let report = store.sweep_expired();
        assert_eq!(report.buckets_removed, 2);
        assert!(!stale_dir.exists());
        assert!(!stale_output.exists());
        assert!(fresh_dir.exists());
    }

    #[test]
    fn quota_evicts_oldest_buckets_first() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let mut dirs = Vec::new();
        for hours in [3, 1, 2] {
            let dir = store.ensure_bucket(Uuid::new_v4()).unwrap();
            fs::write(dir.join("f-1__a.txt"), [b'a'; 40]).unwrap();
            set_age(&dir, Duration::from_secs(hours * 3600));
            dirs.push(dir);
        }

        let report = store.enforce_total_quota();
        assert_eq!(report.buckets_removed, 1);
        assert_eq!(report.bytes_freed, 40);
        assert!(!dirs[0].exists());
        assert!(dirs[1].exists());
        assert!(dirs[2].exists());
    }

    #[test]
    fn quota_counts_exported_outputs_and_evicts_whole_buckets() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let old = Uuid::new_v4();
        let recent = Uuid::new_v4();

        let old_uploads = store.ensure_bucket(old).unwrap();
        fs::write(old_uploads.join("f-1__a.txt"), [b'a'; 10]).unwrap();
        let old_outputs = store.output_root().join(old.to_string());
        fs::create_dir_all(&old_outputs).unwrap();
        fs::write(old_outputs.join("Summary_800w_English.pdf"), [b'p'; 10_000]).unwrap();
        let recent_uploads = store.ensure_bucket(recent).unwrap();
        fs::write(recent_uploads.join("f-1__b.txt"), [b'b'; 40]).unwrap();

        set_age(&old_uploads, Duration::from_secs(2 * 3600));
        set_age(&old_outputs, Duration::from_secs(2 * 3600));
        set_age(&recent_uploads, Duration::from_secs(3600));

        let report = store.enforce_total_quota();
        assert_eq!(report.buckets_removed, 1);
        assert_eq!(report.bytes_freed, 10_010);
        assert!(!old_uploads.exists());
        assert!(!old_outputs.exists());
        assert!(recent_uploads.exists());
    }

    #[test]
    fn outputs_alone_can_exceed_the_ceiling() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let bucket = Uuid::new_v4();
        let outputs = store.output_root().join(bucket.to_string());
        fs::create_dir_all(&outputs).unwrap();
        fs::write(outputs.join("Report_2000w_English.docx"), [b'd'; 10_000]).unwrap();

        let report = store.enforce_total_quota();
        assert_eq!(report.buckets_removed, 1);
        assert!(!outputs.exists());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_bucket_rejects_uploads_instead_of_skipping_quotas() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let bucket = Uuid::new_v4();
        fs::create_dir_all(root.path().join("uploads")).unwrap();
        // A plain file where the bucket directory should be cannot be scanned.
        fs::write(store.bucket_dir(bucket), b"not a directory").unwrap();

        assert!(matches!(
            store.store_file(bucket, b"text", "a.txt"),
            Err(UploadRejection::Storage { .. })
        ));
    }

    #[test]
    fn quota_is_a_no_op_under_the_ceiling() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), quotas());
        let dir = store.ensure_bucket(Uuid::new_v4()).unwrap();
        fs::write(dir.join("f-1__a.txt"), [b'a'; 100]).unwrap();
        set_age(&dir, Duration::from_secs(100 * 3600));

        assert_eq!(store.enforce_total_quota(), CleanupReport::default());
        assert!(dir.exists());
    }

    #[test]
    fn sanitized_names_stay_inside_the_bucket() {
        assert_eq!(sanitize_file_name("C:\\docs\\report v2.pdf"), "report_v2.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name("Zażółć gęślą.txt"), "Zażółć_gęślą.txt");
        assert_eq!(sanitize_file_name("résumé<1>.docx"), "résumé_1_.docx");
    }
}
