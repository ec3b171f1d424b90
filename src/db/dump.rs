//! Backup and restore orchestration via external dump/restore tools.
//!
//! `export` runs `mysqldump | gzip` into a timestamped archive; `import` runs
//! `zcat | mysql` from one. Both build argument arrays and connect the two
//! children with an OS pipe; no shell is ever involved, so credentials and
//! paths cannot break out of their argument. Both wait for both children and
//! verify both exit statuses before returning.

use crate::config::DriverKind;
use crate::db::facade::Connection;
use crate::error::{DbError, DbResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// External executables required by export/import.
const REQUIRED_TOOLS: [&str; 4] = ["mysqldump", "mysql", "gzip", "zcat"];

/// Check the preconditions for export/import. Every failed check aborts the
/// operation.
pub(crate) fn require_dump_tooling(conn: &Connection, operation: &str) -> DbResult<()> {
    if conn.driver() != DriverKind::MySql {
        return Err(DbError::unsupported(
            operation,
            format!("driver '{}' is not supported, requires mysql", conn.driver()),
        ));
    }

    for tool in REQUIRED_TOOLS {
        if resolve_tool(tool).is_none() {
            return Err(DbError::unsupported(
                operation,
                format!("'{}' is not available on PATH", tool),
            ));
        }
    }

    Ok(())
}

/// Locate an executable on the current `PATH`.
fn resolve_tool(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    find_in_paths(name, std::env::split_paths(&path))
}

fn find_in_paths(name: &str, paths: impl Iterator<Item = PathBuf>) -> Option<PathBuf> {
    for dir in paths {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Archive filename for an export taken at `now`.
fn archive_filename(now: chrono::DateTime<chrono::Local>) -> String {
    format!("{}.sql.gz", now.format("%Y-%m-%d_%H:%M:%S"))
}

/// Connection arguments shared by `mysqldump` and `mysql`.
fn client_args(conn: &Connection) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(username) = conn.credentials().username.as_deref() {
        args.push(format!("--user={}", username));
    }
    if let Some(password) = conn.credentials().password.as_deref() {
        args.push(format!("--password={}", password));
    }
    args.push(format!("--host={}", conn.dsn().host()));
    if let Some(port) = conn.dsn().port() {
        args.push(format!("--port={}", port));
    }
    args
}

fn check_exit(tool: &str, status: std::process::ExitStatus) -> DbResult<()> {
    if status.success() {
        Ok(())
    } else {
        Err(DbError::connection(format!(
            "{} exited with status {}",
            tool, status
        )))
    }
}

/// Dump the connection's database into `destination/<timestamp>.sql.gz`.
pub(crate) async fn export(conn: &Connection, destination: &Path) -> DbResult<PathBuf> {
    require_dump_tooling(conn, "export")?;

    if !destination.is_dir() {
        return Err(DbError::invalid_request(
            "export destination must be a directory",
        ));
    }

    let database = conn.dsn().database_name()?;
    let archive_path = destination.join(archive_filename(chrono::Local::now()));

    debug!(database = %database, archive = %archive_path.display(), "Starting export");

    run_dump_pipeline(
        Path::new("mysqldump"),
        Path::new("gzip"),
        &client_args(conn),
        &database,
        &archive_path,
    )
    .await?;

    info!(archive = %archive_path.display(), "Export complete");
    Ok(archive_path)
}

/// Run `mysqldump | gzip` into `archive_path`. A failed pipeline never leaves
/// a truncated archive behind.
async fn run_dump_pipeline(
    dump_cmd: &Path,
    gzip_cmd: &Path,
    args: &[String],
    database: &str,
    archive_path: &Path,
) -> DbResult<()> {
    let pipeline = async {
        let mut dump = Command::new(dump_cmd)
            .arg("--add-drop-table")
            .args(args)
            .arg(database)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()?;

        let dump_stdout = dump
            .stdout
            .take()
            .ok_or_else(|| DbError::connection("could not capture mysqldump output"))?;
        let archive = tokio::fs::File::create(archive_path).await?;

        let mut gzip = Command::new(gzip_cmd)
            .arg("-c")
            .stdin(TryInto::<Stdio>::try_into(dump_stdout)?)
            .stdout(Stdio::from(archive.into_std().await))
            .spawn()?;

        let dump_status = dump.wait().await?;
        let gzip_status = gzip.wait().await?;
        check_exit("mysqldump", dump_status)?;
        check_exit("gzip", gzip_status)
    };

    if let Err(e) = pipeline.await {
        let _ = tokio::fs::remove_file(archive_path).await;
        return Err(e);
    }
    Ok(())
}

/// Restore the connection's database from a `.sql.gz` archive.
pub(crate) async fn import(conn: &Connection, source: &Path, backup: bool) -> DbResult<()> {
    require_dump_tooling(conn, "import")?;

    if !source.is_file() {
        return Err(DbError::invalid_request("import source file does not exist"));
    }

    // Safety backup of the current state next to the archive being restored
    if backup {
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        export(conn, dir).await?;
    }

    let database = conn.dsn().database_name()?;

    debug!(database = %database, source = %source.display(), "Starting import");

    let mut zcat = Command::new("zcat")
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()?;

    let zcat_stdout = zcat
        .stdout
        .take()
        .ok_or_else(|| DbError::connection("could not capture zcat output"))?;

    let mut restore = Command::new("mysql")
        .args(client_args(conn))
        .arg(&database)
        .stdin(TryInto::<Stdio>::try_into(zcat_stdout)?)
        .stdout(Stdio::null())
        .spawn()?;

    let zcat_status = zcat.wait().await?;
    let restore_status = restore.wait().await?;
    check_exit("zcat", zcat_status)?;
    check_exit("mysql", restore_status)?;

    info!(database = %database, "Import complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_archive_filename_shape() {
        let at = chrono::Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(archive_filename(at), "2024-03-07_09:05:01.sql.gz");
    }

    #[test]
    fn test_find_in_paths_hits_and_misses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mysqldump"), b"#!/bin/sh\n").unwrap();

        let found = find_in_paths("mysqldump", std::iter::once(dir.path().to_path_buf()));
        assert_eq!(found, Some(dir.path().join("mysqldump")));

        let missing = find_in_paths("zcat", std::iter::once(dir.path().to_path_buf()));
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_failed_dump_pipeline_removes_partial_archive() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let write_script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };
        // Emits partial output, then fails, like a dump cut off mid-stream
        let dump_cmd = write_script("failing-dump", "#!/bin/sh\necho partial\nexit 1\n");
        let gzip_cmd = write_script("pass-through", "#!/bin/sh\ncat\n");

        let archive = dir.path().join("backup.sql.gz");
        let err = run_dump_pipeline(&dump_cmd, &gzip_cmd, &[], "appdb", &archive)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mysqldump"));
        assert!(!archive.exists());
    }

    #[test]
    fn test_check_exit_reports_tool_name() {
        use std::os::unix::process::ExitStatusExt;
        let failed = std::process::ExitStatus::from_raw(256);
        let err = check_exit("gzip", failed).unwrap_err();
        assert!(err.to_string().contains("gzip"));
    }
}
