//! End-to-end pipeline tests against stub APT tools
//!
//! A shell script stands in for `apt-get`: the dry-run invocation prints a
//! fixed machine-summary stream, the apply invocation records a marker
//! file. `apt-config` is stubbed the same way, and archive bodies come
//! from a local mock HTTP server.

use httpmock::prelude::*;
use rapt_config::Config;
use rapt_errors::{Error, HashError};
use rapt_hash::Algorithm;
use rapt_ops::{commit, plan_transaction, CommitOutcome, OpsCtxBuilder};
use rapt_staging::STAGING_DIR_NAME;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const ALPHA_BODY: &[u8] = b"alpha archive bytes";
const BETA_BODY: &[u8] = b"beta archive bytes, a bit longer";

fn write_script(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Stub apt-get: `--print-uris` prints the fixture, anything else touches
/// the apply marker.
fn write_apt_get(dir: &Path, fixture: &str, marker: &Path) -> String {
    let path = dir.join("apt-get");
    write_script(
        &path,
        &format!(
            "#!/bin/sh\ncase \"$*\" in\n  *--print-uris*)\n    cat <<'EOF'\n{fixture}EOF\n    exit 0\n    ;;\nesac\ntouch '{}'\nexit 0\n",
            marker.display()
        ),
    );
    path.display().to_string()
}

fn write_apt_config(dir: &Path, archives: &Path) -> String {
    let path = dir.join("apt-config");
    write_script(
        &path,
        &format!("#!/bin/sh\necho \"ARCHIVES='{}/'\"\nexit 0\n", archives.display()),
    );
    path.display().to_string()
}

fn ctx_for(apt_get: String, apt_config: String) -> rapt_ops::OpsCtx {
    let mut config = Config::default();
    config.apt.get = apt_get;
    config.apt.config = apt_config;
    config.general.parallel_downloads = 2;

    let (tx, mut rx) = rapt_events::channel();
    // Drain events in the background so the unbounded channel never
    // accumulates; the e2e assertions are all filesystem-based.
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    OpsCtxBuilder::new()
        .with_config(config)
        .with_event_sender(tx)
        .build()
        .unwrap()
}

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Algorithm::Md5.hash_data(data))
}

#[tokio::test]
async fn test_scenario_nothing_to_do() {
    let root = tempfile::tempdir().unwrap();
    let marker = root.path().join("applied");
    let fixture = "rapt:status:install:0\nrapt:status:remove:0\nrapt:status:upgrade:0\n";
    let apt_get = write_apt_get(root.path(), fixture, &marker);
    let apt_config = write_apt_config(root.path(), root.path());

    let ctx = ctx_for(apt_get, apt_config);
    let plan = plan_transaction(&ctx, "install", &["curl".to_string()])
        .await
        .unwrap();

    assert!(plan.is_noop());
    assert!(plan.missing().is_empty());
    // The caller exits here without committing: staging was never touched.
    assert!(!root.path().join(STAGING_DIR_NAME).exists());
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_scenario_download_verify_promote_apply() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/pool/alpha.deb");
            then.status(200).body(ALPHA_BODY);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/pool/beta.deb");
            then.status(200).body(BETA_BODY);
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("archives");
    fs::create_dir(&archives).unwrap();
    let marker = root.path().join("applied");

    let fixture = format!(
        "rapt:install-list:alpha beta\nrapt:status:install:2\nrapt:status:disk-size:1.2 MB\n'{alpha}' alpha.deb 100 MD5:{alpha_md5}\n'{beta}' beta.deb 50 MD5:{beta_md5}\n",
        alpha = server.url("/pool/alpha.deb"),
        beta = server.url("/pool/beta.deb"),
        alpha_md5 = md5_hex(ALPHA_BODY),
        beta_md5 = md5_hex(BETA_BODY),
    );
    let apt_get = write_apt_get(root.path(), &fixture, &marker);
    let apt_config = write_apt_config(root.path(), &archives);

    let ctx = ctx_for(apt_get, apt_config);
    let plan = plan_transaction(&ctx, "install", &["alpha".to_string(), "beta".to_string()])
        .await
        .unwrap();

    assert!(!plan.is_noop());
    assert_eq!(plan.missing().len(), 2);
    assert_eq!(plan.total_size(), 150);

    let outcome = commit(&ctx, &plan, "install", &["alpha".to_string(), "beta".to_string()])
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Applied(0));

    // Both archives verified and promoted into the cache
    assert_eq!(fs::read(archives.join("alpha.deb")).unwrap(), ALPHA_BODY);
    assert_eq!(fs::read(archives.join("beta.deb")).unwrap(), BETA_BODY);

    // Staging exists but is empty again
    let staging = archives.join(STAGING_DIR_NAME);
    assert!(staging.is_dir());
    assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);

    // The apply phase ran
    assert!(marker.exists());
}

#[tokio::test]
async fn test_scenario_checksum_mismatch_aborts_before_apply() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/pool/alpha.deb");
            then.status(200).body(ALPHA_BODY);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/pool/beta.deb");
            then.status(200).body(BETA_BODY);
        })
        .await;

    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("archives");
    fs::create_dir(&archives).unwrap();
    let marker = root.path().join("applied");

    // beta declares a digest its content cannot match
    let fixture = format!(
        "rapt:status:install:2\n'{alpha}' alpha.deb 100 MD5:{alpha_md5}\n'{beta}' beta.deb 50 SHA256:deadbeef\n",
        alpha = server.url("/pool/alpha.deb"),
        beta = server.url("/pool/beta.deb"),
        alpha_md5 = md5_hex(ALPHA_BODY),
    );
    let apt_get = write_apt_get(root.path(), &fixture, &marker);
    let apt_config = write_apt_config(root.path(), &archives);

    let ctx = ctx_for(apt_get, apt_config);
    let plan = plan_transaction(&ctx, "install", &[]).await.unwrap();

    let err = commit(&ctx, &plan, "install", &[]).await.unwrap_err();
    match err {
        Error::Hash(HashError::Mismatch { name, expected, .. }) => {
            assert_eq!(name, "beta.deb");
            assert_eq!(expected, "SHA256:deadbeef");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The mismatched file never reached the cache and apply never ran
    assert!(!archives.join("beta.deb").exists());
    assert!(!marker.exists());

    // The exit purge still ran: staging holds no partial downloads
    let staging = archives.join(STAGING_DIR_NAME);
    assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
}

#[tokio::test]
async fn test_lock_contention_is_a_benign_no_op() {
    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("archives");
    fs::create_dir(&archives).unwrap();
    let marker = root.path().join("applied");

    let fixture = "rapt:status:install:1\n";
    let apt_get = write_apt_get(root.path(), fixture, &marker);
    let apt_config = write_apt_config(root.path(), &archives);

    // Simulate a concurrent instance owning the staging directory
    let held = rapt_staging::StagingDir::acquire(&archives).unwrap();

    let ctx = ctx_for(apt_get, apt_config);
    let plan = plan_transaction(&ctx, "install", &[]).await.unwrap();
    let outcome = commit(&ctx, &plan, "install", &[]).await.unwrap();

    assert_eq!(outcome, CommitOutcome::LockHeld);
    assert!(!marker.exists());
    drop(held);
}

#[tokio::test]
async fn test_archives_dir_comes_from_apt_config() {
    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("custom-cache");
    fs::create_dir(&archives).unwrap();
    let apt_config = write_apt_config(root.path(), &archives);

    let mut config = Config::default();
    config.apt.config = apt_config;
    let (tx, _rx) = rapt_events::channel();
    let ctx = OpsCtxBuilder::new()
        .with_config(config)
        .with_event_sender(tx)
        .build()
        .unwrap();

    let resolved = rapt_ops::archives_dir(&ctx).await.unwrap();
    // Path comparison is component-wise, so the trailing slash apt-config
    // prints does not matter.
    assert_eq!(resolved, archives);
}
