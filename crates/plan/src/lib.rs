#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Transaction plan parsing for rapt
//!
//! A dry-run invocation of `apt-get` with `--print-uris` and the machine
//! summary option produces a line-oriented stream: tagged package lists and
//! counters, plus quoted uri-list lines for every file the transaction
//! would fetch. This crate turns that stream into a [`TransactionPlan`].
//!
//! The parser trusts apt's well-formed output: candidate lines that do not
//! match the expected shapes are skipped, never treated as a parse error.
//! The one exception is a digest declared with an algorithm this tool does
//! not know, which is fatal before any network activity.

use indexmap::IndexMap;
use rapt_errors::{Error, HashError, PlanError};
use rapt_events::{AppEvent, EventEmitter, EventSender, PlanEvent};
use rapt_hash::Digest;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;

/// Tag apt is asked to prefix its machine summary lines with
pub const MACHINE_TAG: &str = "rapt";

/// Prefix of every machine summary line in the apt output stream
pub const MACHINE_LINE_PREFIX: &str = "rapt:";

/// The `-o` option handed to apt for both the dry-run and the apply phase
#[must_use]
pub fn machine_summary_option() -> String {
    format!("-oAPT::Get::Machine-Summary={MACHINE_TAG}")
}

/// Package list categories, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Extra,
    Install,
    Remove,
    Upgrade,
    Downgrade,
    Keep,
    Hold,
    Essential,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Extra,
        Category::Install,
        Category::Remove,
        Category::Upgrade,
        Category::Downgrade,
        Category::Keep,
        Category::Hold,
        Category::Essential,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Extra => "extra",
            Category::Install => "install",
            Category::Remove => "remove",
            Category::Upgrade => "upgrade",
            Category::Downgrade => "downgrade",
            Category::Keep => "keep",
            Category::Hold => "hold",
            Category::Essential => "essential",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == token)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One file the transaction needs to fetch
#[derive(Debug, Clone)]
pub struct FileSpec {
    /// Fetch source. A `copy:` URL is stored with its scheme rewritten to
    /// `file:`; a literal `file:` URL never becomes a `FileSpec` at all.
    pub url: String,
    /// Destination filename in the staging directory and the final cache
    pub name: String,
    /// Declared size in bytes; used for scheduling order only
    pub size: u64,
    /// Declared checksum
    pub digest: Digest,
}

/// Scalar transaction counters from the machine summary
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub install: u64,
    pub remove: u64,
    pub upgrade: u64,
    pub replace: u64,
    pub reinstall: u64,
    pub downgrade: u64,
    /// Disk space delta, held verbatim as apt printed it
    pub disk_size: String,
}

/// The parsed outcome of a dry-run print-uris invocation
#[derive(Debug, Default)]
pub struct TransactionPlan {
    extra: Vec<String>,
    install: Vec<String>,
    remove: Vec<String>,
    upgrade: Vec<String>,
    downgrade: Vec<String>,
    keep: Vec<String>,
    hold: Vec<String>,
    essential: Vec<String>,
    counters: Counters,
    missing: IndexMap<usize, FileSpec>,
    total_size: u64,
    next_index: usize,
}

impl TransactionPlan {
    /// Build a plan by running the package tool in dry-run print-uris mode.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::LaunchFailure`] if the tool cannot be started,
    /// [`PlanError::IncompleteOutput`] if it exits with a failure status,
    /// and [`HashError::UnknownAlgorithm`] for a digest this tool does not
    /// recognize.
    pub async fn from_dry_run(
        apt_get: &str,
        command: &str,
        args: &[String],
        tx: &EventSender,
    ) -> Result<Self, Error> {
        tx.emit(AppEvent::Plan(PlanEvent::Started {
            command: command.to_string(),
        }));

        let output = Command::new(apt_get)
            .arg("-qq")
            .arg("-y")
            .arg("--print-uris")
            .arg(machine_summary_option())
            .arg(command)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PlanError::LaunchFailure {
                command: apt_get.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PlanError::IncompleteOutput {
                command: apt_get.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let plan = Self::parse(stdout.lines())?;

        tx.emit(AppEvent::Plan(PlanEvent::Parsed {
            missing_files: plan.missing.len(),
            total_size: plan.total_size,
        }));

        Ok(plan)
    }

    /// Build a plan from an already-captured line stream.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::UnknownAlgorithm`] for an unrecognized digest
    /// algorithm; every other malformed line is silently skipped.
    pub fn parse<I>(lines: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut plan = Self::default();
        for line in lines {
            plan.apply_line(line.as_ref())?;
        }
        Ok(plan)
    }

    /// Process one line of apt output. Line shapes are tried in order and
    /// the first match wins; anything unrecognized is ignored.
    fn apply_line(&mut self, line: &str) -> Result<(), Error> {
        if let Some(rest) = line.strip_prefix(MACHINE_LINE_PREFIX) {
            if let Some((key, payload)) = rest.split_once(':') {
                if let Some(token) = key.strip_suffix("-list") {
                    if let Some(category) = Category::from_token(token) {
                        self.list_mut(category)
                            .extend(payload.split_whitespace().map(String::from));
                    }
                } else if key == "status" {
                    if let Some((name, value)) = payload.split_once(':') {
                        self.apply_counter(name, value);
                    }
                }
            }
            return Ok(());
        }

        if line.starts_with('\'') {
            self.apply_uri_line(line)?;
        }

        Ok(())
    }

    fn apply_counter(&mut self, name: &str, value: &str) {
        if name == "disk-size" {
            self.counters.disk_size = value.to_string();
            return;
        }

        let Ok(count) = value.trim().parse::<u64>() else {
            tracing::debug!(name, value, "skipping unparsable counter");
            return;
        };
        match name {
            "install" => self.counters.install = count,
            "remove" => self.counters.remove = count,
            "upgrade" => self.counters.upgrade = count,
            "replace" => self.counters.replace = count,
            "re-install" => self.counters.reinstall = count,
            "downgrade" => self.counters.downgrade = count,
            _ => {}
        }
    }

    /// Candidate missing file: `'<url>' <name> <size> <hash>`
    fn apply_uri_line(&mut self, line: &str) -> Result<(), Error> {
        let Some((url, tail)) = line[1..].split_once('\'') else {
            return Ok(());
        };
        let mut fields = tail.split_whitespace();
        let (Some(name), Some(size), Some(hash), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Ok(());
        };
        let Ok(size) = size.parse::<u64>() else {
            return Ok(());
        };

        // Already present in a local repository: nothing to stage.
        if url.starts_with("file:") {
            return Ok(());
        }

        let digest = match Digest::parse(hash) {
            Ok(digest) => digest,
            Err(e @ HashError::UnknownAlgorithm { .. }) => return Err(e.into()),
            Err(_) => {
                tracing::debug!(line, "skipping uri line with malformed checksum");
                return Ok(());
            }
        };

        // `copy:` means "local filesystem copy": normalize the scheme so
        // the download coordinator only ever sees `file:` for local work,
        // but keep the file queued for staging.
        let url = match url.strip_prefix("copy:") {
            Some(path) => format!("file:{path}"),
            None => url.to_string(),
        };

        self.total_size += size;
        self.missing.insert(
            self.next_index,
            FileSpec {
                url,
                name: name.to_string(),
                size,
                digest,
            },
        );
        self.next_index += 1;

        Ok(())
    }

    fn list_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Extra => &mut self.extra,
            Category::Install => &mut self.install,
            Category::Remove => &mut self.remove,
            Category::Upgrade => &mut self.upgrade,
            Category::Downgrade => &mut self.downgrade,
            Category::Keep => &mut self.keep,
            Category::Hold => &mut self.hold,
            Category::Essential => &mut self.essential,
        }
    }

    /// Package names in one category, in the order apt emitted them
    #[must_use]
    pub fn list(&self, category: Category) -> &[String] {
        match category {
            Category::Extra => &self.extra,
            Category::Install => &self.install,
            Category::Remove => &self.remove,
            Category::Upgrade => &self.upgrade,
            Category::Downgrade => &self.downgrade,
            Category::Keep => &self.keep,
            Category::Hold => &self.hold,
            Category::Essential => &self.essential,
        }
    }

    /// All category lists in display order
    pub fn lists(&self) -> impl Iterator<Item = (Category, &[String])> {
        Category::ALL.iter().map(|c| (*c, self.list(*c)))
    }

    #[must_use]
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Files the transaction still needs, keyed by sequence index,
    /// iteration in insertion order
    #[must_use]
    pub fn missing(&self) -> &IndexMap<usize, FileSpec> {
        &self.missing
    }

    /// Sum of the declared sizes of all missing files
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// True when the transaction would change nothing
    #[must_use]
    pub fn is_noop(&self) -> bool {
        let c = &self.counters;
        c.install + c.remove + c.upgrade + c.replace + c.reinstall + c.downgrade == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapt_hash::Algorithm;

    const MD5_HELLO: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    #[test]
    fn test_category_lists_concatenate_in_line_order() {
        let plan = TransactionPlan::parse([
            "rapt:install-list:foo bar",
            "rapt:upgrade-list:baz",
            "rapt:install-list:qux",
        ])
        .unwrap();

        assert_eq!(plan.list(Category::Install), ["foo", "bar", "qux"]);
        assert_eq!(plan.list(Category::Upgrade), ["baz"]);
        assert!(plan.list(Category::Remove).is_empty());
    }

    #[test]
    fn test_counters_and_disk_size() {
        let plan = TransactionPlan::parse([
            "rapt:status:install:3",
            "rapt:status:remove:1",
            "rapt:status:re-install:2",
            "rapt:status:disk-size:42.1 MB",
        ])
        .unwrap();

        assert_eq!(plan.counters().install, 3);
        assert_eq!(plan.counters().remove, 1);
        assert_eq!(plan.counters().reinstall, 2);
        assert_eq!(plan.counters().disk_size, "42.1 MB");
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_uri_lines_build_missing_set() {
        let plan = TransactionPlan::parse([
            format!("'http://mirror/pool/a.deb' a.deb 100 MD5:{MD5_HELLO}"),
            "'http://mirror/pool/b.deb' b.deb 50 SHA256:deadbeef".to_string(),
        ])
        .unwrap();

        assert_eq!(plan.missing().len(), 2);
        assert_eq!(plan.total_size(), 150);

        let first = &plan.missing()[&0];
        assert_eq!(first.name, "a.deb");
        assert_eq!(first.size, 100);
        assert_eq!(first.digest.algorithm(), Algorithm::Md5);
    }

    #[test]
    fn test_file_scheme_is_never_queued() {
        let plan = TransactionPlan::parse([format!(
            "'file:/var/local/repo/a.deb' a.deb 100 MD5:{MD5_HELLO}"
        )])
        .unwrap();

        assert!(plan.missing().is_empty());
        assert_eq!(plan.total_size(), 0);
    }

    #[test]
    fn test_copy_scheme_is_rewritten_but_still_queued() {
        let plan = TransactionPlan::parse([format!(
            "'copy:/var/local/repo/a.deb' a.deb 100 MD5:{MD5_HELLO}"
        )])
        .unwrap();

        assert_eq!(plan.missing().len(), 1);
        assert_eq!(plan.missing()[&0].url, "file:/var/local/repo/a.deb");
        assert_eq!(plan.total_size(), 100);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let plan = TransactionPlan::parse([
            "'http://mirror/a.deb' a.deb not-a-size MD5:aabb".to_string(),
            "'http://mirror/b.deb' b.deb 10 SHA256:zz-not-hex".to_string(),
            "'http://mirror/c.deb' c.deb 10".to_string(),
            "'unterminated quote".to_string(),
            "Reading package lists...".to_string(),
            format!("'http://mirror/d.deb' d.deb 10 MD5:{MD5_HELLO}"),
        ])
        .unwrap();

        assert_eq!(plan.missing().len(), 1);
        assert_eq!(plan.missing()[&0].name, "d.deb");
        assert_eq!(plan.total_size(), 10);
    }

    #[test]
    fn test_bare_hash_defaults_to_md5() {
        let plan =
            TransactionPlan::parse([format!("'http://mirror/a.deb' a.deb 10 {MD5_HELLO}")])
                .unwrap();
        assert_eq!(plan.missing()[&0].digest.algorithm(), Algorithm::Md5);
    }

    #[test]
    fn test_unknown_digest_algorithm_is_fatal() {
        let result =
            TransactionPlan::parse(["'http://mirror/a.deb' a.deb 10 CRC32:deadbeef"]);
        assert!(matches!(
            result,
            Err(Error::Hash(HashError::UnknownAlgorithm { token })) if token == "CRC32"
        ));
    }

    #[test]
    fn test_total_size_matches_missing_sum() {
        let plan = TransactionPlan::parse([
            format!("'http://mirror/a.deb' a.deb 123 MD5:{MD5_HELLO}"),
            format!("'file:/repo/b.deb' b.deb 999 MD5:{MD5_HELLO}"),
            format!("'copy:/repo/c.deb' c.deb 7 MD5:{MD5_HELLO}"),
        ])
        .unwrap();

        let sum: u64 = plan.missing().values().map(|f| f.size).sum();
        assert_eq!(plan.total_size(), sum);
        assert_eq!(sum, 130);
    }

    #[test]
    fn test_empty_plan_is_noop() {
        let plan = TransactionPlan::parse([
            "rapt:status:install:0",
            "rapt:status:remove:0",
            "rapt:keep-list:held-back",
        ])
        .unwrap();
        assert!(plan.is_noop());
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let (tx, _rx) = rapt_events::channel();
        let result =
            TransactionPlan::from_dry_run("/nonexistent/apt-get", "install", &[], &tx).await;
        assert!(matches!(
            result,
            Err(Error::Plan(PlanError::LaunchFailure { .. }))
        ));
    }

    #[tokio::test]
    async fn test_failing_tool_is_incomplete_output() {
        let (tx, _rx) = rapt_events::channel();
        let result = TransactionPlan::from_dry_run("false", "install", &[], &tx).await;
        assert!(matches!(
            result,
            Err(Error::Plan(PlanError::IncompleteOutput { .. }))
        ));
    }
}
