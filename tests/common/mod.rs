//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_config("[settings]\n");
//!     fixture.command().arg("status").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{git_available, GitRepo};
    pub use super::TestFixture;
}

/// Whether the `git` executable can be run.
///
/// Tests that need real repositories return early when it cannot, so the
/// suite still passes on machines without git.
#[allow(dead_code)]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// A local git repository used as a remote in tests.
#[allow(dead_code)]
pub struct GitRepo {
    path: PathBuf,
}

#[allow(dead_code)]
impl GitRepo {
    /// Create an empty repository whose default branch is `master`.
    pub fn init(path: &Path) -> Self {
        std::fs::create_dir_all(path).expect("Failed to create repository directory");
        let repo = Self {
            path: path.to_path_buf(),
        };
        repo.git(&["init", "--quiet"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/master"]);
        repo.git(&["config", "user.email", "devsync@example.com"]);
        repo.git(&["config", "user.name", "devsync tests"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    /// Run git in the repository and return its stdout.
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Commit a new file with the file name as content.
    pub fn add_file(&self, name: &str) {
        std::fs::write(self.path.join(name), name).expect("Failed to write file");
        self.git(&["add", name]);
        self.git(&["commit", "--quiet", "-m", &format!("Add {}", name)]);
    }

    /// Commit `url` as a submodule at `path`.
    pub fn add_submodule(&self, url: &str, path: &str) {
        self.git(&[
            "-c",
            "protocol.file.allow=always",
            "submodule",
            "add",
            "--quiet",
            url,
            path,
        ]);
        self.git(&["commit", "--quiet", "-m", &format!("Add submodule {}", path)]);
    }

    /// The current commit id.
    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    /// A `file://` URL, which git needs for shallow clones of local repos.
    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    /// Standard layout: `foo` on master, branch `test` adding `foo2`, then
    /// `bar` on master. Returns the commit that added `foo2`.
    pub fn with_default_content(path: &Path) -> (Self, String) {
        let repo = Self::init(path);
        repo.add_file("foo");
        repo.git(&["checkout", "--quiet", "-b", "test"]);
        repo.add_file("foo2");
        let revision = repo.head();
        repo.git(&["checkout", "--quiet", "master"]);
        repo.add_file("bar");
        (repo, revision)
    }
}

/// A temporary working directory with an optional `devsync.ini`.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `devsync.ini` with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("devsync.ini")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Read a file from the fixture.
    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path)).expect("Failed to read file")
    }

    /// A `devsync` command running in this fixture, uncolored and isolated
    /// from the caller's environment.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("devsync");
        cmd.current_dir(self.path())
            .env_remove("DEVSYNC_CONFIG")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }

    /// Like [`TestFixture::command`], with git allowed to clone submodules
    /// from `file://` URLs.
    pub fn command_with_file_submodules(&self) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.env("GIT_CONFIG_COUNT", "1")
            .env("GIT_CONFIG_KEY_0", "protocol.file.allow")
            .env("GIT_CONFIG_VALUE_0", "always");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
