use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::str::contains;

fn consign() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("consign"));
    for key in [
        "CONSIGN_B_BIN",
        "CONSIGN_BPKG_BIN",
        "CONSIGN_CURL_BIN",
        "CONSIGN_EMAIL",
        "CONSIGN_GIT_BIN",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn completions_are_generated() {
    consign()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("consign"));
}

#[test]
fn unknown_section_is_a_usage_error() {
    consign()
        .args(["publish", "libhello", "--section", "nightly"])
        .assert()
        .failure()
        .stderr(contains("invalid section 'nightly'"));
}

#[cfg(unix)]
mod publish {
    use std::os::unix::fs::PermissionsExt;

    use insta::assert_snapshot;
    use tempfile::{TempDir, tempdir};

    use super::*;

    const HELLO_DIGEST: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    const ACCEPTED: &str = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/manifest;charset=utf-8\r\n\
        \r\n\
        : 1\n\
        status: 200\n\
        message: package submission is queued\n\
        reference: abc123\n";

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn write_script(path: &Path, body: &str) {
        write_file(path, &format!("#!/usr/bin/env sh\n{body}"));
        let mut perms = fs::metadata(path).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("chmod");
    }

    /// A project directory named `hello` plus fake build, package manager,
    /// transfer, and git programs.
    struct Fixture {
        td: TempDir,
    }

    impl Fixture {
        fn new(response: &str) -> Self {
            let td = tempdir().expect("tempdir");
            fs::create_dir_all(td.path().join("hello")).expect("mkdir");
            write_file(&td.path().join("response"), response);

            write_script(
                &td.path().join("bin/b"),
                &format!(
                    r#"name=$(basename "$2")
version=${{FAKE_VERSION:-1.2.3}}
case "$1" in
  info:)
    printf 'project: %s\nversion: %s\n' "$name" "$version"
    ;;
  dist:)
    root=${{3#config.dist.root=}}
    printf 'hello' > "$root$name-$version.tar.gz"
    printf '%s *%s\n' {HELLO_DIGEST} "$name-$version.tar.gz" > "$root$name-$version.tar.gz.sha256"
    ;;
esac
"#
                ),
            );
            write_script(
                &td.path().join("bin/bpkg"),
                &format!(
                    "printf '%s\\n' \"$@\" >> '{}'\n",
                    td.path().join("verified").display()
                ),
            );
            write_script(
                &td.path().join("bin/curl"),
                &format!(
                    "printf '%s\\n' \"$@\" > '{}'\ncat '{}'\n",
                    td.path().join("curl-args").display(),
                    td.path().join("response").display()
                ),
            );
            write_script(
                &td.path().join("bin/git"),
                r#"case "$1 $2 $3" in
  "rev-parse --git-dir ") exit 0 ;;
  "config --get remote.origin.url") echo "git@github.com:example/hello.git" ;;
  "config --get user.email") echo "git@example.org" ;;
  *) exit 1 ;;
esac
"#,
            );

            Self { td }
        }

        fn project(&self) -> PathBuf {
            self.td.path().join("hello")
        }

        fn bin(&self, name: &str) -> PathBuf {
            self.td.path().join("bin").join(name)
        }

        fn consign(&self) -> Command {
            let mut cmd = consign();
            cmd.current_dir(self.project())
                .env("CONSIGN_B_BIN", self.bin("b"))
                .env("CONSIGN_BPKG_BIN", self.bin("bpkg"))
                .env("CONSIGN_CURL_BIN", self.bin("curl"))
                .env("CONSIGN_GIT_BIN", self.bin("git"));
            cmd
        }

        fn curl_args(&self) -> Option<Vec<String>> {
            fs::read_to_string(self.td.path().join("curl-args"))
                .ok()
                .map(|s| s.lines().map(str::to_string).collect())
        }
    }

    #[test]
    fn publishes_with_yes() {
        let fx = Fixture::new(ACCEPTED);

        fx.consign()
            .args([
                "publish",
                "libhello",
                "-c",
                "../build",
                "--control",
                "none",
                "--email",
                "me@example.org",
                "-y",
            ])
            .assert()
            .success()
            .stderr(contains("submitting libhello-1.2.3.tar.gz"))
            .stderr(contains("package submission is queued (abc123)"));

        let args = fx.curl_args().expect("curl ran");
        assert!(args.iter().any(|a| a == "--include"));
        assert!(args.iter().any(|a| *a == format!("sha256sum={HELLO_DIGEST}")));
        assert!(args.iter().any(|a| a == "section=stable"));
        assert!(args.iter().any(|a| a == "email=me@example.org"));
        assert!(!args.iter().any(|a| a.starts_with("control=")));
        assert_eq!(args.last().map(String::as_str), Some("https://cppget.org/?submit"));

        let verified = fs::read_to_string(fx.td.path().join("verified")).expect("verified");
        assert!(verified.starts_with("pkg-verify\n"));
        assert!(verified.trim_end().ends_with("libhello-1.2.3.tar.gz"));
    }

    #[test]
    fn discovers_control_and_email_from_git() {
        let fx = Fixture::new(ACCEPTED);

        fx.consign()
            .args(["publish", "libhello", "-c", "../build", "-y"])
            .assert()
            .success();

        let args = fx.curl_args().expect("curl ran");
        assert!(args.iter().any(|a| a == "control=https://github.com/example/hello.git"));
        assert!(args.iter().any(|a| a == "email=git@example.org"));
    }

    #[test]
    fn declining_prints_plan_and_exits_one() {
        let fx = Fixture::new(ACCEPTED);

        let out = fx
            .consign()
            .args([
                "publish",
                "libhello",
                "-c",
                "../build",
                "--control",
                "none",
                "--email",
                "me@example.org",
            ])
            .write_stdin("maybe\nn\n")
            .output()
            .expect("run");

        assert_eq!(out.status.code(), Some(1));
        assert!(fx.curl_args().is_none());

        let stderr = String::from_utf8_lossy(&out.stderr);
        let plan = stderr.split("continue? [y/n]").next().unwrap_or_default();
        assert_snapshot!(plan.trim_end(), @r"
        publishing:
          to:      https://cppget.org/
          as:      me@example.org

          package: libhello
          version: 1.2.3
          project: hello
          section: stable
        ");
        assert_eq!(stderr.matches("continue? [y/n]").count(), 2);
        assert!(!stderr.contains("error:"));
    }

    #[test]
    fn snapshot_version_is_refused() {
        let fx = Fixture::new(ACCEPTED);

        fx.consign()
            .env("FAKE_VERSION", "1.0.0-z")
            .args(["publish", "libhello", "-c", "../build", "--control", "none", "-y"])
            .assert()
            .failure()
            .stderr(contains("error: package libhello version 1.0.0-z is a snapshot"));

        assert!(fx.curl_args().is_none());
    }

    #[test]
    fn resolved_snapshot_version_is_refused() {
        let fx = Fixture::new(ACCEPTED);

        fx.consign()
            .env("FAKE_VERSION", "1.2.3-a.0.20180515102937.bd0ed5d8a81c")
            .args(["publish", "libhello", "-c", "../build", "--control", "none", "-y"])
            .assert()
            .failure()
            .stderr(contains(
                "error: package libhello version 1.2.3-a.0.20180515102937.bd0ed5d8a81c is a snapshot",
            ));

        assert!(fx.curl_args().is_none());
        assert!(!fx.td.path().join("verified").exists());
    }

    #[test]
    fn zero_major_goes_to_alpha() {
        let fx = Fixture::new(ACCEPTED);

        fx.consign()
            .env("FAKE_VERSION", "0.3.0")
            .args(["publish", "libhello", "-c", "../build", "--control", "none", "-y"])
            .assert()
            .success();

        let args = fx.curl_args().expect("curl ran");
        assert!(args.iter().any(|a| a == "section=alpha"));
    }

    #[test]
    fn rejection_prints_new_location() {
        let fx = Fixture::new(
            "HTTP/1.1 301 Moved Permanently\r\n\
             Location: https://pkg.example.org/?submit\r\n\
             \r\n",
        );

        fx.consign()
            .args(["publish", "libhello", "-c", "../build", "--control", "none", "-y"])
            .assert()
            .code(1)
            .stderr(contains("  info: new repository location: https://pkg.example.org/"));
    }

    #[test]
    fn protocol_error_carries_correlation_hints() {
        let fx = Fixture::new("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nthanks\r\n");

        fx.consign()
            .args(["publish", "libhello", "-c", "../build", "--control", "none", "-y"])
            .assert()
            .failure()
            .stderr(contains("error: manifest expected"))
            .stderr(contains(
                "  info: consider reporting this to https://cppget.org/ repository maintainers",
            ))
            .stderr(contains(format!("  info: checksum: {HELLO_DIGEST}")));
    }

    #[test]
    fn missing_packages_is_a_usage_error() {
        let fx = Fixture::new(ACCEPTED);

        fx.consign()
            .args(["publish", "-c", "../build"])
            .assert()
            .failure()
            .stderr(contains("error: no packages specified"));
    }

    #[test]
    fn config_file_supplies_defaults() {
        let fx = Fixture::new(ACCEPTED);
        write_file(
            &fx.project().join(".consign.toml"),
            r#"
[project]
config = "../build"
packages = ["libhello"]

[publish]
repository = "https://pkg.example.org"
email = "file@example.org"
section = "beta"
control = "none"
"#,
        );

        fx.consign().args(["publish", "-y"]).assert().success();

        let args = fx.curl_args().expect("curl ran");
        assert!(args.iter().any(|a| a == "email=file@example.org"));
        assert!(args.iter().any(|a| a == "section=beta"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://pkg.example.org/?submit")
        );
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let fx = Fixture::new(ACCEPTED);
        write_file(&fx.project().join(".consign.toml"), "[publish]\nmirror = \"x\"\n");

        fx.consign()
            .args(["publish", "libhello", "-c", "../build"])
            .assert()
            .failure()
            .stderr(contains("failed to parse config file"));
    }

    #[test]
    fn doctor_reports_tools() {
        let fx = Fixture::new(ACCEPTED);
        write_script(&fx.bin("b"), "echo 'b 0.17.0'\n");
        write_script(&fx.bin("curl"), "echo 'fake curl 8.0'\n");

        fx.consign()
            .env("CONSIGN_BPKG_BIN", fx.td.path().join("bin/absent"))
            .args(["doctor"])
            .assert()
            .success()
            .stdout(contains("repository: https://cppget.org/"))
            .stdout(contains("build: b 0.17.0"))
            .stdout(contains("transfer: fake curl 8.0"))
            .stderr(contains("[warn] package_manager program"))
            .stderr(contains("absent not found"));
    }
}
