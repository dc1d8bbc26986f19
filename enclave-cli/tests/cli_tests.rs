use assert_cmd::Command;
use predicates::prelude::*;

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

fn enclave() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_enclave"));
    cmd.env_remove("ENCLAVE_ROOTFS")
        .env_remove("ENCLAVE_HOSTNAME")
        .env_remove("ENCLAVE_PROC_MOUNT")
        .env_remove("RUST_LOG");
    cmd
}

fn read_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .unwrap()
        .trim()
        .to_string()
}

#[test]
fn test_help_command() {
    enclave()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("isolated UTS, PID and mount namespaces"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("bootstrap").not());
}

#[test]
fn test_version_command() {
    enclave()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("enclave"));
}

#[test]
fn test_invalid_command() {
    enclave()
        .arg("invalid")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_missing_subcommand() {
    enclave().assert().code(2);
}

#[test]
fn test_run_without_command() {
    enclave()
        .args(["run", "--rootfs", "/"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid invocation"));
}

#[test]
fn test_run_without_command_or_rootfs() {
    // The missing command is reported first
    enclave()
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid invocation"));
}

#[test]
fn test_run_without_rootfs() {
    enclave()
        .args(["run", "echo", "hello"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("no root filesystem configured"));
}

#[test]
fn test_rootfs_from_environment() {
    enclave()
        .env("ENCLAVE_ROOTFS", "relative/root")
        .args(["run", "echo", "hello"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("must be an absolute path"));
}

#[test]
fn test_invalid_hostname() {
    enclave()
        .args(["run", "--rootfs", "/", "--hostname", "bad name", "echo"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("hostname"));
}

#[test]
fn test_bootstrap_refuses_direct_invocation() {
    let host_before = read_hostname();

    enclave()
        .args(["bootstrap", "--rootfs", "/", "--hostname", "not-the-host", "hostname"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("must be started by the launcher"));

    assert_eq!(read_hostname(), host_before);
}

#[test]
fn test_run_help() {
    enclave()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--rootfs"))
        .stdout(predicate::str::contains("--hostname"))
        .stdout(predicate::str::contains("--proc-mount"))
        .stdout(predicate::str::contains("ENCLAVE_ROOTFS"));
}

#[test]
fn test_run_requires_privilege() {
    // Skip if running as root
    if is_root() {
        return;
    }

    enclave()
        .args(["run", "--rootfs", "/", "echo", "hello"])
        .assert()
        .code(125)
        .stdout(predicate::str::contains("hello").not())
        .stderr(predicate::str::contains("Namespace creation failed"))
        .stderr(predicate::str::contains("CAP_SYS_ADMIN"));
}

#[test]
#[ignore] // Requires root
fn test_echo_hello() {
    // Skip if not root
    if !is_root() {
        return;
    }

    enclave()
        .args(["run", "--rootfs", "/", "echo", "hello"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
#[ignore] // Requires root
fn test_command_without_params() {
    if !is_root() {
        return;
    }

    enclave()
        .args(["run", "--rootfs", "/", "true"])
        .assert()
        .success();
}

#[test]
#[ignore] // Requires root
fn test_exit_code_propagates() {
    if !is_root() {
        return;
    }

    enclave()
        .args(["run", "--rootfs", "/", "/bin/false"])
        .assert()
        .code(1);

    enclave()
        .args(["run", "--rootfs", "/", "sh", "-c", "exit 42"])
        .assert()
        .code(42);
}

#[test]
#[ignore] // Requires root
fn test_signal_exit_code() {
    if !is_root() {
        return;
    }

    enclave()
        .args(["run", "--rootfs", "/", "sh", "-c", "kill -TERM $$"])
        .assert()
        .code(128 + 15);
}

#[test]
#[ignore] // Requires root
fn test_hostname_is_isolated() {
    if !is_root() {
        return;
    }

    let host_before = read_hostname();

    enclave()
        .args(["run", "--rootfs", "/", "--hostname", "isolated-box", "hostname"])
        .assert()
        .success()
        .stdout("isolated-box\n");

    assert_eq!(read_hostname(), host_before);
}

#[test]
#[ignore] // Requires root
fn test_pid_namespace() {
    if !is_root() {
        return;
    }

    // The shell is the only child of the bootstrap process, which is PID 1
    enclave()
        .args(["run", "--rootfs", "/", "sh", "-c", "echo $$; cat /proc/1/cmdline"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("2\n"))
        .stdout(predicate::str::contains("bootstrap"));
}

#[test]
#[ignore] // Requires root
fn test_concurrent_runs_have_separate_pid_views() {
    if !is_root() {
        return;
    }

    let spawn = || {
        std::process::Command::new(env!("CARGO_BIN_EXE_enclave"))
            .args(["run", "--rootfs", "/", "sh", "-c"])
            .arg("readlink /proc/self/ns/pid; sleep 1; ls /proc")
            .env_remove("RUST_LOG")
            .stdout(std::process::Stdio::piped())
            .spawn()
            .unwrap()
    };

    // Both are started before either is waited on, so their lifetimes overlap
    let first = spawn();
    let second = spawn();
    let host_pids = [first.id(), second.id()];
    let outputs = [
        first.wait_with_output().unwrap(),
        second.wait_with_output().unwrap(),
    ];

    let mut pid_namespaces = Vec::new();
    for output in &outputs {
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        pid_namespaces.push(lines.next().unwrap().to_string());

        let pids: Vec<u32> = lines.filter_map(|entry| entry.parse().ok()).collect();
        assert!(pids.contains(&1), "PID 1 missing from {pids:?}");
        assert!(pids.iter().all(|pid| *pid < 10), "foreign processes visible: {pids:?}");
        assert!(!host_pids.iter().any(|pid| pids.contains(pid)));
    }

    assert_ne!(pid_namespaces[0], pid_namespaces[1]);
}

#[test]
#[ignore] // Requires root
fn test_mount_table_unchanged() {
    if !is_root() {
        return;
    }

    let before = std::fs::read_to_string("/proc/self/mountinfo").unwrap();

    enclave()
        .args(["run", "--rootfs", "/", "/bin/false"])
        .assert()
        .code(1);

    let after = std::fs::read_to_string("/proc/self/mountinfo").unwrap();
    assert_eq!(before, after);
}

#[test]
#[ignore] // Requires root
fn test_missing_rootfs_fails_setup() {
    if !is_root() {
        return;
    }

    enclave()
        .args(["run", "--rootfs", "/nonexistent/enclave-root", "echo", "should-not-run"])
        .assert()
        .code(126)
        .stdout(predicate::str::contains("should-not-run").not())
        .stderr(predicate::str::contains("change root"));
}

#[test]
#[ignore] // Requires root
fn test_missing_target() {
    if !is_root() {
        return;
    }

    enclave()
        .args(["run", "--rootfs", "/", "/nonexistent/binary"])
        .assert()
        .code(127)
        .stderr(predicate::str::contains("Failed to execute"));
}
