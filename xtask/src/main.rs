//! Development automation tasks for the `SmartCache` workspace.
//!
//! Run with: `cargo xtask <command>`
//!
//! This is a CLI tool for developers, so `println!` and `eprintln!` are
//! intentionally used for user-facing output rather than structured logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::{Command, ExitCode};

use anyhow::{anyhow, Context};

/// Crates checked one by one before the full test run
const CRATES: [&str; 3] = ["smartcache-common", "smartcache-core", "smartcache-infra"];

fn main() -> ExitCode {
    let task = env::args().nth(1);

    let result = match task.as_deref() {
        Some("ci") => run_ci(),
        Some("fmt") => run_fmt(),
        Some("clippy") => run_clippy(),
        Some("check") => run_check(),
        Some("test") => run_test(),
        Some("doc") => run_doc(),
        Some("deny") => run_deny(),
        Some("audit") => run_audit(),
        Some("help") | None => {
            print_help();
            Ok(())
        }
        Some(unknown) => {
            eprintln!("Unknown task: {unknown}");
            eprintln!();
            print_help();
            Err(anyhow::anyhow!("Unknown task"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Task failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("SmartCache Development Tasks");
    println!();
    println!("USAGE:");
    println!("    cargo xtask <TASK>");
    println!();
    println!("TASKS:");
    println!("    ci        Run all CI checks (fmt, clippy, check, test, doc, deny, audit)");
    println!("    fmt       Check Rust code formatting");
    println!("    clippy    Run Clippy lints");
    println!("    check     Check each crate compiles on its own");
    println!("    test      Run all tests (unit, integration and doc tests)");
    println!("    doc       Build documentation with warnings denied");
    println!("    deny      Check dependencies with cargo-deny");
    println!("    audit     Audit dependencies for security vulnerabilities");
    println!("    help      Show this help message");
}

/// Run all CI checks in sequence
fn run_ci() -> anyhow::Result<()> {
    println!("==> Running CI checks...\n");

    println!("==> Step 1/7: Checking Rust format...");
    run_fmt()?;

    println!("\n==> Step 2/7: Running Clippy...");
    run_clippy()?;

    println!("\n==> Step 3/7: Checking crates individually...");
    run_check()?;

    println!("\n==> Step 4/7: Running tests...");
    run_test()?;

    println!("\n==> Step 5/7: Building docs...");
    run_doc()?;

    println!("\n==> Step 6/7: Checking dependencies...");
    run_deny()?;

    println!("\n==> Step 7/7: Auditing dependencies...");
    run_audit()?;

    println!("\n✓ All CI checks passed!");
    Ok(())
}

/// Run `cargo` with `args`, failing with `message` on a non-zero exit
fn cargo(args: &[&str], message: &str) -> anyhow::Result<()> {
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;

    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("{message}"))
    }
}

/// Check Rust code formatting
fn run_fmt() -> anyhow::Result<()> {
    cargo(&["fmt", "--all", "--", "--check"], "Format check failed. Run 'cargo fmt --all' to fix.")
}

/// Run Clippy lints
fn run_clippy() -> anyhow::Result<()> {
    cargo(
        &["clippy", "--workspace", "--all-targets"],
        "Clippy run failed. See output above.",
    )
}

/// Verify every library crate compiles without the rest of the workspace
fn run_check() -> anyhow::Result<()> {
    for krate in CRATES {
        println!("Checking {krate}...");
        cargo(&["check", "-p", krate], &format!("{krate} check failed"))?;
    }
    println!("✓ All crates compile");
    Ok(())
}

/// Run all workspace tests
fn run_test() -> anyhow::Result<()> {
    cargo(&["test", "--workspace"], "Tests failed")
}

/// Build documentation, treating rustdoc warnings as errors
fn run_doc() -> anyhow::Result<()> {
    let status = Command::new("cargo")
        .args(["doc", "--workspace", "--no-deps"])
        .env("RUSTDOCFLAGS", "-D warnings")
        .status()
        .context("Failed to run cargo doc")?;

    if !status.success() {
        anyhow::bail!("Documentation build failed");
    }

    Ok(())
}

/// Ensure a cargo subcommand is installed before running it
fn require_subcommand(name: &str) -> anyhow::Result<()> {
    let check_installed = Command::new("cargo").args([name, "--version"]).output();

    if check_installed.is_err() || !check_installed.as_ref().is_ok_and(|o| o.status.success()) {
        eprintln!("cargo-{name} is not installed.");
        eprintln!("Install it with: cargo install cargo-{name}");
        anyhow::bail!("cargo-{name} not found");
    }

    Ok(())
}

/// Check dependencies with cargo-deny
fn run_deny() -> anyhow::Result<()> {
    require_subcommand("deny")?;
    cargo(&["deny", "check"], "cargo-deny found issues")
}

/// Audit dependencies for security vulnerabilities
fn run_audit() -> anyhow::Result<()> {
    require_subcommand("audit")?;
    cargo(&["audit"], "cargo-audit found vulnerabilities")
}
