use std::process::Command;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking workspace...".cyan().bold());
    println!();

    let total_start = Instant::now();

    println!("{}", "  Checking host build...".cyan());
    let check_start = Instant::now();
    let check_output = Command::new("cargo")
        .args(["check", "--workspace", "--all-targets"])
        .output()
        .context("Failed to run cargo check")?;
    if !check_output.status.success() {
        eprintln!("{}", "  ✗ Check failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&check_output.stderr));
        anyhow::bail!("Check failed");
    }
    println!(
        "{}",
        format!(
            "  ✓ Check passed in {:.2}s",
            check_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    println!("{}", "  Running clippy lints...".cyan());
    let clippy_start = Instant::now();
    let clippy_output = Command::new("cargo")
        .args(["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])
        .output()
        .context("Failed to run clippy")?;
    if !clippy_output.status.success() {
        eprintln!("{}", "  ⚠ Clippy warnings found".yellow().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&clippy_output.stderr));
        // Don't fail on clippy warnings, just show them
    } else {
        println!(
            "{}",
            format!(
                "  ✓ Clippy passed in {:.2}s",
                clippy_start.elapsed().as_secs_f64()
            )
            .green()
        );
    }
    println!();

    println!("{}", "  Checking code formatting...".cyan());
    let fmt_output = Command::new("cargo")
        .args(["fmt", "--all", "--check"])
        .output()
        .context("Failed to run cargo fmt")?;
    if !fmt_output.status.success() {
        eprintln!("{}", "  ⚠ Formatting issues found".yellow().bold());
        eprintln!("     Run 'cargo fmt --all' to fix");
        // Don't fail on format issues
    } else {
        println!("{}", "  ✓ Formatting check passed".green());
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
