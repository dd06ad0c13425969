//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `registrar_core` linkage from a standalone binary.
//! - Print deterministic output for local sanity checks.

use registrar_core::db::migrations::latest_version;

fn main() {
    println!("registrar_core ping={}", registrar_core::ping());
    println!("registrar_core version={}", registrar_core::core_version());
    println!("registrar_core schema_version={}", latest_version());
}
