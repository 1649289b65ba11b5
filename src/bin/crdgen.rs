// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from Rust types defined in src/crd.rs.
//! This ensures the YAML files in deploy/crds/ are always in sync with the Rust code.
//!
//! Usage:
//!   cargo run --bin crdgen [output-dir]
//!
//! Generated files are written to deploy/crds/ (or the given directory) with
//! proper headers.

use fleetdns::crd::{ClusterIdentity, DNSConfiguration, DNSPolicy, Gateway, ServiceRoute};
use kube::CustomResourceExt;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "deploy/crds".to_string());

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_all(Path::new(&output_dir))?;

    println!("✓ Successfully generated CRD YAML files in {output_dir}");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f {output_dir}/");

    Ok(())
}

fn generate_all(output_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;

    generate_crd::<ClusterIdentity>("clusteridentities.crd.yaml", output_dir)?;
    generate_crd::<DNSConfiguration>("dnsconfigurations.crd.yaml", output_dir)?;
    generate_crd::<DNSPolicy>("dnspolicies.crd.yaml", output_dir)?;
    generate_crd::<Gateway>("gateways.crd.yaml", output_dir)?;
    generate_crd::<ServiceRoute>("serviceroutes.crd.yaml", output_dir)?;

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let crd = T::crd();

    let yaml = serde_yaml::to_string(&crd)?;

    // Add copyright header
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_all_writes_one_file_per_crd() {
        let dir = tempfile::tempdir().expect("tempdir");

        generate_all(dir.path()).expect("generation should succeed");

        for filename in [
            "clusteridentities.crd.yaml",
            "dnsconfigurations.crd.yaml",
            "dnspolicies.crd.yaml",
            "gateways.crd.yaml",
            "serviceroutes.crd.yaml",
        ] {
            let path = dir.path().join(filename);
            assert!(path.exists(), "missing {filename}");

            let content = fs::read_to_string(&path).expect("readable file");
            assert!(content.starts_with("# Copyright"), "{filename} lacks header");
            assert!(
                content.contains("kind: CustomResourceDefinition"),
                "{filename} is not a CRD"
            );
            assert!(
                content.contains("group: fleetdns.firestoned.io"),
                "{filename} has the wrong API group"
            );
        }
    }

    #[test]
    fn test_generated_crd_names_follow_group_convention() {
        let dir = tempfile::tempdir().expect("tempdir");

        generate_all(dir.path()).expect("generation should succeed");

        let content = fs::read_to_string(dir.path().join("serviceroutes.crd.yaml"))
            .expect("readable file");
        assert!(content.contains("name: serviceroutes.fleetdns.firestoned.io"));
        assert!(content.contains("name: v1alpha1"));
    }
}
