// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the `DNSPolicy` activation computation.

#[cfg(test)]
mod tests {
    use super::super::{policy_is_active, select_active_controllers};
    use crate::cache::{ClusterInfo, DnsController, DnsTopology};
    use crate::crd::{DNSPolicySpec, DnsPolicyMode};

    /// Cluster in region `neu`, optionally adopting extra regions.
    fn cluster_info(adopts: &[&str]) -> ClusterInfo {
        ClusterInfo {
            region: "neu".to_string(),
            cluster: "aks01".to_string(),
            domain: "example.com".to_string(),
            environment_letter: "d".to_string(),
            adopts_regions: adopts.iter().map(ToString::to_string).collect(),
        }
    }

    /// Topology {neu: [a, b, c], weu: [d], frc: [e]}.
    fn topology() -> DnsTopology {
        let descriptor = |name: &str, region: &str| DnsController {
            name: name.to_string(),
            region: region.to_string(),
        };
        DnsTopology {
            controllers: vec![
                descriptor("a", "neu"),
                descriptor("b", "neu"),
                descriptor("c", "neu"),
                descriptor("d", "weu"),
                descriptor("e", "frc"),
            ],
        }
    }

    fn policy_spec(mode: DnsPolicyMode, region: Option<&str>, cluster: Option<&str>) -> DNSPolicySpec {
        DNSPolicySpec {
            mode,
            source_region: region.map(ToString::to_string),
            source_cluster: cluster.map(ToString::to_string),
        }
    }

    // ========== policy_is_active ==========

    #[test]
    fn test_policy_without_constraints_is_active() {
        let spec = policy_spec(DnsPolicyMode::Active, None, None);
        assert!(policy_is_active(&spec, &cluster_info(&[])));
    }

    #[test]
    fn test_policy_active_when_source_region_matches() {
        let spec = policy_spec(DnsPolicyMode::Active, Some("neu"), None);
        assert!(policy_is_active(&spec, &cluster_info(&[])));
    }

    #[test]
    fn test_policy_inactive_when_source_region_differs() {
        let spec = policy_spec(DnsPolicyMode::Active, Some("weu"), None);
        assert!(!policy_is_active(&spec, &cluster_info(&[])));
    }

    #[test]
    fn test_policy_active_when_source_cluster_matches() {
        let spec = policy_spec(DnsPolicyMode::Active, None, Some("aks01"));
        assert!(policy_is_active(&spec, &cluster_info(&[])));
    }

    #[test]
    fn test_policy_inactive_when_source_cluster_differs() {
        let spec = policy_spec(DnsPolicyMode::Active, None, Some("aks02"));
        assert!(!policy_is_active(&spec, &cluster_info(&[])));
    }

    #[test]
    fn test_policy_requires_both_constraints_to_match() {
        // Region matches but cluster does not
        let spec = policy_spec(DnsPolicyMode::Active, Some("neu"), Some("aks02"));
        assert!(!policy_is_active(&spec, &cluster_info(&[])));
    }

    #[test]
    fn test_empty_string_constraint_behaves_like_unset() {
        let spec = policy_spec(DnsPolicyMode::Active, Some(""), Some(""));
        assert!(policy_is_active(&spec, &cluster_info(&[])));
    }

    #[test]
    fn test_region_bound_policy_honors_source_region() {
        let matching = policy_spec(DnsPolicyMode::RegionBound, Some("neu"), None);
        let foreign = policy_spec(DnsPolicyMode::RegionBound, Some("weu"), None);

        assert!(policy_is_active(&matching, &cluster_info(&[])));
        assert!(!policy_is_active(&foreign, &cluster_info(&[])));
    }

    // ========== select_active_controllers ==========

    #[test]
    fn test_active_mode_selects_own_region_controllers() {
        let selected =
            select_active_controllers(&DnsPolicyMode::Active, &cluster_info(&[]), &topology());
        assert_eq!(selected, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_active_mode_includes_adopted_region_controllers() {
        let selected = select_active_controllers(
            &DnsPolicyMode::Active,
            &cluster_info(&["frc"]),
            &topology(),
        );
        assert_eq!(selected, vec!["a", "b", "c", "e"]);
    }

    #[test]
    fn test_active_mode_ignores_unknown_adopted_region() {
        // A bogus adopted region contributes nothing
        let selected = select_active_controllers(
            &DnsPolicyMode::Active,
            &cluster_info(&["bogus"]),
            &topology(),
        );
        assert_eq!(selected, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_active_mode_mixed_known_and_unknown_adopted_regions() {
        let selected = select_active_controllers(
            &DnsPolicyMode::Active,
            &cluster_info(&["bogus", "weu"]),
            &topology(),
        );
        assert_eq!(selected, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_active_mode_with_no_regional_controllers() {
        let mut info = cluster_info(&[]);
        info.region = "aps".to_string();

        let selected = select_active_controllers(&DnsPolicyMode::Active, &info, &topology());
        assert!(selected.is_empty());
    }

    #[test]
    fn test_region_bound_mode_selects_every_controller() {
        let selected =
            select_active_controllers(&DnsPolicyMode::RegionBound, &cluster_info(&[]), &topology());
        assert_eq!(selected, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_selection_preserves_descriptor_order() {
        // Adopting a region never reorders: descriptor order is the contract
        let selected = select_active_controllers(
            &DnsPolicyMode::Active,
            &cluster_info(&["frc", "weu"]),
            &topology(),
        );
        assert_eq!(selected, vec!["a", "b", "c", "d", "e"]);
    }
}
