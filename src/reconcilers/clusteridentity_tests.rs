// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ClusterIdentity` spec validation.

#[cfg(test)]
mod tests {
    use super::super::clusteridentity::validate_spec;
    use crate::crd::ClusterIdentitySpec;

    fn valid_spec() -> ClusterIdentitySpec {
        ClusterIdentitySpec {
            region: "neu".to_string(),
            cluster: "aks01".to_string(),
            domain: "example.com".to_string(),
            environment_letter: "d".to_string(),
            adopts_regions: None,
        }
    }

    #[test]
    fn test_valid_spec_passes() {
        assert!(validate_spec(&valid_spec()).is_none());
    }

    #[test]
    fn test_valid_spec_with_adopted_regions_passes() {
        let mut spec = valid_spec();
        spec.adopts_regions = Some(vec!["frc".to_string()]);
        assert!(validate_spec(&spec).is_none());
    }

    #[test]
    fn test_empty_region_rejected() {
        let mut spec = valid_spec();
        spec.region = String::new();

        let problem = validate_spec(&spec).expect("empty region must be rejected");
        assert!(problem.contains("spec.region"));
    }

    #[test]
    fn test_empty_cluster_rejected() {
        let mut spec = valid_spec();
        spec.cluster = "  ".to_string();

        let problem = validate_spec(&spec).expect("blank cluster must be rejected");
        assert!(problem.contains("spec.cluster"));
    }

    #[test]
    fn test_empty_domain_rejected() {
        let mut spec = valid_spec();
        spec.domain = String::new();

        let problem = validate_spec(&spec).expect("empty domain must be rejected");
        assert!(problem.contains("spec.domain"));
    }

    #[test]
    fn test_empty_environment_letter_rejected() {
        let mut spec = valid_spec();
        spec.environment_letter = String::new();

        let problem = validate_spec(&spec).expect("empty environment letter must be rejected");
        assert!(problem.contains("spec.environmentLetter"));
    }

    #[test]
    fn test_first_problem_reported() {
        // Several fields empty at once: the first one in field order wins
        let spec = ClusterIdentitySpec {
            region: String::new(),
            cluster: String::new(),
            domain: "example.com".to_string(),
            environment_letter: "d".to_string(),
            adopts_regions: None,
        };

        let problem = validate_spec(&spec).unwrap();
        assert!(problem.contains("spec.region"));
    }
}
