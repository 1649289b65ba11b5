// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `DNSConfiguration` topology validation.

#[cfg(test)]
mod tests {
    use super::super::dnsconfiguration::validate_spec;
    use crate::crd::{DNSConfigurationSpec, DnsControllerSpec};

    fn descriptor(name: &str, region: &str) -> DnsControllerSpec {
        DnsControllerSpec {
            name: name.to_string(),
            region: region.to_string(),
        }
    }

    #[test]
    fn test_single_controller_passes() {
        let spec = DNSConfigurationSpec {
            controllers: vec![descriptor("a", "neu")],
        };
        assert!(validate_spec(&spec).is_none());
    }

    #[test]
    fn test_multiple_controllers_pass() {
        let spec = DNSConfigurationSpec {
            controllers: vec![
                descriptor("a", "neu"),
                descriptor("b", "neu"),
                descriptor("e", "frc"),
            ],
        };
        assert!(validate_spec(&spec).is_none());
    }

    #[test]
    fn test_empty_controller_list_rejected() {
        let spec = DNSConfigurationSpec {
            controllers: vec![],
        };

        let problem = validate_spec(&spec).expect("empty topology must be rejected");
        assert!(problem.contains("at least one"));
    }

    #[test]
    fn test_empty_controller_name_rejected() {
        let spec = DNSConfigurationSpec {
            controllers: vec![descriptor("a", "neu"), descriptor("", "weu")],
        };

        let problem = validate_spec(&spec).expect("empty name must be rejected");
        assert!(problem.contains("controllers[1].name"));
    }

    #[test]
    fn test_empty_controller_region_rejected() {
        let spec = DNSConfigurationSpec {
            controllers: vec![descriptor("a", "  ")],
        };

        let problem = validate_spec(&spec).expect("blank region must be rejected");
        assert!(problem.contains("controllers[0].region"));
    }

    #[test]
    fn test_duplicate_controller_names_rejected() {
        // Same name in two regions still collides: record names embed it
        let spec = DNSConfigurationSpec {
            controllers: vec![descriptor("a", "neu"), descriptor("a", "weu")],
        };

        let problem = validate_spec(&spec).expect("duplicate names must be rejected");
        assert!(problem.contains("duplicate"));
        assert!(problem.contains('a'));
    }
}
