//! Property-based tests for tasktracker-updater.
//!
//! # Properties Tested
//!
//! - Version ordering is a total order over dotted version strings
//! - A leading `v` and trailing `.0` components never change the ordering
//! - Asset suffixes always carry the platform key and the family's archive
//!   extension

#![cfg(test)]

use std::cmp::Ordering;

use proptest::prelude::*;

use crate::platform::{Platform, UpdateTarget};
use crate::version::{compare_versions, VersionScheme};

// =============================================================================
// Generators
// =============================================================================

/// Generate a list of version components.
fn arb_components() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..1000, 1..5)
}

fn render(components: &[u64]) -> String {
    components
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Generate a version string, optionally `v`-prefixed.
fn arb_version() -> impl Strategy<Value = String> {
    (arb_components(), any::<bool>()).prop_map(|(components, prefixed)| {
        let rendered = render(&components);
        if prefixed {
            format!("v{}", rendered)
        } else {
            rendered
        }
    })
}

fn arb_os() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["linux", "windows", "darwin"])
}

fn arb_arch() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["amd64", "arm64", "386", "arm"])
}

// =============================================================================
// Version ordering
// =============================================================================

proptest! {
    #[test]
    fn prop_compare_is_reflexive(v in arb_version()) {
        prop_assert_eq!(compare_versions(&v, &v), Ordering::Equal);
    }

    #[test]
    fn prop_compare_is_antisymmetric(a in arb_version(), b in arb_version()) {
        prop_assert_eq!(compare_versions(&a, &b), compare_versions(&b, &a).reverse());
    }

    #[test]
    fn prop_compare_is_transitive(a in arb_version(), b in arb_version(), c in arb_version()) {
        if compare_versions(&a, &b) != Ordering::Greater
            && compare_versions(&b, &c) != Ordering::Greater
        {
            prop_assert_ne!(compare_versions(&a, &c), Ordering::Greater);
        }
    }

    #[test]
    fn prop_v_prefix_is_ignored(components in arb_components()) {
        let plain = render(&components);
        let prefixed = format!("v{}", plain);
        prop_assert_eq!(compare_versions(&plain, &prefixed), Ordering::Equal);
    }

    #[test]
    fn prop_trailing_zeros_are_ignored(components in arb_components(), zeros in 1usize..4) {
        let mut padded = components.clone();
        padded.extend(std::iter::repeat(0).take(zeros));
        prop_assert_eq!(
            compare_versions(&render(&components), &render(&padded)),
            Ordering::Equal
        );
    }

    #[test]
    fn prop_bumping_a_component_is_newer(components in arb_components(), index in 0usize..5) {
        let index = index % components.len();
        let mut bumped = components.clone();
        bumped[index] += 1;
        prop_assert_eq!(
            compare_versions(&render(&components), &render(&bumped)),
            Ordering::Less
        );
    }

    #[test]
    fn prop_semver_scheme_agrees_on_plain_triples(
        a in (0u64..50, 0u64..50, 0u64..50),
        b in (0u64..50, 0u64..50, 0u64..50),
    ) {
        let a = format!("{}.{}.{}", a.0, a.1, a.2);
        let b = format!("{}.{}.{}", b.0, b.1, b.2);
        prop_assert_eq!(
            VersionScheme::Semver.compare(&a, &b),
            VersionScheme::Dotted.compare(&a, &b)
        );
    }
}

// =============================================================================
// Asset naming
// =============================================================================

proptest! {
    #[test]
    fn prop_asset_suffix_matches_family(os in arb_os(), arch in arb_arch()) {
        let target = UpdateTarget::resolve(Platform::new(os, arch), "task-tracker").unwrap();
        let suffix = target.asset_suffix();

        let key = format!("{}-{}.", os, arch);
        prop_assert!(suffix.starts_with(&key));
        if os == "windows" {
            prop_assert!(suffix.ends_with(".zip"));
            prop_assert!(target.archived_executable_name().ends_with(".exe"));
        } else {
            prop_assert!(suffix.ends_with(".tar.xz"));
            prop_assert_eq!(target.archived_executable_name(), "task-tracker");
        }
    }
}
