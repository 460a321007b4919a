//! Property-based tests for the port-spec and byte-size parsers.
//!
//! These cover the round-trip laws from the crate's testable
//! properties: canonicalizing a port spec and re-parsing its
//! serialized form always yields the same spec, and byte-size suffixes
//! are case-insensitive.

use proptest::prelude::*;

use maestro_rs::model::port::{parse_port, RawPort};
use maestro_rs::model::volume::{parse_byte_size, RawRestartPolicy};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// canonicalize(serialize(canonicalize(x))) == canonicalize(x), for the
    /// "exposed:external[/proto]" long form every canonical spec serializes
    /// to when bound to 0.0.0.0.
    #[test]
    fn port_spec_round_trips_through_serialize(
        exposed in 1u16..=65535,
        external in 1u16..=65535,
        udp in any::<bool>(),
    ) {
        let proto = if udp { "/udp" } else { "" };
        let input = format!("{exposed}:{external}{proto}");

        let spec = parse_port("p", &RawPort::Str(input)).unwrap();
        let serialized = spec.serialize();
        let reparsed = parse_port("p", &RawPort::Str(serialized.clone())).unwrap();

        prop_assert_eq!(&reparsed, &spec);
        prop_assert_eq!(reparsed.serialize(), serialized);
    }

    /// A bare port number canonicalizes to tcp on both sides and
    /// round-trips through its own canonical serialization.
    #[test]
    fn bare_port_number_round_trips(port in 1u16..=65535) {
        let spec = parse_port("p", &RawPort::Number(port)).unwrap();
        let reparsed = parse_port("p", &RawPort::Str(spec.serialize())).unwrap();
        prop_assert_eq!(reparsed, spec);
    }

    /// "1g" == "1G" == 1073741824: suffix case never changes the parsed
    /// byte count.
    #[test]
    fn byte_size_suffix_case_is_irrelevant(n in 1u64..=4096, suffix in prop_oneof!["k", "m", "g"]) {
        let lower = format!("{n}{suffix}");
        let upper = format!("{n}{}", suffix.to_ascii_uppercase());
        prop_assert_eq!(parse_byte_size(&lower).unwrap(), parse_byte_size(&upper).unwrap());
    }

    /// Bare integers parse as a byte count equal to themselves.
    #[test]
    fn byte_size_bare_integer_is_itself(n in 0u64..=1_000_000_000) {
        prop_assert_eq!(parse_byte_size(&n.to_string()).unwrap(), n);
    }

    /// Restart-policy short form round-trips through its own serialization.
    #[test]
    fn restart_policy_short_form_round_trips(
        name in "[a-z][a-z-]{0,19}",
        count in proptest::option::of(0u32..1000),
    ) {
        let short = match count {
            Some(n) => format!("{name}:{n}"),
            None => name.clone(),
        };
        let policy = RawRestartPolicy::Short(short.clone()).into_policy();
        prop_assert_eq!(&policy.name, &name);
        prop_assert_eq!(policy.maximum_retry_count, count);
        prop_assert_eq!(RawRestartPolicy::serialize(&policy), short);
    }
}
