// tests/property/allocation_test.rs

//! Property-based tests for port allocation
//! The allocator must return the lowest unused port and fail only on a full range.

use crate::test_helpers::FixedPorts;
use proptest::prelude::*;
use std::collections::BTreeSet;
use temboard_autoconf::core::AutoconfError;
use temboard_autoconf::core::ports::{PORT_RANGE_END, PORT_RANGE_START, PortAllocator};
use temboard_autoconf::host::sockets::parse_listening;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_allocates_minimum_free_port(
        used in prop::collection::btree_set(PORT_RANGE_START..=PORT_RANGE_END, 0..200)
    ) {
        let probe = FixedPorts(used.clone());
        let port = PortAllocator::new(&probe).allocate().unwrap().port();

        prop_assert!((PORT_RANGE_START..=PORT_RANGE_END).contains(&port));
        prop_assert!(!used.contains(&port));
        // Every lower port of the range is taken.
        prop_assert!((PORT_RANGE_START..port).all(|p| used.contains(&p)));
    }

    #[test]
    fn test_ports_outside_range_do_not_matter(
        outside in prop::collection::btree_set(
            prop_oneof![1u16..PORT_RANGE_START, (PORT_RANGE_END + 1)..=u16::MAX],
            0..100
        )
    ) {
        let probe = FixedPorts(outside);
        let port = PortAllocator::new(&probe).allocate().unwrap().port();
        prop_assert_eq!(port, PORT_RANGE_START);
    }

    #[test]
    fn test_fails_only_when_every_port_is_used(missing in PORT_RANGE_START..=PORT_RANGE_END) {
        let mut used: BTreeSet<u16> = (PORT_RANGE_START..=PORT_RANGE_END).collect();
        let full = FixedPorts(used.clone());
        let is_no_free_port = matches!(
            PortAllocator::new(&full).allocate(),
            Err(AutoconfError::NoFreePort { .. })
        );
        prop_assert!(is_no_free_port);

        used.remove(&missing);
        let probe = FixedPorts(used);
        prop_assert_eq!(PortAllocator::new(&probe).allocate().unwrap().port(), missing);
    }

    #[test]
    fn test_parse_listening_finds_listen_sockets(
        listening in prop::collection::btree_set(1u16..=u16::MAX, 0..50),
        established in prop::collection::btree_set(1u16..=u16::MAX, 0..50),
    ) {
        let mut contents = String::from(
            "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n",
        );
        for (i, port) in listening.iter().enumerate() {
            contents.push_str(&format!(
                "{i:4}: 00000000:{port:04X} 00000000:0000 0A 00000000:00000000 00:00000000 00000000 0 0 1 1\n"
            ));
        }
        for (i, port) in established.iter().enumerate() {
            contents.push_str(&format!(
                "{i:4}: 0100007F:{port:04X} 0100007F:1538 01 00000000:00000000 00:00000000 00000000 0 0 1 1\n"
            ));
        }

        let parsed = parse_listening(&contents, PORT_RANGE_START..=PORT_RANGE_END);
        let expected: BTreeSet<u16> = listening
            .into_iter()
            .filter(|p| (PORT_RANGE_START..=PORT_RANGE_END).contains(p))
            .collect();
        prop_assert_eq!(parsed, expected);
    }
}
