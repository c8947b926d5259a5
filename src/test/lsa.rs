use super::support::{id, v6};
use crate::lsa::{
    default_lsa_options, fletcher_checksum, prefix_octets, trim_address, verify_fletcher_checksum,
    IntraAreaPrefixLsa, Lsa, LsaBody, LsaHeader, OverlayPrefixLsa, Prefix, RouterLink, RouterLsa,
    INTRA_AREA_PREFIX_LSA_TYPE, NETWORK_LSA_TYPE, OVERLAY_PREFIX_LSA_TYPE, ROUTER_LSA_TYPE,
};
use crate::{INITIAL_SEQUENCE_NUMBER, MAX_AGE};

fn sample_router_lsa() -> Lsa {
    let mut body = RouterLsa::new(0, default_lsa_options());
    body.add_link(RouterLink::new(10, 3, 7, id(2, 2, 2, 2)));
    body.add_link(RouterLink::new(20, 4, 1, id(3, 3, 3, 3)));
    Lsa::new(
        LsaHeader::new(ROUTER_LSA_TYPE, id(0, 0, 0, 0), id(1, 1, 1, 1)),
        LsaBody::Router(body),
    )
}

#[test]
fn fletcher_verifies_encoded_lsa() {
    let bytes = sample_router_lsa().to_be_bytes(true);
    assert!(verify_fletcher_checksum(&bytes));
    let embedded = u16::from_be_bytes([bytes[16], bytes[17]]);
    assert_eq!(fletcher_checksum(&bytes), embedded);
}

#[test]
fn fletcher_detects_corruption() {
    let mut bytes = sample_router_lsa().to_be_bytes(true);
    bytes[25] ^= 0x01;
    assert!(!verify_fletcher_checksum(&bytes));
}

#[test]
fn age_excluded_from_fletcher() {
    let mut bytes = sample_router_lsa().to_be_bytes(true);
    bytes[0..2].copy_from_slice(&1234u16.to_be_bytes());
    assert!(verify_fletcher_checksum(&bytes));
}

#[test]
fn wire_header_matches_full_encoding() {
    let lsa = sample_router_lsa();
    let bytes = lsa.to_be_bytes(true);
    let header = lsa.wire_header();
    assert_eq!(header.length as usize, bytes.len());
    assert_eq!(
        header.checksum,
        u16::from_be_bytes([bytes[16], bytes[17]])
    );
    let short = lsa.to_be_bytes(false);
    assert_eq!(short, bytes[..20]);
}

#[test]
fn refresh_and_kill_advance_sequence() {
    let mut lsa = sample_router_lsa();
    assert_eq!(lsa.header.sequence_number, INITIAL_SEQUENCE_NUMBER);
    lsa.header.age = 1799;
    lsa.refresh();
    assert_eq!(lsa.header.sequence_number, INITIAL_SEQUENCE_NUMBER + 1);
    assert_eq!(lsa.header.age, 0);
    assert!(!lsa.is_dead());
    lsa.kill();
    assert_eq!(lsa.header.sequence_number, INITIAL_SEQUENCE_NUMBER + 2);
    assert_eq!(lsa.header.age, MAX_AGE);
    assert!(lsa.is_dead());
}

#[test]
fn set_sequence_number_restarts_aging() {
    let mut lsa = sample_router_lsa();
    lsa.header.age = 900;
    lsa.set_sequence_number(INITIAL_SEQUENCE_NUMBER + 9);
    assert_eq!(lsa.header.sequence_number, INITIAL_SEQUENCE_NUMBER + 9);
    assert_eq!(lsa.header.age, 0);
}

#[test]
fn trim_address_masks_partial_octet() {
    assert_eq!(
        trim_address(v6("2001:db8:0:ff::"), 60),
        v6("2001:db8:0:f0::")
    );
    assert_eq!(
        trim_address(v6("2001:db8:1:2:3:4:5:6"), 32),
        v6("2001:db8::")
    );
    assert_eq!(prefix_octets(60), 8);
    assert_eq!(prefix_octets(64), 8);
    assert_eq!(prefix_octets(65), 9);
    assert_eq!(prefix_octets(0), 0);
}

#[test]
fn prefix_covers_its_addresses() {
    let prefix = Prefix::new(v6("2001:db8::"), 32, 0, 0);
    assert!(prefix.covers(v6("2001:db8:1::1")));
    assert!(!prefix.covers(v6("2001:db9::1")));
    let host = Prefix::new(v6("2001:db8::7"), 128, 0, 0);
    assert!(host.covers(v6("2001:db8::7")));
    assert!(!host.covers(v6("2001:db8::8")));
}

#[test]
fn router_lsa_link_mutations_report_change() {
    let mut body = RouterLsa::new(0, default_lsa_options());
    let link = RouterLink::new(10, 3, 7, id(2, 2, 2, 2));
    assert!(body.add_link(link));
    assert!(!body.add_link(link));
    assert!(body.update_link_cost(3, 15));
    assert!(!body.update_link_cost(3, 15));
    assert!(!body.update_link_cost(99, 15));
    assert!(body.remove_link(3));
    assert!(!body.remove_link(3));
}

#[test]
fn intra_area_prefixes_survive_truncated_encoding() {
    let mut body = IntraAreaPrefixLsa::new(NETWORK_LSA_TYPE, id(0, 0, 0, 7), id(2, 2, 2, 2));
    body.add_prefix(Prefix::new(v6("2001:db8:1::"), 48, 10, 0));
    body.add_prefix(Prefix::new(v6("2001:db8:2::"), 64, 20, 0));
    body.add_prefix(Prefix::new(v6("2001:db8::1"), 128, 0, 0x02));
    let lsa = Lsa::new(
        LsaHeader::new(INTRA_AREA_PREFIX_LSA_TYPE, id(0, 0, 0, 1), id(2, 2, 2, 2)),
        LsaBody::IntraAreaPrefix(body),
    );
    let decoded = Lsa::try_from_be_bytes(&lsa.to_be_bytes(true)).unwrap();
    assert_eq!(decoded.body, lsa.body);
}

#[test]
fn overlay_prefixes_survive_truncated_encoding() {
    let mut body = OverlayPrefixLsa::new();
    body.add_prefix(Prefix::new(v6("2001:db8:a::"), 48, 5, 0));
    body.add_prefix(Prefix::new(v6("2001:db8:b::"), 64, 30, 0));
    let lsa = Lsa::new(
        LsaHeader::new(OVERLAY_PREFIX_LSA_TYPE, id(0, 0, 0, 0), id(9, 9, 9, 9)),
        LsaBody::OverlayPrefix(body),
    );
    let decoded = Lsa::try_from_be_bytes(&lsa.to_be_bytes(true)).unwrap();
    assert_eq!(decoded.body, lsa.body);
}

#[test]
fn truncated_lsa_rejected() {
    let bytes = sample_router_lsa().to_be_bytes(true);
    assert!(Lsa::try_from_be_bytes(&bytes[..bytes.len() - 4]).is_err());
    assert!(Lsa::try_from_be_bytes(&bytes[..10]).is_err());
}
