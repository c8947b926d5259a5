use super::support::{id, v6};
use crate::error::OspfError;
use crate::interface::{handle, Interface};
use crate::lsa::{LinkLsa, Lsa, LsaBody, LsaHeader, LsaKey, RouterLink, RouterLsa};
use crate::lsa::{default_lsa_options, LINK_LSA_TYPE, NETWORK_LSA_TYPE, ROUTER_LSA_TYPE};
use crate::packet::dd::{DD_FLAG_I, DD_FLAG_M, DD_FLAG_MS};
use crate::packet::{
    check_data, internet_checksum, DbDescriptionPacket, HelloPacket, LsAcknowledgePacket,
    LsRequestPacket, LsUpdatePacket, Packet, PACKET_HEADER_LENGTH,
};
use crate::OSPF_MULTICAST_GROUP;

fn sample_hello() -> Packet {
    Packet::Hello(HelloPacket::new(
        id(1, 1, 1, 1),
        id(0, 0, 0, 0),
        3,
        1,
        10,
        40,
        id(2, 2, 2, 2),
        id(1, 1, 1, 1),
        vec![id(2, 2, 2, 2), id(3, 3, 3, 3)],
    ))
}

#[test]
fn hello_survives_the_wire() {
    let source = v6("fe80::1");
    let unicast = v6("fe80::2");
    let data = sample_hello().to_be_bytes(&source, &OSPF_MULTICAST_GROUP);
    let destination = check_data(&data, &source, &unicast).unwrap();
    assert_eq!(destination, OSPF_MULTICAST_GROUP);
    match Packet::try_from_be_bytes(&data).unwrap() {
        Packet::Hello(hello) => {
            assert_eq!(hello.header.router_id, id(1, 1, 1, 1));
            assert_eq!(hello.interface_id, 3);
            assert_eq!(hello.priority, 1);
            assert_eq!(hello.hello_interval, 10);
            assert_eq!(hello.dead_interval, 40);
            assert_eq!(hello.designated_router, id(2, 2, 2, 2));
            assert_eq!(hello.backup_designated_router, id(1, 1, 1, 1));
            assert_eq!(hello.neighbors, vec![id(2, 2, 2, 2), id(3, 3, 3, 3)]);
        }
        other => panic!("expected hello, got {:?}", other),
    }
}

#[test]
fn unicast_destination_verifies() {
    let source = v6("fe80::1");
    let unicast = v6("fe80::2");
    let data = sample_hello().to_be_bytes(&source, &unicast);
    assert_eq!(check_data(&data, &source, &unicast).unwrap(), unicast);
}

#[test]
fn corrupted_packet_rejected() {
    let source = v6("fe80::1");
    let unicast = v6("fe80::2");
    let mut data = sample_hello().to_be_bytes(&source, &OSPF_MULTICAST_GROUP);
    data[PACKET_HEADER_LENGTH + 4] ^= 0xff;
    assert!(check_data(&data, &source, &unicast).is_err());
}

#[test]
fn wrong_source_rejected() {
    let source = v6("fe80::1");
    let unicast = v6("fe80::2");
    let data = sample_hello().to_be_bytes(&source, &OSPF_MULTICAST_GROUP);
    assert!(check_data(&data, &v6("fe80::99"), &unicast).is_err());
}

#[test]
fn truncated_packet_rejected() {
    let source = v6("fe80::1");
    let data = sample_hello().to_be_bytes(&source, &OSPF_MULTICAST_GROUP);
    assert!(check_data(&data[..10], &source, &v6("fe80::2")).is_err());
    assert!(Packet::try_from_be_bytes(&data[..PACKET_HEADER_LENGTH + 2]).is_err());
}

#[test]
fn checksum_field_excluded_from_sum() {
    let source = v6("fe80::1");
    let data = sample_hello().to_be_bytes(&source, &OSPF_MULTICAST_GROUP);
    let embedded = u16::from_be_bytes([data[12], data[13]]);
    assert_eq!(
        internet_checksum(&source, &OSPF_MULTICAST_GROUP, &data),
        embedded
    );
}

#[test]
fn database_description_flags_survive() {
    let headers = vec![
        LsaHeader::new(ROUTER_LSA_TYPE, id(0, 0, 0, 0), id(1, 1, 1, 1)),
        LsaHeader::new(NETWORK_LSA_TYPE, id(0, 0, 0, 7), id(2, 2, 2, 2)),
    ];
    let packet = Packet::DbDescription(DbDescriptionPacket::new(
        id(1, 1, 1, 1),
        id(0, 0, 0, 0),
        DD_FLAG_I | DD_FLAG_M | DD_FLAG_MS,
        731,
        headers.clone(),
    ));
    let source = v6("fe80::1");
    let data = packet.to_be_bytes(&source, &v6("fe80::2"));
    match Packet::try_from_be_bytes(&data).unwrap() {
        Packet::DbDescription(dd) => {
            assert!(dd.is_initial());
            assert!(dd.is_master());
            assert_eq!(dd.dd_sequence_number, 731);
            assert_eq!(dd.lsa_headers, headers);
        }
        other => panic!("expected database description, got {:?}", other),
    }
}

#[test]
fn ls_request_keys_survive() {
    let requests = vec![
        LsaKey::new(ROUTER_LSA_TYPE, id(2, 2, 2, 2), id(0, 0, 0, 0)),
        LsaKey::new(NETWORK_LSA_TYPE, id(2, 2, 2, 2), id(0, 0, 0, 7)),
    ];
    let packet = Packet::LsRequest(LsRequestPacket::new(
        id(1, 1, 1, 1),
        id(0, 0, 0, 0),
        requests.clone(),
    ));
    let data = packet.to_be_bytes(&v6("fe80::1"), &v6("fe80::2"));
    match Packet::try_from_be_bytes(&data).unwrap() {
        Packet::LsRequest(request) => assert_eq!(request.requests, requests),
        other => panic!("expected ls request, got {:?}", other),
    }
}

#[test]
fn ls_acknowledge_headers_survive() {
    let mut acked = LsaHeader::new(ROUTER_LSA_TYPE, id(0, 0, 0, 0), id(2, 2, 2, 2));
    acked.sequence_number += 3;
    let packet = Packet::LsAcknowledge(LsAcknowledgePacket::new(
        id(1, 1, 1, 1),
        id(0, 0, 0, 0),
        vec![acked],
    ));
    let data = packet.to_be_bytes(&v6("fe80::1"), &OSPF_MULTICAST_GROUP);
    match Packet::try_from_be_bytes(&data).unwrap() {
        Packet::LsAcknowledge(ack) => assert_eq!(ack.lsa_headers, vec![acked]),
        other => panic!("expected ls acknowledge, got {:?}", other),
    }
}

#[test]
fn foreign_area_packet_rejected() {
    let hello = Packet::Hello(HelloPacket::new(
        id(2, 2, 2, 2),
        id(1, 1, 1, 1),
        7,
        1,
        10,
        40,
        id(0, 0, 0, 0),
        id(0, 0, 0, 0),
        vec![],
    ));
    let source = v6("fe80::2");
    let data = hello.to_be_bytes(&source, &OSPF_MULTICAST_GROUP);
    let outsider = Interface::new(3, id(0, 0, 0, 0), v6("fe80::1"), 10, 1, 10, 40);
    let err = handle::accept(&outsider, &data, &source).unwrap_err();
    assert!(matches!(err, OspfError::UnknownArea(area) if area == id(1, 1, 1, 1)));
    let member = Interface::new(3, id(1, 1, 1, 1), v6("fe80::1"), 10, 1, 10, 40);
    assert!(handle::accept(&member, &data, &source).is_ok());
}

fn sample_update() -> Packet {
    let mut router = RouterLsa::new(0, default_lsa_options());
    router.add_link(RouterLink::new(10, 3, 7, id(2, 2, 2, 2)));
    let router_lsa = Lsa::new(
        LsaHeader::new(ROUTER_LSA_TYPE, id(0, 0, 0, 0), id(1, 1, 1, 1)),
        LsaBody::Router(router),
    );
    let link_lsa = Lsa::new(
        LsaHeader::new(LINK_LSA_TYPE, id(0, 0, 0, 3), id(1, 1, 1, 1)),
        LsaBody::Link(LinkLsa::new(1, default_lsa_options(), v6("fe80::1"))),
    );
    Packet::LsUpdate(LsUpdatePacket::new(
        id(1, 1, 1, 1),
        id(0, 0, 0, 0),
        vec![router_lsa, link_lsa],
    ))
}

#[test]
fn ls_update_carries_full_lsas() {
    let packet = sample_update();
    let data = packet.to_be_bytes(&v6("fe80::1"), &OSPF_MULTICAST_GROUP);
    match Packet::try_from_be_bytes(&data).unwrap() {
        Packet::LsUpdate(update) => {
            assert_eq!(update.lsas.len(), 2);
            assert_eq!(update.lsas[0].key().ls_type, ROUTER_LSA_TYPE);
            assert_eq!(update.lsas[1].key().ls_type, LINK_LSA_TYPE);
            if let LsaBody::Router(body) = &update.lsas[0].body {
                assert_eq!(body.links[&3].neighbor_router_id, id(2, 2, 2, 2));
            } else {
                panic!("router lsa body expected");
            }
        }
        other => panic!("expected ls update, got {:?}", other),
    }
}

#[test]
fn ls_update_rejects_corrupt_lsa() {
    let data = sample_update().to_be_bytes(&v6("fe80::1"), &OSPF_MULTICAST_GROUP);
    let mut corrupt = data.clone();
    // first lsa body starts after the packet header, the update count and
    // the 20 byte lsa header
    corrupt[PACKET_HEADER_LENGTH + 4 + 20 + 3] ^= 0xff;
    assert!(Packet::try_from_be_bytes(&corrupt).is_err());
    assert!(Packet::try_from_be_bytes(&data).is_ok());
}
