use std::collections::HashMap;

use super::support::{id, v6};
use crate::area::lsdb::{number_lsid, Lsdb, ReceivingInterface};
use crate::lsa::{
    default_lsa_options, LinkLsa, LsaBody, LsaHeader, LsaKey, NetworkLsa, Prefix, RouterLink,
    RouterLsa, INTER_AREA_PREFIX_LSA_TYPE, INTRA_AREA_PREFIX_LSA_TYPE, LINK_LSA_TYPE,
    NETWORK_LSA_TYPE, ROUTER_LSA_TYPE,
};
use crate::rtable::{NodeId, SpfManager};
use crate::{INITIAL_SEQUENCE_NUMBER, MAX_AGE, NULL_ID, REFRESH_AGE};

fn build() -> Lsdb {
    let area = id(0, 0, 0, 0);
    let router_id = id(1, 1, 1, 1);
    let spf = SpfManager::new(area, router_id);
    Lsdb::new(area, router_id, spf)
}

fn foreign_router_header(adv: std::net::Ipv4Addr, sequence: u32, age: u16) -> LsaHeader {
    let mut header = LsaHeader::new(ROUTER_LSA_TYPE, NULL_ID, adv);
    header.sequence_number = sequence;
    header.age = age;
    header
}

fn router_body(metric: u16) -> RouterLsa {
    let mut body = RouterLsa::new(0, default_lsa_options());
    body.add_link(RouterLink::new(metric, 1, 1, id(1, 1, 1, 1)));
    body
}

#[tokio::test]
async fn stale_sequence_rejected() {
    let lsdb = build();
    let adv = id(2, 2, 2, 2);
    let key = LsaKey::new(ROUTER_LSA_TYPE, adv, NULL_ID);
    lsdb.update_router_lsa(
        foreign_router_header(adv, INITIAL_SEQUENCE_NUMBER + 2, 0),
        router_body(10),
        false,
    )
    .await;
    lsdb.update_router_lsa(
        foreign_router_header(adv, INITIAL_SEQUENCE_NUMBER + 1, 0),
        router_body(99),
        false,
    )
    .await;
    let stored = lsdb.get(key).await.unwrap();
    assert_eq!(stored.header.sequence_number, INITIAL_SEQUENCE_NUMBER + 2);
    if let LsaBody::Router(body) = &stored.body {
        assert_eq!(body.links[&1].metric, 10);
    } else {
        panic!("router lsa body expected");
    }
    lsdb.update_router_lsa(
        foreign_router_header(adv, INITIAL_SEQUENCE_NUMBER + 3, 0),
        router_body(7),
        false,
    )
    .await;
    assert_eq!(
        lsdb.sequence_of(key).await,
        Some(INITIAL_SEQUENCE_NUMBER + 3)
    );
}

#[tokio::test]
async fn expired_lsa_moves_to_dead_table() {
    let area = id(0, 0, 0, 0);
    let router_id = id(1, 1, 1, 1);
    let spf = SpfManager::new(area, router_id);
    let lsdb = Lsdb::new(area, router_id, spf.clone());
    let adv = id(2, 2, 2, 2);
    let key = LsaKey::new(ROUTER_LSA_TYPE, adv, NULL_ID);
    lsdb.update_router_lsa(
        foreign_router_header(adv, INITIAL_SEQUENCE_NUMBER, MAX_AGE),
        router_body(10),
        false,
    )
    .await;
    assert!(spf.snapshot().node(&NodeId::Router(adv)).is_some());
    let refreshed = lsdb.age_tick().await;
    assert!(refreshed.is_empty());
    assert!(lsdb.get(key).await.is_none());
    assert!(lsdb.get_dead(key).await.is_some());
    assert!(spf.snapshot().node(&NodeId::Router(adv)).is_none());
}

#[tokio::test]
async fn expired_link_lsa_dropped_without_tombstone() {
    let lsdb = build();
    let adv = id(2, 2, 2, 2);
    let mut header = LsaHeader::new(LINK_LSA_TYPE, number_lsid(3), adv);
    header.age = MAX_AGE;
    let body = LinkLsa::new(1, default_lsa_options(), v6("fe80::2"));
    let receiving = ReceivingInterface {
        number: 3,
        cost: 10,
        is_dr: false,
    };
    lsdb.update_link_lsa(header, body, false, receiving).await;
    let key = header.key();
    assert_eq!(lsdb.link_lsa_interface(key).await, Some(3));
    lsdb.age_tick().await;
    assert!(lsdb.get(key).await.is_none());
    assert!(lsdb.get_dead(key).await.is_none());
    assert_eq!(lsdb.link_lsa_interface(key).await, None);
}

#[tokio::test]
async fn self_lsa_refreshes_at_refresh_age() {
    let lsdb = build();
    let own = id(1, 1, 1, 1);
    let foreign = id(2, 2, 2, 2);
    lsdb.update_router_lsa(
        foreign_router_header(own, INITIAL_SEQUENCE_NUMBER, REFRESH_AGE - 1),
        router_body(10),
        false,
    )
    .await;
    lsdb.update_router_lsa(
        foreign_router_header(foreign, INITIAL_SEQUENCE_NUMBER, REFRESH_AGE - 1),
        router_body(10),
        false,
    )
    .await;
    let refreshed = lsdb.age_tick().await;
    assert_eq!(refreshed, vec![LsaKey::new(ROUTER_LSA_TYPE, own, NULL_ID)]);
    let renewed = lsdb.get(refreshed[0]).await.unwrap();
    assert_eq!(renewed.header.sequence_number, INITIAL_SEQUENCE_NUMBER + 1);
    assert_eq!(renewed.header.age, 0);
    let kept = lsdb
        .get(LsaKey::new(ROUTER_LSA_TYPE, foreign, NULL_ID))
        .await
        .unwrap();
    assert_eq!(kept.header.sequence_number, INITIAL_SEQUENCE_NUMBER);
    assert_eq!(kept.header.age, REFRESH_AGE);
}

#[tokio::test]
async fn bump_self_sequence_past_foreign_copy() {
    let lsdb = build();
    let key = lsdb.create_router_lsa(false).await;
    assert_eq!(
        lsdb.bump_self_lsa(key, INITIAL_SEQUENCE_NUMBER + 5).await,
        Some(key)
    );
    assert_eq!(
        lsdb.sequence_of(key).await,
        Some(INITIAL_SEQUENCE_NUMBER + 6)
    );
    assert_eq!(lsdb.bump_self_lsa(key, INITIAL_SEQUENCE_NUMBER).await, None);
    assert_eq!(
        lsdb.sequence_of(key).await,
        Some(INITIAL_SEQUENCE_NUMBER + 6)
    );
}

#[tokio::test]
async fn requests_drain_once() {
    let lsdb = build();
    let from = id(2, 2, 2, 2);
    let header = foreign_router_header(id(3, 3, 3, 3), INITIAL_SEQUENCE_NUMBER, 0);
    lsdb.ls_request(from, &header).await;
    lsdb.ls_request(from, &header).await;
    assert!(lsdb.has_requests(from).await);
    let requests = lsdb.get_ls_requests(from).await;
    assert_eq!(requests, vec![header.key()]);
    assert!(!lsdb.has_requests(from).await);
    assert!(lsdb.get_ls_requests(from).await.is_empty());
}

#[tokio::test]
async fn request_skipped_when_copy_is_newer() {
    let lsdb = build();
    let adv = id(3, 3, 3, 3);
    lsdb.update_router_lsa(
        foreign_router_header(adv, INITIAL_SEQUENCE_NUMBER + 5, 0),
        router_body(10),
        false,
    )
    .await;
    let older = foreign_router_header(adv, INITIAL_SEQUENCE_NUMBER + 2, 0);
    lsdb.ls_request(id(2, 2, 2, 2), &older).await;
    assert!(!lsdb.has_requests(id(2, 2, 2, 2)).await);
}

#[tokio::test]
async fn network_lsa_links_the_segment() {
    let area = id(0, 0, 0, 0);
    let router_id = id(1, 1, 1, 1);
    let spf = SpfManager::new(area, router_id);
    let lsdb = Lsdb::new(area, router_id, spf.clone());
    lsdb.create_router_lsa(false).await;
    let key = lsdb.create_network_lsa(7, vec![id(2, 2, 2, 2)]).await;
    let stored = lsdb.get(key).await.unwrap();
    if let LsaBody::Network(body) = &stored.body {
        assert!(body.attached.contains(&router_id));
        assert!(body.attached.contains(&id(2, 2, 2, 2)));
    } else {
        panic!("network lsa body expected");
    }
    let graph = spf.snapshot();
    let segment = NodeId::Network(router_id, 7);
    assert_eq!(
        graph.costs.get(&(segment, NodeId::Router(id(2, 2, 2, 2)))),
        Some(&0)
    );
    assert_eq!(
        graph.costs.get(&(NodeId::Router(id(2, 2, 2, 2)), segment)),
        Some(&0)
    );
}

#[tokio::test]
async fn foreign_network_lsa_preserves_router_metric() {
    let area = id(0, 0, 0, 0);
    let router_id = id(1, 1, 1, 1);
    let spf = SpfManager::new(area, router_id);
    let lsdb = Lsdb::new(area, router_id, spf.clone());
    let dr = id(2, 2, 2, 2);
    let segment = NodeId::Network(dr, 9);
    // our router lsa already points at the segment with the link metric
    spf.update_topology(|graph| {
        graph.add_edge(NodeId::Router(router_id), segment, 10);
    });
    let header = LsaHeader::new(NETWORK_LSA_TYPE, number_lsid(9), dr);
    let body = NetworkLsa::new(default_lsa_options(), vec![dr, router_id]);
    lsdb.update_network_lsa(header, body, false, Some(4)).await;
    let graph = spf.snapshot();
    assert_eq!(
        graph.costs.get(&(NodeId::Router(router_id), segment)),
        Some(&10)
    );
    assert_eq!(
        graph.costs.get(&(segment, NodeId::Router(router_id))),
        Some(&0)
    );
}

#[tokio::test]
async fn designated_router_folds_link_prefixes() {
    let lsdb = build();
    lsdb.create_router_lsa(false).await;
    lsdb.create_network_lsa(7, vec![id(2, 2, 2, 2)]).await;
    let header = LsaHeader::new(LINK_LSA_TYPE, number_lsid(2), id(2, 2, 2, 2));
    let mut body = LinkLsa::new(1, default_lsa_options(), v6("fe80::2"));
    body.add_prefix(Prefix::new(v6("2001:db8:1::"), 64, 0, 0));
    body.add_prefix(Prefix::new(v6("2001:db8::2"), 128, 0, 0x02));
    let receiving = ReceivingInterface {
        number: 7,
        cost: 10,
        is_dr: true,
    };
    let (updates, kills) = lsdb.update_link_lsa(header, body, false, receiving).await;
    assert!(kills.is_empty());
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].ls_type, INTRA_AREA_PREFIX_LSA_TYPE);
    let intra = lsdb.get(updates[0]).await.unwrap();
    if let LsaBody::IntraAreaPrefix(body) = &intra.body {
        assert_eq!(body.ref_ls_type, NETWORK_LSA_TYPE);
        let prefix = body.prefixes.get(&v6("2001:db8:1::")).unwrap();
        assert_eq!(prefix.length, 64);
        assert_eq!(prefix.metric, 10);
        // host addresses stay in the link lsa
        assert!(!body.prefixes.contains_key(&v6("2001:db8::2")));
    } else {
        panic!("intra-area-prefix lsa body expected");
    }
}

#[tokio::test]
async fn inter_area_summaries_allocate_stable_ids() {
    let lsdb = build();
    let first = (v6("2001:db8:a::"), 64u8);
    let second = (v6("2001:db8:b::"), 64u8);
    let mut wanted = HashMap::new();
    wanted.insert(first, 5u32);
    wanted.insert(second, 9u32);
    let keys = lsdb.update_self_inter_area_prefix_lsas(wanted).await;
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|key| key.ls_type == INTER_AREA_PREFIX_LSA_TYPE));
    assert_ne!(keys[0].link_state_id, keys[1].link_state_id);

    let mut wanted = HashMap::new();
    wanted.insert(first, 7u32);
    let changed = lsdb.update_self_inter_area_prefix_lsas(wanted).await;
    assert_eq!(changed.len(), 2);
    let mut live = 0;
    let mut dead = 0;
    for key in &changed {
        let lsa = lsdb.get(*key).await.unwrap();
        if lsa.is_dead() {
            dead += 1;
        } else {
            live += 1;
            if let LsaBody::InterAreaPrefix(body) = &lsa.body {
                assert_eq!(body.prefix.address, first.0);
                assert_eq!(body.prefix.metric, 7);
            } else {
                panic!("inter-area-prefix lsa body expected");
            }
        }
    }
    assert_eq!((live, dead), (1, 1));

    // unchanged metric floods nothing
    let mut wanted = HashMap::new();
    wanted.insert(first, 7u32);
    assert!(lsdb.update_self_inter_area_prefix_lsas(wanted).await.is_empty());
}

#[tokio::test]
async fn clear_inter_area_kills_every_summary() {
    let lsdb = build();
    let mut wanted = HashMap::new();
    wanted.insert((v6("2001:db8:a::"), 64u8), 5u32);
    wanted.insert((v6("2001:db8:b::"), 64u8), 9u32);
    lsdb.update_self_inter_area_prefix_lsas(wanted).await;
    let killed = lsdb.clear_inter_area_lsas().await;
    assert_eq!(killed.len(), 2);
    for key in &killed {
        assert!(lsdb.get(*key).await.unwrap().is_dead());
    }
}
