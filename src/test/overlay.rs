use std::collections::HashMap;

use super::support::{id, v6};
use crate::lsa::{
    AbrLsa, LsaBody, LsaHeader, OverlayPrefixLsa, Prefix, OVERLAY_ABR_LSA_TYPE,
    OVERLAY_PREFIX_LSA_TYPE,
};
use crate::overlay::OverlayLsdb;
use crate::rtable::NodeId;
use crate::{INITIAL_SEQUENCE_NUMBER, MAX_AGE, NULL_ID};

fn foreign_abr_header(adv: std::net::Ipv4Addr, sequence: u32, age: u16) -> LsaHeader {
    let mut header = LsaHeader::new(OVERLAY_ABR_LSA_TYPE, NULL_ID, adv);
    header.sequence_number = sequence;
    header.age = age;
    header
}

#[tokio::test]
async fn border_announcement_merges_cheapest_area_view() {
    let overlay = OverlayLsdb::new(id(1, 1, 1, 1));
    let area_a = id(0, 0, 0, 1);
    let area_b = id(0, 0, 0, 2);
    let mut reachable = HashMap::new();
    reachable.insert(id(2, 2, 2, 2), 5u32);
    reachable.insert(id(3, 3, 3, 3), 8u32);
    let key = overlay.update_neighbors(area_a, reachable.clone()).await.unwrap();

    // the same view again is not a change
    assert!(overlay.update_neighbors(area_a, reachable).await.is_none());

    // a second area reaches one border cheaper and adds another
    let mut reachable = HashMap::new();
    reachable.insert(id(2, 2, 2, 2), 9u32);
    reachable.insert(id(4, 4, 4, 4), 2u32);
    overlay.update_neighbors(area_b, reachable).await.unwrap();

    let lsa = overlay.get(key).await.unwrap();
    if let LsaBody::Abr(body) = &lsa.body {
        assert_eq!(body.neighbors[&id(2, 2, 2, 2)], 5);
        assert_eq!(body.neighbors[&id(3, 3, 3, 3)], 8);
        assert_eq!(body.neighbors[&id(4, 4, 4, 4)], 2);
    } else {
        panic!("abr lsa body expected");
    }
    let graph = overlay.spf.snapshot();
    let root = NodeId::Router(id(1, 1, 1, 1));
    assert_eq!(graph.costs.get(&(root, NodeId::Router(id(2, 2, 2, 2)))), Some(&5));
}

#[tokio::test]
async fn prefix_export_keeps_best_cost() {
    let overlay = OverlayLsdb::new(id(1, 1, 1, 1));
    let area_a = id(0, 0, 0, 1);
    let area_b = id(0, 0, 0, 2);
    let prefix = (v6("2001:db8:44::"), 48u8);
    let mut reachable = HashMap::new();
    reachable.insert(prefix, 10u32);
    let key = overlay.update_prefixes(area_a, reachable).await.unwrap();
    let mut reachable = HashMap::new();
    reachable.insert(prefix, 4u32);
    overlay.update_prefixes(area_b, reachable.clone()).await.unwrap();
    assert!(overlay.update_prefixes(area_b, reachable).await.is_none());

    let lsa = overlay.get(key).await.unwrap();
    if let LsaBody::OverlayPrefix(body) = &lsa.body {
        assert_eq!(body.prefixes[&prefix.0].metric, 4);
    } else {
        panic!("overlay prefix lsa body expected");
    }
    assert_eq!(overlay.local_prefix_cost(area_a, prefix).await, Some(10));
    assert_eq!(overlay.local_prefix_cost(area_b, prefix).await, Some(4));
}

#[tokio::test]
async fn summary_cost_adds_path_to_border() {
    let overlay = OverlayLsdb::new(id(1, 1, 1, 1));
    let remote = id(2, 2, 2, 2);
    let mut reachable = HashMap::new();
    reachable.insert(remote, 5u32);
    overlay
        .update_neighbors(id(0, 0, 0, 1), reachable)
        .await
        .unwrap();

    let mut body = OverlayPrefixLsa::new();
    body.add_prefix(Prefix::new(v6("2001:db8:44::"), 48, 30, 0));
    let header = LsaHeader::new(OVERLAY_PREFIX_LSA_TYPE, NULL_ID, remote);
    overlay.update_prefix_lsa(header, body, false, true).await;

    let best = overlay.spf.best_prefixes();
    assert_eq!(best.get(&(v6("2001:db8:44::"), 48)), Some(&35));
}

#[tokio::test]
async fn stale_foreign_border_lsa_rejected() {
    let overlay = OverlayLsdb::new(id(1, 1, 1, 1));
    let adv = id(9, 9, 9, 9);
    let mut body = AbrLsa::new();
    body.add_neighbor(id(2, 2, 2, 2), 1);
    overlay
        .update_abr_lsa(
            foreign_abr_header(adv, INITIAL_SEQUENCE_NUMBER + 2, 0),
            body,
            false,
            true,
        )
        .await;
    let mut stale = AbrLsa::new();
    stale.add_neighbor(id(2, 2, 2, 2), 99);
    overlay
        .update_abr_lsa(
            foreign_abr_header(adv, INITIAL_SEQUENCE_NUMBER + 1, 0),
            stale,
            false,
            true,
        )
        .await;
    let key = foreign_abr_header(adv, 0, 0).key();
    assert_eq!(
        overlay.sequence_of(key).await,
        Some(INITIAL_SEQUENCE_NUMBER + 2)
    );
    let lsa = overlay.get(key).await.unwrap();
    if let LsaBody::Abr(body) = &lsa.body {
        assert_eq!(body.neighbors[&id(2, 2, 2, 2)], 1);
    } else {
        panic!("abr lsa body expected");
    }
}

#[tokio::test]
async fn expired_overlay_lsa_tombstoned() {
    let overlay = OverlayLsdb::new(id(1, 1, 1, 1));
    let adv = id(9, 9, 9, 9);
    let mut body = AbrLsa::new();
    body.add_neighbor(id(2, 2, 2, 2), 1);
    overlay
        .update_abr_lsa(
            foreign_abr_header(adv, INITIAL_SEQUENCE_NUMBER, MAX_AGE),
            body,
            false,
            true,
        )
        .await;
    let key = foreign_abr_header(adv, 0, 0).key();
    assert!(overlay.spf.snapshot().node(&NodeId::Router(adv)).is_some());
    let refreshed = overlay.age_tick().await;
    assert!(refreshed.is_empty());
    assert!(overlay.get(key).await.is_none());
    assert!(overlay.lookup_update(key).await.is_some());
    assert!(overlay.spf.snapshot().node(&NodeId::Router(adv)).is_none());
}

#[tokio::test]
async fn leaving_border_duty_withdraws_everything() {
    let overlay = OverlayLsdb::new(id(1, 1, 1, 1));
    let mut reachable = HashMap::new();
    reachable.insert(id(2, 2, 2, 2), 5u32);
    overlay
        .update_neighbors(id(0, 0, 0, 1), reachable)
        .await
        .unwrap();
    let mut prefixes = HashMap::new();
    prefixes.insert((v6("2001:db8:44::"), 48u8), 10u32);
    overlay
        .update_prefixes(id(0, 0, 0, 1), prefixes)
        .await
        .unwrap();

    let kills = overlay.kill_self_lsas().await;
    assert_eq!(kills.len(), 2);
    for key in &kills {
        assert!(overlay.get(*key).await.unwrap().is_dead());
    }
    let graph = overlay.spf.snapshot();
    assert!(graph.costs.is_empty());
    let root = graph.node(&NodeId::Router(id(1, 1, 1, 1))).unwrap();
    assert!(root.prefixes.is_empty());
}
