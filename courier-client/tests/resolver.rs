mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use courier_client::peers::{ChannelInfo, ObservedChat, ObservedUser, UserInfo};
use courier_client::{
    CancellationToken, Error, ErrorKind, PeerCache, PeerHandle, PeerKey, PeerKind, ResolvedPeer,
    Resolver, SessionClient,
};

use common::{MockClient, alice};

fn resolver(client: MockClient, cache: &PeerCache) -> Resolver {
    let client: Arc<dyn SessionClient> = Arc::new(client);
    Resolver::new(client, cache.clone(), CancellationToken::new())
}

#[tokio::test]
async fn numeric_ids_probe_user_then_chat_then_channel() {
    let cache = PeerCache::in_memory();
    cache.add(&PeerHandle::channel(42, 2)).unwrap();
    let r = resolver(MockClient::cached(), &cache);
    assert_eq!(r.resolve("42").await.unwrap().kind, PeerKind::Channel);

    cache.add(&PeerHandle::chat(42)).unwrap();
    assert_eq!(r.resolve("42").await.unwrap().kind, PeerKind::Chat);

    cache.add(&PeerHandle::user(42, 1)).unwrap();
    for _ in 0..3 {
        let h = r.resolve("42").await.unwrap();
        assert_eq!(h.key(), PeerKey::user(42));
        assert_eq!(h.access_hash, 1);
    }
}

#[tokio::test]
async fn username_then_id_hits_network_once() {
    let client = MockClient::cached().with_user("alice", alice());
    let calls  = client.calls();
    let cache  = PeerCache::in_memory();
    let r      = resolver(client, &cache);

    let by_name = r.resolve("@alice").await.unwrap();
    assert_eq!(by_name.key(), PeerKey::user(42));
    assert_eq!(by_name.access_hash, 4242);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let by_id = r.resolve("42").await.unwrap();
    assert_eq!(by_id, by_name);
    assert_eq!(r.resolve(" 42\t").await.unwrap(), by_name);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unseen_id_is_not_found_without_network() {
    let client = MockClient::cached();
    let calls  = client.calls();
    let r      = resolver(client, &PeerCache::in_memory());

    let err = r.resolve("999").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "peer 999 not found in local storage");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bare_and_padded_names_go_to_directory() {
    let client = MockClient::cached().with_user("alice", alice());
    let calls  = client.calls();
    let r      = resolver(client, &PeerCache::in_memory());

    assert_eq!(r.resolve("alice").await.unwrap().id, 42);
    assert_eq!(r.resolve("  @alice\n").await.unwrap().id, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_name_carries_directory_error() {
    let r = resolver(MockClient::cached(), &PeerCache::in_memory());

    match r.resolve("@ghost").await {
        Err(Error::NotFound { identifier, source: Some(e) }) => {
            assert_eq!(identifier, "@ghost");
            assert!(e.is("USERNAME_NOT_OCCUPIED"));
        }
        other => panic!("unexpected: {other:?}"),
    }

    let err = r.resolve("@ghost").await.unwrap_err();
    assert_eq!(err.to_string(), "resolve @ghost: RPC 400: USERNAME_NOT_OCCUPIED");
}

#[tokio::test]
async fn empty_name_is_not_looked_up() {
    let client = MockClient::cached();
    let calls  = client.calls();
    let r      = resolver(client, &PeerCache::in_memory());

    assert!(matches!(r.resolve("@").await, Err(Error::NotFound { source: None, .. })));
    assert!(matches!(r.resolve("   ").await, Err(Error::NotFound { source: None, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn hashless_directory_answer_falls_back_to_cache() {
    let stale = UserInfo { access_hash: None, ..alice() };
    let client = MockClient::cached().with_user("alice", stale);
    let cache  = PeerCache::in_memory();
    cache.add(&PeerHandle::user(42, 4242)).unwrap();

    let r = resolver(client, &cache);
    assert_eq!(r.resolve("@alice").await.unwrap().access_hash, 4242);
}

#[tokio::test]
async fn observed_peers_become_resolvable_by_id() {
    let cache = PeerCache::in_memory();
    let r     = resolver(MockClient::cached(), &cache);

    let chats = [ObservedChat::Channel(ChannelInfo {
        id:          -1001,
        access_hash: Some(55),
        title:       "Ops".into(),
        username:    None,
    })];
    let users = [ObservedUser::User(alice()), ObservedUser::Empty(7)];

    assert_eq!(r.store_peers(&chats, &users), 2);
    assert_eq!(r.store_peers(&chats, &users), 2);
    assert_eq!(cache.len().unwrap(), 2);

    let channel = r.resolve("-1001").await.unwrap();
    assert_eq!(channel.kind, PeerKind::Channel);
    assert_eq!(channel.display_name(), "Ops");
    assert!(r.resolve("7").await.is_err());
}

#[tokio::test]
async fn directory_response_entities_are_all_cached() {
    let mut client = MockClient::cached();
    client.directory.insert("ops".into(), ResolvedPeer {
        peer:  Some(PeerKey::channel(5)),
        users: vec![ObservedUser::User(alice())],
        chats: vec![ObservedChat::Channel(ChannelInfo {
            id:          5,
            access_hash: Some(9),
            title:       "Ops".into(),
            username:    Some("ops".into()),
        })],
    });
    let cache = PeerCache::in_memory();
    let r     = resolver(client, &cache);

    let h = r.resolve("@ops").await.unwrap();
    assert_eq!(h.display_name(), "@ops");
    assert!(cache.find(PeerKey::user(42)).is_ok());
}
