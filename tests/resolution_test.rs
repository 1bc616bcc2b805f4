use potion::mock::MockTransport;
use potion::{Entity, EntityId, Potion, PotionError, ResourceOptions, Value};
use serde_json::json;

fn client() -> (Potion, MockTransport) {
    let transport = MockTransport::new();
    let potion = Potion::new(transport.clone());
    potion
        .register(
            "/user",
            ResourceOptions::new()
                .readonly(["createdAt"])
                .lazy(["friends", "bestFriend"]),
        )
        .expect("register /user");
    (potion, transport)
}

fn entity(value: &Value) -> Entity {
    value.as_entity().expect("not an entity").clone()
}

/// Resolving the same URI twice, in separate payloads, yields one instance.
#[tokio::test]
async fn test_identity_across_payloads() {
    let (potion, _) = client();

    let first = potion
        .resolve(&json!({"$uri": "/user/1", "name": "John"}))
        .await
        .unwrap();
    let second = potion
        .resolve(&json!({"$uri": "/user/1", "email": "john@example.com"}))
        .await
        .unwrap();

    let user = entity(&first);
    assert_eq!(user, entity(&second));
    // Merged, not replaced.
    assert_eq!(user.get("name").unwrap().as_str(), Some("John"));
    assert_eq!(user.get("email").unwrap().as_str(), Some("john@example.com"));
}

#[tokio::test]
async fn test_user_payload_with_date() {
    let (potion, transport) = client();
    let value = potion
        .resolve(&json!({
            "$uri": "/user/1",
            "name": "John Doe",
            "created_at": {"$date": 1451060269000_i64},
        }))
        .await
        .unwrap();

    let user = entity(&value);
    assert_eq!(user.id(), &EntityId::Int(1));
    assert_eq!(user.resource().prefix(), "/user");
    assert_eq!(
        user.get("createdAt").unwrap().as_date().unwrap().timestamp_millis(),
        1451060269000
    );
    assert_eq!(
        potion.encoder().entity_payload(&user),
        json!({"name": "John Doe"})
    );
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_type_and_id_identity() {
    let (potion, _) = client();
    let value = potion
        .resolve(&json!([
            {"$type": "user", "$id": 4, "name": "Four"},
            {"$uri": "/user/4"},
            {"$type": "user", "$id": "abc"},
        ]))
        .await
        .unwrap();

    let items = value.as_array().unwrap();
    let four = entity(&items[0]);
    assert_eq!(four.uri(), "/user/4");
    assert_eq!(four, entity(&items[1]));
    assert_eq!(entity(&items[2]).id(), &EntityId::Str("abc".into()));
}

/// Two resources of one payload referring to each other need no requests.
#[tokio::test]
async fn test_cycle_within_payload() {
    let (potion, transport) = client();
    let value = potion
        .resolve(&json!([
            {"$uri": "/user/1", "partner": {"$ref": "/user/2"}},
            {"$uri": "/user/2", "partner": {"$ref": "/user/1"}},
        ]))
        .await
        .unwrap();

    let items = value.as_array().unwrap();
    let (a, b) = (entity(&items[0]), entity(&items[1]));
    assert_eq!(entity(&a.get("partner").unwrap()), b);
    assert_eq!(entity(&b.get("partner").unwrap()), a);
    assert_eq!(transport.request_count(), 0);
}

/// A cycle spanning two fetches terminates with one request per URI.
#[tokio::test]
async fn test_cycle_across_fetches() {
    let (potion, transport) = client();
    transport
        .expect_get("/user/1")
        .return_ok(json!({"$uri": "/user/1", "name": "A", "partner": {"$ref": "/user/2"}}));
    transport
        .expect_get("/user/2")
        .return_ok(json!({"$uri": "/user/2", "name": "B", "partner": {"$ref": "/user/1"}}));

    let a = entity(&potion.get("/user/1").await.unwrap());
    let b = entity(&a.get("partner").unwrap());

    assert_eq!(b.get("name").unwrap().as_str(), Some("B"));
    assert_eq!(entity(&b.get("partner").unwrap()), a);
    assert_eq!(transport.request_count(), 2);
    transport.verify();
}

#[tokio::test]
async fn test_lazy_properties() {
    let (potion, transport) = client();
    transport
        .expect_get("/user/2")
        .return_ok(json!({"$uri": "/user/2", "name": "Bob"}));

    let value = potion
        .resolve(&json!({
            "$uri": "/user/1",
            "best_friend": {"$ref": "/user/2"},
            "friends": [{"$ref": "/user/1"}, {"$uri": "/user/3", "name": "Carol"}],
        }))
        .await
        .unwrap();
    let user = entity(&value);

    // Nothing resolved yet.
    let friends = user.get("friends").unwrap().as_lazy().unwrap().clone();
    let best = user.get("bestFriend").unwrap().as_lazy().unwrap().clone();
    assert!(!friends.is_started());
    assert!(!potion.cache().has("/user/3"));
    assert_eq!(best.reference(), Some("/user/2"));
    assert_eq!(transport.request_count(), 0);

    // Lazy arrays resolve against the enclosing payload.
    let list = friends.load().await.unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(entity(&list[0]), user);
    assert_eq!(entity(&list[1]).get("name").unwrap().as_str(), Some("Carol"));
    assert_eq!(transport.request_count(), 0);

    // Lazy references fetch once.
    let bob = entity(&best.load().await.unwrap());
    assert_eq!(entity(&best.load().await.unwrap()), bob);
    assert_eq!(bob.get("name").unwrap().as_str(), Some("Bob"));
    assert_eq!(transport.request_count(), 1);

    // A loaded lazy reference is written back as a reference.
    assert_eq!(
        potion.encoder().entity_payload(&user)["best_friend"],
        json!({"$ref": "/user/2"})
    );
    transport.verify();
}

#[tokio::test]
async fn test_prefix_boundaries() {
    let transport = MockTransport::new();
    let potion = Potion::new(transport);
    potion.register("/foo", ResourceOptions::new()).unwrap();
    potion.register("/foo_bar", ResourceOptions::new()).unwrap();

    let value = potion
        .resolve(&json!([{"$uri": "/foo_bar/1"}, {"$uri": "/foo/1"}]))
        .await
        .unwrap();
    let items = value.as_array().unwrap();
    assert_eq!(entity(&items[0]).resource().prefix(), "/foo_bar");
    assert_eq!(entity(&items[1]).resource().prefix(), "/foo");
}

#[tokio::test]
async fn test_unresolvable_payloads() {
    let (potion, _) = client();

    let err = potion
        .resolve(&json!({"$uri": "/group/1"}))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PotionError::UnknownResource {
            uri: "/group/1".into()
        }
    );

    let err = potion
        .resolve(&json!({"owner": {"$ref": "#"}}))
        .await
        .unwrap_err();
    assert!(matches!(err, PotionError::UnresolvedReference { .. }));
}

/// A failed resolution leaves no empty entities behind, and keeps cached ones.
#[tokio::test]
async fn test_failed_resolution_rolls_back_new_entities() {
    let (potion, _) = client();
    potion
        .resolve(&json!({"$uri": "/user/9", "name": "Kept"}))
        .await
        .unwrap();

    let err = potion
        .resolve(&json!([
            {"$uri": "/user/9", "name": "Changed"},
            {"$uri": "/user/10"},
            {"$uri": "/group/1"},
        ]))
        .await
        .unwrap_err();
    assert!(matches!(err, PotionError::UnknownResource { .. }));

    assert!(!potion.cache().has("/user/10"));
    let kept = potion.cache().entity("/user/9").unwrap();
    assert_eq!(kept.get("name").unwrap().as_str(), Some("Kept"));
}
