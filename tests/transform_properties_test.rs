use chrono::{TimeZone, Utc};
use placeholder_etl::core::{EntityKind, RawRecord};
use placeholder_etl::domain::model::{PostCategory, RejectReason};
use placeholder_etl::transform::metrics::{post_category, word_count};
use placeholder_etl::transform::record::{transform_post, transform_user, USERNAME_MAX_LEN};
use placeholder_etl::transform::{BatchOptions, BatchTransformer, TransformContext};
use proptest::prelude::*;
use serde_json::{json, Value};

fn ctx() -> TransformContext {
    TransformContext::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
}

fn record(value: Value) -> RawRecord {
    RawRecord::from_value(value).unwrap()
}

fn coordinate() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("not a number")),
        (-90.0f64..90.0).prop_map(|f| json!(f.to_string())),
        (-180.0f64..180.0).prop_map(|f| json!(f)),
    ]
}

fn optional_id() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        Just(Some(json!("abc"))),
        (1i64..10_000).prop_map(|id| Some(json!(id))),
        (1i64..10_000).prop_map(|id| Some(json!(id.to_string()))),
    ]
}

fn coerces(value: &Option<Value>) -> bool {
    match value {
        Some(Value::Number(_)) => true,
        Some(Value::String(s)) => s.parse::<i64>().is_ok(),
        _ => false,
    }
}

proptest! {
    #[test]
    fn has_coordinates_iff_both_present(lat in coordinate(), lng in coordinate()) {
        let raw = record(json!({"id": 1, "address": {"geo": {"lat": lat, "lng": lng}}}));
        let user = transform_user(&raw, &ctx()).unwrap();
        prop_assert_eq!(user.has_coordinates, user.lat.is_some() && user.lng.is_some());
    }

    #[test]
    fn post_without_ids_is_rejected(id in optional_id(), user_id in optional_id()) {
        let mut data = serde_json::Map::new();
        if let Some(id) = &id {
            data.insert("id".to_string(), id.clone());
        }
        if let Some(user_id) = &user_id {
            data.insert("userId".to_string(), user_id.clone());
        }
        data.insert("body".to_string(), json!("some body"));

        let result = transform_post(&RawRecord::new(data), &ctx());
        match (coerces(&id), coerces(&user_id)) {
            (false, _) => prop_assert_eq!(result.unwrap_err(), RejectReason::MissingId),
            (true, false) => prop_assert_eq!(result.unwrap_err(), RejectReason::MissingUserId),
            (true, true) => prop_assert!(result.is_ok()),
        }
    }

    #[test]
    fn category_follows_body_length(body in "[a-z ]{0,300}") {
        let raw = record(json!({"id": 1, "userId": 1, "body": body}));
        let post = transform_post(&raw, &ctx()).unwrap();

        let expected = match post.body_length {
            0..=99 => PostCategory::Short,
            100..=200 => PostCategory::Medium,
            _ => PostCategory::Long,
        };
        prop_assert_eq!(post.post_category, expected);
        prop_assert_eq!(post.post_category, post_category(post.body_length));
        prop_assert_eq!(post.word_count, word_count(&post.body));
        prop_assert_eq!(post.body_length, post.body.chars().count());
    }

    #[test]
    fn transformation_is_deterministic(
        username in "\\PC{0,150}",
        email in "[A-Za-z]{1,10}@[A-Za-z]{1,10}\\.[a-z]{2,3}",
    ) {
        let raw = record(json!({"id": 3, "username": username, "email": email}));
        let first = transform_user(&raw, &ctx()).unwrap();
        let second = transform_user(&raw, &ctx()).unwrap();
        prop_assert_eq!(&first, &second);

        prop_assert!(first.username.chars().count() <= USERNAME_MAX_LEN);
        prop_assert!(username.starts_with(first.username.as_str()));
        prop_assert_eq!(first.email.clone(), email.to_lowercase());
    }

    #[test]
    fn parallel_batch_matches_sequential(ids in proptest::collection::vec(optional_id(), 0..200)) {
        let records: Vec<RawRecord> = ids
            .into_iter()
            .map(|id| {
                let mut data = serde_json::Map::new();
                if let Some(id) = id {
                    data.insert("id".to_string(), id);
                }
                RawRecord::new(data)
            })
            .collect();

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let parallel = BatchTransformer::new(now)
            .with_options(BatchOptions {
                parallel: true,
                chunk_size: 7,
            })
            .transform_users(&records);
        let sequential = BatchTransformer::new(now)
            .with_options(BatchOptions::sequential())
            .transform_users(&records);

        prop_assert_eq!(&parallel.processed, &sequential.processed);
        prop_assert_eq!(&parallel.rejected, &sequential.rejected);
        prop_assert_eq!(parallel.total_seen(), records.len());
    }
}

#[test]
fn username_is_truncated_to_limit() {
    let raw = record(json!({"id": 1, "username": "u".repeat(150)}));
    let user = transform_user(&raw, &ctx()).unwrap();
    assert_eq!(user.username, "u".repeat(100));
}

#[test]
fn jsonplaceholder_user_end_to_end() {
    let raw = record(json!({
        "id": 1,
        "username": "Bret",
        "email": "Sincere@april.biz",
        "address": {"geo": {"lat": "-37.35", "lng": "144.0"}}
    }));
    let user = transform_user(&raw, &ctx()).unwrap();

    assert_eq!(user.user_id, 1);
    assert_eq!(user.username, "Bret");
    assert_eq!(user.email, "sincere@april.biz");
    assert_eq!(user.email_domain, "april.biz");
    assert_eq!(user.lat, Some(-37.35));
    assert_eq!(user.lng, Some(144.0));
    assert!(user.has_coordinates);
    assert_eq!(user.company_name, "");
}

#[test]
fn kind_dispatch_rejects_post_without_author() {
    let records = vec![
        record(json!({"id": 1, "userId": 1, "title": "  hello  ", "body": ""})),
        record(json!({"id": 2, "title": "orphan"})),
    ];
    let batch = BatchTransformer::new(Utc::now()).transform(&records, EntityKind::Post);

    assert_eq!(batch.processed.len(), 1);
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].index, 1);
    assert_eq!(batch.rejected[0].reason, RejectReason::MissingUserId);
}
