//! Integration tests for batched relation loading
//!
//! These tests drive a `UnitOfWork` over the in-memory `MockDatabase` and count
//! the queries each relation access costs.
//!
//! Test relationships:
//! - User has_many Addresses, ordered by email DESC (one-to-many)
//! - Address belongs_to User (many-to-one)
//! - User has_one UserInfo (one-to-one) / UserInfo belongs_to User
//! - User has_many children / belongs_to parent (self-referencing)
//! - User ⇄ Thing through user_to_things (many-to-many)

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use lifeguard_bulk::mock::{MockDatabase, QueryKind};
use lifeguard_bulk::model::record;
use lifeguard_bulk::{
    BatchQuery, Entity, EntityId, KeyValue, LifeError, LoadStrategy, LoaderConfig, LoaderError, ModelDef, OrderSpec,
    OwnerQuery, Record, Registry, RelationDeclaration, RelationFetcher, RelationValue, ResultRow, UnitOfWork,
};
use sea_query::Value;
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_model(ModelDef::new("User", "users", "id")).unwrap();
    registry.register_model(ModelDef::new("UserInfo", "user_infos", "id")).unwrap();
    registry.register_model(ModelDef::new("Address", "addresses", "id")).unwrap();
    registry.register_model(ModelDef::new("Thing", "things", "id")).unwrap();

    let declarations = [
        RelationDeclaration::new("User", "addresses", "Address")
            .join_on(("users", "id"), ("addresses", "user_id"))
            .order_by(OrderSpec::desc("email_address")),
        RelationDeclaration::new("Address", "user", "User").join_on(("addresses", "user_id"), ("users", "id")),
        RelationDeclaration::new("User", "children", "User").join_on(("users", "id"), ("users", "parent_id")),
        RelationDeclaration::new("User", "parent", "User").join_on(("users", "parent_id"), ("users", "id")),
        RelationDeclaration::new("User", "user_info", "UserInfo")
            .join_on(("users", "id"), ("user_infos", "user_id"))
            .uselist(false),
        RelationDeclaration::new("UserInfo", "user", "User").join_on(("user_infos", "user_id"), ("users", "id")),
        RelationDeclaration::new("User", "things", "Thing")
            .through("user_to_things")
            .join_on(("users", "id"), ("user_to_things", "user_id"))
            .secondary_join_on(("user_to_things", "thing_id"), ("things", "id")),
        RelationDeclaration::new("Thing", "users", "User")
            .through("user_to_things")
            .join_on(("things", "id"), ("user_to_things", "thing_id"))
            .secondary_join_on(("user_to_things", "user_id"), ("users", "id")),
    ];
    for declaration in declarations {
        registry.declare(declaration.bulk()).unwrap();
    }
    registry.configure().unwrap();
    registry
}

fn user(id: i32, name: &str, parent_id: Option<i32>) -> Record {
    record([("id", id.into()), ("name", name.into()), ("parent_id", Value::Int(parent_id))])
}

fn database() -> MockDatabase {
    MockDatabase::new()
        .with_table(
            "users",
            vec![
                user(7, "jack", None),
                user(8, "jack jr", Some(7)),
                user(9, "fred", Some(7)),
                user(10, "jack jr jr", Some(8)),
            ],
        )
        .with_table(
            "user_infos",
            vec![
                record([("id", 1.into()), ("user_id", 7.into()), ("details", "is cool".into())]),
                record([("id", 2.into()), ("user_id", 8.into()), ("details", "is not cool".into())]),
                record([("id", 3.into()), ("user_id", 10.into()), ("details", "is moderately cool".into())]),
            ],
        )
        .with_table(
            "addresses",
            vec![
                record([("id", 1.into()), ("user_id", 7.into()), ("email_address", "jack@bean.com".into())]),
                record([("id", 2.into()), ("user_id", 8.into()), ("email_address", "jackjr@wood.com".into())]),
                record([("id", 3.into()), ("user_id", 8.into()), ("email_address", "jackjr@bettyboop.com".into())]),
                record([("id", 4.into()), ("user_id", 8.into()), ("email_address", "jackjr@lala.com".into())]),
                record([("id", 5.into()), ("user_id", 9.into()), ("email_address", "fred@fred.com".into())]),
            ],
        )
        .with_table(
            "things",
            vec![
                record([("id", 1.into()), ("name", "dog".into())]),
                record([("id", 2.into()), ("name", "lamp".into())]),
                record([("id", 3.into()), ("name", "chair".into())]),
            ],
        )
        .with_table(
            "user_to_things",
            vec![
                record([("user_id", 7.into()), ("thing_id", 1.into())]),
                record([("user_id", 8.into()), ("thing_id", 1.into())]),
                // duplicate link on purpose
                record([("user_id", 8.into()), ("thing_id", 1.into())]),
                record([("user_id", 10.into()), ("thing_id", 2.into())]),
                record([("user_id", 9.into()), ("thing_id", 2.into())]),
                record([("user_id", 10.into()), ("thing_id", 3.into())]),
            ],
        )
}

fn users_by_id(uow: &mut UnitOfWork<'_>, ids: &[i32]) -> Vec<EntityId> {
    let mut query = OwnerQuery::new("users").order_by(OrderSpec::asc("id"));
    if !ids.is_empty() {
        query = query.filter_in("id", ids.iter().copied());
    }
    uow.load("User", query).unwrap()
}

fn int(entity: &Entity, column: &str) -> Option<i64> {
    match entity.get(column).and_then(KeyValue::from_value) {
        Some(KeyValue::Int(i)) => Some(i),
        _ => None,
    }
}

fn text(entity: &Entity, column: &str) -> String {
    match entity.get(column).and_then(KeyValue::from_value) {
        Some(KeyValue::Text(s)) => s,
        other => panic!("{column} is not text: {other:?}"),
    }
}

/// `id` column of every entity in `value`
fn ids(uow: &UnitOfWork<'_>, value: &RelationValue) -> Vec<i64> {
    value
        .ids()
        .iter()
        .map(|id| int(uow.entity(*id).unwrap(), "id").unwrap())
        .collect()
}

/// Resolved `id`s of `relation` on `owner`, without loading anything
fn committed(uow: &UnitOfWork<'_>, owner: EntityId, relation: &str) -> Vec<i64> {
    let value = uow
        .entity(owner)
        .unwrap()
        .relation(relation)
        .unwrap_or_else(|| panic!("{relation} is not resolved on {owner}"))
        .clone();
    ids(uow, &value)
}

// ============================================================================
// Cardinalities
// ============================================================================

#[test]
fn test_load_one_to_one() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);
    db.clear_log();

    for id in &users {
        assert!(!uow.entity(*id).unwrap().is_resolved("user_info"));
    }

    uow.get_relation(users[0], "user_info").unwrap();
    assert_eq!(db.query_count(), 1);
    db.clear_log();

    assert_eq!(committed(&uow, users[0], "user_info"), vec![1]);
    assert_eq!(committed(&uow, users[1], "user_info"), vec![2]);
    assert_eq!(
        uow.entity(users[2]).unwrap().relation("user_info"),
        Some(&RelationValue::One(None))
    );
    assert_eq!(committed(&uow, users[3], "user_info"), vec![3]);

    let info = uow.entity(users[0]).unwrap().relation("user_info").unwrap().as_one().unwrap();
    assert_eq!(text(uow.entity(info).unwrap(), "details"), "is cool");

    // back-references resolve from tracked users
    for (index, owner) in [(0, users[0]), (1, users[1]), (3, users[3])] {
        let info = uow.get_relation(owner, "user_info").unwrap().as_one().unwrap();
        let back = uow.get_relation(info, "user").unwrap();
        assert_eq!(back, RelationValue::One(Some(users[index])));
    }
    assert_eq!(db.query_count(), 0);
}

#[test]
fn test_only_loads_relations_on_unpopulated_models() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);
    let address = uow
        .load("Address", OwnerQuery::new("addresses").filter_eq("id", 1))
        .unwrap()[0];
    uow.set_committed_value(users[0], "addresses", RelationValue::Many(vec![address]))
        .unwrap();
    db.clear_log();

    for id in &users[1..] {
        assert!(!uow.entity(*id).unwrap().is_resolved("addresses"));
    }

    uow.get_relation(users[1], "addresses").unwrap();

    let queries = db.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].keys, vec![KeyValue::Int(8), KeyValue::Int(9), KeyValue::Int(10)]);
    assert_eq!(committed(&uow, users[0], "addresses"), vec![1]);
}

#[test]
fn test_load_one_to_many() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);
    db.clear_log();

    uow.get_relation(users[0], "addresses").unwrap();
    assert_eq!(db.query_count(), 1);
    db.clear_log();

    assert_eq!(committed(&uow, users[0], "addresses"), vec![1]);
    // ordered by email_address DESC
    assert_eq!(committed(&uow, users[1], "addresses"), vec![2, 4, 3]);
    assert_eq!(committed(&uow, users[2], "addresses"), vec![5]);
    assert_eq!(committed(&uow, users[3], "addresses"), Vec::<i64>::new());

    // back-references do not query
    for owner in &users[..3] {
        let addresses = uow.get_relation(*owner, "addresses").unwrap();
        for address in addresses.ids() {
            assert_eq!(uow.get_relation(*address, "user").unwrap().as_one(), Some(*owner));
        }
    }
    assert_eq!(db.query_count(), 0);
}

#[test]
fn test_load_many_to_one() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let addresses = uow
        .load("Address", OwnerQuery::new("addresses").order_by(OrderSpec::asc("id")))
        .unwrap();
    db.clear_log();

    for id in &addresses {
        assert!(!uow.entity(*id).unwrap().is_resolved("user"));
    }

    uow.get_relation(addresses[0], "user").unwrap();
    let queries = db.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].keys, vec![KeyValue::Int(7), KeyValue::Int(8), KeyValue::Int(9)]);
    db.clear_log();

    let expected = [7, 8, 8, 8, 9];
    for (address, user_id) in addresses.iter().zip(expected) {
        assert_eq!(committed(&uow, *address, "user"), vec![user_id]);
    }

    // addresses sharing a user share the same instance
    assert_eq!(
        uow.entity(addresses[1]).unwrap().relation("user"),
        uow.entity(addresses[3]).unwrap().relation("user")
    );
    let jack_jr = uow.entity(addresses[1]).unwrap().relation("user").unwrap().as_one().unwrap();
    assert_eq!(text(uow.entity(jack_jr).unwrap(), "name"), "jack jr");
    assert_eq!(int(uow.entity(jack_jr).unwrap(), "parent_id"), Some(7));
    assert_eq!(db.query_count(), 0);
}

#[test]
fn test_load_one_to_many_self_referencing() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[7, 8]);
    db.clear_log();

    uow.get_relation(users[0], "children").unwrap();
    assert_eq!(db.query_count(), 1);
    db.clear_log();

    assert_eq!(committed(&uow, users[0], "children"), vec![8, 9]);
    assert_eq!(committed(&uow, users[1], "children"), vec![10]);

    for owner in [users[0], users[1]] {
        let children = uow.get_relation(owner, "children").unwrap();
        for child in children.ids() {
            assert_eq!(uow.get_relation(*child, "parent").unwrap().as_one(), Some(owner));
        }
    }
    assert_eq!(db.query_count(), 0);
}

#[test]
fn test_load_many_to_one_self_referencing() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[8, 9, 10]);
    db.clear_log();

    uow.get_relation(users[0], "parent").unwrap();
    let queries = db.queries();
    assert_eq!(queries.len(), 1);
    // jack jr (8) is tracked already, only jack (7) is fetched
    assert_eq!(queries[0].keys, vec![KeyValue::Int(7)]);
    db.clear_log();

    assert_eq!(committed(&uow, users[0], "parent"), vec![7]);
    assert_eq!(committed(&uow, users[1], "parent"), vec![7]);
    assert_eq!(committed(&uow, users[2], "parent"), vec![8]);
    assert_eq!(committed(&uow, users[2], "parent"), vec![int(uow.entity(users[0]).unwrap(), "id").unwrap()]);
    assert_eq!(db.query_count(), 0);
}

#[test]
fn test_load_many_to_many() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);
    db.clear_log();

    uow.get_relation(users[0], "things").unwrap();
    assert_eq!(db.query_count(), 1);
    assert!(db.queries()[0].sql.contains("INNER JOIN \"user_to_things\""));
    db.clear_log();

    assert_eq!(committed(&uow, users[0], "things"), vec![1]);
    // the duplicate link does not duplicate the dog
    assert_eq!(committed(&uow, users[1], "things"), vec![1]);
    assert_eq!(committed(&uow, users[2], "things"), vec![2]);
    assert_eq!(committed(&uow, users[3], "things"), vec![2, 3]);

    // the dog is one instance shared by both owners
    assert_eq!(
        uow.entity(users[0]).unwrap().relation("things"),
        uow.entity(users[1]).unwrap().relation("things")
    );
    assert_eq!(db.query_count(), 0);
}

#[test]
fn test_load_many_to_many_from_other_side() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let things = uow
        .load("Thing", OwnerQuery::new("things").order_by(OrderSpec::asc("id")))
        .unwrap();
    db.clear_log();

    let dog_owners = uow.get_relation(things[0], "users").unwrap();
    assert_eq!(db.query_count(), 1);
    assert_eq!(ids(&uow, &dog_owners), vec![7, 8]);
    assert_eq!(committed(&uow, things[1], "users"), vec![10, 9]);
    assert_eq!(committed(&uow, things[2], "users"), vec![10]);
}

// ============================================================================
// Query budget
// ============================================================================

#[test]
fn test_hundred_owners_take_two_queries() {
    let mut db = MockDatabase::new();
    let mut expected = Vec::new();
    let mut next_address = 1i32;
    for id in 1..=100 {
        let name: String = Name().fake();
        db.insert("users", user(id, &name, None));

        let count = (0..4usize).fake::<usize>();
        for _ in 0..count {
            let email: String = SafeEmail().fake();
            db.insert(
                "addresses",
                record([
                    ("id", next_address.into()),
                    ("user_id", id.into()),
                    ("email_address", email.into()),
                ]),
            );
            next_address += 1;
        }
        expected.push(count);
    }

    let registry = registry();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);
    assert_eq!(users.len(), 100);

    uow.get_relation(users[0], "addresses").unwrap();
    for user in &users {
        uow.get_relation(*user, "addresses").unwrap();
    }

    assert_eq!(db.query_count(), 2);
    assert_eq!(db.batch_queries()[0].keys.len(), 100);
    for (user, count) in users.iter().zip(expected) {
        assert_eq!(committed(&uow, *user, "addresses").len(), count);
    }
    let report = &uow.reports()[0];
    assert_eq!(report.owners, 100);
    assert!(report.queried);
}

#[test]
fn test_hundred_to_one_owners_take_two_queries() {
    let mut db = MockDatabase::new();
    for id in 1..=25 {
        let name: String = Name().fake();
        db.insert("users", user(id, &name, None));
    }
    for id in 1..=100i32 {
        let email: String = SafeEmail().fake();
        db.insert(
            "addresses",
            record([
                ("id", id.into()),
                ("user_id", ((id - 1) % 25 + 1).into()),
                ("email_address", email.into()),
            ]),
        );
    }

    let registry = registry();
    let mut uow = UnitOfWork::new(&registry, &db);
    let addresses = uow
        .load("Address", OwnerQuery::new("addresses").order_by(OrderSpec::asc("id")))
        .unwrap();
    assert_eq!(addresses.len(), 100);
    assert!(uow.entities_of("User").is_empty());

    for address in &addresses {
        assert!(matches!(uow.get_relation(*address, "user").unwrap(), RelationValue::One(Some(_))));
    }

    assert_eq!(db.query_count(), 2);
    let batches = db.batch_queries();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].keys, (1..=25).map(KeyValue::Int).collect::<Vec<_>>());
    // user_id is an INT4 column and is bound as one
    assert_eq!(batches[0].values, (1..=25).map(|id| Value::Int(Some(id))).collect::<Vec<_>>());

    for (index, address) in addresses.iter().enumerate() {
        let expected = (index as i64) % 25 + 1;
        assert_eq!(committed(&uow, *address, "user"), vec![expected]);
    }
    assert_eq!(uow.entities_of("User").len(), 25);
    assert_eq!(uow.reports()[0].owners, 100);
}

#[test]
fn test_resolved_relation_is_not_refetched() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);
    db.clear_log();

    let first = uow.get_relation(users[2], "addresses").unwrap();
    let second = uow.get_relation(users[2], "addresses").unwrap();
    assert_eq!(first, second);
    uow.get_relation(users[3], "addresses").unwrap();
    assert_eq!(db.query_count(), 1);
}

#[test]
fn test_siblings_loaded_later_join_the_next_batch() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let early = users_by_id(&mut uow, &[7]);
    uow.get_relation(early[0], "addresses").unwrap();

    let late = users_by_id(&mut uow, &[8, 9]);
    db.clear_log();
    uow.get_relation(late[0], "addresses").unwrap();

    let batches = db.batch_queries();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].keys, vec![KeyValue::Int(8), KeyValue::Int(9)]);
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn test_relations_are_isolated_from_each_other() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);

    uow.get_relation(users[0], "addresses").unwrap();
    for user in &users {
        assert!(uow.entity(*user).unwrap().is_resolved("addresses"));
        assert!(!uow.entity(*user).unwrap().is_resolved("user_info"));
        assert!(!uow.entity(*user).unwrap().is_resolved("things"));
    }
}

#[test]
fn test_units_of_work_are_isolated() {
    let registry = registry();
    let db = database();
    let mut first = UnitOfWork::new(&registry, &db);
    let mut second = UnitOfWork::new(&registry, &db);
    let first_users = users_by_id(&mut first, &[]);
    let second_users = users_by_id(&mut second, &[]);
    db.clear_log();

    first.get_relation(first_users[0], "addresses").unwrap();
    for user in &second_users {
        assert!(!second.entity(*user).unwrap().is_resolved("addresses"));
    }

    second.get_relation(second_users[1], "addresses").unwrap();
    assert_eq!(db.batch_queries().len(), 2);
}

#[test]
fn test_units_of_work_on_coroutines() {
    may::config().set_stack_size(0x10000);
    let registry = Arc::new(registry());
    let db = Arc::new(database());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let db = Arc::clone(&db);
            may::go!(move || {
                let mut uow = UnitOfWork::new(&registry, &*db);
                let users = users_by_id(&mut uow, &[]);
                let trigger = users[i % users.len()];
                uow.get_relation(trigger, "addresses").unwrap();
                users
                    .iter()
                    .map(|user| uow.entity(*user).unwrap().relation("addresses").map(|v| v.ids().len()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        let counts = handle.join().unwrap();
        assert_eq!(counts, vec![Some(1), Some(3), Some(1), Some(0)]);
    }
    // one owner query plus one batch per coroutine
    assert_eq!(db.query_count(), 8);
    assert_eq!(db.batch_queries().len(), 4);
}

// ============================================================================
// Pending entities, eager strategies, default strategy
// ============================================================================

#[test]
fn test_pending_entities_are_not_siblings() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[7, 8]);
    let pending = uow.add("User", user(11, "new kid", None)).unwrap();
    db.clear_log();

    uow.get_relation(users[0], "addresses").unwrap();
    assert_eq!(db.batch_queries()[0].keys, vec![KeyValue::Int(7), KeyValue::Int(8)]);
    assert!(!uow.entity(pending).unwrap().is_resolved("addresses"));

    // accessed directly, the pending entity resolves alone
    assert_eq!(uow.get_relation(pending, "addresses").unwrap(), RelationValue::Many(vec![]));
    assert_eq!(db.batch_queries()[1].keys, vec![KeyValue::Int(11)]);
}

#[test]
fn test_null_keys_need_no_query() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let jack = users_by_id(&mut uow, &[7]);
    db.clear_log();

    assert_eq!(uow.get_relation(jack[0], "parent").unwrap(), RelationValue::One(None));
    assert_eq!(db.query_count(), 0);
    assert!(!uow.reports()[0].queried);
}

#[test]
fn test_eager_relations_resolve_with_the_owners() {
    let mut registry = Registry::new();
    registry.register_model(ModelDef::new("User", "users", "id")).unwrap();
    registry.register_model(ModelDef::new("Address", "addresses", "id")).unwrap();
    registry
        .declare(
            RelationDeclaration::new("User", "addresses", "Address")
                .join_on(("users", "id"), ("addresses", "user_id"))
                .order_by(OrderSpec::desc("email_address"))
                .strategy(LoadStrategy::EagerSubquery),
        )
        .unwrap();
    registry.configure().unwrap();

    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);

    assert_eq!(db.query_count(), 2);
    assert_eq!(db.queries()[0].kind, QueryKind::Owners);
    assert_eq!(committed(&uow, users[1], "addresses"), vec![2, 4, 3]);

    db.clear_log();
    uow.get_relation(users[3], "addresses").unwrap();
    assert_eq!(db.query_count(), 0);
}

#[test]
fn test_default_strategy_loads_one_entity_per_query() {
    let mut registry = Registry::new();
    registry.register_model(ModelDef::new("User", "users", "id")).unwrap();
    registry.register_model(ModelDef::new("Address", "addresses", "id")).unwrap();
    registry
        .declare(
            RelationDeclaration::new("User", "addresses", "Address").join_on(("users", "id"), ("addresses", "user_id")),
        )
        .unwrap();

    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);
    db.clear_log();

    for user in &users {
        uow.get_relation(*user, "addresses").unwrap();
    }
    assert_eq!(db.batch_queries().len(), users.len());
    assert_eq!(committed(&uow, users[1], "addresses"), vec![2, 4, 3]);
    assert_eq!(uow.reports().len(), users.len());
}

// ============================================================================
// Failures and anomalies
// ============================================================================

#[test]
fn test_data_access_failure_propagates() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);

    db.fail_next("connection reset by peer");
    let err = uow.get_relation(users[0], "addresses").unwrap_err();
    assert!(matches!(err, LoaderError::DataAccess(LifeError::QueryError(ref m)) if m.contains("connection reset")));
    for user in &users {
        assert!(!uow.entity(*user).unwrap().is_resolved("addresses"));
    }

    db.clear_log();
    uow.get_relation(users[0], "addresses").unwrap();
    assert_eq!(db.query_count(), 1);
    assert_eq!(committed(&uow, users[1], "addresses"), vec![2, 4, 3]);
}

/// Returns the rows of the wrapped database plus one row for an owner nobody asked for
struct LeakyFetcher {
    inner: MockDatabase,
}

impl RelationFetcher for LeakyFetcher {
    fn fetch_batch(&self, query: &BatchQuery) -> Result<Vec<ResultRow>, LifeError> {
        let mut rows = self.inner.fetch_batch(query)?;
        rows.push(ResultRow::new(
            Some(KeyValue::Int(99)),
            record([("id", 99.into()), ("user_id", 99.into()), ("email_address", "ghost@example.com".into())]),
        ));
        Ok(rows)
    }

    fn fetch_owners(&self, query: &OwnerQuery) -> Result<Vec<Record>, LifeError> {
        self.inner.fetch_owners(query)
    }
}

#[test]
fn test_orphan_rows_are_reported_not_fatal() {
    let registry = registry();
    let fetcher = LeakyFetcher { inner: database() };
    let config = LoaderConfig {
        report_orphan_rows: false,
        ..LoaderConfig::default()
    };
    let mut uow = UnitOfWork::with_config(&registry, &fetcher, config);
    let users = users_by_id(&mut uow, &[]);

    uow.get_relation(users[0], "addresses").unwrap();
    assert_eq!(committed(&uow, users[1], "addresses"), vec![2, 4, 3]);

    let report = &uow.reports()[0];
    assert_eq!(report.orphan_rows, 1);
    assert_eq!(report.orphan_keys, vec![KeyValue::Int(99)]);
    assert_eq!(report.owners, 4);
    assert_eq!(uow.entities_of("Address").len(), 5);
}

#[test]
fn test_expunged_sibling_is_left_out() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[]);
    uow.expunge(users[2]).unwrap();
    db.clear_log();

    uow.get_relation(users[0], "addresses").unwrap();
    assert_eq!(
        db.batch_queries()[0].keys,
        vec![KeyValue::Int(7), KeyValue::Int(8), KeyValue::Int(10)]
    );
    assert!(matches!(
        uow.get_relation(users[2], "addresses"),
        Err(LoaderError::UnknownEntity(_))
    ));
}

#[test]
fn test_unknown_relation() {
    let registry = registry();
    let db = database();
    let mut uow = UnitOfWork::new(&registry, &db);
    let users = users_by_id(&mut uow, &[7]);
    assert!(matches!(
        uow.get_relation(users[0], "pets"),
        Err(LoaderError::UnknownRelation { .. })
    ));
}
