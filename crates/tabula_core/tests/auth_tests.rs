//! Integration tests for user checks against a bucket.

use tabula_core::auth::{check_user, is_authorized, Access, AccessGate, Role, RoleRegistry, User};
use tabula_core::{Bucket, Db, Model, RecordId, Table};

fn users(db: &Db) -> Bucket<User> {
    let users = db.bucket("users", User::default()).unwrap();
    User::new("root", "toor", Role::admin()).save(&users).unwrap();
    User::new("ann", "secret", Role::default()).save(&users).unwrap();
    users
}

fn token(login: &str, password: &str) -> String {
    serde_json::json!({ "login": login, "password": password }).to_string()
}

#[test]
fn saved_user_without_role_becomes_guest() {
    let db = Db::open_in_memory().unwrap();
    let users = users(&db);
    let ann = users.get(&RecordId::Seq(2)).unwrap();
    assert_eq!(ann.role, Role::guest());
    assert_eq!(ann.login, "ann");
}

#[test]
fn valid_credentials_return_stored_user() {
    let db = Db::open_in_memory().unwrap();
    let users = users(&db);
    let roles = RoleRegistry::new();

    let user = check_user(&users, &roles, &token("root", "toor")).unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(user.role, Role::admin());
    assert!(is_authorized(&users, &roles, &token("ann", "secret")));
}

#[test]
fn bad_tokens_are_rejected() {
    let db = Db::open_in_memory().unwrap();
    let users = users(&db);
    let roles = RoleRegistry::new();

    assert!(check_user(&users, &roles, "").is_none());
    assert!(check_user(&users, &roles, "not json").is_none());
    assert!(check_user(&users, &roles, &token("root", "wrong")).is_none());
    assert!(check_user(&users, &roles, &token("nobody", "toor")).is_none());
}

#[test]
fn role_is_resolved_through_registry() {
    let db = Db::open_in_memory().unwrap();
    let users = db.bucket("users", User::default()).unwrap();
    User::new("ed", "pw", Role::new("editor", 5)).save(&users).unwrap();

    let mut roles = RoleRegistry::new();
    roles.register(Role::new("editor", 50));
    let user = check_user(&users, &roles, &token("ed", "pw")).unwrap();
    assert_eq!(user.role.access, 50);

    // Unregistered roles keep their stored definition.
    let user = check_user(&users, &RoleRegistry::new(), &token("ed", "pw")).unwrap();
    assert_eq!(user.role.access, 5);
}

#[test]
fn gate_allows_public_paths_and_valid_users() {
    let db = Db::open_in_memory().unwrap();
    let users = users(&db);
    let roles = RoleRegistry::new();
    let gate = AccessGate::new();

    assert_eq!(gate.check(&users, &roles, "/login", ""), Access::Allowed(None));
    assert_eq!(
        gate.check(&users, &roles, "/admin", ""),
        Access::Redirect("/login".to_string())
    );
    match gate.check(&users, &roles, "/admin", &token("root", "toor")) {
        Access::Allowed(Some(user)) => assert_eq!(user.login, "root"),
        other => panic!("unexpected {other:?}"),
    }

    let strict = AccessGate::new()
        .with_public_paths(["/health"])
        .with_login_path("/signin");
    assert_eq!(
        strict.check(&users, &roles, "/", ""),
        Access::Redirect("/signin".to_string())
    );
}

#[test]
fn failed_save_leaves_user_unprepared() {
    let db = Db::open_in_memory().unwrap();
    let users = db.bucket("users", User::default()).unwrap();
    db.close().unwrap();

    let mut user = User::new("ann", "pw", Role::default());
    assert!(user.save(&users).is_err());
    assert!(user.role.name.is_empty());
    assert_eq!(user.id, 0);
}

#[test]
fn successful_save_applies_prepare_to_caller() {
    let db = Db::open_in_memory().unwrap();
    let users = db.bucket("users", User::default()).unwrap();

    let mut user = User::new("ann", "pw", Role::default());
    user.save(&users).unwrap();
    assert_eq!(user.role, Role::guest());
    assert_eq!(user.id, 1);
}
