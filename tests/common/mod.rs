//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use lazyguard::query::Client;
use lazyguard::schema::{Field, Model, Relation, Schema};
use serde_json::json;

/// Roles, users with profiles and groups, posts with tags.
pub fn schema() -> Schema {
    Schema::builder()
        .model(Model::new("Role").field(Field::id("id")).field(Field::scalar("name")))
        .model(
            Model::new("User")
                .field(Field::id("id"))
                .field(Field::scalar("name"))
                .field(Field::scalar("email"))
                .field(Field::scalar("nickname").nullable())
                .relation(
                    Relation::foreign_key("role", "Role")
                        .related_name("users")
                        .nullable(),
                )
                .relation(Relation::many_to_many("groups", "Group").related_name("members")),
        )
        .model(Model::new("Group").field(Field::id("id")).field(Field::scalar("name")))
        .model(
            Model::new("Profile")
                .field(Field::id("id"))
                .field(Field::scalar("bio"))
                .relation(Relation::one_to_one("user", "User")),
        )
        .model(
            Model::new("Post")
                .field(Field::id("id"))
                .field(Field::scalar("title"))
                .field(Field::scalar("published"))
                .relation(Relation::foreign_key("author", "User").related_name("posts"))
                .relation(Relation::many_to_many("tags", "Tag").related_name("posts")),
        )
        .model(Model::new("Tag").field(Field::id("id")).field(Field::scalar("label")))
        .build()
        .expect("fixture schema is valid")
}

/// A client with fixture rows and an empty query log.
///
/// | id | user | role | groups | posts |
/// |---|---|---|---|---|
/// | 1 | ann | admin | staff, ops | first, second |
/// | 2 | bob | admin | staff | third |
/// | 3 | cy | - | - | - |
/// | 4 | dee | guest | - | - |
pub fn client() -> Client {
    lazyguard::install();

    let client = Client::new(schema());
    seed(&client);
    client.reset_queries();
    client
}

pub fn seed(client: &Client) {
    for name in ["admin", "guest"] {
        client.insert("Role", json!({ "name": name })).expect("role");
    }
    for name in ["staff", "ops"] {
        client.insert("Group", json!({ "name": name })).expect("group");
    }
    for (name, role) in [("ann", json!(1)), ("bob", json!(1)), ("cy", json!(null)), ("dee", json!(2))] {
        client
            .insert(
                "User",
                json!({
                    "name": name,
                    "email": format!("{name}@example.com"),
                    "nickname": "",
                    "role_id": role,
                }),
            )
            .expect("user");
    }
    client.link("User", "groups", 1, 1).expect("link");
    client.link("User", "groups", 1, 2).expect("link");
    client.link("User", "groups", 2, 1).expect("link");

    client
        .insert("Profile", json!({ "bio": "hello", "user_id": 1 }))
        .expect("profile");

    for (title, published, author) in [
        ("first", "2023-01-05", 1),
        ("second", "2023-02-10", 1),
        ("third", "2024-03-01", 2),
    ] {
        client
            .insert(
                "Post",
                json!({ "title": title, "published": published, "author_id": author }),
            )
            .expect("post");
    }
    for label in ["rust", "orm"] {
        client.insert("Tag", json!({ "label": label })).expect("tag");
    }
    client.link("Post", "tags", 1, 1).expect("link");
    client.link("Post", "tags", 1, 2).expect("link");
    client.link("Tag", "posts", 1, 2).expect("link");
}
