//! Integration tests for the collection manager guard.

mod common;

use std::fmt::Debug;

use lazyguard::query::{
    Annotation, DateKind, ErrorCode, Filter, IncludeSpec, QueryResult, RelationManager,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn ann(client: &lazyguard::Client, prefetch: &[&str]) -> lazyguard::Record {
    client
        .query("User")
        .filter(Filter::equals("name", "ann"))
        .prefetch_related(prefetch)
        .get()
        .unwrap()
}

#[track_caller]
fn assert_blocked<T: Debug>(result: QueryResult<T>) {
    let err = result.unwrap_err();
    assert_eq!(err.code, ErrorCode::BlockedMethod, "{err}");
}

#[test]
fn test_all_denied_without_prefetch() {
    let client = common::client();
    let user = ann(&client, &[]);
    client.reset_queries();

    let err = user.manager("posts").unwrap().all().unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingReverseRelationField);
    insta::assert_snapshot!(err.message, @r###"
    Access to `User.posts.all()` was prevented.
    To fetch the `Post` objects, add `prefetch_related("posts")` to the query where `User` objects are selected.
    "###);
    assert_eq!(client.query_count(), 0);
}

#[test]
fn test_denial_names_existing_prefetch() {
    let client = common::client();
    let user = ann(&client, &["groups"]);

    let err = user.manager("posts").unwrap().all().unwrap_err();
    insta::assert_snapshot!(err.message, @r###"
    Access to `User.posts.all()` was prevented.
    To fetch the `Post` objects, add "posts" to the existing `prefetch_related("groups")` part of the query where `User` objects are selected.
    "###);
}

#[test]
fn test_prefetched_collection_is_served_from_memory() {
    let client = common::client();
    let users = client.query("User").prefetch_related(&["posts"]).fetch().unwrap();
    assert_eq!(client.query_count(), 2);

    let counts: Vec<usize> = users
        .iter()
        .map(|u| u.manager("posts").unwrap().all().unwrap().len())
        .collect();
    assert_eq!(counts, vec![2, 1, 0, 0]);

    let posts = users[0].manager("posts").unwrap();
    assert_eq!(posts.count().unwrap(), 2);
    assert!(posts.exists().unwrap());
    assert_eq!(client.query_count(), 2);
}

#[test]
fn test_empty_prefetch_is_allowed() {
    let client = common::client();
    let cy = client
        .query("User")
        .filter(Filter::equals("name", "cy"))
        .prefetch_related(&["posts", "groups"])
        .get()
        .unwrap();
    client.reset_queries();

    assert!(cy.manager("posts").unwrap().all().unwrap().is_empty());
    assert!(cy.manager("groups").unwrap().all().unwrap().is_empty());
    assert!(!cy.manager("posts").unwrap().exists().unwrap());
    assert_eq!(client.query_count(), 0);
}

#[test]
fn test_refinements_blocked_after_prefetch() {
    let client = common::client();
    let user = ann(&client, &["posts"]);
    let posts = user.manager("posts").unwrap();
    client.reset_queries();

    assert_blocked(posts.filter(Filter::equals("title", "first")));
    assert_blocked(posts.exclude(Filter::equals("title", "first")));
    assert_blocked(posts.annotate("n", Annotation::value(1)));
    assert_blocked(posts.alias("n", Annotation::value(1)));
    assert_blocked(posts.order_by(&["title"]));
    assert_blocked(posts.reverse());
    assert_blocked(posts.distinct());
    assert_blocked(posts.only(&["title"]));
    assert_blocked(posts.defer(&["title"]));
    assert_blocked(posts.select_related(&["author"]));
    assert_blocked(posts.prefetch_related(&["tags"]));
    assert_blocked(posts.values(&["title"]));
    assert_blocked(posts.values_list(&["title"]));
    assert_blocked(posts.in_bulk(None));
    assert_blocked(posts.earliest("published"));
    assert_blocked(posts.latest("published"));
    assert_eq!(client.query_count(), 0);
}

#[test]
fn test_blocked_message_offers_alternatives() {
    let client = common::client();
    let user = ann(&client, &["posts"]);

    let err = user
        .manager("posts")
        .unwrap()
        .filter(Filter::equals("title", "first"))
        .unwrap_err();
    insta::assert_snapshot!(err.message, @r###"
    Access to `posts.filter(...)` via `User` instance was prevented because of previous `prefetch_related("posts")`
    Filter existing objects in memory with:
    `user.manager("posts")?.all()?.into_iter().filter(|post| ...)`
    Filter new objects from the database with:
    `user.unguarded().manager("posts")?.filter(...)`
    "###);
    assert_eq!(err.context.suggestions.len(), 2);

    let err = user.manager("posts").unwrap().distinct().unwrap_err();
    assert_eq!(
        err.message,
        "Access to `posts.distinct(...)` via `User` instance was prevented because of previous `prefetch_related(\"posts\")`"
    );
}

#[test]
fn test_unguarded_calls_pass() {
    let client = common::client();
    let user = ann(&client, &["posts"]);
    let posts = user.manager("posts").unwrap();
    client.reset_queries();

    // positional reads, set algebra and date buckets
    assert_eq!(posts.first().unwrap().unwrap().get("title").unwrap(), json!("first"));
    assert_eq!(posts.last().unwrap().unwrap().get("title").unwrap(), json!("second"));
    let other = client.query("Post").filter(Filter::equals("author_id", 2));
    assert_eq!(posts.union(other).unwrap().count().unwrap(), 3);
    assert_eq!(posts.dates("published", DateKind::Year).unwrap(), vec!["2023-01-01"]);
    assert!(client.query_count() > 0);
}

#[test]
fn test_refinements_allowed_without_prefetch() {
    let client = common::client();
    let user = ann(&client, &[]);
    let posts = user.manager("posts").unwrap();
    client.reset_queries();

    let titles = posts
        .filter(Filter::equals("title", "second"))
        .unwrap()
        .values_list(&["title"])
        .unwrap();
    assert_eq!(titles, vec![vec![json!("second")]]);
    assert_eq!(posts.count().unwrap(), 2);
    assert_eq!(client.query_count(), 2);
}

#[test]
fn test_switch_off_falls_back_to_lazy_load() {
    let client = common::client();
    client.settings().set_relation_reverse_fields(false);

    let user = ann(&client, &[]);
    client.reset_queries();
    assert_eq!(user.manager("posts").unwrap().all().unwrap().len(), 2);
    assert_eq!(client.query_count(), 1);

    let user = ann(&client, &["posts"]);
    let recent = user
        .manager("posts")
        .unwrap()
        .filter(Filter::equals("title", "second"))
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(recent.len(), 1);

    // single relations stay guarded
    assert!(user.related("role").unwrap_err().is_missing_relation());
}

#[test]
fn test_switch_off_covers_many_to_many_both_sides() {
    let client = common::client();
    client.settings().set_relation_reverse_fields(false);

    let user = ann(&client, &[]);
    let staff = client.query("Group").first().unwrap().unwrap();
    client.reset_queries();
    assert_eq!(user.manager("groups").unwrap().all().unwrap().len(), 2);
    assert_eq!(staff.manager("members").unwrap().all().unwrap().len(), 2);
    assert_eq!(client.query_count(), 2);

    let user = ann(&client, &["groups"]);
    let ops = user
        .manager("groups")
        .unwrap()
        .filter(Filter::equals("name", "ops"))
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(ops.len(), 1);

    let staff = client
        .query("Group")
        .prefetch_related(&["members"])
        .first()
        .unwrap()
        .unwrap();
    let bob = staff
        .manager("members")
        .unwrap()
        .exclude(Filter::equals("name", "ann"))
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(bob.len(), 1);

    // single relations stay guarded
    let err = user.related("role").unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingRelationField);
    let profile = client.query("Profile").first().unwrap().unwrap();
    assert!(profile.related("user").unwrap_err().is_missing_relation());

    client.settings().set_relation_reverse_fields(true);
    assert_blocked(user.manager("groups").unwrap().filter(Filter::equals("name", "ops")));
    assert!(staff.manager("members").unwrap().order_by(&["name"]).is_err());
}

#[test]
fn test_escape_hatch_returns_plain_manager() {
    let client = common::client();
    let user = ann(&client, &["posts"]);

    let posts = user.unguarded().manager("posts").unwrap();
    let first = posts.filter(Filter::equals("title", "first")).unwrap().get().unwrap();
    assert_eq!(first.get("id").unwrap(), json!(1));

    let user = ann(&client, &[]);
    assert_eq!(user.unguarded().manager("posts").unwrap().all().unwrap().len(), 2);

    // the bypass covers one access only
    assert!(user.manager("posts").unwrap().all().is_err());
}

#[test]
fn test_many_to_many_both_sides() {
    let client = common::client();
    let user = ann(&client, &["groups"]);
    client.reset_queries();
    let groups: Vec<_> = user
        .manager("groups")
        .unwrap()
        .all()
        .unwrap()
        .iter()
        .map(|g| g.get("name").unwrap())
        .collect();
    assert_eq!(groups, vec![json!("staff"), json!("ops")]);
    assert_eq!(client.query_count(), 0);

    let staff = client.query("Group").first().unwrap().unwrap();
    assert!(staff.manager("members").unwrap().all().unwrap_err().is_missing_reverse_relation());

    let staff = client
        .query("Group")
        .prefetch_related(&["members"])
        .first()
        .unwrap()
        .unwrap();
    assert_eq!(staff.manager("members").unwrap().count().unwrap(), 2);
}

#[test]
fn test_nested_prefetch() {
    let client = common::client();
    let users = client
        .query("User")
        .prefetch_related(&["posts__tags"])
        .fetch()
        .unwrap();
    assert_eq!(client.query_count(), 3);

    let mut labels = Vec::new();
    for user in &users {
        for post in user.manager("posts").unwrap().all().unwrap() {
            labels.push(post.manager("tags").unwrap().count().unwrap());
            assert!(post.manager("tags").unwrap().all().is_ok());
        }
    }
    assert_eq!(labels, vec![2, 1, 0]);
    assert_eq!(client.query_count(), 3);
}

#[test]
fn test_prefetch_with_filter() {
    let client = common::client();
    let user = client
        .query("User")
        .filter(Filter::equals("name", "ann"))
        .prefetch(IncludeSpec::prefetch("posts").filter(Filter::equals("title", "second")))
        .get()
        .unwrap();

    let posts = user.manager("posts").unwrap().all().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].get("title").unwrap(), json!("second"));
}

#[test]
fn test_prefetched_children_keep_their_own_state() {
    let client = common::client();
    let user = client
        .query("User")
        .filter(Filter::equals("name", "ann"))
        .prefetch(IncludeSpec::prefetch("posts").only(["title"]))
        .get()
        .unwrap();

    let posts = user.manager("posts").unwrap().all().unwrap();
    assert_eq!(posts[0].get("title").unwrap(), json!("first"));
    assert!(posts[0].get("published").unwrap_err().is_missing_field());
    assert!(posts[0].related("author").unwrap_err().is_missing_relation());
}
