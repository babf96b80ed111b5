mod common;

use common::{Scripted, normalize_ws, params};
use futures_util::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlweave::{
    Client, Config, Execution, ParamsSource, QueryOptions, TableColumns, WeaveResult, build,
    json_text, schema, sql,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Metadata {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email_variant: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDb {
    id: String,
    email: String,
    #[serde(deserialize_with = "json_text::deserialize")]
    metadata: Metadata,
    created_at: i64,
    disabled_at: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserWithLength {
    #[serde(flatten)]
    user: UserDb,
    length_id: i64,
}

#[derive(Serialize, Deserialize)]
struct ById {
    id: String,
}

fn stored_user(id: &str, metadata: &str) -> Value {
    json!({
        "id": id,
        "email": "john@doe.com",
        "metadata": metadata,
        "created_at": 1500000000,
        "disabled_at": null,
        "length_id": 6,
    })
}

#[tokio::test]
async fn first_with_result_key_and_validated_params() -> WeaveResult<()> {
    let ex = Scripted::returning(vec![stored_user("uuid-1", r#"{"role":"user"}"#)]);
    let client = Client::with_config(ex.clone(), Config::new().stringify_object_params(true));

    let result = client
        .first(
            QueryOptions::new()
                .params(params(json!({"id": "uuid-1"})))
                .params_schema(schema::<ById>())
                .result_schema(schema::<UserWithLength>()),
            build(|s| {
                sql!(s => "
SELECT
  *,
  LENGTH({}) AS {}
FROM {}
WHERE
  {} = {}
", "@users.id", "$length_id", "@users", "@users.id", ":id")
            }),
        )
        .await?
        .into_single()?;

    assert_eq!(
        ex.sql(),
        vec![
            "
SELECT
  *,
  LENGTH(users.id) AS length_id
FROM users
WHERE
  users.id = :id
"
            .to_string()
        ]
    );
    assert_eq!(ex.calls(), vec![Some(params(json!({"id": "uuid-1"})))]);
    assert_eq!(
        result,
        Some(json!({
            "id": "uuid-1",
            "email": "john@doe.com",
            "metadata": {"role": "user"},
            "created_at": 1500000000,
            "disabled_at": null,
            "length_id": 6,
        }))
    );
    Ok(())
}

#[tokio::test]
async fn first_returns_none_when_nothing_matches() -> WeaveResult<()> {
    let ex = Scripted::returning(vec![]);
    let client = Client::new(ex);

    let result = client
        .first(
            QueryOptions::new()
                .params(params(json!({"id": "uuid-1"})))
                .result_schema(schema::<UserWithLength>()),
            "SELECT * FROM users WHERE id = :id",
        )
        .await?;
    assert!(matches!(result, Execution::Single(None)));
    Ok(())
}

#[tokio::test]
async fn insert_with_column_shorthand_stringifies_objects() -> WeaveResult<()> {
    #[derive(Serialize, Deserialize)]
    struct NewUser {
        id: String,
        email: String,
        metadata: Value,
    }

    let ex = Scripted::new(|_, p| {
        let p = p.expect("params");
        vec![json!({
            "id": p["id"],
            "email": p["email"],
            "metadata": p["metadata"],
            "created_at": 1500000000,
            "disabled_at": null,
        })]
    });
    let client = Client::with_config(ex.clone(), Config::new().stringify_object_params(true));

    let user = client
        .first_or_throw(
            QueryOptions::new()
                .params(params(json!({
                    "id": "uuid-3",
                    "email": "joke@doe.com",
                    "metadata": {"role": "admin"},
                })))
                .params_schema(schema::<NewUser>())
                .result_schema(schema::<UserDb>()),
            sql!(
                "
INSERT INTO
  {}
VALUES
  (
    {}
    , {}
    , json({})
  )
RETURNING *
",
                TableColumns::new("users", ["id", "email", "metadata"]),
                ":id",
                ":email",
                ":metadata",
            ),
        )
        .await?
        .into_single()?;

    assert_eq!(
        ex.sql()[0],
        "
INSERT INTO
  users (id, email, metadata)
VALUES
  (
    :id
    , :email
    , json(:metadata)
  )
RETURNING *
"
    );
    assert_eq!(
        ex.calls()[0],
        Some(params(json!({
            "id": "uuid-3",
            "email": "joke@doe.com",
            "metadata": "{\"role\":\"admin\"}",
        })))
    );
    assert_eq!(user["metadata"], json!({"role": "admin"}));
    Ok(())
}

#[tokio::test]
async fn update_with_alias_and_json_paths() -> WeaveResult<()> {
    let ex = Scripted::returning(vec![stored_user(
        "uuid-2",
        r#"{"role":"admin","email_variant":"jane+variant@doe.com"}"#,
    )]);
    let client = Client::new(ex.clone());

    let user = client
        .first_or_throw(
            QueryOptions::new()
                .params(params(json!({
                    "role": "admin",
                    "emailVariant": "jane+variant@doe.com",
                    "emailVerifiedAt": 1500000000,
                })))
                .result_schema(schema::<UserDb>()),
            build(|s| {
                sql!(s => "
UPDATE {}
SET
  {} = JSON_SET({},
    {}, {},
    {}, {}
  )
WHERE
  {} = {}
RETURNING *
",
                    "@users",
                    "@users.metadata-",
                    "@users.metadata",
                    "@users.metadata $.email_variant",
                    ":emailVariant",
                    "@users.metadata $.email_verified_at",
                    ":emailVerifiedAt",
                    "@users.metadata ->role",
                    ":role",
                )
            }),
        )
        .await?
        .into_single()?;

    assert_eq!(
        ex.sql()[0],
        "
UPDATE users
SET
  metadata = JSON_SET(users.metadata,
    '$.email_variant', :emailVariant,
    '$.email_verified_at', :emailVerifiedAt
  )
WHERE
  users.metadata->'role' = :role
RETURNING *
"
    );
    assert_eq!(
        user["metadata"],
        json!({"role": "admin", "email_variant": "jane+variant@doe.com"})
    );
    Ok(())
}

#[tokio::test]
async fn all_validates_rows_with_an_array_schema() -> WeaveResult<()> {
    let ex = Scripted::returning(vec![
        stored_user("uuid-1", r#"{"role":"admin"}"#),
        stored_user("uuid-2", r#"{"role":"user"}"#),
    ]);
    let client = Client::new(ex);

    let users = client
        .all(
            QueryOptions::new().result_schema(schema::<Vec<UserDb>>()),
            sql!("SELECT * FROM {}", "@users"),
        )
        .await?
        .into_single()?;

    assert_eq!(users.len(), 2);
    assert_eq!(users[1]["id"], "uuid-2");
    assert_eq!(users[0]["metadata"], json!({"role": "admin"}));
    Ok(())
}

#[tokio::test]
async fn nested_conditional_and_raw_fragments() -> WeaveResult<()> {
    let ex = Scripted::returning(vec![]);
    let client = Client::new(ex.clone());
    let descending = false;

    let rows = client
        .all(
            QueryOptions::new().params(params(json!({"cursor": "uuid-1", "limit": 10}))),
            build(move |s| {
                let filter = sql!(s => "
    WHERE
      {} {} {}
      {}
    ",
                    "@users.id-",
                    s.raw(if descending { "<" } else { ">" }),
                    ":cursor",
                    s.cond(true, sql!(s => "AND {}", s.cond_else(false, "1=1", "0=0"))),
                );
                sql!(s => "
WITH
_user_scope AS (
  SELECT *
  FROM {}
  {}
  ORDER BY {} {}
  LIMIT {}
)

SELECT
  _us.{} AS {},
  s.{} AS {}
FROM _user_scope _us
LEFT JOIN {} s ON s.{} = _us.{}
",
                    "@users",
                    s.cond(true, filter),
                    "@users.id-",
                    s.cond_else(descending, "DESC", "ASC"),
                    ":limit",
                    "@users.id-",
                    "$user_id",
                    "@sessions.id-",
                    "$session_id",
                    "@sessions",
                    "@sessions.id-",
                    "@users.id-",
                )
            }),
        )
        .await?
        .into_single()?;

    assert!(rows.is_empty());
    assert_eq!(
        normalize_ws(&ex.sql()[0]),
        normalize_ws(
            "
WITH
_user_scope AS (
  SELECT *
  FROM users
  WHERE
    id > :cursor
    AND 0=0
  ORDER BY id ASC
  LIMIT :limit
)

SELECT
  _us.id AS user_id,
  s.id AS session_id
FROM _user_scope _us
LEFT JOIN sessions s ON s.id = _us.id
"
        )
    );
    Ok(())
}

#[tokio::test]
async fn missing_capability_fails_before_sql_is_built() {
    let ex = Scripted::returning(vec![json!({"id": 1})]).without_iterate();
    let client = Client::new(ex.clone());
    let built = Arc::new(AtomicBool::new(false));
    let flag = built.clone();

    let err = client
        .iterate(
            QueryOptions::new(),
            build(move |_| {
                flag.store(true, Ordering::SeqCst);
                "SELECT * FROM users".to_string()
            }),
        )
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(!built.load(Ordering::SeqCst));
    assert!(ex.sql().is_empty());
}

#[tokio::test]
async fn quoted_table_name_reaches_the_executor() -> WeaveResult<()> {
    let ex = Scripted::returning(vec![]);
    let client = Client::with_config(ex.clone(), Config::new().quote_identifiers(true));

    client
        .all(
            QueryOptions::new(),
            build(|s| {
                sql!(s => "INSERT INTO {} SELECT {} FROM {}",
                    TableColumns::new("users", ["id"]),
                    "@accounts.id",
                    "@accounts",
                )
            }),
        )
        .await?;

    assert_eq!(
        ex.sql()[0],
        "INSERT INTO \"users\" (id) SELECT accounts.id FROM accounts"
    );
    Ok(())
}

#[tokio::test]
async fn async_param_source_yields_in_source_order() -> WeaveResult<()> {
    let ex = Scripted::new(|_, p| {
        let id = p.and_then(|p| p.get("id")).cloned().unwrap_or(Value::Null);
        vec![json!({ "id": id })]
    });
    let client = Client::new(ex.clone());

    let source = futures_util::stream::iter(["u3", "u1", "u2"])
        .map(|id| params(json!({ "id": id })));

    let mut results = client
        .first_or_throw(
            QueryOptions::new()
                .params(ParamsSource::stream(source))
                .params_schema(schema::<ById>()),
            "SELECT * FROM users WHERE id = :id",
        )
        .await?
        .into_stream();

    let mut ids = Vec::new();
    while let Some(row) = results.try_next().await? {
        ids.push(row["id"].clone());
    }
    assert_eq!(ids, vec![json!("u3"), json!("u1"), json!("u2")]);
    assert_eq!(ex.sql().len(), 1, "prepared once");
    assert_eq!(ex.calls().len(), 3);
    Ok(())
}

#[tokio::test]
async fn iterate_decodes_typed_rows() -> WeaveResult<()> {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Session {
        id: String,
    }

    let ex = Scripted::returning(vec![json!({"id": "s1"}), json!({"id": "s2"})]);
    let client = Client::new(ex);

    let sessions: Vec<Session> = client
        .iterate(QueryOptions::new(), sql!("SELECT * FROM {}", "@sessions"))
        .await?
        .decode::<Session>()
        .try_collect()
        .await?;

    assert_eq!(
        sessions,
        vec![Session { id: "s1".into() }, Session { id: "s2".into() }]
    );
    Ok(())
}

#[tokio::test]
async fn typed_params_serialize_into_a_batch() -> WeaveResult<()> {
    let ex = Scripted::new(|_, p| vec![Value::Object(p.cloned().unwrap_or_default())]);
    let client = Client::new(ex.clone());

    let batch = vec![
        ById { id: "a".into() },
        ById { id: "b".into() },
    ];
    let rows = client
        .all(
            QueryOptions::new()
                .params(ParamsSource::from_serialize(&batch)?)
                .tag("bulk_lookup"),
            "SELECT * FROM users WHERE id = :id",
        )
        .await?
        .collect()
        .await?;

    assert_eq!(rows, vec![vec![json!({"id": "a"})], vec![json!({"id": "b"})]]);
    Ok(())
}
