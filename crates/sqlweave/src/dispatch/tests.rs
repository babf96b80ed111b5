use super::*;
use crate::error::Issue;
use crate::executor::{statement_fn, sync_statement_fn};
use crate::validate::{Schema, validator_fn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// ── Shared in-memory executor for tests ──

#[derive(Default)]
struct Probe {
    prepared: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<Option<Params>>>,
}

impl Probe {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self, params: Option<Params>) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.record(params);
    }

    fn record(&self, params: Option<Params>) {
        self.calls.lock().unwrap().push(params);
    }

    fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }

    fn calls(&self) -> Vec<Option<Params>> {
        self.calls.lock().unwrap().clone()
    }
}

fn records() -> Vec<Value> {
    vec![
        json!({"id": "u1", "name": "Ada", "extra": true}),
        json!({"id": "u2", "name": "Grace", "extra": false}),
    ]
}

fn lookup(params: &Option<Params>) -> WeaveResult<Option<Value>> {
    let Some(params) = params else {
        return Ok(Some(json!({"count": 2})));
    };
    if params.contains_key("fail") {
        return Err(WeaveError::executor(std::io::Error::other("boom")));
    }
    let id = params.get("id").and_then(Value::as_str);
    Ok(records().into_iter().find(|r| r["id"].as_str() == id))
}

/// Answers every statement from `records()`, keyed by the `id` param.
struct Memory {
    probe: Arc<Probe>,
}

impl Memory {
    fn new() -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

#[async_trait]
impl QueryExecutor for Memory {
    fn supports(&self, _: Capability) -> bool {
        true
    }

    async fn prepare_first(&self, _: &str) -> WeaveResult<BoxStatement<Option<Row>>> {
        self.probe.prepared.fetch_add(1, Ordering::SeqCst);
        let probe = self.probe.clone();
        Ok(statement_fn(move |params: Option<Params>| {
            let probe = probe.clone();
            async move {
                probe.enter();
                tokio::task::yield_now().await;
                let out = lookup(&params);
                probe.leave(params);
                out
            }
        }))
    }

    async fn prepare_all(&self, _: &str) -> WeaveResult<BoxStatement<Vec<Row>>> {
        self.probe.prepared.fetch_add(1, Ordering::SeqCst);
        let probe = self.probe.clone();
        Ok(sync_statement_fn(move |params| {
            probe.record(params);
            Ok(records())
        }))
    }

    async fn prepare_iterate(&self, _: &str) -> WeaveResult<BoxStatement<RowSource>> {
        self.probe.prepared.fetch_add(1, Ordering::SeqCst);
        let probe = self.probe.clone();
        Ok(sync_statement_fn(move |params: Option<Params>| {
            let rows = match &params {
                None => records(),
                Some(_) => lookup(&params)?.into_iter().collect(),
            };
            probe.record(params);
            Ok(RowSource::from_rows(rows))
        }))
    }
}

fn p(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
}

fn reject_bad_ids() -> impl Validator {
    validator_fn(|v: Value| {
        if v["id"] == json!("bad") {
            Err(vec![Issue::new("id is not allowed").at("id")])
        } else {
            Ok(v)
        }
    })
}

// ── Single / absent ──

#[tokio::test]
async fn single_params_resolve_directly() {
    let (ex, probe) = Memory::new();
    let out = execute::<Option<Row>, _>(
        &ex,
        "SELECT * FROM users WHERE id = :id",
        QueryOptions::new().params(p(json!({"id": "u1"}))),
        &Config::default(),
    )
    .await
    .unwrap();

    let Execution::Single(Some(row)) = out else {
        panic!("expected a single row");
    };
    assert_eq!(row["name"], json!("Ada"));
    assert_eq!(probe.prepared(), 1);
    assert_eq!(probe.calls().len(), 1);
}

#[tokio::test]
async fn absent_params_execute_once_with_none() {
    let (ex, probe) = Memory::new();
    let out = execute::<Option<Row>, _>(&ex, "SELECT 1", QueryOptions::new(), &Config::default())
        .await
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(out, Some(json!({"count": 2})));
    assert_eq!(probe.calls(), vec![None]);
}

#[tokio::test]
async fn first_returns_absence_without_validating() {
    let (ex, _) = Memory::new();
    let out = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new()
            .params(p(json!({"id": "nobody"})))
            .result_schema(Schema::<User>::new()),
        &Config::default(),
    )
    .await
    .unwrap();
    assert!(matches!(out, Execution::Single(None)));
}

#[tokio::test]
async fn single_param_validation_runs_before_execution() {
    let (ex, probe) = Memory::new();
    let err = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new()
            .params(p(json!({"id": "bad"})))
            .params_schema(reject_bad_ids()),
        &Config::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_param_validation());
    assert_eq!(err.issues().unwrap()[0].path, vec!["id".to_string()]);
    assert_eq!(probe.prepared(), 0);
    assert!(probe.calls().is_empty());
}

// ── Batch ──

#[tokio::test]
async fn batch_yields_in_order_then_completes() {
    let (ex, probe) = Memory::new();
    let out = execute::<Option<Row>, _>(
        &ex,
        "SELECT * FROM users WHERE id = :id",
        QueryOptions::new().params(vec![p(json!({"id": "u1"})), p(json!({"id": "u2"}))]),
        &Config::default(),
    )
    .await
    .unwrap();

    let Execution::Sequence(mut seq) = out else {
        panic!("expected a sequence");
    };
    assert_eq!(probe.prepared(), 1);
    assert!(probe.calls().is_empty(), "nothing runs before the first pull");

    let first = seq.next().await.unwrap().unwrap().unwrap();
    assert_eq!(first["id"], json!("u1"));
    assert_eq!(probe.calls().len(), 1);

    let second = seq.next().await.unwrap().unwrap().unwrap();
    assert_eq!(second["id"], json!("u2"));
    assert!(seq.next().await.is_none());
    assert_eq!(probe.prepared(), 1);
}

#[tokio::test]
async fn batch_is_validated_up_front() {
    let (ex, probe) = Memory::new();
    let err = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new()
            .params(vec![
                p(json!({"id": "u1"})),
                p(json!({"id": 7})),
                p(json!({"id": "u2"})),
            ])
            .params_schema(Schema::<Vec<User>>::new()),
        &Config::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_param_validation());
    assert!(probe.calls().is_empty());
}

#[tokio::test]
async fn batch_validator_output_is_what_executes() {
    #[derive(Serialize, Deserialize)]
    struct ById {
        id: String,
    }

    let (ex, probe) = Memory::new();
    let seq = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new()
            .params(vec![p(json!({"id": "u1", "drop": 1})), p(json!({"id": "u2"}))])
            .params_schema(Schema::<Vec<ById>>::new()),
        &Config::default(),
    )
    .await
    .unwrap();
    let rows = seq.collect().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        probe.calls(),
        vec![Some(p(json!({"id": "u1"}))), Some(p(json!({"id": "u2"})))]
    );
}

#[tokio::test]
async fn executor_error_halts_the_sequence() {
    let (ex, probe) = Memory::new();
    let mut seq = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new().params(vec![
            p(json!({"id": "u1"})),
            p(json!({"fail": true})),
            p(json!({"id": "u2"})),
        ]),
        &Config::default(),
    )
    .await
    .unwrap()
    .into_stream();

    assert!(seq.next().await.unwrap().is_ok());
    let err = seq.next().await.unwrap().unwrap_err();
    assert!(err.executor_error::<std::io::Error>().is_some());
    assert!(seq.next().await.is_none());
    assert_eq!(probe.calls().len(), 2);
}

#[tokio::test]
async fn dropping_the_sequence_stops_execution() {
    let (ex, probe) = Memory::new();
    let mut seq = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new().params(vec![p(json!({"id": "u1"})), p(json!({"id": "u2"}))]),
        &Config::default(),
    )
    .await
    .unwrap()
    .into_stream();

    seq.next().await.unwrap().unwrap();
    drop(seq);
    assert_eq!(probe.calls().len(), 1);
}

// ── Pulled sources ──

#[tokio::test]
async fn iterator_source_halts_at_the_invalid_element() {
    let (ex, probe) = Memory::new();
    let mut seq = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new()
            .params(ParamsSource::iter(vec![
                p(json!({"id": "u1"})),
                p(json!({"id": "bad"})),
                p(json!({"id": "u2"})),
            ]))
            .params_schema(reject_bad_ids()),
        &Config::default(),
    )
    .await
    .unwrap()
    .into_stream();

    let first = seq.next().await.unwrap().unwrap().unwrap();
    assert_eq!(first["id"], json!("u1"));
    assert!(seq.next().await.unwrap().unwrap_err().is_param_validation());
    assert!(seq.next().await.is_none());
    assert_eq!(probe.calls().len(), 1, "the third element never runs");
}

#[tokio::test]
async fn iterator_source_is_pulled_lazily() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = pulled.clone();
    let source = (0..).map(move |i| {
        counter.fetch_add(1, Ordering::SeqCst);
        let id = if i % 2 == 0 { "u1" } else { "u2" };
        p(json!({ "id": id }))
    });

    let (ex, _) = Memory::new();
    let mut seq = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new().params(ParamsSource::iter(source)),
        &Config::default(),
    )
    .await
    .unwrap()
    .into_stream();

    assert_eq!(pulled.load(Ordering::SeqCst), 0);
    let taken: Vec<_> = (&mut seq).take(3).collect().await;
    assert_eq!(taken.len(), 3);
    assert_eq!(pulled.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stream_source_runs_strictly_sequentially() {
    let (ex, probe) = Memory::new();
    let source = futures_util::stream::iter(vec![
        p(json!({"id": "u2"})),
        p(json!({"id": "u1"})),
        p(json!({"id": "u2"})),
    ])
    .then(|params| async move {
        tokio::task::yield_now().await;
        params
    });

    let rows = execute::<Option<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new().params(ParamsSource::stream(source)),
        &Config::default(),
    )
    .await
    .unwrap()
    .collect()
    .await
    .unwrap();

    let ids: Vec<_> = rows
        .iter()
        .map(|r| r.as_ref().unwrap()["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!("u2"), json!("u1"), json!("u2")]);
    assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(probe.prepared(), 1);
}

// ── first_or_throw ──

#[tokio::test]
async fn first_or_throw_fails_on_absence() {
    let (ex, _) = Memory::new();
    let err = execute::<Row, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new().params(p(json!({"id": "nobody"}))),
        &Config::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_no_result());
}

#[tokio::test]
async fn first_or_throw_fails_per_element_when_pulled() {
    let (ex, _) = Memory::new();
    let mut seq = execute::<Row, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new().params(vec![p(json!({"id": "u1"})), p(json!({"id": "nobody"}))]),
        &Config::default(),
    )
    .await
    .expect("absence is only detected when pulled")
    .into_stream();

    assert_eq!(seq.next().await.unwrap().unwrap()["id"], json!("u1"));
    assert!(seq.next().await.unwrap().unwrap_err().is_no_result());
}

#[tokio::test]
async fn null_from_first_or_throw_statement_is_no_result() {
    struct NullRow;

    #[async_trait]
    impl QueryExecutor for NullRow {
        async fn prepare_first(&self, _: &str) -> WeaveResult<BoxStatement<Option<Row>>> {
            Ok(sync_statement_fn(|_| Ok(None)))
        }

        async fn prepare_all(&self, _: &str) -> WeaveResult<BoxStatement<Vec<Row>>> {
            Ok(sync_statement_fn(|_| Ok(Vec::new())))
        }

        async fn prepare_first_or_throw(&self, _: &str) -> WeaveResult<BoxStatement<Row>> {
            Ok(sync_statement_fn(|_| Ok(Value::Null)))
        }
    }

    let err = execute::<Row, _>(&NullRow, "SELECT 1", QueryOptions::new(), &Config::default())
        .await
        .unwrap_err();
    assert!(err.is_no_result());
}

// ── Result validation ──

#[tokio::test]
async fn result_validator_output_replaces_record() {
    let (ex, _) = Memory::new();
    let row = execute::<Row, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new()
            .params(p(json!({"id": "u1"})))
            .result_schema(Schema::<User>::new()),
        &Config::default(),
    )
    .await
    .unwrap()
    .into_single()
    .unwrap();
    assert_eq!(row, json!({"id": "u1", "name": "Ada"}));
}

#[tokio::test]
async fn all_hands_the_whole_result_to_the_validator() {
    let (ex, _) = Memory::new();
    let rows = execute::<Vec<Row>, _>(
        &ex,
        "SELECT * FROM users",
        QueryOptions::new().result_schema(Schema::<Vec<User>>::new()),
        &Config::default(),
    )
    .await
    .unwrap()
    .into_single()
    .unwrap();
    assert_eq!(
        rows,
        vec![json!({"id": "u1", "name": "Ada"}), json!({"id": "u2", "name": "Grace"})]
    );
}

#[tokio::test]
async fn all_rejection_carries_the_raw_array() {
    let (ex, _) = Memory::new();
    let only_ada = validator_fn(|v: Value| {
        match v.as_array().and_then(|rows| rows.iter().position(|r| r["name"] != json!("Ada"))) {
            Some(i) => Err(vec![Issue::new("unexpected name").at("name").at(i.to_string())]),
            None => Ok(v),
        }
    });

    let err = execute::<Vec<Row>, _>(
        &ex,
        "SELECT * FROM users",
        QueryOptions::new().result_schema(only_ada),
        &Config::default(),
    )
    .await
    .unwrap_err();

    assert!(err.is_result_validation());
    assert_eq!(err.raw_record().unwrap(), &Value::Array(records()));
}

#[tokio::test]
async fn all_validator_must_return_an_array() {
    let (ex, _) = Memory::new();
    let count = validator_fn(|v: Value| Ok(json!(v.as_array().map_or(0, Vec::len))));

    let err = execute::<Vec<Row>, _>(
        &ex,
        "SELECT * FROM users",
        QueryOptions::new().result_schema(count),
        &Config::default(),
    )
    .await
    .unwrap_err();

    assert!(err.is_result_validation());
    assert_eq!(err.raw_record().unwrap(), &Value::Array(records()));
}

#[tokio::test]
async fn stringify_applies_to_every_shape() {
    let (ex, probe) = Memory::new();
    let config = Config::new().stringify_object_params(true);

    execute::<Vec<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new().params(p(json!({"meta": {"a": 1}, "n": 1}))),
        &config,
    )
    .await
    .unwrap();

    let rows = execute::<Vec<Row>, _>(
        &ex,
        "SELECT 1",
        QueryOptions::new().params(ParamsSource::iter(vec![p(json!({"tags": [1, 2]}))])),
        &config,
    )
    .await
    .unwrap()
    .collect()
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);

    let calls = probe.calls();
    assert_eq!(calls[0].as_ref().unwrap()["meta"], json!("{\"a\":1}"));
    assert_eq!(calls[0].as_ref().unwrap()["n"], json!(1));
    assert_eq!(calls[1].as_ref().unwrap()["tags"], json!("[1,2]"));
}

// ── iterate ──

#[tokio::test]
async fn iterate_yields_executor_records_unchanged() {
    let (ex, _) = Memory::new();
    let rows = execute_iterate(&ex, "SELECT * FROM users", QueryOptions::new(), &Config::default())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(rows, records());
}

#[tokio::test]
async fn iterate_validates_each_row() {
    let (ex, _) = Memory::new();
    let mut users = execute_iterate(
        &ex,
        "SELECT * FROM users",
        QueryOptions::new().result_schema(Schema::<User>::new()),
        &Config::default(),
    )
    .await
    .unwrap()
    .decode::<User>();

    assert_eq!(users.next().await.unwrap().unwrap().name, "Ada");
    assert_eq!(users.next().await.unwrap().unwrap().name, "Grace");
    assert!(users.next().await.is_none());
}

#[tokio::test]
async fn iterate_chains_row_sources_for_batches() {
    let (ex, probe) = Memory::new();
    let rows = execute_iterate(
        &ex,
        "SELECT * FROM users WHERE id = :id",
        QueryOptions::new().params(vec![p(json!({"id": "u2"})), p(json!({"id": "u1"}))]),
        &Config::default(),
    )
    .await
    .unwrap()
    .try_collect()
    .await
    .unwrap();
    assert_eq!(rows, vec![records()[1].clone(), records()[0].clone()]);
    assert_eq!(probe.prepared(), 1);
    assert_eq!(probe.calls().len(), 2);
}

#[tokio::test]
async fn iterate_halts_on_invalid_row() {
    let (ex, _) = Memory::new();
    let mut rows = execute_iterate(
        &ex,
        "SELECT * FROM users",
        QueryOptions::new().result_schema(validator_fn(|v: Value| {
            if v["extra"] == json!(true) {
                Ok(v)
            } else {
                Err(vec![Issue::new("extra must be set")])
            }
        })),
        &Config::default(),
    )
    .await
    .unwrap();

    assert!(rows.next().await.unwrap().is_ok());
    let err = rows.next().await.unwrap().unwrap_err();
    assert_eq!(err.raw_record().unwrap()["id"], json!("u2"));
    assert!(rows.next().await.is_none());
}
