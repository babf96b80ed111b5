#![allow(dead_code)]

use serde_json::Value;
use sqlweave::{
    BoxStatement, Capability, Params, QueryExecutor, Row, RowSource, WeaveResult, async_trait,
    sync_statement_fn,
};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&str, Option<&Params>) -> Vec<Row> + Send + Sync;

/// Executor answering from a closure and recording what it was given.
#[derive(Clone)]
pub struct Scripted {
    responder: Arc<Responder>,
    iterate: bool,
    pub prepared: Arc<Mutex<Vec<(Capability, String)>>>,
    pub calls: Arc<Mutex<Vec<Option<Params>>>>,
}

impl Scripted {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, Option<&Params>) -> Vec<Row> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            iterate: true,
            prepared: Arc::default(),
            calls: Arc::default(),
        }
    }

    /// Always answer with `rows`.
    pub fn returning(rows: Vec<Row>) -> Self {
        Self::new(move |_, _| rows.clone())
    }

    pub fn without_iterate(mut self) -> Self {
        self.iterate = false;
        self
    }

    pub fn sql(&self) -> Vec<String> {
        self.prepared
            .lock()
            .unwrap()
            .iter()
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<Option<Params>> {
        self.calls.lock().unwrap().clone()
    }

    fn statement<T, M>(&self, capability: Capability, sql: &str, map: M) -> BoxStatement<T>
    where
        T: Send + 'static,
        M: Fn(Vec<Row>) -> T + Send + Sync + 'static,
    {
        self.prepared
            .lock()
            .unwrap()
            .push((capability, sql.to_string()));
        let responder = self.responder.clone();
        let calls = self.calls.clone();
        let sql = sql.to_string();
        sync_statement_fn(move |params: Option<Params>| {
            let rows = (*responder)(&sql, params.as_ref());
            calls.lock().unwrap().push(params);
            Ok(map(rows))
        })
    }
}

#[async_trait]
impl QueryExecutor for Scripted {
    fn supports(&self, capability: Capability) -> bool {
        capability != Capability::Iterate || self.iterate
    }

    async fn prepare_first(&self, sql: &str) -> WeaveResult<BoxStatement<Option<Row>>> {
        Ok(self.statement(Capability::First, sql, |rows| rows.into_iter().next()))
    }

    async fn prepare_all(&self, sql: &str) -> WeaveResult<BoxStatement<Vec<Row>>> {
        Ok(self.statement(Capability::All, sql, |rows| rows))
    }

    async fn prepare_iterate(&self, sql: &str) -> WeaveResult<BoxStatement<RowSource>> {
        Ok(self.statement(Capability::Iterate, sql, |rows| {
            RowSource::from_stream(futures_util::stream::iter(rows.into_iter().map(Ok)))
        }))
    }
}

pub fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Collapse runs of whitespace so multi-line SQL compares by tokens.
pub fn normalize_ws(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
