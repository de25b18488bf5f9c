//! Both data sources honor the same contract
//!
//! The REST adapter is driven through a loopback transport that decodes
//! each request and replays it against an in-memory engine, the way a
//! PostgREST server would against its database. Calling code written
//! against `dyn DataSource` must see the same `{data, error}` pairs from
//! either side.

use std::sync::{Arc, Mutex};

use academy_datasource::rest::{Method, RestReply, RestRequest, RestSettings, Transport};
use academy_datasource::{
    DataSource, DataSourceError, DataSourceResult, MemoryDataSource, QueryBuilder, QueryParams,
    RestDataSource, RowsResponse, SortDirection,
};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};

/// Serves REST requests from an in-memory engine
struct Loopback {
    db: MemoryDataSource,
    requests: Mutex<Vec<RestRequest>>,
}

impl Loopback {
    fn new(db: MemoryDataSource) -> Arc<Self> {
        Arc::new(Self {
            db,
            requests: Mutex::new(Vec::new()),
        })
    }

    async fn serve(&self, request: RestRequest) -> RestReply {
        let params = match QueryParams::parse(request.params.iter().cloned()) {
            Ok(params) => params,
            Err(e) => return error_reply(400, &e),
        };
        let body = request.body.clone().unwrap_or(Value::Null);
        let builder = self.db.from(&request.table);
        let builder = match request.method {
            Method::Get => builder,
            Method::Post if merges(&request) => builder.upsert(body),
            Method::Post => builder.insert(body),
            Method::Patch => builder.update(body),
            Method::Delete => builder.delete(),
        };

        let response: RowsResponse = builder.apply_params(params).await;
        match (response.data, response.error) {
            (_, Some(e)) => error_reply(409, &e),
            (None, None) => RestReply::new(204, ""),
            (Some(rows), None) => RestReply::new(
                if request.method == Method::Get { 200 } else { 201 },
                serde_json::to_string(&rows).unwrap(),
            ),
        }
    }
}

fn merges(request: &RestRequest) -> bool {
    request
        .header("Prefer")
        .is_some_and(|prefer| prefer.contains("merge-duplicates"))
}

fn error_reply(status: u16, error: &DataSourceError) -> RestReply {
    RestReply::new(
        status,
        json!({"code": error.code(), "message": error.to_string()}).to_string(),
    )
}

impl Transport for Loopback {
    fn send(&self, request: RestRequest) -> BoxFuture<'_, DataSourceResult<RestReply>> {
        self.requests.lock().unwrap().push(request.clone());
        async move { Ok(self.serve(request).await) }.boxed()
    }
}

const FIXTURE: &str = r#"{
    "students": [
        {"id": "a", "name": "Ann", "grade": 7, "created_at": "2024-01-01T00:00:00Z"},
        {"id": "b", "name": "Bob", "grade": 8, "created_at": "2024-01-01T00:00:00Z"},
        {"id": "c", "name": "Smith, J", "grade": 7, "created_at": "2024-01-01T00:00:00Z"},
        {"id": "d", "name": "dan", "grade": 9, "created_at": "2024-01-01T00:00:00Z", "deleted_at": "2024-02-01"}
    ]
}"#;

fn seeded() -> MemoryDataSource {
    let db = MemoryDataSource::new();
    let fixture: Value = serde_json::from_str(FIXTURE).unwrap();
    db.seed_document(&fixture).unwrap();
    db
}

/// A memory source and a REST source over an identical copy of the fixture
fn pair() -> (Arc<dyn DataSource>, Arc<dyn DataSource>, Arc<Loopback>) {
    let loopback = Loopback::new(seeded());
    let rest = RestDataSource::with_transport(
        RestSettings::new("https://academy.example.co", "anon-key"),
        Arc::clone(&loopback) as Arc<dyn Transport>,
    );
    (Arc::new(seeded()), Arc::new(rest), loopback)
}

/// Runs the same builder chain on both sources and compares the pairs
async fn assert_agree(
    memory: &Arc<dyn DataSource>,
    rest: &Arc<dyn DataSource>,
    build: impl Fn(&Arc<dyn DataSource>) -> QueryBuilder,
) {
    let from_memory = build(memory).await;
    let from_rest = build(rest).await;
    assert!(from_memory.error.is_none(), "{:?}", from_memory.error);
    assert_eq!(from_memory, from_rest);
}

#[tokio::test]
async fn test_select_queries_agree() {
    let (memory, rest, _) = pair();
    let (m, r) = (&memory, &rest);

    assert_agree(m, r, |db| db.from("students").select("*").eq("grade", 7)).await;
    assert_agree(m, r, |db| db.from("students").select("id,name").neq("name", "Bob")).await;
    assert_agree(m, r, |db| db.from("students").select("*").in_("id", ["a", "d"])).await;
    assert_agree(m, r, |db| db.from("students").select("*").is("deleted_at", Value::Null)).await;
    assert_agree(m, r, |db| db.from("students").select("*").not("deleted_at", "is", "null")).await;
    assert_agree(m, r, |db| db.from("students").select("*").ilike("name", "%AN%")).await;
    assert_agree(m, r, |db| db.from("students").select("*").eq("name", "Smith, J")).await;
    assert_agree(m, r, |db| {
        db.from("students")
            .select("*")
            .or("grade.gt.8,name.eq.\"Smith, J\"")
    })
    .await;
    assert_agree(m, r, |db| {
        db.from("students")
            .select("*")
            .order("grade", SortDirection::Desc)
            .range(1, 2)
    })
    .await;
    assert_agree(m, r, |db| {
        db.from("students")
            .select("*")
            .order("name", SortDirection::Asc)
            .limit(2)
    })
    .await;
    assert_agree(m, r, |db| db.from("missing").select("*")).await;
}

#[tokio::test]
async fn test_offset_without_limit_agrees() {
    let (memory, rest, loopback) = pair();
    let params = QueryParams::parse_args(&["order=id.asc", "offset=1"]).unwrap();

    let from_memory = memory.from("students").select("id").apply_params(params.clone()).await;
    let from_rest = rest.from("students").select("id").apply_params(params).await;
    assert_eq!(from_memory.count(), 3);
    assert_eq!(from_memory, from_rest);

    let requests = loopback.requests.lock().unwrap();
    assert!(requests[0].params.iter().any(|(k, v)| k == "offset" && v == "1"));
    assert!(requests[0].params.iter().all(|(k, _)| k != "limit"));
}

#[tokio::test]
async fn test_single_agrees() {
    let (memory, rest, _) = pair();

    for db in [&memory, &rest] {
        let one = db.from("students").select("*").eq("id", "b").single().await;
        assert_eq!(one.data.unwrap()["name"], "Bob");

        let none = db.from("students").select("*").eq("id", "zz").single().await;
        assert!(none.data.is_none() && none.error.is_none());

        let many = db.from("students").select("*").eq("grade", 7).single().await;
        assert_eq!(many.error, Some(DataSourceError::Cardinality { rows: 2 }));
    }
}

#[tokio::test]
async fn test_maybe_single_policies_differ() {
    let (memory, rest, _) = pair();

    let relaxed = memory.from("students").select("*").eq("grade", 7).maybe_single().await;
    assert_eq!(relaxed.data.unwrap()["id"], "a");

    let strict = rest.from("students").select("*").eq("grade", 7).maybe_single().await;
    assert_eq!(strict.error, Some(DataSourceError::Cardinality { rows: 2 }));
}

#[tokio::test]
async fn test_mutations_agree_on_shape() {
    let (memory, rest, loopback) = pair();

    for db in [&memory, &rest] {
        let updated = db
            .from("students")
            .update(json!({"grade": 10}))
            .eq("grade", 7)
            .await;
        let rows = updated.data.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["grade"] == 10 && r["updated_at"].is_string()));

        let inserted = db.from("students").insert(json!({"id": "e", "name": "Eve"})).await;
        assert_eq!(inserted.count(), 1);

        let upserted = db
            .from("students")
            .upsert(json!([{"id": "e", "grade": 4}, {"id": "f"}]))
            .await;
        assert_eq!(upserted.count(), 2);

        let deleted = db.from("students").delete().eq("id", "b").await;
        assert!(deleted.data.is_none() && deleted.error.is_none());

        let remaining = db.from("students").select("id").order("id", SortDirection::Asc).await;
        let ids: Vec<Value> = remaining
            .data
            .unwrap()
            .into_iter()
            .map(|r| r["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("a"), json!("c"), json!("d"), json!("e"), json!("f")]);
    }

    let methods: Vec<Method> = loopback
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(
        methods,
        vec![Method::Patch, Method::Post, Method::Post, Method::Delete, Method::Get]
    );
}

#[tokio::test]
async fn test_errors_surface_as_values_on_both_sides() {
    let (memory, rest, _) = pair();

    let from_memory = memory.from("students").insert(json!({"id": "a"})).await;
    assert_eq!(from_memory.error.unwrap().code(), "DUPLICATE_KEY");

    let from_rest = rest.from("students").insert(json!({"id": "a"})).await;
    match from_rest.error {
        Some(DataSourceError::Backend { status, code, .. }) => {
            assert_eq!(status, 409);
            assert_eq!(code.as_deref(), Some("DUPLICATE_KEY"));
        }
        other => panic!("expected backend error, got {:?}", other),
    }
    assert!(from_rest.data.is_none());

    for db in [&memory, &rest] {
        let rejected = db.from("students").select("*").filter("tags", "cs", "{a}").await;
        assert_eq!(rejected.error.unwrap().code(), "UNSUPPORTED_OPERATOR");
    }
}
