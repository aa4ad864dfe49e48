//! Builder round-trips against a live PostgreSQL.
//!
//! Set `DATABASE_URL` to run; every test skips otherwise. Fixtures are temporary tables, so each
//! test sees only its own connection's data.

use chrono::{DateTime, FixedOffset};
use pgchain::{
    ChainError, Data, Database, Direction, ErrorKind, NO_ROWS_MESSAGE, Record,
    SelectOptions, Value, payload,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

type Db = Database<tokio_postgres::Client>;

async fn try_connect() -> Option<Db> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return None;
    };
    let (client, connection) = tokio_postgres::connect(&database_url, tokio_postgres::NoTls)
        .await
        .expect("Failed to connect to DATABASE_URL with NoTls");
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("tokio-postgres connection error: {e}");
        }
    });
    Some(Database::new(client))
}

async fn create_projects(db: &Db) {
    db.raw(
        "CREATE TEMP TABLE projects (
            id BIGSERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            visibility TEXT NOT NULL DEFAULT 'public',
            featured BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute()
    .await
    .unwrap();
}

/// 10 public and 5 private projects with distinct creation times.
async fn seed_projects(db: &Db) {
    create_projects(db).await;
    db.raw(
        "INSERT INTO projects (title, slug, visibility, created_at)
         SELECT 'Public ' || g, 'public-' || g, 'public', now() - make_interval(mins => g)
         FROM generate_series(1, 10) AS g",
    )
    .execute()
    .await
    .unwrap();
    db.raw(
        "INSERT INTO projects (title, slug, visibility, created_at)
         SELECT 'Private ' || g, 'private-' || g, $1, now() - make_interval(secs => g)
         FROM generate_series(1, 5) AS g",
    )
    .bind("private")
    .execute()
    .await
    .unwrap();
}

async fn create_access_requests(db: &Db) {
    db.raw(
        "CREATE TEMP TABLE access_requests (
            id SERIAL PRIMARY KEY,
            email TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute()
    .await
    .unwrap();
}

fn created_at(row: &Record) -> DateTime<FixedOffset> {
    let raw = row["created_at"].as_str().expect("created_at is a string");
    DateTime::parse_from_rfc3339(raw).expect("created_at is RFC 3339")
}

fn id_of(row: &Record) -> i64 {
    row["id"].as_i64().expect("integer id")
}

#[tokio::test]
async fn latest_public_projects() {
    let Some(db) = try_connect().await else {
        return;
    };
    seed_projects(&db).await;

    let resp = db
        .from("projects")
        .select("*")
        .eq("visibility", "public")
        .order("created_at", Direction::Desc)
        .limit(6)
        .await;

    assert!(resp.error.is_none(), "{:?}", resp.error);
    assert_eq!(resp.count, Some(6));
    let rows = resp.rows();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| r["visibility"] == json!("public")));
    for pair in rows.windows(2) {
        assert!(created_at(&pair[0]) >= created_at(&pair[1]));
    }
}

#[tokio::test]
async fn filters_bind_in_declaration_order() {
    let Some(db) = try_connect().await else {
        return;
    };
    seed_projects(&db).await;

    let builder = db
        .from("projects")
        .select("id, slug")
        .eq("visibility", "private")
        .eq("slug", "private-3");
    let stmt = builder.to_statement().unwrap();
    assert_eq!(stmt.params, vec![Value::from("private"), Value::from("private-3")]);

    let resp = builder.await;
    assert_eq!(resp.count, Some(1));
    let row = resp.row().unwrap();
    assert_eq!(row["slug"], json!("private-3"));
    assert_eq!(row.len(), 2);
}

#[tokio::test]
async fn count_only_matches_full_select() {
    let Some(db) = try_connect().await else {
        return;
    };
    seed_projects(&db).await;

    let counted = db
        .from("projects")
        .select_with("*", SelectOptions::count_only())
        .eq("visibility", "public")
        .await;
    assert!(counted.data.is_none());
    assert_eq!(counted.count, Some(10));

    let all = db.from("projects").eq("visibility", "public").await;
    assert_eq!(all.rows().len() as i64, counted.count.unwrap());

    let everything = db
        .from("projects")
        .select_with("id", SelectOptions::count_only())
        .await;
    assert_eq!(everything.count, Some(15));
}

#[tokio::test]
async fn insert_returns_server_generated_columns() {
    let Some(db) = try_connect().await else {
        return;
    };
    create_projects(&db).await;

    let resp = db
        .from("projects")
        .insert(payload! { "title" => "X", "slug" => "x" })
        .await;

    assert!(resp.is_ok(), "{:?}", resp.error);
    assert!(resp.count.is_none());
    let row = resp.row().unwrap();
    assert_eq!(row["title"], json!("X"));
    assert_eq!(row["slug"], json!("x"));
    assert!(id_of(row) > 0);
    let _ = created_at(row);
}

#[tokio::test]
async fn insert_uses_only_the_first_row() {
    let Some(db) = try_connect().await else {
        return;
    };
    create_projects(&db).await;

    let resp = db
        .from("projects")
        .insert(vec![
            payload! { "title" => "A", "slug" => "a" },
            payload! { "title" => "B", "slug" => "b" },
        ])
        .await;
    assert_eq!(resp.rows().len(), 1);

    let counted = db
        .from("projects")
        .select_with("*", SelectOptions::count_only())
        .await;
    assert_eq!(counted.count, Some(1));
}

#[tokio::test]
async fn update_by_id_changes_one_row() {
    let Some(db) = try_connect().await else {
        return;
    };
    create_access_requests(&db).await;

    let first = db
        .from("access_requests")
        .insert(payload! { "email" => "a@example.com" })
        .single()
        .await;
    let other = db
        .from("access_requests")
        .insert(payload! { "email" => "b@example.com" })
        .single()
        .await;
    let id = id_of(first.row().unwrap());
    let other_id = id_of(other.row().unwrap());

    let updated = db
        .from("access_requests")
        .update(payload! { "status" => "approved" })
        .eq("id", id)
        .await;
    assert!(updated.is_ok(), "{:?}", updated.error);
    assert_eq!(updated.rows().len(), 1);
    assert_eq!(updated.row().unwrap()["status"], json!("approved"));
    assert_eq!(id_of(updated.row().unwrap()), id);

    let reread = db.from("access_requests").eq("id", id).single().await;
    assert_eq!(reread.row().unwrap()["status"], json!("approved"));

    let untouched = db.from("access_requests").eq("id", other_id).single().await;
    assert_eq!(untouched.row().unwrap()["status"], json!("pending"));
}

#[tokio::test]
async fn delete_then_single_reports_no_rows() {
    let Some(db) = try_connect().await else {
        return;
    };
    seed_projects(&db).await;

    let target = db
        .from("projects")
        .eq("slug", "public-4")
        .single()
        .await;
    let id = id_of(target.row().unwrap());

    let deleted = db.from("projects").delete().eq("id", id).await;
    assert!(deleted.is_ok());
    assert_eq!(deleted.rows().len(), 1);
    assert_eq!(id_of(&deleted.rows()[0]), id);

    let gone = db.from("projects").eq("id", id).single().await;
    assert!(gone.data.is_none());
    let err = gone.error.expect("no rows error");
    assert_eq!(err.message, NO_ROWS_MESSAGE);
    assert_eq!(err.kind, ErrorKind::NoRows);

    let remaining = db
        .from("projects")
        .select_with("*", SelectOptions::count_only())
        .await;
    assert_eq!(remaining.count, Some(14));
}

#[tokio::test]
async fn single_admin_lookup_by_email() {
    let Some(db) = try_connect().await else {
        return;
    };
    db.raw(
        "CREATE TEMP TABLE admin_users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL
        )",
    )
    .execute()
    .await
    .unwrap();
    db.raw("INSERT INTO admin_users (email, password_hash) VALUES ($1, $2)")
        .bind("admin@example.com")
        .bind("$argon2id$v=19$m=65536,t=3,p=4$c2FsdA$aGFzaA")
        .execute()
        .await
        .unwrap();

    let resp = db
        .from("admin_users")
        .select("id, email, password_hash")
        .eq("email", "admin@example.com")
        .single()
        .await;
    let Some(Data::One(admin)) = &resp.data else {
        panic!("expected one admin row, got {resp:?}");
    };
    assert!(admin["password_hash"].as_str().unwrap().starts_with("$argon2id$"));

    // Uuid text binds against the uuid column.
    let by_id = db
        .from("admin_users")
        .eq("id", admin["id"].as_str().unwrap())
        .single()
        .await;
    assert!(by_id.is_ok(), "{:?}", by_id.error);
}

#[tokio::test]
async fn constraint_violation_is_normalized() {
    let Some(db) = try_connect().await else {
        return;
    };
    create_projects(&db).await;
    db.from("projects")
        .insert(payload! { "title" => "X", "slug" => "dup" })
        .await;

    let seen = Arc::new(Mutex::new(false));
    let flag = seen.clone();
    let resp = db
        .from("projects")
        .insert(payload! { "title" => "Y", "slug" => "dup" })
        .on_error(move |err: &ChainError| {
            *flag.lock().unwrap() = err.is_unique_violation();
        })
        .await;

    assert!(resp.data.is_none());
    let err = resp.error.expect("constraint error");
    assert_eq!(err.kind, ErrorKind::Constraint);
    assert_eq!(err.code.as_deref(), Some("23505"));
    assert!(*seen.lock().unwrap());
}

#[tokio::test]
async fn engine_errors_do_not_escape() {
    let Some(db) = try_connect().await else {
        return;
    };

    let resp = db.from("missing_table_for_pgchain").eq("id", 1).await;
    assert!(resp.data.is_none());
    assert!(resp.count.is_none());
    let err = resp.error.expect("undefined table error");
    assert_eq!(err.kind, ErrorKind::Database);
    assert_eq!(err.code.as_deref(), Some("42P01"));
}

#[tokio::test]
async fn typed_values_round_trip() {
    let Some(db) = try_connect().await else {
        return;
    };
    db.raw(
        "CREATE TEMP TABLE publications (
            id SERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            year INT2 NOT NULL,
            citations INT8,
            score NUMERIC(6, 2),
            tags TEXT[] NOT NULL DEFAULT '{}',
            meta JSONB,
            published_on DATE,
            external_id UUID
        )",
    )
    .execute()
    .await
    .unwrap();

    let external_id = uuid::Uuid::new_v4();
    let resp = db
        .from("publications")
        .insert(payload! {
            "title" => "Lazy statements",
            "year" => 2024,
            "citations" => None::<i64>,
            "score" => "9.50",
            "tags" => json!(["rust", "sql"]),
            "meta" => json!({"venue": "RustConf"}),
            "published_on" => "2024-05-01",
            "external_id" => external_id,
        })
        .single()
        .await;

    assert!(resp.is_ok(), "{:?}", resp.error);
    let row = resp.row().unwrap();
    assert_eq!(row["year"], json!(2024));
    assert_eq!(row["citations"], json!(null));
    assert_eq!(row["score"], json!("9.50"));
    assert_eq!(row["tags"], json!(["rust", "sql"]));
    assert_eq!(row["meta"], json!({"venue": "RustConf"}));
    assert_eq!(row["published_on"], json!("2024-05-01"));
    assert_eq!(row["external_id"], json!(external_id.to_string()));

    let by_year = db.from("publications").eq("year", "2024").await;
    assert_eq!(by_year.rows().len(), 1);
}

async fn create_visitor_log(db: &Db) {
    db.raw(
        "CREATE TEMP TABLE visitor_log (
            id SERIAL PRIMARY KEY,
            ip_address INET NOT NULL,
            network CIDR,
            best_time TIME,
            session_length INTERVAL,
            visitor_ids UUID[],
            scores FLOAT8[],
            events JSONB[],
            seen_at TIMESTAMPTZ[],
            ratings INT2[],
            amounts NUMERIC[]
        )",
    )
    .execute()
    .await
    .unwrap();
}

#[tokio::test]
async fn select_star_decodes_network_time_and_array_columns() {
    let Some(db) = try_connect().await else {
        return;
    };
    create_visitor_log(&db).await;

    let inserted = db
        .from("visitor_log")
        .insert(payload! {
            "ip_address" => "10.0.0.2",
            "network" => "10.0.0.0/8",
            "best_time" => "09:30:00",
            "session_length" => "1 day 00:30:00",
        })
        .single()
        .await;
    assert!(inserted.is_ok(), "{:?}", inserted.error);
    let id = id_of(inserted.row().unwrap());

    db.raw(
        "UPDATE visitor_log SET
            visitor_ids = ARRAY['00000000-0000-0000-0000-000000000000'::uuid],
            scores = ARRAY[1.5, NULL]::float8[],
            events = ARRAY['{\"kind\": \"view\"}'::jsonb],
            seen_at = ARRAY['2024-05-01T10:00:00Z'::timestamptz],
            ratings = ARRAY[4, 5]::int2[],
            amounts = ARRAY[2.50]::numeric[]
         WHERE id = $1",
    )
    .bind(id)
    .execute()
    .await
    .unwrap();

    let resp = db
        .from("visitor_log")
        .select("*")
        .eq("ip_address", "10.0.0.2")
        .single()
        .await;
    assert!(resp.is_ok(), "{:?}", resp.error);
    let row = resp.row().unwrap();
    assert_eq!(row["ip_address"], json!("10.0.0.2"));
    assert_eq!(row["network"], json!("10.0.0.0/8"));
    assert_eq!(row["best_time"], json!("09:30:00"));
    assert_eq!(row["session_length"], json!("1 day 00:30:00"));
    assert_eq!(
        row["visitor_ids"],
        json!(["00000000-0000-0000-0000-000000000000"])
    );
    assert_eq!(row["scores"], json!([1.5, null]));
    assert_eq!(row["events"], json!([{"kind": "view"}]));
    assert_eq!(row["seen_at"], json!(["2024-05-01T10:00:00+00:00"]));
    assert_eq!(row["ratings"], json!([4, 5]));
    assert_eq!(row["amounts"], json!(["2.50"]));
}

#[tokio::test]
async fn failures_report_the_underlying_cause() {
    let Some(db) = try_connect().await else {
        return;
    };
    db.raw("CREATE TEMP TABLE landmarks (id SERIAL PRIMARY KEY, location POINT)")
        .execute()
        .await
        .unwrap();
    db.raw("INSERT INTO landmarks (location) VALUES (point(1, 2))")
        .execute()
        .await
        .unwrap();

    let unsupported = db.from("landmarks").select("*").await;
    let err = unsupported.error.expect("decode error");
    assert_eq!(err.kind, ErrorKind::Decode);
    assert!(err.message.contains("location"), "{}", err.message);
    assert!(err.message.contains("point"), "{}", err.message);

    create_visitor_log(&db).await;
    let mismatched = db
        .from("visitor_log")
        .insert(payload! { "ip_address" => true })
        .await;
    let err = mismatched.error.expect("bind error");
    assert_eq!(err.kind, ErrorKind::Database);
    assert!(err.message.contains("inet"), "{}", err.message);
}

#[tokio::test]
async fn record_keys_follow_result_columns() {
    let Some(db) = try_connect().await else {
        return;
    };
    let row = db
        .raw("SELECT 1 AS zeta, 2 AS alpha, 3 AS mid")
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(row.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);

    seed_projects(&db).await;
    let resp = db
        .from("projects")
        .select("slug, title, id")
        .eq("slug", "public-1")
        .single()
        .await;
    let row = resp.row().unwrap();
    assert_eq!(row.keys().collect::<Vec<_>>(), vec!["slug", "title", "id"]);
}

#[cfg(feature = "pool")]
#[tokio::test]
async fn pooled_database_from_env() {
    dotenvy::dotenv().ok();
    let config = match pgchain::DbConfig::from_env() {
        Ok(config) => config.max_connections(2),
        Err(_) => {
            eprintln!("DATABASE_URL not set; skipping");
            return;
        }
    };
    let db = Database::connect(&config).unwrap();

    let resp = db
        .from("pg_namespace")
        .select("nspname")
        .eq("nspname", "public")
        .single()
        .await;
    assert!(resp.is_ok(), "{:?}", resp.error);
    assert_eq!(resp.row().unwrap()["nspname"], json!("public"));

    let one = db.raw("SELECT 1::int4 AS one").fetch_one().await.unwrap();
    assert_eq!(one["one"], json!(1));
}
