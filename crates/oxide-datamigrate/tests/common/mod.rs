#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use oxide_datamigrate::prelude::*;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

pub async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql)
        .execute(pool)
        .await
        .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e}"));
}

pub fn fixed_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn users(rows: &[(i64, &str)]) -> Snapshot {
    let table = rows
        .iter()
        .fold(TableSnapshot::new("id", ["id", "name"]), |table, (id, name)| {
            table.row(row([("id", Value::from(*id)), ("name", Value::from(*name))]))
        });
    Snapshot::new("app").table("users", table)
}
