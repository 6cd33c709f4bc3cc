use super::*;
use crate::driver::DriverFailure;
use crate::driver::testing::RecordingDriver;
use crate::record;

fn table(dialect: Dialect, primary_key: Option<&str>) -> (Table<RecordingDriver>, RecordingDriver) {
    let driver = RecordingDriver::new(dialect);
    let connection = Connection::new(driver.clone(), "");
    (connection.table("t", primary_key), driver)
}

fn last_call(driver: &RecordingDriver) -> (String, Vec<Value>) {
    driver.calls().pop().unwrap_or_default()
}

fn text(v: &str) -> Value {
    Value::Text(v.to_string())
}

// ==================== SELECT ====================

#[tokio::test]
async fn select_all_without_columns_selects_star() {
    let (t, driver) = table(Dialect::Postgres, None);
    t.select_all(&[], sql!("WHERE \"{}\" = {}", "status", "active").unwrap())
        .await
        .unwrap();
    assert_eq!(
        last_call(&driver),
        (
            r#"SELECT * FROM "t" WHERE "status" = $1"#.to_string(),
            vec![text("active")]
        )
    );
}

#[tokio::test]
async fn select_one_quotes_columns_and_limits() {
    let (t, driver) = table(Dialect::MySql, None);
    driver.push_rows(vec![record! { "id" => 6, "name" => "x" }]);
    let row = t
        .select_one(&["id", "name"], sql!("WHERE id > {}", 5).unwrap())
        .await
        .unwrap();
    assert_eq!(row.unwrap().get("id"), Some(&Value::Int(6)));
    assert_eq!(
        last_call(&driver).0,
        "SELECT `id`, `name` FROM `t` WHERE id > ? LIMIT 1"
    );
}

#[tokio::test]
async fn clause_with_leading_space_is_not_doubled() {
    let (t, driver) = table(Dialect::Postgres, None);
    t.select_all(&[], Statement::raw(" ORDER BY id")).await.unwrap();
    t.select_all(&[], Statement::new()).await.unwrap();
    let calls = driver.calls();
    assert_eq!(calls[0].0, r#"SELECT * FROM "t" ORDER BY id"#);
    assert_eq!(calls[1].0, r#"SELECT * FROM "t""#);
}

#[tokio::test]
async fn table_name_carries_connection_prefix() {
    let driver = RecordingDriver::new(Dialect::Postgres);
    let connection = Connection::new(driver.clone(), "app_");
    let users = connection.table("users", Some("id"));
    assert_eq!(users.name(), "app_users");

    users.get(1, &[]).await.unwrap();
    assert_eq!(
        last_call(&driver).0,
        r#"SELECT * FROM "app_users" WHERE "id" = $1 LIMIT 1"#
    );
}

#[tokio::test]
async fn eval_reads_result_column() {
    let (t, driver) = table(Dialect::Postgres, None);
    driver.push_rows(vec![record! { "result" => 3 }]);
    driver.push_rows(vec![record! { "result" => 4 }]);

    let value = t.eval(Statement::raw("COUNT(*)")).await.unwrap();
    assert_eq!(value, Some(Value::Int(3)));
    assert_eq!(
        last_call(&driver).0,
        r#"SELECT COUNT(*) AS result FROM "t" LIMIT 1"#
    );

    let count: Option<i64> = t.eval_as(Statement::raw("COUNT(*)")).await.unwrap();
    assert_eq!(count, Some(4));

    let empty = t.eval(Statement::raw("MAX(id)")).await.unwrap();
    assert_eq!(empty, None);
}

// ==================== UPDATE / DELETE ====================

#[tokio::test]
async fn update_all_on_mysql() {
    let (t, driver) = table(Dialect::MySql, None);
    t.update_all(record! { "status" => "done" }, sql!("WHERE id = {}", 3).unwrap())
        .await
        .unwrap();
    assert_eq!(
        last_call(&driver),
        (
            "UPDATE `t` SET `status` = ? WHERE id = ?".to_string(),
            vec![text("done"), Value::Int(3)]
        )
    );
}

#[tokio::test]
async fn update_one_narrows_by_ctid_on_postgres() {
    let (t, driver) = table(Dialect::Postgres, None);
    t.update_one(record! { "status" => "done" }, sql!("WHERE id = {}", 3).unwrap())
        .await
        .unwrap();
    assert_eq!(
        last_call(&driver),
        (
            r#"UPDATE "t" SET "status" = $1 WHERE ctid = (SELECT ctid FROM "t" WHERE id = $2 LIMIT 1)"#
                .to_string(),
            vec![text("done"), Value::Int(3)]
        )
    );
}

#[tokio::test]
async fn update_one_limits_on_mysql() {
    let (t, driver) = table(Dialect::MySql, None);
    t.update_one(record! { "status" => "done" }, sql!("WHERE id = {}", 3).unwrap())
        .await
        .unwrap();
    assert_eq!(
        last_call(&driver).0,
        "UPDATE `t` SET `status` = ? WHERE id = ? LIMIT 1"
    );
}

#[tokio::test]
async fn blank_filter_is_rejected_before_execution() {
    let (t, driver) = table(Dialect::Postgres, None);

    let err = t.delete_all(Statement::new()).await.unwrap_err();
    assert!(err.is_configuration());
    let err = t
        .update_one(record! { "a" => 1 }, Statement::raw("  "))
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn all_rows_must_be_explicit() {
    let (t, driver) = table(Dialect::Postgres, None);
    t.delete_all(Filter::AllRows).await.unwrap();
    t.delete_one(Filter::AllRows).await.unwrap();
    let calls = driver.calls();
    assert_eq!(calls[0].0, r#"DELETE FROM "t""#);
    assert_eq!(
        calls[1].0,
        r#"DELETE FROM "t" WHERE ctid = (SELECT ctid FROM "t" LIMIT 1)"#
    );
}

#[tokio::test]
async fn delete_one_limits_on_mysql() {
    let (t, driver) = table(Dialect::MySql, None);
    driver.push_summary(1);
    let summary = t
        .delete_one(sql!("WHERE expired = {}", true).unwrap())
        .await
        .unwrap();
    assert_eq!(summary.affected_rows, 1);
    assert_eq!(
        last_call(&driver),
        (
            "DELETE FROM `t` WHERE expired = ? LIMIT 1".to_string(),
            vec![Value::Bool(true)]
        )
    );
}

// ==================== INSERT ====================

#[tokio::test]
async fn insert_appends_extra() {
    let (t, driver) = table(Dialect::Postgres, None);
    t.insert(record! { "name" => "x", "age" => 5 }, Statement::raw("RETURNING id"))
        .await
        .unwrap();
    assert_eq!(
        last_call(&driver),
        (
            r#"INSERT INTO "t" ("name", "age") VALUES ($1, $2) RETURNING id"#.to_string(),
            vec![text("x"), Value::Int(5)]
        )
    );
}

#[tokio::test]
async fn insert_of_empty_row_is_a_composition_error() {
    let (t, driver) = table(Dialect::MySql, None);
    let err = t.insert(Record::new(), Statement::new()).await.unwrap_err();
    assert!(err.is_composition());
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn insert_ignore_per_dialect() {
    let (my, my_driver) = table(Dialect::MySql, None);
    my.insert_ignore(record! { "name" => "x" }, Statement::new())
        .await
        .unwrap();
    assert_eq!(
        last_call(&my_driver).0,
        "INSERT IGNORE INTO `t` (`name`) VALUES (?)"
    );

    let (pg, pg_driver) = table(Dialect::Postgres, None);
    pg.insert_ignore(record! { "name" => "x" }, Statement::raw("RETURNING id"))
        .await
        .unwrap();
    assert_eq!(
        last_call(&pg_driver).0,
        r#"INSERT INTO "t" ("name") VALUES ($1) ON CONFLICT DO NOTHING RETURNING id"#
    );
}

#[tokio::test]
async fn try_insert_swallows_only_duplicate_keys() {
    let (t, driver) = table(Dialect::MySql, None);
    driver.push_failure(DriverFailure::with_code("1062", "Duplicate entry '1' for key 'PRIMARY'"));
    driver.push_failure(DriverFailure::with_code("1146", "Table 't' doesn't exist"));
    driver.push_summary(1);

    let skipped = t
        .try_insert(record! { "id" => 1 }, Statement::new())
        .await
        .unwrap();
    assert_eq!(skipped, None);

    let err = t
        .try_insert(record! { "id" => 1 }, Statement::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("1146"));

    let inserted = t
        .try_insert(record! { "id" => 2 }, Statement::new())
        .await
        .unwrap();
    assert_eq!(inserted.map(|s| s.affected_rows), Some(1));
}

#[tokio::test]
async fn insert_surfaces_duplicate_key() {
    let (t, driver) = table(Dialect::Postgres, None);
    driver.push_failure(DriverFailure::with_code("23505", "duplicate key value"));
    let err = t.insert(record! { "id" => 1 }, Statement::new()).await.unwrap_err();
    assert!(err.is_duplicate_key());
    assert_eq!(
        err.driver_error().map(|e| e.sql.as_str()),
        Some(r#"INSERT INTO "t" ("id") VALUES ($1)"#)
    );
}

#[tokio::test]
async fn upsert_on_postgres_conflicts_on_primary_key() {
    let (t, driver) = table(Dialect::Postgres, Some("id"));
    t.upsert(
        record! { "id" => 1, "name" => "x" },
        Some(record! { "name" => "y" }),
        Statement::new(),
    )
    .await
    .unwrap();
    assert_eq!(
        last_call(&driver),
        (
            r#"INSERT INTO "t" ("id", "name") VALUES ($1, $2) ON CONFLICT ("id") DO UPDATE SET "name" = $3"#
                .to_string(),
            vec![Value::Int(1), text("x"), text("y")]
        )
    );
}

#[tokio::test]
async fn upsert_on_postgres_requires_primary_key() {
    let (t, driver) = table(Dialect::Postgres, None);
    let err = t
        .upsert(record! { "id" => 1 }, None, Statement::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn upsert_on_mysql_defaults_update_to_row() {
    let (t, driver) = table(Dialect::MySql, None);
    t.upsert(record! { "id" => 1, "name" => "x" }, None, Statement::new())
        .await
        .unwrap();
    assert_eq!(
        last_call(&driver),
        (
            "INSERT INTO `t` (`id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `id` = ?, `name` = ?"
                .to_string(),
            vec![Value::Int(1), text("x"), Value::Int(1), text("x")]
        )
    );
}

#[tokio::test]
async fn replace_per_dialect() {
    let (my, my_driver) = table(Dialect::MySql, None);
    my.replace(record! { "id" => 1 }, Statement::new()).await.unwrap();
    assert_eq!(last_call(&my_driver).0, "REPLACE INTO `t` (`id`) VALUES (?)");

    let (pg, pg_driver) = table(Dialect::Postgres, Some("id"));
    pg.replace(record! { "id" => 1, "name" => "x" }, Statement::new())
        .await
        .unwrap();
    assert_eq!(
        last_call(&pg_driver).0,
        r#"INSERT INTO "t" ("id", "name") VALUES ($1, $2) ON CONFLICT ("id") DO UPDATE SET "id" = $3, "name" = $4"#
    );

    let (keyless, keyless_driver) = table(Dialect::Postgres, None);
    let err = keyless
        .replace(record! { "id" => 1 }, Statement::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(keyless_driver.calls().is_empty());
}

// ==================== By primary key ====================

#[tokio::test]
async fn keyed_operations_compose_primary_key_filter() {
    let (t, driver) = table(Dialect::Postgres, Some("id"));
    t.get(7, &["name"]).await.unwrap();
    t.update(7, record! { "name" => "z" }).await.unwrap();

    let calls = driver.calls();
    assert_eq!(
        calls[0],
        (
            r#"SELECT "name" FROM "t" WHERE "id" = $1 LIMIT 1"#.to_string(),
            vec![Value::Int(7)]
        )
    );
    assert_eq!(
        calls[1],
        (
            r#"UPDATE "t" SET "name" = $1 WHERE "id" = $2"#.to_string(),
            vec![text("z"), Value::Int(7)]
        )
    );

    let (my, my_driver) = table(Dialect::MySql, Some("id"));
    my.delete("abc").await.unwrap();
    assert_eq!(
        last_call(&my_driver),
        ("DELETE FROM `t` WHERE `id` = ?".to_string(), vec![text("abc")])
    );
}

#[tokio::test]
async fn keyed_operations_require_primary_key() {
    let (t, driver) = table(Dialect::MySql, None);

    assert!(t.get(1, &[]).await.unwrap_err().is_configuration());
    assert!(t.delete(1).await.unwrap_err().is_configuration());
    assert!(
        t.update(1, record! { "a" => 1 })
            .await
            .unwrap_err()
            .is_configuration()
    );

    assert!(driver.calls().is_empty());
}
