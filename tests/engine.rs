use pretty_assertions::assert_eq;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use rqlx::fallback;
use rqlx::prelude::*;

async fn memory_pool() -> SqlitePool {
    // One connection: every `sqlite::memory:` connection is its own database.
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql).execute(pool).await.unwrap();
}

async fn users_db(config: Config) -> RqlDb {
    let pool = memory_pool().await;
    exec(&pool, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)").await;
    exec(&pool, "INSERT INTO users (id, name, age) VALUES (1, 'Alice', 30), (2, 'Bob', 25)").await;
    RqlDb::new(pool, config).await.unwrap()
}

fn user(id: i64, name: &str, age: i64) -> Row {
    Row::new().with("id", id).with("name", name).with("age", age)
}

#[tokio::test]
async fn test_read_examples() {
    let db = users_db(Config::default()).await;

    let result = db.read("users", "gt(age,26)").await.unwrap();
    assert_eq!(result.rows, vec![user(1, "Alice", 30)]);
    assert_eq!(result.row_count, 1);

    let result = db.read("users", "and(eq(name,Alice),lt(age,40))").await.unwrap();
    assert_eq!(result.rows, vec![user(1, "Alice", 30)]);

    let result = db.read("users", "sort(-age)&select(name)").await.unwrap();
    assert_eq!(
        result.rows,
        vec![Row::new().with("name", "Alice"), Row::new().with("name", "Bob")]
    );
}

#[tokio::test]
async fn test_both_syntaxes_read_the_same_rows() {
    let db = users_db(Config::default()).await;
    let functional = db.read("users", "and(eq(name,Alice),lt(age,40))").await.unwrap();
    let infix = db.read("users", "name=Alice&age=lt=40").await.unwrap();
    assert_eq!(functional, infix);
}

#[tokio::test]
async fn test_update_example() {
    let db = users_db(Config::default()).await;

    let patch = Row::new().with("age", 26);
    let result = db
        .update("users", "eq(id,2)", &patch, WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(result.affected, 1);

    let result = db.read("users", "eq(id,2)").await.unwrap();
    assert_eq!(result.rows, vec![user(2, "Bob", 26)]);
}

#[tokio::test]
async fn test_unfiltered_writes_need_confirmation() {
    let db = users_db(Config::default()).await;

    let err = db.delete("users", "", WriteOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        RqlError::RequiresConfirmation { operation: "delete", .. }
    ));

    let patch = Row::new().with("age", 1);
    let err = db
        .update("users", "", &patch, WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RqlError::RequiresConfirmation { operation: "update", .. }
    ));
    assert_eq!(db.read("users", "count()").await.unwrap().rows, vec![Row::new().with("count", 2)]);

    let result = db.delete("users", "", WriteOptions::confirmed()).await.unwrap();
    assert_eq!(result.affected, 2);
    assert!(db.read("users", "").await.unwrap().rows.is_empty());
}

#[tokio::test]
async fn test_create_then_read_by_key() {
    let db = users_db(Config::default()).await;

    let created = db
        .create("users", &Row::new().with("name", "Carol").with("age", 41))
        .await
        .unwrap();
    assert_eq!(created.row, user(3, "Carol", 41));

    let result = db.read("users", "eq(id,3)").await.unwrap();
    assert_eq!(result.rows, vec![created.row]);
}

#[tokio::test]
async fn test_errors_are_structured() {
    let db = users_db(Config::default()).await;

    match db.read("user", "").await.unwrap_err() {
        RqlError::NotFound(NotFound::Table { suggestion, .. }) => {
            assert_eq!(suggestion.as_deref(), Some("users"))
        }
        other => panic!("unexpected: {:?}", other),
    }

    assert!(matches!(
        db.read("users", "eq(agee,3)").await.unwrap_err(),
        RqlError::NotFound(NotFound::Column { .. })
    ));

    assert!(matches!(
        db.read("users", "in(age,())").await.unwrap_err(),
        RqlError::Parse(ParseError::EmptyArraySet { .. })
    ));

    assert!(matches!(
        db.delete("users", "eq(id,1)&sort(age)", WriteOptions::default())
            .await
            .unwrap_err(),
        RqlError::Compile(CompileError::NotApplicable { modifier: "sort", .. })
    ));

    assert!(matches!(
        db.create("users", &Row::new().with("nam", "X")).await.unwrap_err(),
        RqlError::NotFound(NotFound::Column { .. })
    ));

    // A constraint violation comes back from the engine untouched.
    assert!(matches!(
        db.create("users", &Row::new().with("id", 1)).await.unwrap_err(),
        RqlError::Database(_)
    ));
}

#[tokio::test]
async fn test_unsupported_read_falls_back() {
    let db = users_db(Config::default()).await;

    let query = "in(age,((30),(25)))&sort(-age)";
    assert!(matches!(db.explain("users", query).unwrap(), Explain::Fallback { .. }));

    let result = db.read("users", query).await.unwrap();
    assert_eq!(result.rows, vec![user(1, "Alice", 30), user(2, "Bob", 25)]);
}

#[tokio::test]
async fn test_unsupported_write_fails() {
    let db = users_db(Config::default()).await;

    let err = db
        .delete("users", "in(age,((30),(25)))", WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RqlError::Compile(CompileError::UnsupportedConstruct(_))
    ));
    assert_eq!(db.read("users", "").await.unwrap().row_count, 2);
}

#[tokio::test]
async fn test_bind_limit_fallback_matches_compiled() {
    let compiled = users_db(Config::default()).await;
    let limited = users_db(Config::builder().max_bind_params(1).build()).await;

    let query = "in(id,(1,2,3))&sort(-age)&limit(1,1)";
    assert!(matches!(compiled.explain("users", query).unwrap(), Explain::Compiled(_)));
    assert!(matches!(limited.explain("users", query).unwrap(), Explain::Fallback { .. }));

    assert_eq!(
        compiled.read("users", query).await.unwrap(),
        limited.read("users", query).await.unwrap()
    );
}

#[tokio::test]
async fn test_oversized_like_pattern_falls_back() {
    let db = users_db(Config::default()).await;
    let needle = "a".repeat(50_000);
    let created = db
        .create("users", &Row::new().with("name", format!("x{}y", needle)).with("age", 7))
        .await
        .unwrap();

    let query = format!("contains(name,{})", needle);
    assert!(matches!(db.explain("users", &query).unwrap(), Explain::Fallback { .. }));
    let result = db.read("users", &query).await.unwrap();
    assert_eq!(result.rows, vec![created.row]);

    let excluded = db
        .read("users", &format!("excludes(name,{})&select(name)", needle))
        .await
        .unwrap();
    assert_eq!(
        excluded.rows,
        vec![Row::new().with("name", "Alice"), Row::new().with("name", "Bob")]
    );

    let err = db
        .delete("users", &query, WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RqlError::Compile(CompileError::UnsupportedConstruct(_))
    ));
    assert_eq!(db.read("users", "").await.unwrap().row_count, 3);
}

#[tokio::test]
async fn test_distinct_reads() {
    let db = users_db(Config::default()).await;
    db.create("users", &Row::new().with("name", "Alice").with("age", 52))
        .await
        .unwrap();

    let result = db.read("users", "select(name)&distinct()").await.unwrap();
    assert_eq!(
        result.rows,
        vec![Row::new().with("name", "Alice"), Row::new().with("name", "Bob")]
    );

    assert!(matches!(
        db.read("users", "select(name)&sort(age)&distinct()").await.unwrap_err(),
        RqlError::Compile(CompileError::UnselectedSortKey(_))
    ));
    assert!(matches!(
        db.delete("users", "eq(name,Alice)&distinct()", WriteOptions::default())
            .await
            .unwrap_err(),
        RqlError::Compile(CompileError::NotApplicable { modifier: "distinct", .. })
    ));
}

#[tokio::test]
async fn test_fallback_row_limit() {
    let db = users_db(Config::builder().fallback_row_limit(1).build()).await;

    match db.read("users", "in(age,((30)))").await.unwrap_err() {
        RqlError::FallbackTooLarge { rows, limit, .. } => {
            assert_eq!(rows, 2);
            assert_eq!(limit, 1);
        }
        other => panic!("unexpected: {:?}", other),
    }

    // Compiled reads are not bounded.
    assert_eq!(db.read("users", "").await.unwrap().row_count, 2);
}

#[tokio::test]
async fn test_read_only_tables() {
    let db = users_db(Config::builder().read_only_table("users").build()).await;

    assert!(matches!(
        db.delete("users", "eq(id,1)", WriteOptions::default()).await.unwrap_err(),
        RqlError::ReadOnly { .. }
    ));
    assert!(matches!(
        db.create("users", &Row::new().with("name", "X")).await.unwrap_err(),
        RqlError::ReadOnly { .. }
    ));
    assert_eq!(db.read("users", "").await.unwrap().row_count, 2);
}

#[tokio::test]
async fn test_default_limit() {
    let db = users_db(Config::builder().default_limit(1).build()).await;

    assert_eq!(db.read("users", "").await.unwrap().rows, vec![user(1, "Alice", 30)]);
    assert_eq!(db.read("users", "limit(5)").await.unwrap().row_count, 2);
    assert_eq!(
        db.read("users", "count()").await.unwrap().rows,
        vec![Row::new().with("count", 2)]
    );
}

#[tokio::test]
async fn test_explain_compiled() {
    let db = users_db(Config::default()).await;
    match db.explain("users", "name=Alice").unwrap() {
        Explain::Compiled(statement) => {
            assert_eq!(
                statement.sql,
                "SELECT * FROM \"users\" WHERE \"name\" = ? ORDER BY \"id\" ASC"
            );
            assert_eq!(statement.params, vec![Value::Text("Alice".into())]);
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_boolean_columns() {
    let pool = memory_pool().await;
    exec(&pool, "CREATE TABLE flags (id INTEGER PRIMARY KEY, active BOOLEAN NOT NULL DEFAULT 0)").await;
    let db = RqlDb::new(pool, Config::default()).await.unwrap();

    let created = db
        .create("flags", &Row::new().with("active", true))
        .await
        .unwrap();
    assert_eq!(created.row, Row::new().with("id", 1).with("active", true));

    let defaulted = db.create("flags", &Row::new()).await.unwrap();
    assert_eq!(defaulted.row.get("active"), Some(&Value::Bool(false)));

    let result = db.read("flags", "eq(active,true)").await.unwrap();
    assert_eq!(result.rows, vec![created.row]);
}

async fn items_db() -> RqlDb {
    let pool = memory_pool().await;
    exec(
        &pool,
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, qty INTEGER, price REAL, note TEXT)",
    )
    .await;
    exec(
        &pool,
        "INSERT INTO items (id, name, qty, price, note) VALUES
            (1, 'Apple', 3, 1.5, 'x1'),
            (2, 'banana', NULL, 9.5, NULL),
            (3, 'Cherry 50%', 1, 12.0, '10'),
            (4, 'date_a', 3, NULL, '9x'),
            (5, 'Émile', 2, 5.25, 'x'),
            (6, NULL, 5, 7.0, 'abc'),
            (7, 'apple', 3, 1.5, 'X2'),
            (8, 'big', 9007199254740993, 2.0, 'x9')",
    )
    .await;
    RqlDb::new(pool, Config::default()).await.unwrap()
}

#[tokio::test]
async fn test_compiled_and_fallback_agree() {
    let db = items_db().await;
    let table = db.catalog().table("items").unwrap().clone();
    let all = db.read("items", "").await.unwrap().rows;
    assert_eq!(all.len(), 8);

    let queries = [
        "gt(qty,2)",
        "le(price,9.5)",
        "ge(price,5)",
        "lt(note,9)",
        "eq(qty,string:3)",
        "ne(qty,3)",
        "eq(note,null)",
        "ne(name,null)",
        "contains(name,APP)",
        "contains(name,é)",
        "contains(name,50%)",
        "contains(name,_)",
        "excludes(name,a)",
        "in(qty,(1,3))",
        "in(qty,(1,3,null))",
        "out(qty,(1,3))",
        "out(qty,(1,null))",
        "or(lt(qty,2),and(gt(price,5),contains(note,x)))",
        "and(or(eq(name,Apple),eq(name,apple)),lt(id,7))",
        "sort(-price,name)",
        "sort(note,-qty)&limit(3,1)",
        "sort(-qty)&select(name)",
        "select(price,id)&limit(2)",
        "gt(qty,1)&count()",
        "count()",
        "gt(qty,9007199254740992.0)",
        "ge(qty,9007199254740993.0)",
        "eq(qty,9007199254740992.0)",
        "sort(-qty)&limit(2)",
        "select(qty)&distinct()",
        "select(price,name)&sort(-price)&distinct()&limit(3,1)",
        "gt(price,1)&select(price)&distinct()",
        "distinct()",
    ];

    for query in queries {
        let compiled = db.read("items", query).await.unwrap();
        assert!(matches!(db.explain("items", query).unwrap(), Explain::Compiled(_)));

        let parsed = parse(query).unwrap();
        let evaluated = fallback::evaluate(&all, &parsed, &table);
        assert_eq!(compiled.rows, evaluated, "{}", query);
    }
}
