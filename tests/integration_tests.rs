//! Integration tests for rowmap using an in-memory database
//!
//! Covers the derive macro, schema generation, the entity manager's
//! insert/update dispatch and transactions, repository finders and the
//! query builder.

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use fake::Fake;
use fake::faker::name::en::FirstName;
use fake::faker::name::en::LastName;
use rowmap::TransactionState;
use rowmap::prelude::*;

// =============================================================================
// Test Entity Definitions
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Entity)]
pub struct Teacher {
    #[rowmap(primary_key, auto_generated)]
    pub id:          Option<i64>,
    #[rowmap(length = 50)]
    pub first_name:  String,
    #[rowmap(length = 50)]
    pub last_name:   String,
    pub age:         i64,
    pub nickname:    Option<String>,
    #[rowmap(column_type = "one_to_many")]
    pub employments: Vec<EmployeeList>,
}

#[derive(Clone, Debug, PartialEq, Entity)]
pub struct EmployeeList {
    #[rowmap(primary_key, auto_generated)]
    pub id:         Option<i64>,
    #[rowmap(references = "Teacher")]
    pub teacher:    i64,
    pub start_date: NaiveDate,
    pub end_date:   Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Entity)]
#[rowmap(table_name = "countries")]
pub struct Country {
    #[rowmap(primary_key, length = 3)]
    pub code:  Option<String>,
    #[rowmap(unique)]
    pub name:  String,
    #[rowmap(skip)]
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Entity)]
pub struct Lesson {
    #[rowmap(primary_key, auto_generated)]
    pub id:        Option<i64>,
    pub title:     String,
    pub active:    bool,
    pub duration:  f64,
    pub starts_at: NaiveDateTime,
    #[rowmap(length = 1000)]
    pub tags:      Json<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Entity)]
pub struct AuditEntry {
    #[rowmap(column_type = "text")]
    pub message: String,
}

// =============================================================================
// Helper Functions
// =============================================================================

#[ctor::ctor]
unsafe fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn create_test_db() -> Connection {
    let db = Builder::new_local(":memory:").build().await.unwrap();
    db.connect().unwrap()
}

async fn setup(conn: &Connection) -> EntityManager {
    let mut em = EntityManager::new(conn.clone());
    em.create_table::<Teacher>().await.unwrap();
    em.create_table::<EmployeeList>().await.unwrap();
    em
}

fn teacher(age: i64) -> Teacher {
    Teacher { first_name: FirstName().fake(), last_name: LastName().fake(), age, ..Default::default() }
}

fn named(first_name: &str, last_name: &str, age: i64) -> Teacher {
    Teacher { first_name: first_name.to_string(), last_name: last_name.to_string(), age, ..Default::default() }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn lesson(title: &str, active: bool, duration: f64, starts_at: NaiveDateTime, tags: &[&str]) -> Lesson {
    Lesson {
        id: None,
        title: title.to_string(),
        active,
        duration,
        starts_at,
        tags: Json(tags.iter().map(|t| t.to_string()).collect()),
    }
}

async fn seed(em: &mut EntityManager, teachers: Vec<Teacher>) -> Vec<Teacher> {
    let mut saved = Vec::with_capacity(teachers.len());
    for mut t in teachers {
        em.persist(&mut t).await.unwrap();
        saved.push(t);
    }
    em.flush().await.unwrap();
    saved
}

// =============================================================================
// Derived Metadata
// =============================================================================

#[test]
fn test_derived_metadata() {
    let metadata = Teacher::metadata().unwrap();
    assert_eq!(metadata.type_name(), "Teacher");
    assert_eq!(metadata.table_name(), "teacher");
    assert_eq!(metadata.primary_key(), Some("id"));
    assert_eq!(metadata.stored_columns().count(), 5);

    let first_name = metadata.column("first_name").unwrap();
    assert_eq!(first_name.length, 50);
    assert!(!first_name.nullable);
    assert!(metadata.column("nickname").unwrap().nullable);
    assert_eq!(metadata.column("employments").unwrap().logical_type, LogicalType::OneToMany);
}

#[test]
fn test_derived_foreign_key() {
    let metadata = EmployeeList::metadata().unwrap();
    assert_eq!(metadata.table_name(), "employee_list");
    assert_eq!(metadata.column("teacher").unwrap().logical_type, LogicalType::ManyToOne);
    assert_eq!(metadata.column("start_date").unwrap().logical_type, LogicalType::Date);

    let foreign_keys = metadata.foreign_keys();
    assert_eq!(foreign_keys.len(), 1);
    assert_eq!(foreign_keys[0].column, "teacher");
    assert_eq!(foreign_keys[0].referenced_table, "teacher");
    assert_eq!(foreign_keys[0].referenced_column, "id");
}

#[test]
fn test_derived_table_name_and_skip() {
    let metadata = Country::metadata().unwrap();
    assert_eq!(metadata.table_name(), "countries");
    assert!(metadata.column("label").is_none());
    assert!(!metadata.column("code").unwrap().auto_generated);
    assert!(metadata.column("name").unwrap().unique);

    assert_eq!(AuditEntry::metadata().unwrap().primary_key(), None);
}

#[test]
fn test_column_enum() {
    assert_eq!(TeacherColumn::LastName.name(), "last_name");
    assert_eq!(TeacherColumn::LastName.property(), "last_name");
    assert_eq!(TeacherColumn::all().len(), 5);
    assert_eq!(EmployeeListColumn::StartDate.to_string(), "start_date");
    assert_eq!(CountryColumn::all(), &[CountryColumn::Code, CountryColumn::Name]);
}

#[test]
fn test_column_values_skip_unassigned_key() {
    let t = named("Ada", "Byron", 36);
    let values = t.column_values();
    assert_eq!(values.len(), 4);
    assert!(values.iter().all(|(p, _)| *p != "id"));
    assert!(values.contains(&("nickname", Value::Null)));

    let t = Teacher { id: Some(7), ..t };
    assert_eq!(t.primary_key_value(), Some(Value::Integer(7)));
    assert_eq!(t.column_values().len(), 5);
}

// =============================================================================
// Schema
// =============================================================================

#[tokio::test]
async fn test_create_and_drop_table() {
    let conn = create_test_db().await;
    let mut em = EntityManager::new(conn.clone());

    em.create_table::<Teacher>().await.unwrap();
    em.create_table::<EmployeeList>().await.unwrap();
    assert!(SchemaGenerator::table_exists(&conn, "teacher").await.unwrap());
    assert!(SchemaGenerator::table_exists(&conn, "employee_list").await.unwrap());
    assert_eq!(em.transaction_state(), TransactionState::Idle);

    em.drop_table::<EmployeeList>().await.unwrap();
    assert!(!SchemaGenerator::table_exists(&conn, "employee_list").await.unwrap());
    assert!(SchemaGenerator::table_exists(&conn, "teacher").await.unwrap());
}

#[tokio::test]
async fn test_create_table_is_idempotent() {
    let conn = create_test_db().await;
    let mut em = EntityManager::new(conn.clone());

    em.create_table::<Country>().await.unwrap();
    em.create_table::<Country>().await.unwrap();
    assert!(SchemaGenerator::table_exists(&conn, "countries").await.unwrap());
}

// =============================================================================
// Entity Manager
// =============================================================================

#[tokio::test]
async fn test_persist_inserts_then_updates() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;

    let mut t = named("Ada", "Byron", 36);
    let outcome = em.persist(&mut t).await.unwrap();
    assert_eq!(outcome, Persisted::Inserted { rows: 1 });
    assert_eq!(em.transaction_state(), TransactionState::Active);
    let id = t.id.expect("generated key written back");

    t.last_name = "Lovelace".to_string();
    let outcome = em.persist(&mut t).await.unwrap();
    assert_eq!(outcome, Persisted::Updated { rows: 1 });
    assert_eq!(t.id, Some(id));

    em.flush().await.unwrap();
    assert_eq!(em.transaction_state(), TransactionState::Committed);

    let repository = Repository::<Teacher>::new(conn).unwrap();
    let found = repository.find(id).await.unwrap().unwrap();
    assert_eq!(found, t);
    assert_eq!(repository.count_by(&Filter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_persist_assigned_key_updates() {
    let conn = create_test_db().await;
    let mut em = EntityManager::new(conn.clone());
    em.create_table::<Country>().await.unwrap();
    conn.execute("INSERT INTO countries (code, name) VALUES ('NLD', 'Holland')", ()).await.unwrap();

    let mut country =
        Country { code: Some("NLD".to_string()), name: "Netherlands".to_string(), label: "nl".to_string() };
    let outcome = em.persist(&mut country).await.unwrap();
    assert_eq!(outcome, Persisted::Updated { rows: 1 });
    em.flush().await.unwrap();

    let found = Repository::<Country>::new(conn).unwrap().find("NLD").await.unwrap().unwrap();
    assert_eq!(found.code.as_deref(), Some("NLD"));
    assert_eq!(found.name, "Netherlands");
    assert_eq!(found.label, "");
}

#[tokio::test]
async fn test_typed_columns_round_trip() {
    let conn = create_test_db().await;
    let mut em = EntityManager::new(conn.clone());
    em.create_table::<Lesson>().await.unwrap();

    let starts_at = date(2024, 3, 1).and_hms_milli_opt(9, 15, 30, 250).unwrap();
    let mut algebra = lesson("Algebra", true, 45.5, starts_at, &["math", "first year"]);
    let mut poetry = lesson("Poetry", false, 0.75, date(2024, 3, 2).and_hms_opt(14, 0, 0).unwrap(), &[]);
    em.persist(&mut algebra).await.unwrap();
    em.persist(&mut poetry).await.unwrap();
    em.flush().await.unwrap();

    let repository = Repository::<Lesson>::new(conn).unwrap();
    let found = repository.find(algebra.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(found, algebra);
    assert_eq!(found.starts_at, starts_at);
    assert_eq!(found.tags, Json(vec!["math".to_string(), "first year".to_string()]));

    let found = repository.find(poetry.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(found, poetry);
    assert!(!found.active);
}

#[tokio::test]
async fn test_find_by_boolean() {
    let conn = create_test_db().await;
    let mut em = EntityManager::new(conn.clone());
    em.create_table::<Lesson>().await.unwrap();

    let at = date(2024, 5, 6).and_hms_opt(8, 0, 0).unwrap();
    for (title, active) in [("Chemistry", true), ("Latin", false), ("Physics", true)] {
        let mut l = lesson(title, active, 50.0, at, &["science"]);
        em.persist(&mut l).await.unwrap();
    }
    em.flush().await.unwrap();

    let repository = Repository::<Lesson>::new(conn).unwrap();
    let active = repository
        .find_by(&Filter::by("active", true), &FindOptions::new().order_by("title", "asc"))
        .await
        .unwrap();
    let titles: Vec<&str> = active.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(titles, vec!["Chemistry", "Physics"]);

    let inactive = repository.find_by(&Filter::by("active", false), &FindOptions::new()).await.unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].title, "Latin");

    assert_eq!(repository.count_by(&Filter::by("active", true).and("duration", 50.0)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_persist_without_primary_key() {
    let conn = create_test_db().await;
    let mut em = EntityManager::new(conn.clone());
    em.create_table::<AuditEntry>().await.unwrap();

    let mut entry = AuditEntry { message: "created".to_string() };
    assert_eq!(em.persist(&mut entry).await.unwrap(), Persisted::Inserted { rows: 1 });
    assert_eq!(em.persist(&mut entry).await.unwrap(), Persisted::Inserted { rows: 1 });
    em.flush().await.unwrap();

    let repository = Repository::<AuditEntry>::new(conn).unwrap();
    assert_eq!(repository.count_by(&Filter::by("message", "created")).await.unwrap(), 2);

    let result = em.remove(&entry).await;
    assert!(matches!(result, Err(Error::PrimaryKeyNotDeclared(_))));
}

#[tokio::test]
async fn test_remove() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    let saved = seed(&mut em, vec![teacher(30), teacher(40)]).await;

    let rows = em.remove(&saved[0]).await.unwrap();
    assert_eq!(rows, 1);
    em.flush().await.unwrap();

    let repository = Repository::<Teacher>::new(conn).unwrap();
    assert!(repository.find(saved[0].id.unwrap()).await.unwrap().is_none());
    assert!(repository.find(saved[1].id.unwrap()).await.unwrap().is_some());

    let unsaved = teacher(50);
    assert!(matches!(em.remove(&unsaved).await, Err(Error::PrimaryKeyNotSet)));
}

#[tokio::test]
async fn test_rollback_discards_writes() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;

    let mut t = teacher(25);
    em.persist(&mut t).await.unwrap();
    em.rollback().await.unwrap();
    assert_eq!(em.transaction_state(), TransactionState::RolledBack);

    let repository = Repository::<Teacher>::new(conn).unwrap();
    assert_eq!(repository.count_by(&Filter::new()).await.unwrap(), 0);

    // the next write opens a fresh transaction
    let mut t = teacher(26);
    em.persist(&mut t).await.unwrap();
    assert_eq!(em.transaction_state(), TransactionState::Active);
    em.flush().await.unwrap();
    assert_eq!(repository.count_by(&Filter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_lazy_transaction_leaves_autocommit() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    assert!(conn.is_autocommit().unwrap());

    let mut t = teacher(45);
    em.persist(&mut t).await.unwrap();
    assert!(!conn.is_autocommit().unwrap());

    em.flush().await.unwrap();
    assert!(conn.is_autocommit().unwrap());
    assert_eq!(conn.path(), ":memory:");
    assert!(!conn.is_mvcc_enabled());
}

#[tokio::test]
async fn test_flush_without_transaction_is_noop() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;

    em.flush().await.unwrap();
    em.rollback().await.unwrap();
    assert_eq!(em.transaction_state(), TransactionState::Idle);
}

#[tokio::test]
async fn test_transactional_commits_on_ok() {
    let conn = create_test_db().await;
    setup(&conn).await;

    let t = teacher(33);
    let saved = EntityManager::transactional(conn.clone(), move |em| {
        Box::pin(async move {
            let mut t = t;
            em.persist(&mut t).await?;
            Ok::<_, Error>(t)
        })
    })
    .await
    .unwrap();

    let repository = Repository::<Teacher>::new(conn).unwrap();
    assert_eq!(repository.find(saved.id.unwrap()).await.unwrap(), Some(saved));
}

#[tokio::test]
async fn test_transactional_rolls_back_on_err() {
    let conn = create_test_db().await;
    setup(&conn).await;

    let t = teacher(33);
    let result: Result<()> = EntityManager::transactional(conn.clone(), move |em| {
        Box::pin(async move {
            let mut t = t;
            em.persist(&mut t).await?;
            Err::<(), _>(Error::Query("abort".to_string()))
        })
    })
    .await;
    assert!(matches!(result, Err(Error::Query(_))));

    let repository = Repository::<Teacher>::new(conn).unwrap();
    assert_eq!(repository.count_by(&Filter::new()).await.unwrap(), 0);
}

// =============================================================================
// Repository
// =============================================================================

#[tokio::test]
async fn test_find_by_scalar_null_and_list() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    let mut nicknamed = named("Grace", "Hopper", 40);
    nicknamed.nickname = Some("Amazing".to_string());
    seed(&mut em, vec![named("Alan", "Turing", 30), named("Ada", "Byron", 36), nicknamed]).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();

    let by_name = repository.find_by(&Filter::by("last_name", "Turing"), &FindOptions::new()).await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].first_name, "Alan");

    let without_nickname = repository
        .find_by(&Filter::by("nickname", None::<String>), &FindOptions::new().order_by("age", "asc"))
        .await
        .unwrap();
    let names: Vec<&str> = without_nickname.iter().map(|t| t.first_name.as_str()).collect();
    assert_eq!(names, vec!["Alan", "Ada"]);

    let in_list = repository
        .find_by(&Filter::by("age", vec![30i64, 40]), &FindOptions::new().order_by("age", "DESC"))
        .await
        .unwrap();
    let ages: Vec<i64> = in_list.iter().map(|t| t.age).collect();
    assert_eq!(ages, vec![40, 30]);

    let combined = Filter::by("last_name", "Byron").and("age", 36i64);
    let one = repository.find_one_by(&combined).await.unwrap().unwrap();
    assert_eq!(one.first_name, "Ada");

    assert!(repository.find_one_by(&Filter::by("last_name", "Nobody")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_by_rejects_empty_list() {
    let conn = create_test_db().await;
    setup(&conn).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();
    let result = repository.find_by(&Filter::by("age", Vec::<i64>::new()), &FindOptions::new()).await;
    assert!(matches!(result, Err(Error::TypeNotSupported(_))));
}

#[tokio::test]
async fn test_find_all_with_pagination() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    seed(&mut em, (20..30).map(teacher).collect()).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();

    let page = repository.find_all(&FindOptions::new().order_by("age", "asc").limit(3).offset(2)).await.unwrap();
    let ages: Vec<i64> = page.iter().map(|t| t.age).collect();
    assert_eq!(ages, vec![22, 23, 24]);

    let tail = repository.find_all(&FindOptions::new().order_by("age", "asc").offset(8)).await.unwrap();
    let ages: Vec<i64> = tail.iter().map(|t| t.age).collect();
    assert_eq!(ages, vec![28, 29]);

    assert_eq!(repository.find_all(&FindOptions::new()).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_invalid_order_direction() {
    let conn = create_test_db().await;
    setup(&conn).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();
    let result = repository.find_all(&FindOptions::new().order_by("age", "sideways")).await;
    assert!(matches!(result, Err(Error::OrderByFormat(direction)) if direction == "sideways"));

    let result = repository.find_by_range("age", 1, 2, &FindOptions::new().order_by("age", "up")).await;
    assert!(matches!(result, Err(Error::OrderByFormat(_))));
}

#[tokio::test]
async fn test_find_by_like() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    seed(&mut em, vec![named("Johanna", "Smith", 30), named("John", "Smithers", 31), named("Mary", "Jones", 32)]).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();

    let smiths = repository
        .find_by_like([("last_name", "Smith")], &FindOptions::new().order_by("first_name", "asc"))
        .await
        .unwrap();
    let names: Vec<&str> = smiths.iter().map(|t| t.first_name.as_str()).collect();
    assert_eq!(names, vec!["Johanna", "John"]);

    let both = repository.find_by_like([("first_name", "oh"), ("last_name", "ers")], &FindOptions::new()).await.unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].first_name, "John");

    let one = repository.find_one_by_like([("last_name", "one")]).await.unwrap().unwrap();
    assert_eq!(one.first_name, "Mary");
}

#[tokio::test]
async fn test_find_by_like_matches_wildcards_literally() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    seed(&mut em, vec![
        named("Percy", "100%", 30),
        named("Hundred", "1000", 31),
        named("Under", "a_b", 32),
        named("Plain", "axb", 33),
    ])
    .await;

    let repository = Repository::<Teacher>::new(conn).unwrap();

    let percent = repository.find_by_like([("last_name", "0%")], &FindOptions::new()).await.unwrap();
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].first_name, "Percy");

    let underscore = repository.find_by_like([("last_name", "a_b")], &FindOptions::new()).await.unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].first_name, "Under");
}

#[tokio::test]
async fn test_unknown_fields_are_rejected() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    seed(&mut em, vec![named("Alan", "Turing", 41)]).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();

    let result = repository.find_by(&Filter::by("id > 0 or last_name", "zzz"), &FindOptions::new()).await;
    assert!(matches!(result, Err(Error::Query(_))));

    let result = repository.count_by(&Filter::by("postal_code", "1234")).await;
    assert!(matches!(result, Err(Error::Query(_))));

    let result = repository.find_all(&FindOptions::new().order_by("age; DROP TABLE teacher", "asc")).await;
    assert!(matches!(result, Err(Error::Query(_))));

    let result = repository.find_by_like([("nickname = '' or last_name", "x")], &FindOptions::new()).await;
    assert!(matches!(result, Err(Error::Query(_))));

    let result = repository.find_one_by_range("1 = 1 or age", 0, 1).await;
    assert!(matches!(result, Err(Error::Query(_))));

    let result = repository.find_by(&Filter::by("employments", 1i64), &FindOptions::new()).await;
    assert!(matches!(result, Err(Error::Query(_))));

    assert_eq!(repository.count_by(&Filter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_find_by_range_includes_bounds() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    seed(&mut em, vec![teacher(17), teacher(18), teacher(25), teacher(30), teacher(31)]).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();

    let in_range = repository.find_by_range("age", 18, 30, &FindOptions::new().order_by("age", "asc")).await.unwrap();
    let ages: Vec<i64> = in_range.iter().map(|t| t.age).collect();
    assert_eq!(ages, vec![18, 25, 30]);

    let first = repository.find_one_by_range("age", 26, 40).await.unwrap().unwrap();
    assert!(first.age == 30 || first.age == 31);

    assert!(repository.find_one_by_range("age", 50, 60).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_by_date_range() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    let saved = seed(&mut em, vec![teacher(40)]).await;
    let teacher_id = saved[0].id.unwrap();

    for (start, end) in [(date(2019, 9, 1), Some(date(2020, 6, 30))), (date(2021, 9, 1), None)] {
        let mut employment = EmployeeList { id: None, teacher: teacher_id, start_date: start, end_date: end };
        em.persist(&mut employment).await.unwrap();
    }
    em.flush().await.unwrap();

    let repository = Repository::<EmployeeList>::new(conn).unwrap();
    let recent = repository
        .find_by_range("start_date", date(2021, 1, 1), date(2021, 12, 31), &FindOptions::new())
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].start_date, date(2021, 9, 1));
    assert_eq!(recent[0].end_date, None);

    let open = repository.find_by(&Filter::by("end_date", None::<NaiveDate>), &FindOptions::new()).await.unwrap();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn test_find_reference() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    let saved = seed(&mut em, vec![named("Alan", "Turing", 41)]).await;

    let mut employment =
        EmployeeList { id: None, teacher: saved[0].id.unwrap(), start_date: date(2020, 1, 6), end_date: None };
    em.persist(&mut employment).await.unwrap();
    em.flush().await.unwrap();

    let repository = Repository::<EmployeeList>::new(conn).unwrap();
    let found: Option<Teacher> = repository.find_reference(&employment, "teacher").await.unwrap();
    assert_eq!(found.unwrap().last_name, "Turing");

    let result = repository.find_reference::<Teacher>(&employment, "start_date").await;
    assert!(matches!(result, Err(Error::Query(_))));
}

#[tokio::test]
async fn test_count_by() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    seed(&mut em, vec![named("A", "Smith", 30), named("B", "Smith", 40), named("C", "Jones", 30)]).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();
    assert_eq!(repository.count_by(&Filter::new()).await.unwrap(), 3);
    assert_eq!(repository.count_by(&Filter::by("last_name", "Smith")).await.unwrap(), 2);
    assert_eq!(repository.count_by(&Filter::by("last_name", "Smith").and("age", 30i64)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_repository_trait_object_style() {
    async fn names<R: RepositoryTrait<Teacher>>(repository: &R) -> Vec<String> {
        repository
            .find_all(&FindOptions::new().order_by("first_name", "asc"))
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.first_name)
            .collect()
    }

    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    let saved = seed(&mut em, vec![named("Bea", "X", 30), named("Abe", "Y", 31)]).await;

    let repository = Repository::<Teacher>::new(conn).unwrap();
    assert_eq!(names(&repository).await, vec!["Abe", "Bea"]);

    let found = RepositoryTrait::find(&repository, Value::Integer(saved[0].id.unwrap())).await.unwrap();
    assert_eq!(found.unwrap().first_name, "Bea");
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test]
async fn test_registry_resolve_and_create() {
    let conn = create_test_db().await;
    let mut registry = Registry::new();
    registry.register::<Teacher>().unwrap();
    registry.register::<Country>().unwrap();

    assert_eq!(registry.resolve("Teacher").unwrap().table_name(), "teacher");
    assert_eq!(registry.resolve("countries").unwrap().type_name(), "Country");
    assert!(matches!(registry.resolve("Unknown"), Err(Error::EntityNotFound(_))));

    let mut em = EntityManager::new(conn.clone());
    for metadata in registry.iter() {
        em.create_table_for(metadata).await.unwrap();
    }
    assert!(SchemaGenerator::table_exists(&conn, "teacher").await.unwrap());
    assert!(SchemaGenerator::table_exists(&conn, "countries").await.unwrap());

    let repository = Repository::<Teacher>::from_registry(conn, &mut registry).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(repository.metadata().table_name(), "teacher");
}

// =============================================================================
// Query Builder
// =============================================================================

#[tokio::test]
async fn test_query_builder_join_group_having() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    let saved = seed(&mut em, vec![named("Alan", "Turing", 41), named("Ada", "Byron", 36)]).await;

    let starts = [(0, date(2018, 9, 1)), (0, date(2020, 9, 1)), (1, date(2019, 9, 1))];
    for (idx, start) in starts {
        let mut employment =
            EmployeeList { id: None, teacher: saved[idx].id.unwrap(), start_date: start, end_date: None };
        em.persist(&mut employment).await.unwrap();
    }
    em.flush().await.unwrap();

    let rows = QueryBuilder::<Teacher>::new(Some("t"))
        .unwrap()
        .select("t.last_name, COUNT(e.id)")
        .join("employee_list", "e", "e.teacher = t.id")
        .group_by("t.last_name")
        .and_having("COUNT(e.id) > :min")
        .set_parameter("min", 1)
        .get_query(&conn)
        .await
        .unwrap()
        .get_rows()
        .await
        .unwrap();
    assert_eq!(rows, vec![vec![Value::Text("Turing".to_string()), Value::Integer(2)]]);

    let teachers = QueryBuilder::<Teacher>::new(Some("t"))
        .unwrap()
        .select_distinct(Teacher::metadata().unwrap().projection(Some("t")).join(", "))
        .left_join("employee_list", "e", "e.teacher = t.id")
        .and_where("e.start_date >= :since")
        .or_where("t.age < :age")
        .set_parameter(":since", date(2019, 1, 1))
        .set_parameter("age", 37)
        .order_by("t.last_name", "asc")
        .get_query(&conn)
        .await
        .unwrap()
        .get_result()
        .await
        .unwrap();
    let names: Vec<&str> = teachers.iter().map(|t| t.last_name.as_str()).collect();
    assert_eq!(names, vec!["Byron", "Turing"]);
}

#[tokio::test]
async fn test_query_builder_scalar_and_count() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    seed(&mut em, vec![teacher(20), teacher(30), teacher(40)]).await;

    let max_age: Option<i64> = QueryBuilder::<Teacher>::new(None)
        .unwrap()
        .select("MAX(age)")
        .get_query(&conn)
        .await
        .unwrap()
        .get_single_scalar_result()
        .await
        .unwrap();
    assert_eq!(max_age, Some(40));

    let count = QueryBuilder::<Teacher>::new(None)
        .unwrap()
        .and_where("age > :age")
        .set_parameter("age", 25)
        .get_query(&conn)
        .await
        .unwrap()
        .get_count_result()
        .await
        .unwrap();
    assert_eq!(count, 2);

    let youngest = QueryBuilder::<Teacher>::new(None)
        .unwrap()
        .order_by(TeacherColumn::Age.name(), "asc")
        .set_max_results(1)
        .get_query(&conn)
        .await
        .unwrap()
        .get_one_or_null_result()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(youngest.age, 20);
}

#[tokio::test]
async fn test_query_builder_missing_parameter() {
    let result = QueryBuilder::<Teacher>::new(None).unwrap().and_where("age = :age").build();
    assert!(matches!(result, Err(Error::MissingParameter(name)) if name == "age"));
}

#[tokio::test]
async fn test_query_builder_condition_builder() {
    let conn = create_test_db().await;
    let mut em = setup(&conn).await;
    seed(&mut em, vec![named("Alan", "Turing", 41), named("Ada", "Byron", 36), named("Grace", "Hopper", 40)]).await;

    let mut conditions = ConditionBuilder::new();
    let by_age = conditions.make_condition("age", vec![36i64, 41]).unwrap();
    let by_name = conditions.like("first_name", "Al");

    let found = QueryBuilder::<Teacher>::new(None)
        .unwrap()
        .and_where_condition(by_age.and(by_name))
        .get_query(&conn)
        .await
        .unwrap()
        .get_result()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].last_name, "Turing");
}
