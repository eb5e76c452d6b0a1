mod support;

use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use stage2merge::config::{MergeSpec, WindowFilter};
use stage2merge::error::MergeError;
use stage2merge::generator::dedup::ranking;
use stage2merge::generator::merge_generator::{compile_merge, CompiledStatement};
use stage2merge::generator::notice::{NoticeKind, NoticeLevel, Notices};
use stage2merge::schema::locator::RelationLocator;
use stage2merge::schema::resolver::{resolve, resolve_columns};
use stage2merge::schema::types::{ColumnSet, DestinationSchema};
use support::{column, eval, surviving_rows, Row, Value};

fn compile_people(spec: &MergeSpec) -> CompiledStatement {
    let catalog = support::people_catalog();
    let schema = resolve(&catalog, &spec.destination).expect("destination should resolve");
    let source = resolve_columns(&catalog, &spec.source).expect("source should resolve");
    compile_merge(spec, &schema, &source).expect("statement should compile")
}

fn count_kind(compiled: &CompiledStatement, kind: NoticeKind) -> usize {
    compiled.notices().iter().filter(|n| n.kind == kind).count()
}

fn parse_single(sql: &str) -> Statement {
    let mut statements =
        Parser::parse_sql(&GenericDialect {}, sql).expect("rendered statement should parse");
    assert_eq!(statements.len(), 1, "expected exactly one statement");
    statements.remove(0)
}

#[test]
fn codes_merge_shape() {
    let schema = DestinationSchema::from_pairs([
        ("code", "varchar"),
        ("label", "varchar"),
        ("updated_at", "timestamp(6)"),
    ]);
    let spec = MergeSpec::new(
        RelationLocator::new("stg", "codes"),
        RelationLocator::new("silver", "codes"),
        &["code"],
    );
    let compiled = compile_merge(
        &spec,
        &schema,
        &ColumnSet::new(["code", "label", "updated_at"]),
    )
    .unwrap();

    insta::assert_snapshot!("codes_merge", compiled.sql());
}

#[test]
fn primary_keys_inside_the_destination_always_compile() {
    let catalog = support::people_catalog();
    let schema = resolve(&catalog, &support::people_destination()).unwrap();
    let source = resolve_columns(&catalog, &support::people_source()).unwrap();

    let keys: Vec<&str> = schema.column_names().collect();
    for (idx, key) in keys.iter().enumerate() {
        let spec = MergeSpec::new(support::people_source(), support::people_destination(), &[key]);
        compile_merge(&spec, &schema, &source)
            .unwrap_or_else(|e| panic!("key {key} should compile: {e}"));

        let pair = [keys[idx], keys[(idx + 1) % keys.len()]];
        let spec = MergeSpec::new(support::people_source(), support::people_destination(), &pair);
        compile_merge(&spec, &schema, &source)
            .unwrap_or_else(|e| panic!("key {pair:?} should compile: {e}"));
    }
}

#[test]
fn primary_key_outside_the_destination_is_a_configuration_error() {
    let catalog = support::people_catalog();
    let schema = resolve(&catalog, &support::people_destination()).unwrap();
    let source = resolve_columns(&catalog, &support::people_source()).unwrap();

    let spec = MergeSpec::new(
        support::people_source(),
        support::people_destination(),
        &["id", "nickname"],
    );
    let err = compile_merge(&spec, &schema, &source).unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(
        err,
        MergeError::PrimaryKeyNotInDestination { ref column, .. } if column == "nickname"
    ));

    let empty: [&str; 0] = [];
    let spec = MergeSpec::new(support::people_source(), support::people_destination(), &empty);
    assert_eq!(
        compile_merge(&spec, &schema, &source).unwrap_err(),
        MergeError::EmptyPrimaryKey
    );
}

#[test]
fn most_recent_row_survives_regardless_of_input_order() {
    let catalog = support::people_catalog();
    let spec = support::people_spec();
    let schema = resolve(&catalog, &spec.destination).unwrap();
    let source = resolve_columns(&catalog, &spec.source).unwrap();
    let ctx = support::context(&spec);
    let mut notices = Notices::new();
    let clause = ranking(&spec, &schema, &source, &ctx, &mut notices).expect("dedup is on");

    let row = |id: &str, at: &str, name: &str| {
        Row::new()
            .with("s", "id", Value::text(id))
            .with("s", "updated_at", Value::text(at))
            .with("s", "name", Value::text(name))
    };
    let early = row("1", "2024-01-01 09:00:00", "early");
    let late = row("1", "2024-01-01 10:00:00", "late");
    let other = row("2", "2024-01-01 08:00:00", "other");

    for rows in [
        vec![early.clone(), late.clone(), other.clone()],
        vec![late.clone(), other.clone(), early.clone()],
        vec![other, early, late],
    ] {
        let survivors = surviving_rows(&clause, &rows);
        let mut names: Vec<Value> = survivors.iter().map(|r| column(r, "s", "name")).collect();
        names.sort_by_key(|v| format!("{v:?}"));
        assert_eq!(names, vec![Value::text("late"), Value::text("other")]);
    }
    assert_eq!(notices.warning_count(), 0);
}

#[test]
fn blank_recency_falls_back_to_the_primary_key_order() {
    let catalog = support::people_catalog();
    let spec = support::people_spec();
    let schema = resolve(&catalog, &spec.destination).unwrap();
    let source = resolve_columns(&catalog, &spec.source).unwrap();
    let ctx = support::context(&spec);
    let clause = ranking(&spec, &schema, &source, &ctx, &mut Notices::new()).unwrap();

    let rows = [
        Row::new()
            .with("s", "id", Value::text("1"))
            .with("s", "updated_at", Value::text(""))
            .with("s", "name", Value::text("blank")),
        Row::new()
            .with("s", "id", Value::text("1"))
            .with("s", "updated_at", Value::text("2020-01-01"))
            .with("s", "name", Value::text("dated")),
    ];
    let survivors = surviving_rows(&clause, &rows);
    assert_eq!(survivors.len(), 1);
    assert_eq!(column(&survivors[0], "s", "name"), Value::text("dated"));
}

#[test]
fn older_source_row_matches_but_does_not_update() {
    let schema = DestinationSchema::from_pairs([
        ("id", "bigint"),
        ("name", "varchar"),
        ("updated_at", "date"),
    ]);
    let spec = support::people_spec();
    let compiled = compile_merge(
        &spec,
        &schema,
        &ColumnSet::new(["id", "name", "updated_at"]),
    )
    .unwrap();
    let plan = compiled.plan();
    let guard = plan.matched_guard.as_ref().expect("recency guard");

    let pair = |source: Value, target: Value| {
        Row::new()
            .with("s", "id", Value::text("1"))
            .with("t", "id", Value::Int(1))
            .with("s", "updated_at", source)
            .with("t", "updated_at", target)
    };

    let stale = pair(Value::text("2023-12-31"), Value::time("2024-01-01"));
    assert_eq!(eval(&plan.on, &stale), Value::Bool(true), "row should match");
    assert_eq!(eval(guard, &stale), Value::Bool(false), "stale row must not update");

    let fresh = pair(Value::text("2024-01-02"), Value::time("2024-01-01"));
    assert_eq!(eval(guard, &fresh), Value::Bool(true));

    let missing_source = pair(Value::Null, Value::time("2024-01-01"));
    assert_eq!(eval(guard, &missing_source), Value::Bool(false));

    let missing_target = pair(Value::text("2023-12-31"), Value::Null);
    assert_eq!(eval(guard, &missing_target), Value::Bool(true));

    assert!(compiled
        .sql()
        .contains("COALESCE(TRY_CAST(t.\"updated_at\" AS date), DATE '1970-01-01')"));
}

#[test]
fn window_over_a_missing_column_is_dropped_with_one_warning() {
    let spec = support::people_spec()
        .with_window(WindowFilter::between("2025-08-30", "2025-09-01").on_column("ingested_at"));
    let compiled = compile_people(&spec);

    assert_eq!(compiled.warning_count(), 1);
    assert_eq!(count_kind(&compiled, NoticeKind::FilterDropped), 1);
    assert!(!compiled.sql().contains("2025-08-30"));
    assert!(!compiled.sql().contains("date_add"));
}

#[test]
fn window_over_the_recency_column_is_half_open() {
    let spec = support::people_spec()
        .with_window(WindowFilter::between("2025-08-30", "2025-09-01 12:30:00"));
    let compiled = compile_people(&spec);

    assert!(compiled.sql().contains(
        "WHERE TRY_CAST(s.\"updated_at\" AS timestamp) >= TIMESTAMP '2025-08-30 00:00:00.000' \
         AND TRY_CAST(s.\"updated_at\" AS timestamp) < TIMESTAMP '2025-09-01 12:30:00.000'"
    ));
    assert_eq!(compiled.warning_count(), 0);
}

#[test]
fn inverted_window_fails_before_building() {
    let spec = support::people_spec().with_window(WindowFilter::between("2025-09-01", "2025-08-30"));
    let catalog = support::people_catalog();
    let schema = resolve(&catalog, &spec.destination).unwrap();
    let source = resolve_columns(&catalog, &spec.source).unwrap();

    let err = compile_merge(&spec, &schema, &source).unwrap_err();
    assert!(matches!(err, MergeError::InvalidWindow { .. }));
}

#[test]
fn default_lookback_applies_without_a_window() {
    let compiled = compile_people(&support::people_spec().with_lookback_days(7));
    assert!(compiled.sql().contains(
        "COALESCE(TRY_CAST(s.\"updated_at\" AS timestamp), TIMESTAMP '1970-01-01 00:00:00') \
         > CAST(date_add('day', -7, current_date) AS timestamp)"
    ));

    let compiled = compile_people(&support::people_spec().with_lookback_days(0));
    assert!(!compiled.sql().contains("date_add"));
}

#[test]
fn provenance_columns_are_synthesized() {
    let compiled = compile_people(&support::people_spec().with_op_literal("replay"));
    let sql = compiled.sql();

    assert!(sql.contains("  \"__op\" = CAST('replay' AS varchar),\n"));
    assert!(sql.contains(
        "  \"__ts_ms\" = CAST(format_datetime(current_timestamp AT TIME ZONE 'Asia/Jakarta', \
         'yyyy-MM-dd HH:mm:ss.SSS') AS timestamp)\n"
    ));
    assert_eq!(compiled.ignored_columns(), ["nickname"]);
    assert_eq!(count_kind(&compiled, NoticeKind::IgnoredColumns), 1);
    assert_eq!(compiled.warning_count(), 0);
}

#[test]
fn excluded_columns_are_inserted_but_never_updated() {
    let compiled = compile_people(&support::people_spec().with_excluded_update(&["Name"]));
    let plan = compiled.plan();

    assert!(plan.set.iter().all(|item| item.column != "name"));
    assert!(plan.set.iter().all(|item| item.column != "id"));
    assert!(plan.insert_columns.iter().any(|c| c == "name"));
}

#[test]
fn caller_fragments_extend_every_clause() {
    let catalog = support::people_catalog().with_relation(
        RelationLocator::new("silver", "people"),
        [
            ("id", "bigint"),
            ("region", "varchar"),
            ("name", "varchar"),
            ("note", "varchar"),
            ("created_by", "varchar"),
        ],
    );
    let spec = support::people_spec()
        .with_extra_on("t.\"region\" = 'ID'")
        .with_extra_set("note", "'manual fix'")
        .with_extra_set("missing", "1")
        .with_extra_insert("created_by", "'etl'")
        .with_extra_insert("name", "UPPER(s.\"name\")");
    let schema = resolve(&catalog, &spec.destination).unwrap();
    let source = resolve_columns(&catalog, &spec.source).unwrap();
    let compiled = compile_merge(&spec, &schema, &source).unwrap();
    let sql = compiled.sql();

    assert!(sql.contains(
        "ON (t.\"id\" = COALESCE(TRY_CAST(NULLIF(REGEXP_EXTRACT(REGEXP_REPLACE("
    ));
    assert!(sql.contains(" AND (t.\"region\" = 'ID'))\n"));
    assert!(sql.contains("  \"note\" = ('manual fix')"));
    assert!(!sql.contains("\"missing\""));
    assert_eq!(count_kind(&compiled, NoticeKind::SkippedAssignment), 1);

    let plan = compiled.plan();
    assert_eq!(plan.insert_columns, ["id", "name", "created_by"]);
    assert!(sql.contains("  (UPPER(s.\"name\")),\n  ('etl')\n)"));
}

#[test]
fn text_recency_column_is_guarded_as_a_timestamp() {
    let schema = DestinationSchema::from_pairs([("id", "bigint"), ("updated_at", "varchar")]);
    let compiled = compile_merge(
        &support::people_spec(),
        &schema,
        &ColumnSet::new(["id", "updated_at"]),
    )
    .unwrap();
    let guard = compiled.plan().matched_guard.as_ref().expect("recency guard");

    let pair = |source: &str, target: &str| {
        Row::new()
            .with("s", "updated_at", Value::text(source))
            .with("t", "updated_at", Value::text(target))
    };
    assert_eq!(
        eval(guard, &pair("2024-01-02 08:00:00", " 2024-01-01 09:30:00 ")),
        Value::Bool(true)
    );
    assert_eq!(
        eval(guard, &pair("2023-12-31", "2024-01-01 00:00:00")),
        Value::Bool(false)
    );
    assert_eq!(eval(guard, &pair("not a time", "2024-01-01")), Value::Bool(false));

    let sql = compiled.sql();
    assert!(!sql.contains("TRY_CAST(t.\"updated_at\" AS varchar)"), "{sql}");
    assert!(sql.contains("TRY_CAST(TRIM(CAST(t.\"updated_at\" AS varchar)) AS timestamp)"));
}

#[test]
fn recency_missing_from_source_disables_the_guard() {
    let catalog = support::people_catalog();
    let spec = support::people_spec();
    let schema = resolve(&catalog, &spec.destination).unwrap();
    let compiled = compile_merge(&spec, &schema, &ColumnSet::new(["id", "name"])).unwrap();

    assert!(compiled.plan().matched_guard.is_none());
    assert_eq!(count_kind(&compiled, NoticeKind::RecencyNotInSource), 1);
    let notice = compiled
        .notices()
        .iter()
        .find(|n| n.kind == NoticeKind::RecencyNotInSource)
        .unwrap();
    assert_eq!(notice.level, NoticeLevel::Warning);
}

#[test]
fn disabled_dedup_selects_the_source_directly() {
    let compiled = compile_people(&support::people_spec().with_dedup(false));
    let sql = compiled.sql();
    assert!(!sql.contains("ROW_NUMBER()"));
    assert!(sql.contains("USING (\n  SELECT *\n  FROM \"stg\".\"people\" AS s\n  WHERE "));
}

#[test]
fn tiebreakers_missing_from_source_are_skipped() {
    let compiled = compile_people(&support::people_spec().with_tiebreakers(&["name", "version"]));
    assert!(compiled.sql().contains("TRY_CAST(s.\"name\" AS varchar) DESC NULLS LAST"));
    assert_eq!(count_kind(&compiled, NoticeKind::SkippedTiebreaker), 1);
}

#[test]
fn catalog_qualified_destination_keeps_its_prefix() {
    let mut spec = support::people_spec();
    spec.destination = support::people_destination().with_catalog("AwsDataCatalog");
    let compiled = compile_people(&spec);
    assert!(compiled
        .sql()
        .starts_with("MERGE INTO \"AwsDataCatalog\".\"silver\".\"people\" AS t\n"));
}

#[test]
fn quoted_names_are_escaped_once() {
    let schema = DestinationSchema::from_pairs([("id", "varchar"), ("we\"ird", "varchar")]);
    let spec = support::people_spec();
    let compiled = compile_merge(&spec, &schema, &ColumnSet::new(["id", "we\"ird"])).unwrap();
    assert!(compiled.sql().contains("INSERT (\"id\", \"we\"\"ird\")"));
    parse_single(compiled.sql());
}

#[test]
fn rendered_statements_parse_as_one_merge() {
    let specs = [
        support::people_spec(),
        support::people_spec().with_dedup(false),
        support::people_spec().with_window(WindowFilter::between("2025-08-30", "2025-09-01")),
        support::people_spec()
            .with_extra_on("t.\"name\" IS NOT NULL")
            .with_tiebreakers(&["name"]),
    ];
    for spec in specs {
        let compiled = compile_people(&spec);
        let statement = parse_single(compiled.sql());
        assert!(
            matches!(statement, Statement::Merge { .. }),
            "expected a MERGE, got {statement}"
        );
    }
}
