// --- Scenario tests across the whole engine ---
use std::{sync::Arc, thread};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use super::*;

fn setup_logging() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("widerow=trace".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 5, 1, h, m, s).unwrap()
}

fn column(rows: &[Row], name: &str) -> Vec<Value> {
    rows.iter().filter_map(|r| r.get(name).cloned()).collect()
}

fn customers(keyspace: &Keyspace) -> Result<Arc<Table>> {
    keyspace.table(TableDefinition::new(
        "customers",
        ["Pk1", "Pk2"],
        ["Ck1", "Ck2"],
    )?)
}

fn customer(pk1: i32, pk2: i32, ck1: i32, ck2: i32, name: &str) -> Row {
    Row::new()
        .with("Pk1", pk1)
        .with("Pk2", pk2)
        .with("Ck1", ck1)
        .with("Ck2", ck2)
        .with("Name", name)
}

#[test]
fn scenario_clustering_order_within_partition() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("scenarios");
    let table = customers(&keyspace)?;
    table.set(customer(1, 1, 1, 1, "John"))?;
    table.set(customer(1, 2, 1, 1, "Joe"))?;
    table.set(customer(1, 1, 2, 1, "Josh"))?;
    table.set(customer(1, 1, 1, 2, "Jane"))?;

    let rows = table
        .filter([eq("Pk1", 1), eq("Pk2", 1)])
        .read(&Options::default())?;
    assert_eq!(column(&rows, "name"), ["John", "Jane", "Josh"].map(Value::from));

    let rows = table
        .filter([eq("Pk1", 1), eq("Pk2", 1), eq("Ck1", 1)])
        .read(&Options::default())?;
    assert_eq!(column(&rows, "name"), ["John", "Jane"].map(Value::from));

    let rows = table
        .filter([eq("Pk1", 1), eq("Pk2", 1), eq("Ck1", 1), gte("Ck2", 2)])
        .read(&Options::default())?;
    assert_eq!(column(&rows, "name"), ["Jane"].map(Value::from));

    let rows = table
        .filter([eq("Pk1", 1), is_in("Pk2", [2, 1])])
        .read(&Options::default())?;
    assert_eq!(
        column(&rows, "name"),
        ["Joe", "John", "Jane", "Josh"].map(Value::from)
    );
    Ok(())
}

#[test]
fn scenario_time_series_list() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("scenarios");
    let bucketer = Arc::new(FixedBucketer::new(Duration::seconds(60))?);
    let trips = TimeSeriesTable::new(
        &keyspace,
        "trips",
        &[],
        "Time",
        &["Id"],
        bucketer,
        Options::default(),
    )?;
    for (id, time) in [
        ("1", at(15, 3, 59)),
        ("2", at(15, 4, 0)),
        ("3", at(15, 4, 1)),
        ("4", at(15, 5, 1)),
    ] {
        trips.set(Row::new().with("Id", id).with("Time", time))?;
    }

    let index = Row::new();
    let rows = trips.list(&index, at(15, 3, 58), at(15, 4, 2))?;
    assert_eq!(column(&rows, "id"), ["1", "2", "3"].map(Value::from));

    let rows = trips.list(&index, at(15, 3, 58), at(15, 5, 2))?;
    assert_eq!(column(&rows, "id"), ["1", "2", "3", "4"].map(Value::from));
    Ok(())
}

#[test]
fn scenario_in_keeps_literal_order() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("scenarios");
    let table = keyspace.table(TableDefinition::new("users", ["Id"], Vec::<&str>::new())?)?;
    table.set(Row::new().with("Id", 200).with("Name", "second"))?;
    table.set(Row::new().with("Id", 100).with("Name", "first"))?;

    let rows = table
        .filter([is_in("Id", [100, 200])])
        .read(&Options::default())?;
    assert_eq!(rows.len(), 2);
    assert_eq!(column(&rows, "id"), [100, 200].map(Value::from));

    let rows = table
        .filter([is_in("Id", [200, 100])])
        .read(&Options::default())?;
    assert_eq!(column(&rows, "id"), [200, 100].map(Value::from));
    Ok(())
}

#[test]
fn scenario_illegal_key_usage() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("scenarios");
    let table = customers(&keyspace)?;

    let err = table
        .filter([is_in("Pk1", [1, 2]), eq("Pk2", 1)])
        .read(&Options::default())
        .unwrap_err();
    assert!(matches!(err, WideRowError::InvalidKeyUsage { ref column, .. } if column == "pk1"));

    let err = table
        .filter([eq("Pk1", 1), eq("Pk2", 1), is_in("Ck1", [1, 2]), eq("Ck2", 1)])
        .read(&Options::default())
        .unwrap_err();
    assert!(matches!(err, WideRowError::InvalidKeyUsage { ref column, .. } if column == "ck1"));

    let err = table
        .filter([eq("Pk1", 1), eq("Ck1", 1)])
        .read(&Options::default())
        .unwrap_err();
    assert!(matches!(err, WideRowError::MissingKeyPart(ref c) if c == "pk2"));

    let err = table
        .filter([eq("Pk1", 1), eq("Pk2", 1)])
        .update(Changes::new().set("Name", "x"))
        .unwrap_err();
    assert!(matches!(err, WideRowError::MissingKeyPart(ref c) if c == "ck1"));
    Ok(())
}

#[test]
fn set_replaces_and_update_merges() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("semantics");
    let table = customers(&keyspace)?;
    let key = [eq("Pk1", 1), eq("Pk2", 1), eq("Ck1", 1), eq("Ck2", 1)];

    table.set(customer(1, 1, 1, 1, "John").with("Age", 40).with("City", "Leeds"))?;
    table.filter(key.clone()).update(Changes::new().set("Age", 41))?;
    let row = table.filter(key.clone()).read_one(&Options::default())?;
    assert_eq!(row.get("age"), Some(&Value::from(41)));
    assert_eq!(row.get("city"), Some(&Value::from("Leeds")));

    table.set(customer(1, 1, 1, 1, "John"))?;
    let row = table.filter(key.clone()).read_one(&Options::default())?;
    assert!(!row.contains("age"));
    assert!(!row.contains("city"));
    assert_eq!(row.get("ck2"), Some(&Value::from(1)));
    Ok(())
}

#[test]
fn written_rows_read_back_unchanged() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("semantics");
    let table = keyspace.table(TableDefinition::new("readings", ["sensor"], ["at"])?)?;
    let row = Row::new()
        .with("sensor", uuid::Uuid::nil())
        .with("at", at(12, 0, 0))
        .with("celsius", 21.5)
        .with("raw", vec![0_u8, 1, 2])
        .with("tags", vec![Value::from("indoor")])
        .with("calibrated", true)
        .with("offset", Value::Decimal("0.25".into()));
    table.set(row.clone())?;

    let read = table
        .filter([eq("sensor", uuid::Uuid::nil()), eq("at", at(12, 0, 0))])
        .read_one(&Options::default())?;
    assert_eq!(read, row);
    Ok(())
}

#[test]
fn deleting_unknown_rows_is_a_no_op() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("semantics");
    let table = customers(&keyspace)?;
    let removed = table
        .filter([eq("Pk1", 9), eq("Pk2", 9), eq("Ck1", 9), eq("Ck2", 9)])
        .delete()?;
    assert_eq!(removed, 0);

    table.set(customer(1, 1, 1, 1, "John"))?;
    let key = [eq("Pk1", 1), eq("Pk2", 1), eq("Ck1", 1), eq("Ck2", 1)];
    assert_eq!(table.filter(key.clone()).delete()?, 1);
    assert_eq!(table.filter(key).delete()?, 0);
    Ok(())
}

#[test]
fn multi_key_update_keeps_earlier_keys_on_failure() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("semantics");
    let table = keyspace.table(TableDefinition::new("profiles", ["id"], Vec::<&str>::new())?)?;
    table.set(Row::new().with("id", 1).with("tags", vec![Value::from("a")]))?;
    table.set(Row::new().with("id", 2).with("tags", "not a list"))?;

    let err = table
        .filter([is_in("id", [1, 2])])
        .update(Changes::new().modify("tags", Modifier::ListAppend(vec!["b".into()])))
        .unwrap_err();
    assert!(matches!(err, WideRowError::InvalidModifier { .. }));

    let first = table.filter([eq("id", 1)]).read_one(&Options::default())?;
    assert_eq!(first.get("tags"), Some(&Value::List(vec!["a".into(), "b".into()])));
    let second = table.filter([eq("id", 2)]).read_one(&Options::default())?;
    assert_eq!(second.get("tags"), Some(&Value::from("not a list")));
    Ok(())
}

#[test]
fn delete_with_in_spans_partitions() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("semantics");
    let table = customers(&keyspace)?;
    table.set(customer(1, 1, 1, 1, "John"))?;
    table.set(customer(1, 1, 1, 2, "Jane"))?;
    table.set(customer(1, 2, 1, 1, "Joe"))?;
    table.set(customer(1, 3, 1, 1, "Jill"))?;

    let removed = table.filter([eq("Pk1", 1), is_in("Pk2", [1, 2, 4])]).delete()?;
    assert_eq!(removed, 3);
    assert_eq!(table.partition_count(), 1);

    let rows = table
        .filter([eq("Pk1", 1), is_in("Pk2", [1, 2, 3])])
        .read(&Options::default())?;
    assert_eq!(column(&rows, "name"), ["Jill"].map(Value::from));
    Ok(())
}

#[test]
fn descending_clustering_reverses_reads() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("semantics");
    let definition = TableDefinition::with_clustering_order(
        "timeline",
        ["user"],
        vec![ClusteringColumn::new("posted", ClusteringOrder::Desc)],
    )?;
    let table = keyspace.table(definition)?;
    for minute in [1, 3, 2] {
        table.set(Row::new().with("user", "joe").with("posted", at(9, minute, 0)))?;
    }
    let rows = table
        .filter([eq("user", "joe"), lt("posted", at(9, 3, 0))])
        .read(&Options::default())?;
    assert_eq!(column(&rows, "posted"), [at(9, 2, 0), at(9, 1, 0)].map(Value::from));
    Ok(())
}

#[test]
fn modifiers_leave_other_columns_intact() -> Result<()> {
    setup_logging();
    let keyspace = Keyspace::new("semantics");
    let table = keyspace.table(TableDefinition::new("profiles", ["id"], Vec::<&str>::new())?)?;
    table.set(
        Row::new()
            .with("id", 1)
            .with("name", "Joe")
            .with("tags", vec![Value::from("a")]),
    )?;

    table.filter([eq("id", 1)]).update(
        Changes::new()
            .modify("tags", Modifier::ListAppend(vec!["b".into()]))
            .modify("tags_seen", Modifier::CounterIncrement(1)),
    )?;
    let row = table.filter([eq("id", 1)]).read_one(&Options::default())?;
    assert_eq!(row.get("tags"), Some(&Value::List(vec!["a".into(), "b".into()])));
    assert_eq!(row.get("tags_seen"), Some(&Value::I64(1)));
    assert_eq!(row.get("name"), Some(&Value::from("Joe")));

    let err = table
        .filter([eq("id", 1)])
        .update(Changes::new().modify("name", Modifier::ListAppend(vec![])))
        .unwrap_err();
    assert!(matches!(err, WideRowError::InvalidModifier { .. }));
    Ok(())
}

#[test]
fn concurrent_writers_and_readers() -> Result<()> {
    setup_logging();
    let keyspace = Arc::new(Keyspace::new("concurrency"));
    let table = keyspace.table(TableDefinition::new("counters", ["shard"], ["seq"])?)?;

    let writers: Vec<_> = (0..4)
        .map(|shard| {
            let table = table.clone();
            thread::spawn(move || -> Result<()> {
                for seq in 0..250 {
                    table.set(
                        Row::new()
                            .with("shard", shard)
                            .with("seq", seq)
                            .with("a", seq)
                            .with("b", seq),
                    )?;
                }
                Ok(())
            })
        })
        .collect();
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let table = table.clone();
            thread::spawn(move || -> Result<()> {
                for _ in 0..50 {
                    let rows = table
                        .filter([is_in("shard", [0, 1, 2, 3])])
                        .read(&Options::default())?;
                    for row in rows {
                        assert_eq!(row.get("a"), row.get("b"));
                    }
                }
                Ok(())
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap()?;
    }
    info!(rows = table.row_count(), "Concurrent run finished");
    assert_eq!(table.row_count(), 1000);
    assert_eq!(table.partition_count(), 4);
    Ok(())
}
