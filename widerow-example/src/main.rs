use std::{env, sync::Arc, time::Instant};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use widerow::{
    eq, Changes, FixedBucketer, FlakeGenerator, FlakeId, FlakeSeriesTable, Keyspace, MapTable,
    Modifier, Options, Row, TimeSeriesTable, Value, BUCKET_COLUMN,
};

const STATIONS: [&str; 3] = ["north", "harbour", "airport"];
const READINGS_PER_STATION: i64 = 120;

fn setup_logging() {
    let filter = EnvFilter::from_default_env()
        .add_directive("widerow_example=info".parse().unwrap())
        .add_directive("widerow=info".parse().unwrap());

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Keyspace options come from the JSON file named by the first argument, if any.
fn keyspace_options() -> Result<Options> {
    match env::args().nth(1) {
        Some(path) => {
            let options = Options::load(&path)?;
            info!("Loaded keyspace options from {}: {:?}", path, options);
            Ok(options)
        }
        None => Ok(Options::default()),
    }
}

/// A smooth, repeatable temperature curve so runs are comparable.
fn temperature(station: usize, minute: i64) -> f64 {
    let phase = station as f64 * 1.7 + minute as f64 / 20.0;
    12.0 + station as f64 * 2.5 + 4.0 * phase.sin()
}

fn print_rows(label: &str, rows: &[Row]) -> Result<()> {
    println!("# {} ({} rows)", label, rows.len());
    for row in rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

fn ingest(
    readings: &TimeSeriesTable,
    alerts: &FlakeSeriesTable,
    stations: &MapTable,
    start: DateTime<Utc>,
) -> Result<()> {
    let ids = FlakeGenerator::new(42);
    let timer = Instant::now();

    for (s, station) in STATIONS.iter().enumerate() {
        stations.set(
            Row::new()
                .with("station", *station)
                .with("alerts", 0_i64)
                .with("recent", Vec::<Value>::new()),
        )?;

        for minute in 0..READINGS_PER_STATION {
            let time = start + Duration::minutes(minute);
            let celsius = temperature(s, minute);
            readings.set(
                Row::new()
                    .with("station", *station)
                    .with("time", time)
                    .with("sensor", "t1")
                    .with("celsius", celsius),
            )?;

            if celsius > 18.0 {
                let id = ids.next_id_at(time);
                alerts.set(
                    Row::new()
                        .with("station", *station)
                        .with("id", id)
                        .with("celsius", celsius),
                )?;
                stations.update(
                    *station,
                    Changes::new()
                        .modify("alerts", Modifier::CounterIncrement(1))
                        .modify("recent", Modifier::ListPrepend(vec![id.into()])),
                )?;
                debug!(station, %time, celsius, "Raised alert");
            }
        }
    }

    info!(
        "Ingested {} readings in {:?}",
        STATIONS.len() as i64 * READINGS_PER_STATION,
        timer.elapsed()
    );
    Ok(())
}

fn main() -> Result<()> {
    setup_logging();

    let keyspace = Keyspace::with_options("weather", keyspace_options()?);
    let bucketer = Arc::new(FixedBucketer::new(Duration::minutes(15))?);
    let readings = TimeSeriesTable::new(
        &keyspace,
        "readings",
        &["station"],
        "time",
        &["sensor"],
        bucketer.clone(),
        Options::default(),
    )?;
    let alerts = FlakeSeriesTable::new(
        &keyspace,
        "alerts",
        &["station"],
        "id",
        bucketer,
        Options::default(),
    )?;
    let stations = MapTable::new(&keyspace, "stations", "station", Options::default())?;

    let start = Utc
        .with_ymd_and_hms(2024, 3, 1, 6, 0, 0)
        .single()
        .ok_or_else(|| anyhow!("invalid start time"))?;
    ingest(&readings, &alerts, &stations, start)?;
    info!("Tables: {:?}", keyspace.table_names());

    let harbour = Row::new().with("station", "harbour");
    let window = readings.list(
        &harbour,
        start + Duration::minutes(10),
        start + Duration::minutes(20),
    )?;
    print_rows("harbour readings 06:10-06:20", &window)?;

    let cursor = readings.buckets(start + Duration::minutes(10));
    info!(
        "Window starts in bucket {:?}, next bucket {:?}",
        cursor.time(),
        cursor.next().time()
    );

    let summary = stations.multi_read(STATIONS)?;
    print_rows("station summaries", &summary)?;

    let airport = Row::new().with("station", "airport");
    let airport_alerts = alerts.list(&airport, start, start + Duration::hours(2))?;
    match airport_alerts.first().and_then(|row| row.get("id")) {
        Some(first) => {
            let first = FlakeId::try_from(first)?;
            let next = alerts.list_since(&airport, &first, Duration::minutes(30), 5)?;
            print_rows("airport alerts after the first", &next)?;
        }
        None => warn!("No airport alerts raised"),
    }

    let table = readings.table();
    let deleted = table
        .filter([
            eq("station", "north"),
            eq(BUCKET_COLUMN, start.timestamp_millis()),
        ])
        .delete()?;
    info!(
        "Deleted {} north readings from the first bucket, {} rows left",
        deleted,
        table.row_count()
    );

    Ok(())
}
