use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use ulid::Ulid;

use slotbook::config::EngineConfig;
use slotbook::directory::InMemoryDirectory;
use slotbook::engine::{Collaborators, Engine, EngineError};
use slotbook::model::*;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

/// One clinician with a weekday 08:00-17:00 clinic in 15-minute slots.
struct Clinician {
    facility: Ulid,
    identity: Ulid,
    patient: Ulid,
}

const FIRST_DAY: (i32, u32, u32) = (2026, 1, 5);

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(FIRST_DAY.0, FIRST_DAY.1, FIRST_DAY.2).unwrap()
}

async fn setup(engine: &Engine, directory: &InMemoryDirectory, tokens_per_slot: u32) -> Clinician {
    let c = Clinician {
        facility: Ulid::new(),
        identity: Ulid::new(),
        patient: Ulid::new(),
    };
    let resource = Ulid::new();
    directory.register_identity(c.identity);
    directory.register_patient(c.patient);
    directory.register_schedulable(SchedulableResource {
        id: resource,
        facility_id: c.facility,
        resource_type: "user".into(),
        identity_id: c.identity,
    });

    let schedule = Ulid::new();
    let from = first_day();
    engine
        .create_schedule(schedule, resource, from, from + TimeDelta::days(365))
        .await
        .unwrap();
    let windows = (0..5)
        .map(|dow| RecurrenceWindow {
            day_of_week: dow,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        })
        .collect();
    engine
        .create_availability(Availability {
            id: Ulid::new(),
            schedule_id: schedule,
            slot_type: SlotType::Appointment,
            slot_size_in_minutes: 15,
            tokens_per_slot,
            windows,
        })
        .await
        .unwrap();
    c
}

fn query(c: &Clinician, date: NaiveDate) -> SlotQuery {
    SlotQuery {
        facility_id: c.facility,
        resource_id: c.identity,
        resource_type: "user".into(),
        date,
    }
}

fn booking(c: &Clinician, slot_id: Ulid) -> BookingRequest {
    BookingRequest {
        slot_id,
        patient_id: c.patient,
        booked_by: c.identity,
        reason_for_visit: "bench".into(),
    }
}

async fn phase1_materialize(engine: &Engine, c: &Clinician) {
    let days = 200;
    let mut latencies = Vec::with_capacity(days);
    let start = Instant::now();
    let mut slots = 0usize;

    for i in 0..days {
        let date = first_day() + TimeDelta::days(i as i64);
        let t = Instant::now();
        slots += engine.query_slots(&query(c, date)).await.unwrap().len();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    println!(
        "  {days} first queries created {slots} slots in {:.2}s",
        elapsed.as_secs_f64()
    );
    print_latency("first query latency", &mut latencies);
}

async fn phase2_requery(engine: &Engine, c: &Clinician) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    for i in 0..n {
        let date = first_day() + TimeDelta::days((i % 200) as i64);
        let t = Instant::now();
        engine.query_slots(&query(c, date)).await.unwrap();
        latencies.push(t.elapsed());
    }
    print_latency("materialized re-query latency", &mut latencies);
}

async fn phase3_contended(engine: Arc<Engine>, c: Arc<Clinician>) {
    let slot_id = engine.query_slots(&query(&c, first_day())).await.unwrap()[0].id;
    let n_tasks = 100;
    let booked = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let engine = engine.clone();
        let c = c.clone();
        let booked = booked.clone();
        let rejected = rejected.clone();
        handles.push(tokio::spawn(async move {
            let t = Instant::now();
            match engine.create_booking(booking(&c, slot_id)).await {
                Ok(_) => booked.fetch_add(1, Ordering::Relaxed),
                Err(EngineError::CapacityExceeded { .. }) => rejected.fetch_add(1, Ordering::Relaxed),
                Err(e) => panic!("unexpected booking error: {e}"),
            };
            t.elapsed()
        }));
    }
    let mut latencies = Vec::with_capacity(n_tasks);
    for h in handles {
        latencies.push(h.await.unwrap());
    }

    let allocated = engine.get_slot(&slot_id).unwrap().allocated;
    println!(
        "  {n_tasks} racers on one slot: {} booked, {} rejected, allocated={allocated} in {:.2}s",
        booked.load(Ordering::Relaxed),
        rejected.load(Ordering::Relaxed),
        start.elapsed().as_secs_f64()
    );
    print_latency("contended booking latency", &mut latencies);
}

async fn phase4_spread(engine: Arc<Engine>, clinicians: Vec<Arc<Clinician>>) {
    let start = Instant::now();
    let mut handles = Vec::new();
    for c in clinicians {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let slots = engine.query_slots(&query(&c, first_day())).await.unwrap();
            let mut n = 0usize;
            for s in &slots {
                if engine.create_booking(booking(&c, s.id)).await.is_ok() {
                    n += 1;
                }
            }
            n
        }));
    }
    let mut total = 0;
    for h in handles {
        total += h.await.unwrap();
    }
    let elapsed = start.elapsed();
    println!(
        "  {total} bookings across resources in {:.2}s = {:.0} ops/sec",
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let dir = std::env::temp_dir().join(format!("slotbook_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let directory = Arc::new(InMemoryDirectory::new());
    let engine = Arc::new(
        Engine::new(
            dir.join("slotbook.wal"),
            EngineConfig {
                max_slots_per_window: 64,
                ..EngineConfig::default()
            },
            Collaborators::local(directory.clone()),
        )
        .unwrap(),
    );

    println!("=== slotbook stress benchmark ===");
    println!("wal: {}\n", dir.display());

    println!("[phase 1] on-demand materialization");
    let main_clinician = Arc::new(setup(&engine, &directory, 10).await);
    phase1_materialize(&engine, &main_clinician).await;

    println!("\n[phase 2] re-query of materialized days");
    phase2_requery(&engine, &main_clinician).await;

    println!("\n[phase 3] contended booking on one slot");
    phase3_contended(engine.clone(), main_clinician.clone()).await;

    println!("\n[phase 4] bookings spread over resources");
    let mut clinicians = Vec::new();
    for _ in 0..10 {
        clinicians.push(Arc::new(setup(&engine, &directory, 1).await));
    }
    phase4_spread(engine.clone(), clinicians).await;

    let _ = std::fs::remove_dir_all(&dir);
    println!("\n=== done ===");
}
