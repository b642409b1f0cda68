use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Days;
use innkeep::booking::{BookingError, BookingTx, DraftReservation};
use innkeep::engine::Engine;
use innkeep::model::{Guest, Room, Stay, parse_date};
use innkeep::repository::Repository;

const ROOMS: u32 = 10;
const WORKERS: usize = 64;
const ATTEMPTS_PER_WORKER: usize = 200;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: n=0");
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

/// Small deterministic generator so runs are comparable.
fn next(seed: &mut u64) -> u64 {
    *seed ^= *seed << 13;
    *seed ^= *seed >> 7;
    *seed ^= *seed << 17;
    *seed
}

fn random_draft(seed: &mut u64) -> DraftReservation {
    let base = parse_date("2050-01-01").unwrap();
    let room_id = (next(seed) % ROOMS as u64) as u32 + 1;
    let offset = next(seed) % 60;
    let nights = next(seed) % 5 + 1;
    let start = base + Days::new(offset);
    let stay = Stay::new(start, start + Days::new(nights)).unwrap();
    let mut draft = DraftReservation::for_room(stay, room_id, format!("Room {room_id}"));
    draft.guest = Guest {
        first_name: "Bench".into(),
        last_name: "Guest".into(),
        email: "bench@example.com".into(),
        phone: "555-0100".into(),
    };
    draft
}

#[tokio::main]
async fn main() {
    let dir = std::env::temp_dir().join("innkeep_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("stress.wal");
    let _ = std::fs::remove_file(&path);

    let engine = Arc::new(Engine::new(path).unwrap());
    let rooms: Vec<Room> = (1..=ROOMS)
        .map(|id| Room { id, name: format!("Room {id}") })
        .collect();
    engine.seed_rooms(&rooms).await.unwrap();
    println!("racing commits: {WORKERS} workers x {ATTEMPTS_PER_WORKER} attempts over {ROOMS} rooms");

    let repo: Arc<dyn Repository> = engine.clone();
    let started = Instant::now();
    let mut handles = Vec::new();
    for worker in 0..WORKERS {
        let tx = BookingTx::new(repo.clone(), Duration::from_secs(5));
        handles.push(tokio::spawn(async move {
            let mut seed = 0x9E37_79B9_7F4A_7C15 ^ (worker as u64 + 1);
            let mut ok = Vec::new();
            let mut rejected = Vec::new();
            for _ in 0..ATTEMPTS_PER_WORKER {
                let draft = random_draft(&mut seed);
                let t = Instant::now();
                match tx.commit(&draft).await {
                    Ok(_) => ok.push(t.elapsed()),
                    Err(BookingError::PersistenceFailure(_)) => rejected.push(t.elapsed()),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            (ok, rejected)
        }));
    }

    let mut ok = Vec::new();
    let mut rejected = Vec::new();
    for handle in handles {
        let (o, r) = handle.await.unwrap();
        ok.extend(o);
        rejected.extend(r);
    }
    let elapsed = started.elapsed();
    let total = ok.len() + rejected.len();
    println!(
        "  {total} commits in {:.2}s ({:.0}/s), {} stored, {} conflicts",
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64(),
        ok.len(),
        rejected.len()
    );
    print_latency("committed", &mut ok);
    print_latency("conflicted", &mut rejected);

    // Whatever raced, no two stored guest stays on one room may overlap.
    let window = Stay::parse("2050-01-01", "2050-04-01").unwrap();
    for room in &rooms {
        let restrictions = engine.room_restrictions(room.id, &window).await.unwrap();
        for pair in restrictions.windows(2) {
            assert!(
                pair[0].stay.end <= pair[1].stay.start,
                "overlap on room {}: {:?} / {:?}",
                room.id,
                pair[0].stay,
                pair[1].stay
            );
        }
    }
    assert_eq!(engine.reservation_count(), ok.len());
    println!("  invariant held: no overlapping stays");

    let t = Instant::now();
    engine.compact_wal().await.unwrap();
    println!("  compaction: {:.2}ms", t.elapsed().as_secs_f64() * 1000.0);
}
