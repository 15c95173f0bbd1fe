//! # Sensor-Gateway Routing Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | `TopicRouter::matches` | exact and prefix lookup against growing indices |
//! | `SessionManager::notify` | fan-out of one notification across sessions |

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use sg_01_authorization::DefaultAuthPolicy;
use sg_02_session::{
    InMemoryTwin, ListenerSinks, ManualClock, SessionManager, SessionManagerConfig, TopicRouter,
};
use shared_bus::{SinkError, TopicMessage};
use shared_types::{NotificationEvent, NotificationHeader, UserInfo};
use std::sync::Arc;
use std::time::Duration;

fn random_topic(rng: &mut impl Rng) -> String {
    format!(
        "DATA/p{}/s{}/r{}",
        rng.gen_range(0..50),
        rng.gen_range(0..10),
        rng.gen_range(0..10)
    )
}

// ============================================================================
// Topic router
// ============================================================================

fn bench_router_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("topic-router");
    group.measurement_time(Duration::from_secs(5));

    for size in [100usize, 1_000, 10_000] {
        let mut rng = rand::thread_rng();
        let mut router = TopicRouter::new();
        for i in 0..size {
            let topic = random_topic(&mut rng);
            if i % 3 == 0 {
                let cut = topic.rfind('/').unwrap_or(topic.len());
                router.insert(topic[..cut].to_string(), true, i);
            } else {
                router.insert(topic, false, i);
            }
        }
        let probes: Vec<String> = (0..256).map(|_| random_topic(&mut rng)).collect();

        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_with_input(BenchmarkId::new("matches", size), &probes, |b, probes| {
            b.iter(|| {
                for topic in probes {
                    black_box(router.matches(topic));
                }
            })
        });
    }
    group.finish();
}

// ============================================================================
// Session store fan-out
// ============================================================================

fn bench_notify_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("session-store");

    for sessions in [10usize, 100, 1_000] {
        let clock = Arc::new(ManualClock::starting_now());
        let twin = Arc::new(InMemoryTwin::new(clock.clone()));
        let config = SessionManagerConfig {
            auth_policy: DefaultAuthPolicy::AllowAll,
            activity_check_interval_secs: 0,
            ..SessionManagerConfig::default()
        };
        let Ok(manager) = SessionManager::new(config, twin, clock) else {
            return;
        };
        for i in 0..sessions {
            let topic = if i % 2 == 0 { "p1/*" } else { "p1/s1/r1" };
            let Ok(session) = manager.create_session(&UserInfo::authenticated(format!("u{i}")))
            else {
                return;
            };
            let sink = |m: &TopicMessage| -> Result<(), SinkError> {
                black_box(m);
                Ok(())
            };
            let _ = session.add_listener(&[topic], ListenerSinks::new().on_data(sink));
        }

        let event = NotificationEvent::data(
            NotificationHeader::resource(None, "p1", "s1", "r1"),
            Some(1.into()),
            Some(2.into()),
            Utc::now(),
        );
        let message = TopicMessage::new("DATA/p1/s1/r1", event);

        group.throughput(Throughput::Elements(sessions as u64));
        group.bench_with_input(BenchmarkId::new("dispatch", sessions), &message, |b, m| {
            b.iter(|| black_box(manager.dispatch(m)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_router_matches, bench_notify_fan_out);
criterion_main!(benches);
