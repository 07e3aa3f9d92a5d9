//! Criterion microbenchmarks for prhub-api hot paths.
//!
//! Run with:
//!   cargo bench -p prhub-api
//!
//! HTML reports are written to `target/criterion/`.

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use prhub_common::gamification::{apply_points, level_for_points, points_for_rating};
use prhub_common::models::{
    Role, StageStatus, TaskPriority, TaskStage, TelegramAuthData, check_stage_transition,
};
use prhub_telegram::login::{data_check_string, verify_login_at};
use prhub_telegram::parse_command;
use uuid::Uuid;

// ── Gamification ──────────────────────────────────────────────────────────────

fn bench_gamification(c: &mut Criterion) {
    let mut group = c.benchmark_group("gamification");
    for points in [0, 150, 4_200] {
        group.bench_with_input(BenchmarkId::new("level_for_points", points), &points, |b, p| {
            b.iter(|| level_for_points(black_box(*p)))
        });
    }
    group.bench_function("apply_points", |b| {
        b.iter(|| apply_points(black_box(480), black_box(Role::Active), black_box(35), None))
    });
    group.bench_function("points_for_rating", |b| {
        b.iter(|| points_for_rating(black_box(TaskPriority::High), black_box(4)))
    });
    group.finish();
}

// ── Stage ordering ────────────────────────────────────────────────────────────

fn stages(n: i32) -> Vec<TaskStage> {
    let task_id = Uuid::now_v7();
    (0..n)
        .map(|i| TaskStage {
            id: Uuid::now_v7(),
            task_id,
            name: format!("Stage {i}"),
            stage_order: i,
            status: if i < n - 1 {
                StageStatus::Completed
            } else {
                StageStatus::Pending
            },
            due_date: None,
            completed_at: None,
            created_at: Utc::now(),
        })
        .collect()
}

fn bench_stage_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages/check_transition");
    for n in [3, 12] {
        let all = stages(n);
        let last = all[all.len() - 1].clone();
        group.bench_with_input(BenchmarkId::from_parameter(n), &all, |b, all| {
            b.iter(|| check_stage_transition(black_box(all), &last, StageStatus::InProgress))
        });
    }
    group.finish();
}

// ── Telegram ──────────────────────────────────────────────────────────────────

fn bench_parse_command(c: &mut Criterion) {
    let text = "/start@prhub_bot qr_f3K9wQ2mZx7LpA1bC4dE5fG6hJ8kL0nM";
    c.bench_function("telegram/parse_command", |b| {
        b.iter(|| parse_command(black_box(text), Some("prhub_bot")))
    });
}

fn bench_login_verification(c: &mut Criterion) {
    let data = TelegramAuthData {
        id: 123_456_789,
        first_name: Some("Anna".into()),
        last_name: Some("Petrova".into()),
        username: Some("anna_p".into()),
        photo_url: None,
        auth_date: 1_760_000_000,
        hash: "00".repeat(32),
    };

    c.bench_function("telegram/data_check_string", |b| {
        b.iter(|| data_check_string(black_box(&data)))
    });
    // A wrong hash still runs the full HMAC before rejecting.
    c.bench_function("telegram/verify_login", |b| {
        b.iter(|| verify_login_at(black_box(&data), "123456:ABC-DEF", 86_400, 1_760_000_100).is_err())
    });
}

// ── Argon2 password hashing ───────────────────────────────────────────────────

fn bench_argon2_hash(c: &mut Criterion) {
    c.bench_function("auth/argon2_hash", |b| {
        b.iter(|| prhub_api::auth::hash_password(black_box("hunter2-password-bench")).unwrap())
    });
}

criterion_group!(
    benches,
    bench_gamification,
    bench_stage_transition,
    bench_parse_command,
    bench_login_verification,
    bench_argon2_hash,
);
criterion_main!(benches);
