//! 分诊引擎演示程序
//!
//! 展示接诊、状态转换、超时检测和病例持久化

use chrono::{Duration, Utc};
use std::sync::Arc;
use triage_core::{CaseStatus, ManualClock, PatientInfo, Sex, Vitals};
use triage_integration::{CaseRepository, InMemoryBackend, LogNotifier, DEFAULT_CASES_TABLE};
use triage_workflow::{
    CaseFilter, DelayWatcher, IntakeMode, IntakeRequest, NotificationDispatcher, TriageEngine,
    TriageIntake,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut engine = TriageEngine::new(
        clock.clone(),
        TriageIntake::default(),
        DelayWatcher::default(),
    );
    let repository = CaseRepository::new(Arc::new(InMemoryBackend::new()), DEFAULT_CASES_TABLE);
    let notifier = LogNotifier;

    println!("🚑 急诊分诊引擎演示\n");

    // 1. 接诊
    let arrivals = [
        ("Mve Albert", Some(67), Some(Sex::Male), "Arrêt respiratoire", 1, IntakeMode::Triaged),
        ("Nkoghe Alice", Some(34), Some(Sex::Female), "Fracture ouverte", 2, IntakeMode::Triaged),
        ("Bouanga Eric", Some(22), None, "Entorse", 4, IntakeMode::Triaged),
        ("Ivanga Lucie", None, None, "Fièvre", 3, IntakeMode::Registration),
    ];

    for (name, age, sex, motif, severity, mode) in arrivals {
        let vitals = (severity <= 3).then(|| Vitals {
            heart_rate: Some(104),
            spo2_percent: Some(93),
            ..Vitals::default()
        });

        let outcome = engine.register_case(IntakeRequest {
            patient: PatientInfo {
                name: name.to_string(),
                age,
                sex,
            },
            motif: motif.to_string(),
            severity,
            vitals,
            mode,
        })?;

        for request in &outcome.notifications {
            notifier.dispatch(request).await?;
        }
        repository.create(&outcome.case).await?;

        println!(
            "📋 {} {} (严重程度 {}) -> {}",
            outcome.case.reference, name, outcome.case.severity, outcome.case.status
        );
    }

    // 2. 推进流程
    let cases = engine.query_cases(&CaseFilter::default());
    let bouanga = cases[2].id;
    let ivanga = cases[3].id;

    clock.advance(Duration::minutes(5));
    engine.transition(ivanga, CaseStatus::AwaitingConsultation, Some("ioa-1".to_string()))?;

    if let Err(e) = engine.transition(bouanga, CaseStatus::InExam, None) {
        println!("⛔ 拒绝的转换: {}", e);
    }
    let discharged =
        engine.transition(bouanga, CaseStatus::Discharged, Some("dr-ella".to_string()))?;
    repository.save(&discharged).await?;
    println!("✅ {} 已离院", discharged.reference);

    // 3. 超时检测
    clock.advance(Duration::minutes(7));
    let report = engine.scan_delays();
    println!("\n⏰ 超时告警: {}", report.alerts.len());
    for alert in &report.alerts {
        println!("   - {}", alert.message);
    }
    for request in &report.notifications {
        notifier.dispatch(request).await?;
    }

    // 4. 看板
    let summary = engine.summary();
    println!("\n📊 看板统计:");
    println!("   总病例: {}", summary.total_cases);
    println!("   候诊中: {}", summary.open_cases);
    println!("   已结束: {}", summary.closed_cases);
    println!("   超时病例: {}", summary.breached_cases);
    println!("{}", serde_json::to_string_pretty(&summary.by_status)?);

    let persisted = repository.load_all().await?;
    println!("\n💾 已持久化病例: {}", persisted.len());

    println!("\n🎉 演示完成!");
    Ok(())
}
