use std::error::Error;
use std::sync::Arc;

use adslot_core::impls::{SimulatedSdk, StaticSlotSource};
use adslot_core::ports::{AdSdk, PresentationSurface};
use adslot_core::{AdCenterBuilder, AdCenterConfig, TaskProgress, TaskType, WatchOutcome};
use tokio::time::{Duration, timeout};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SLOT_PAYLOAD: &str = r#"{
    "data": {
        "ios": [
            { "taskId": "daily_task", "taskName": "Daily check-in", "slotIds": ["daily-a", "daily-b", "daily-c"], "watchIntervalSeconds": 30 },
            { "taskId": "swipe_task", "taskName": "Swipe", "slotIds": "swipe-a,swipe-b" },
            { "taskId": "feed", "taskName": "Feed", "slotIds": ["feed-a", "feed-b"] }
        ]
    }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 使い方: adslot-cli [task_type] [view_count]
    let mut args = std::env::args().skip(1);
    let task = match args.next() {
        Some(raw) => TaskType::from_wire(&raw).ok_or_else(|| format!("unknown task type: {raw}"))?,
        None => TaskType::DailyTask,
    };
    let view_count: u64 = args.next().map(|raw| raw.parse()).transpose()?.unwrap_or(0);
    info!(%task, view_count, "starting ad session");

    // (A) SDK とスロット設定ソースを用意（どちらも開発用の代役）
    let sdk: Arc<dyn AdSdk> = Arc::new(SimulatedSdk::auto(
        Duration::from_millis(300),
        Duration::from_secs(2),
    ));
    let source = Arc::new(StaticSlotSource::new(SLOT_PAYLOAD));

    // (B) AdCenter を組み立ててスロット設定を取得
    let center = AdCenterBuilder::new()
        .config(AdCenterConfig::default())
        .sdk(sdk)
        .slot_source(source)
        .build()?;
    center.refresh_slots().await?;
    println!(
        "task={task} slots_available={} watch_interval={}s",
        center.has_available_slots(task),
        center.watch_interval(task)
    );

    // (C) イベントを購読してから視聴を開始
    let mut events = center.subscribe();
    let progress = TaskProgress::new().with_count(task, view_count);
    let outcome = center
        .watch_ad_for_task(task, &progress, PresentationSurface::new("task-center"))
        .await?;
    let shown = match outcome {
        WatchOutcome::Presented {
            slot_id,
            used_fallback,
            preloading,
        } => {
            println!("presenting slot={slot_id} fallback={used_fallback} preloading={preloading:?}");
            slot_id
        }
        WatchOutcome::Unavailable => {
            println!("no ad available for {task}");
            return Ok(());
        }
    };

    // (D) 表示中スロットの Closed まで流れるイベントを表示
    let watch = async {
        while let Some(event) = events.recv().await {
            println!("event: slot={} instance={} {:?}", event.slot_id, event.instance_id, event.event);
            if event.slot_id == shown && event.event.is_terminal() {
                break;
            }
        }
    };
    if timeout(Duration::from_secs(30), watch).await.is_err() {
        println!("gave up waiting for the ad to close");
    }

    // (E) 猶予時間後に自動削除されることを確認してから後片付け
    tokio::time::sleep(center.config().reward_options().close_grace + Duration::from_millis(100)).await;
    let registered = center.registry().contains(&shown).await;
    println!("after close: {shown} registered={registered}");
    if let Some(next) = center.next_slot(task, &progress) {
        let state = center.state_description(&next).await;
        println!("next slot: {next} state={state}");
    }
    center.shutdown().await;
    Ok(())
}
