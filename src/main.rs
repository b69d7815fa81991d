use std::sync::Arc;

use live_audio::audio::AlsaHost;
use live_audio::{BackendKind, Config, Conversation, ConversationReport, EchoBackend, NetLink};
use tokio::signal;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new().map_err(anyhow::Error::msg)?;
    log::info!(
        "{} {} starting, backend: {:?}",
        config.app_name,
        config.app_version,
        config.backend
    );

    let host = Arc::new(AlsaHost::new(config.capture_device, config.playback_device));
    let conversation = Conversation::from_config(&config, host);
    let stop = conversation.stop_handle();

    // Ctrl+C 时停止采集并结束下行流
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("Received Ctrl+C, shutting down...");
            stop.stop();
            let _ = shutdown_tx.send(true);
        }
    });

    // 设备读写是阻塞的，放到阻塞线程池中运行
    let handle = tokio::runtime::Handle::current();
    let report = tokio::task::spawn_blocking(move || match config.backend {
        BackendKind::WebSocket => {
            conversation.run(&mut NetLink::new(&config, handle, shutdown_rx))
        }
        BackendKind::Echo => conversation.run(&mut EchoBackend::new(handle, shutdown_rx)),
    })
    .await??;

    print_report(&report);
    println!("Exiting live audio run.");
    Ok(())
}

fn print_report(report: &ConversationReport) {
    match &report.playback {
        Some(stats) => println!(
            "Played {} bytes in {} writes across {} units",
            stats.bytes, stats.writes, stats.units
        ),
        None => println!("Speaker failed, see log for details"),
    }
    match &report.capture {
        Some(stats) => println!("Captured {} bytes in {} chunks", stats.bytes, stats.chunks),
        None if report.capture_joined => println!("Microphone failed, see log for details"),
        None => println!("Microphone thread did not finish in time"),
    }
}
