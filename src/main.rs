use std::io::Write;

use omr_server::server::{self, EvaluateCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s
        } else {
            "Unknown panic payload"
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "Unknown location".to_string());

        let now = chrono::Utc::now();
        eprintln!("[PANIC] 程序异常退出");
        eprintln!("位置: {}", location);
        eprintln!("原因: {}", message);
        eprintln!("时间: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));

        tracing::error!(event = "panic.raised", location = %location, reason = %message, time = %now);

        let panic_msg = format!(
            "PANIC OCCURRED\nLocation: {}\nReason: {}\nTime: {}\n\n",
            location, message, now
        );
        if let Err(e) = std::fs::write("./panic.log", &panic_msg) {
            eprintln!("[WARN] 无法写入panic.log: {}", e);
        } else {
            eprintln!("[OK] Panic信息已保存到 ./panic.log");
        }

        std::io::stderr().flush().ok();
    }));

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("health-check") | Some("--health-check") => {
            let report = server::check_system_health().await?;
            println!(
                "健康检查: overall={}, staging_writable={}, evaluator_available={}, config_valid={}",
                report.overall_healthy,
                report.staging_writable,
                report.evaluator_available,
                report.config_valid
            );
            for warning in &report.validation_warnings {
                println!("  警告: {}", warning);
            }
            if !report.overall_healthy {
                std::process::exit(1);
            }
            Ok(())
        }
        Some("evaluate") => {
            let command = EvaluateCommand::parse(&args[1..])?;
            let report = server::run_once_evaluation(command).await?;
            print!("{}", report);
            Ok(())
        }
        _ => server::start_server().await,
    }
}
