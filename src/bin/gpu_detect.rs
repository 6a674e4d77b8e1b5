use telemetryd::gpu::amd::AmdAdapter;
use telemetryd::gpu::report::DetectionReport;

// Writes one json report to stdout and a human-readable summary to stderr.
// No tracing subscriber here: stdout carries nothing but the report.
#[tokio::main]
async fn main() {
    let Some(adapter) = AmdAdapter::probe().await else {
        print_error("rocm-smi not found. Please install ROCm.");
        std::process::exit(1);
    };

    let metrics = adapter.enumerate().await;
    if metrics.is_empty() {
        print_error("No GPUs detected or unable to parse rocm-smi output");
        std::process::exit(1);
    }

    let report = DetectionReport::from_metrics(metrics);
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("failed to encode report: {err}");
            std::process::exit(1);
        }
    }

    eprintln!();
    for line in report.summary_lines() {
        eprintln!("{line}");
    }
}

fn print_error(message: &str) {
    let body = serde_json::json!({
        "error": message,
        "gpus": []
    });
    eprintln!("{body}");
}
