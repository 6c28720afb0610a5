//! Status rendering and table formatting.

use std::time::{Duration, Instant};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::poll::StatusObserver;
use crate::status::JobStatus;

/// Format seconds as `H:MM:SS`, or `-` when unknown.
pub fn format_hms(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite() && *s >= 0.0) else {
        return "-".to_string();
    };
    let total = seconds.round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn format_position(queue_position: Option<u64>) -> String {
    queue_position.map_or_else(|| "-".to_string(), |p| p.to_string())
}

/// Discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl StatusObserver for SilentObserver {
    fn observe(&mut self, _status: &JobStatus, _queue_position: Option<u64>, _etd_seconds: Option<f64>) {}
}

/// Emits one `info!` line per distinct status.
///
/// PENDING is reported a second time, with queue position and ETA, the first
/// time either becomes available. POSTPROCESSING and unrecognized statuses
/// are not reported.
#[derive(Debug, Clone, Default)]
pub struct LogObserver {
    last_status: Option<JobStatus>,
    queue_info_reported: bool,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line to emit for this observation, if any.
    pub fn next_line(
        &mut self,
        status: &JobStatus,
        queue_position: Option<u64>,
        etd_seconds: Option<f64>,
    ) -> Option<String> {
        let has_queue_info = queue_position.is_some() || etd_seconds.is_some();

        if self.last_status.as_ref() == Some(status) {
            if *status == JobStatus::Pending && has_queue_info && !self.queue_info_reported {
                self.queue_info_reported = true;
                return Some(pending_line(queue_position, etd_seconds));
            }
            return None;
        }
        self.last_status = Some(status.clone());

        match status {
            JobStatus::Postprocessing | JobStatus::Unknown(_) => None,
            JobStatus::Pending if has_queue_info && !self.queue_info_reported => {
                self.queue_info_reported = true;
                Some(pending_line(queue_position, etd_seconds))
            }
            other => Some(format!("Job {other}")),
        }
    }
}

fn pending_line(queue_position: Option<u64>, etd_seconds: Option<f64>) -> String {
    format!(
        "Job PENDING -> position in queue: {}, max ETD: {}",
        format_position(queue_position),
        format_hms(etd_seconds)
    )
}

impl StatusObserver for LogObserver {
    fn observe(&mut self, status: &JobStatus, queue_position: Option<u64>, etd_seconds: Option<f64>) {
        if let Some(line) = self.next_line(status, queue_position, etd_seconds) {
            info!("{line}");
        }
    }
}

/// Terminal spinner showing the live status.
///
/// The spinner advances once per observation; there is no background
/// ticker thread.
pub struct SpinnerObserver {
    bar: ProgressBar,
    pid: String,
    device: Option<String>,
    started: Instant,
}

impl SpinnerObserver {
    pub fn new(pid: impl Into<String>, device: Option<String>) -> Self {
        Self::with_bar(ProgressBar::new_spinner(), pid, device)
    }

    /// Spinner drawing into `bar`.
    pub fn with_bar(bar: ProgressBar, pid: impl Into<String>, device: Option<String>) -> Self {
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Waiting for job status...");
        Self {
            bar,
            pid: pid.into(),
            device,
            started: Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl StatusObserver for SpinnerObserver {
    fn observe(&mut self, status: &JobStatus, queue_position: Option<u64>, etd_seconds: Option<f64>) {
        let mut message = format!(
            "Job {} {}",
            style(&self.pid).dim(),
            style(status).cyan().bold()
        );
        if *status == JobStatus::Pending {
            message.push_str(&format!(
                "  queue position: {}  max ETD: {}",
                format_position(queue_position),
                format_hms(etd_seconds)
            ));
        }
        message.push_str(&format!(
            "  elapsed {}",
            format_hms(Some(self.elapsed().as_secs_f64()))
        ));
        self.bar.set_message(message);
        self.bar.tick();
    }

    fn finish(&mut self, status: &JobStatus) {
        let mark = if *status == JobStatus::Success {
            style("✓").green().bold()
        } else {
            style("✗").red().bold()
        };
        let device = self.device.as_deref().unwrap_or("-");
        self.bar.finish_with_message(format!(
            "{mark} Job {} {} on {}  elapsed {}",
            style(&self.pid).dim(),
            status,
            device,
            format_hms(Some(self.elapsed().as_secs_f64()))
        ));
    }
}

/// Render rows as a plain-text table with a header rule.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let format_row = |cells: &mut dyn Iterator<Item = &str>| -> String {
        let line: Vec<String> = widths
            .iter()
            .zip(cells.chain(std::iter::repeat("")))
            .map(|(w, cell)| format!("{cell:<w$}"))
            .collect();
        line.join("  ").trim_end().to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(format_row(&mut headers.iter().copied()));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        out.push(format_row(&mut row.iter().map(String::as_str)));
    }
    out.join("\n")
}

/// Reformat an RFC 3339 timestamp as `%Y-%m-%d %H:%M:%S`. Unparseable
/// values are returned unchanged.
pub fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Some(120.0)), "0:02:00");
        assert_eq!(format_hms(Some(3725.4)), "1:02:05");
        assert_eq!(format_hms(Some(0.0)), "0:00:00");
        assert_eq!(format_hms(None), "-");
        assert_eq!(format_hms(Some(f64::NAN)), "-");
    }

    #[test]
    fn test_log_observer_dedup() {
        let mut observer = LogObserver::new();
        let seq: Vec<(JobStatus, Option<u64>, Option<f64>)> = vec![
            (JobStatus::Queueing, None, None),
            (JobStatus::Queueing, None, None),
            (JobStatus::Pending, None, None),
            (JobStatus::Pending, Some(3), Some(120.0)),
            (JobStatus::Pending, Some(2), Some(60.0)),
            (JobStatus::Running, None, None),
            (JobStatus::Postprocessing, None, None),
            (JobStatus::Success, None, None),
        ];
        let lines: Vec<String> = seq
            .iter()
            .filter_map(|(s, q, e)| observer.next_line(s, *q, *e))
            .collect();
        assert_eq!(
            lines,
            vec![
                "Job QUEUEING",
                "Job PENDING",
                "Job PENDING -> position in queue: 3, max ETD: 0:02:00",
                "Job RUNNING",
                "Job SUCCESS",
            ]
        );
    }

    #[test]
    fn test_log_observer_pending_with_info_first() {
        let mut observer = LogObserver::new();
        assert_eq!(
            observer.next_line(&JobStatus::Pending, Some(1), None).as_deref(),
            Some("Job PENDING -> position in queue: 1, max ETD: -")
        );
        assert_eq!(observer.next_line(&JobStatus::Pending, Some(1), Some(5.0)), None);
    }

    #[test]
    fn test_log_observer_skips_unknown() {
        let mut observer = LogObserver::new();
        assert_eq!(observer.next_line(&JobStatus::Unknown("paused".into()), None, None), None);
        assert_eq!(
            observer.next_line(&JobStatus::Error, None, None).as_deref(),
            Some("Job ERROR")
        );
    }

    fn plain(bar: &ProgressBar) -> String {
        console::strip_ansi_codes(&bar.message()).into_owned()
    }

    #[test]
    fn test_spinner_tracks_each_observation() {
        let bar = ProgressBar::hidden();
        let mut spinner = SpinnerObserver::with_bar(bar.clone(), "p-42", Some("sim".into()));
        assert_eq!(plain(&bar), "Waiting for job status...");

        spinner.observe(&JobStatus::Pending, Some(3), Some(120.0));
        let pending = plain(&bar);
        assert!(pending.starts_with("Job p-42 PENDING"), "{pending}");
        assert!(pending.contains("queue position: 3  max ETD: 0:02:00"), "{pending}");

        spinner.observe(&JobStatus::Running, None, None);
        let running = plain(&bar);
        assert!(running.starts_with("Job p-42 RUNNING"), "{running}");
        assert!(!running.contains("queue position"));
        assert!(!bar.is_finished());
    }

    #[test]
    fn test_spinner_finish_message() {
        let bar = ProgressBar::hidden();
        let mut spinner = SpinnerObserver::with_bar(bar.clone(), "p-42", Some("sim".into()));
        spinner.observe(&JobStatus::Success, None, None);
        spinner.finish(&JobStatus::Success);

        assert!(bar.is_finished());
        let done = plain(&bar);
        assert!(done.starts_with("✓ Job p-42 SUCCESS on sim"), "{done}");

        let bar = ProgressBar::hidden();
        let mut spinner = SpinnerObserver::with_bar(bar.clone(), "p-43", None);
        spinner.finish(&JobStatus::Error);
        assert!(plain(&bar).starts_with("✗ Job p-43 ERROR on -"));
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(
            &["Pid", "Status"],
            &[
                vec!["abc".into(), "success".into()],
                vec!["a-much-longer-pid".into(), "error".into()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Pid                Status");
        assert_eq!(lines[1], "-----------------  -------");
        assert_eq!(lines[2], "abc                success");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp("2024-05-01T10:20:30.123456Z"),
            "2024-05-01 10:20:30"
        );
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }
}
