//! Event output

use std::io::Write;

use stackforge_types::StackEvent;

/// Receives events the monitor decided to show.
pub trait EventSink: Send {
    /// `prefix` is the logical name of the nested stack the event came
    /// from, `None` for events of the monitored stack itself.
    fn emit(&mut self, event: &StackEvent, prefix: Option<&str>);
}

/// Render one event line.
///
/// `YYYY-MM-DD HH:MM:SS| <type:40>  <logical:38>  <status>`, followed by
/// the reason for failed statuses.
pub fn format_event(event: &StackEvent, prefix: Option<&str>) -> String {
    let logical = match prefix {
        Some(parent) => format!("{parent}/{}", event.logical_id),
        None => event.logical_id.clone(),
    };
    let mut line = format!(
        "{}| {:<40}  {:<38}  {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.resource_type,
        logical,
        event.status
    );
    if event.is_failure() {
        if let Some(reason) = &event.status_reason {
            line.push(' ');
            line.push_str(reason);
        }
    }
    line
}

/// Prints event lines to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &StackEvent, prefix: Option<&str>) {
        let mut out = std::io::stdout().lock();
        // Broken pipes are not worth aborting a deployment over
        let _ = writeln!(out, "{}", format_event(event, prefix));
    }
}

/// Keeps formatted lines in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub lines: Vec<String>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &StackEvent, prefix: Option<&str>) {
        self.lines.push(format_event(event, prefix));
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &StackEvent, _prefix: Option<&str>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(status: &str, reason: Option<&str>) -> StackEvent {
        StackEvent {
            event_id: "e1".into(),
            stack_id: "arn:stack/web/1".into(),
            stack_name: "web".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
            resource_type: "AWS::EC2::Subnet".into(),
            logical_id: "Subnet".into(),
            physical_id: None,
            status: status.into(),
            status_reason: reason.map(String::from),
        }
    }

    #[test]
    fn test_line_layout() {
        let line = format_event(&event("CREATE_COMPLETE", Some("ignored")), None);
        assert_eq!(
            line,
            format!(
                "2024-03-01 12:30:05| {:<40}  {:<38}  CREATE_COMPLETE",
                "AWS::EC2::Subnet", "Subnet"
            )
        );
    }

    #[test]
    fn test_failure_reason_appended() {
        let line = format_event(&event("CREATE_FAILED", Some("quota exceeded")), None);
        assert!(line.ends_with("CREATE_FAILED quota exceeded"));
    }

    #[test]
    fn test_nested_prefix() {
        let line = format_event(&event("CREATE_COMPLETE", None), Some("Network"));
        assert!(line.contains("Network/Subnet"));
    }
}
