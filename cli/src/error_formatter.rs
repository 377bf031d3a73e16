use ariadne::{Color, Label, Report, ReportKind, Source};
use tsd::{ErrorKind, Span, TsdError, ValidationError};

/// Render a hard failure, pointing into the source for parse errors
pub fn format_error(error: &TsdError) -> String {
    match error {
        TsdError::Parse(details) => {
            let message = format!(
                "Parse error: {} (file {}:{})",
                details.message, details.source_id, details.span.line
            );
            render(
                &details.source_id,
                details.source_text.as_ref(),
                &details.span,
                message,
                details.suggestion.as_deref(),
            )
            .unwrap_or_else(|| error.to_string())
        }
        other => other.to_string(),
    }
}

/// Format a recorded error, pointing into the source when its span is known
pub fn format_validation_error(error: &ValidationError, source: Option<&str>) -> String {
    match (&error.span, source) {
        (Some(span), Some(text)) => {
            let message = format!("{} error: {}", kind_label(error.kind), error.message);
            render(&error.file, text, span, message, None).unwrap_or_else(|| error.to_string())
        }
        _ => error.to_string(),
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Parse => "Parse",
        ErrorKind::Type => "Type",
        ErrorKind::Rule => "Rule",
        ErrorKind::Fact => "Fact",
        ErrorKind::Action => "Action",
    }
}

fn render(
    source_id: &String,
    text: &str,
    span: &Span,
    message: String,
    suggestion: Option<&str>,
) -> Option<String> {
    let end = span.end.max(span.start).min(text.len());
    let start = span.start.min(end);

    let mut report = Report::build(ReportKind::Error, source_id, start)
        .with_message(message)
        .with_label(
            Label::new((source_id, start..end))
                .with_message("")
                .with_color(Color::Red),
        );
    if let Some(suggestion) = suggestion {
        report = report.with_help(suggestion);
    }

    let mut output = Vec::new();
    report
        .finish()
        .write((source_id, Source::from(text)), &mut output)
        .ok()?;
    Some(String::from_utf8_lossy(&output).to_string())
}
