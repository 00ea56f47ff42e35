//! One-shot diagnostic report

use crate::cli::{CommandContext, OutputFormat};
use crate::error::Result;
use crate::orchestrator::DebugReport;
use crate::orchestrator::debug::compose;
use crate::output::{FieldRow, format_table};

/// Print one debug report composed from the cache and local context
pub async fn run(ctx: &CommandContext) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let info = ctx.debug_info();
    let report = compose(&orchestrator, info.as_ref()).await?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => println!("{}", format_table(&rows(&report)?)),
    }

    Ok(())
}

/// Flatten the report into FIELD/VALUE rows, sorted by field name
fn rows(report: &DebugReport) -> Result<Vec<FieldRow>> {
    let value = serde_json::to_value(report)?;
    let Some(fields) = value.as_object() else {
        return Ok(Vec::new());
    };

    Ok(fields
        .iter()
        .map(|(field, value)| {
            let shown = match value {
                serde_json::Value::Null => "n/a".to_string(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            FieldRow::new(field, shown)
        })
        .collect())
}
