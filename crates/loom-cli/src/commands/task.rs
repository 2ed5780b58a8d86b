use anyhow::Result;
use loom_core::task::OutputFormat;

use super::context::AppContext;

/// Prints the stored task, after applying any supplied fields.
pub async fn run(
    ctx: &AppContext,
    description: Option<String>,
    requirements: Option<String>,
    format: Option<OutputFormat>,
) -> Result<()> {
    let changed = description.is_some() || requirements.is_some() || format.is_some();
    if changed {
        ctx.workspace
            .update_task(|task| {
                if let Some(description) = description {
                    task.task_description = description;
                }
                if let Some(requirements) = requirements {
                    task.requirements = requirements;
                }
                if let Some(format) = format {
                    task.output_format = format;
                }
            })
            .await;
        ctx.workspace.save().await?;
    }

    let task = ctx.workspace.task().await;
    println!("description:  {}", task.task_description);
    println!("requirements: {}", task.requirements);
    println!("format:       {}", task.output_format);
    Ok(())
}
