//! Numbered model selection on a plain terminal.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, Lines};

use crate::api::models::format_size;
use crate::api::ModelDetails;
use crate::ui::console::{Console, Tone};

/// Print the model list and read a choice. `Ok(None)` when input ends
/// before a valid choice is made.
pub async fn pick_model<R, W>(
    console: &mut Console<W>,
    lines: &mut Lines<R>,
    models: &[ModelDetails],
) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if models.is_empty() {
        return Ok(None);
    }

    console.newline()?;
    console.info("Models available locally:")?;
    for (index, model) in models.iter().enumerate() {
        console.plain(&format!("{}. ", index + 1))?;
        console.write(Tone::Model, &model.name)?;
        if let Some(size) = model.size {
            console.plain(&format!("  ({})", format_size(size)))?;
        }
        console.newline()?;
    }

    loop {
        console.write(
            Tone::Prompt,
            &format!("Choose a model (1-{}): ", models.len()),
        )?;
        let Some(input) = lines.next_line().await? else {
            return Ok(None);
        };
        match parse_choice(&input, models.len()) {
            Some(index) => return Ok(Some(models[index].name.clone())),
            None => console.error("Invalid choice. Enter a number from the list.")?,
        }
    }
}

/// Shown when the server has no models pulled yet.
pub fn print_no_models_help<W: Write>(console: &mut Console<W>) -> io::Result<()> {
    console.newline()?;
    console.error("-------------------------------------------------")?;
    console.error("No Ollama models are installed yet.")?;
    console.info("Pull one from ANOTHER terminal, for example:")?;
    console.line(Tone::Prompt, "  ollama pull llama3")?;
    console.error("-------------------------------------------------")
}

fn parse_choice(input: &str, count: usize) -> Option<usize> {
    let choice: usize = input.trim().parse().ok()?;
    (1..=count).contains(&choice).then(|| choice - 1)
}
