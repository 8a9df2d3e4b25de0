//! Interactive session: one draft, one stage per command.

use std::io::Write;

use color_eyre::eyre::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use curator_core::{Pipeline, StageOutcome};

const HELP: &str = "\
commands:
  fetch <url>        fetch a page into the draft
  title <text>       set the draft title
  instruct <text>    set the rewrite instruction
  id [override]      set or clear the archive id override
  rewrite            rewrite the fetched text
  archive [raw]      archive the rewritten text (or the fetched text with `raw`)
  retry              redo the file write of the last partial archive
  show               print the draft
  list               list archived documents
  reset              discard the draft
  help               show this help
  quit               leave the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    Fetch(String),
    Title(String),
    Instruct(String),
    Id(Option<String>),
    Rewrite,
    Archive { raw: bool },
    Retry,
    Show,
    List,
    Reset,
    Help,
    Quit,
    Empty,
}

/// Parse one input line. `Err` carries a message for the operator.
pub(crate) fn parse_line(line: &str) -> std::result::Result<SessionCommand, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let required = |usage: &str| {
        if rest.is_empty() {
            Err(format!("usage: {usage}"))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "" => SessionCommand::Empty,
        "fetch" => SessionCommand::Fetch(required("fetch <url>")?),
        "title" => SessionCommand::Title(required("title <text>")?),
        "instruct" => SessionCommand::Instruct(required("instruct <text>")?),
        "id" => SessionCommand::Id(Some(rest.to_string()).filter(|s| !s.is_empty())),
        "rewrite" => SessionCommand::Rewrite,
        "archive" => match rest {
            "" => SessionCommand::Archive { raw: false },
            "raw" => SessionCommand::Archive { raw: true },
            _ => return Err("usage: archive [raw]".into()),
        },
        "retry" => SessionCommand::Retry,
        "show" => SessionCommand::Show,
        "list" => SessionCommand::List,
        "reset" => SessionCommand::Reset,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => return Err(format!("unknown command `{other}`; type `help`")),
    };
    Ok(command)
}

/// Drive `pipeline` from `input` until `quit` or end of input.
pub(crate) async fn run<R, W>(pipeline: &mut Pipeline, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "curator session; type `help` for commands")?;
    let mut lines = input.lines();

    loop {
        write!(out, "curator> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(message) => {
                writeln!(out, "{message}")?;
                continue;
            }
        };

        match command {
            SessionCommand::Empty => {}
            SessionCommand::Fetch(url) => {
                let outcome = pipeline.submit_url(&url).await;
                report(out, &outcome)?;
            }
            SessionCommand::Title(title) => pipeline.set_title(title),
            SessionCommand::Instruct(instruction) => pipeline.set_instruction(instruction),
            SessionCommand::Id(requested) => pipeline.set_requested_id(requested),
            SessionCommand::Rewrite => {
                let draft = pipeline.draft();
                if draft.raw_text.trim().is_empty() {
                    writeln!(out, "nothing to rewrite; fetch a page first")?;
                    continue;
                }
                let (text, title) = (draft.raw_text.clone(), draft.title.clone());
                let outcome = pipeline.submit_rewrite(&text, &title, None).await;
                report(out, &outcome)?;
                if let Some(cleaned) = outcome.data() {
                    writeln!(out, "\n{cleaned}\n")?;
                }
            }
            SessionCommand::Archive { raw } => {
                let Some((title, text, requested)) = archive_inputs(pipeline, raw) else {
                    writeln!(out, "nothing to archive")?;
                    continue;
                };
                let outcome = pipeline
                    .submit_archive(&title, &text, requested.as_deref())
                    .await;
                report(out, &outcome)?;
            }
            SessionCommand::Retry => {
                let outcome = pipeline.retry_last().await;
                report(out, &outcome)?;
            }
            SessionCommand::Show => {
                writeln!(out, "{}", serde_json::to_string_pretty(pipeline.draft())?)?;
            }
            SessionCommand::List => {
                let outcome = pipeline.list_all().await;
                report(out, &outcome)?;
                for doc in outcome.data().into_iter().flatten() {
                    writeln!(out, "  {}\t{}", doc.id, doc.title)?;
                }
            }
            SessionCommand::Reset => {
                pipeline.reset();
                writeln!(out, "draft cleared")?;
            }
            SessionCommand::Help => writeln!(out, "{HELP}")?,
            SessionCommand::Quit => break,
        }
    }
    Ok(())
}

/// Title, text and id override for an archive of the current draft.
fn archive_inputs(pipeline: &Pipeline, raw: bool) -> Option<(String, String, Option<String>)> {
    let draft = pipeline.draft();
    let text = if raw {
        draft.raw_text.as_str()
    } else {
        draft.archivable_text()
    };
    if text.trim().is_empty() {
        return None;
    }
    Some((
        draft.title.clone(),
        text.to_string(),
        draft.requested_id.clone(),
    ))
}

fn report<T, W: Write>(out: &mut W, outcome: &StageOutcome<T>) -> Result<()> {
    match outcome {
        StageOutcome::Success { message, .. } => writeln!(out, "ok: {message}")?,
        StageOutcome::Failure { kind, message } => writeln!(out, "{kind} failed: {message}")?,
    }
    Ok(())
}
