//! CLI entry point over `marknote_core`.
//!
//! # Responsibility
//! - Provide a small executable for health checks, listing and backups.
//! - Keep output deterministic for scripted use.
//!
//! Storage location and tunables come from `MARKNOTE_*` environment
//! variables; see `CoreConfig::from_lookup`.

use log::info;
use marknote_core::transfer::export::ExportFormat;
use marknote_core::{CoreConfig, NoticeKind, NotesApp};
use std::process::ExitCode;

const USAGE: &str = "usage: marknote <ping|version|list|tags|import FILE|export-json|export-md ID|export-text ID>";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("MARKNOTE_LOG_DIR") {
        if let Err(err) = marknote_core::init_logging(marknote_core::default_log_level(), &log_dir)
        {
            eprintln!("logging disabled: {err}");
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<String, String> {
    let command = args.first().map(String::as_str).unwrap_or("ping");
    info!("event=cli_command module=cli status=start command={command}");
    match command {
        "ping" => return Ok(format!("marknote_core ping={}\n", marknote_core::ping())),
        "version" => {
            return Ok(format!(
                "marknote_core version={}\n",
                marknote_core::core_version()
            ))
        }
        _ => {}
    }

    let app = NotesApp::open(&CoreConfig::from_env()).map_err(|err| err.to_string())?;
    let argument = args.get(1).map(String::as_str);

    match (command, argument) {
        ("list", _) => {
            let state = app.state();
            let mut out = String::new();
            for note in state.notes() {
                let marker = if note.archived { " [archived]" } else { "" };
                out.push_str(&format!("{}\t{}{marker}\n", note.id, note.title));
            }
            Ok(out)
        }
        ("tags", _) => Ok(app
            .state()
            .all_tags()
            .iter()
            .map(|tag| format!("#{tag}\n"))
            .collect()),
        ("import", Some(path)) => {
            let json = std::fs::read_to_string(path)
                .map_err(|err| format!("cannot read `{path}`: {err}"))?;
            import(&app, &json)
        }
        ("export-json", _) => app
            .state()
            .export_json()
            .map(|json| format!("{json}\n"))
            .map_err(|err| err.to_string()),
        ("export-md", Some(id)) => render_note(&app, id, ExportFormat::Markdown),
        ("export-text", Some(id)) => render_note(&app, id, ExportFormat::Text),
        _ => Err(USAGE.to_string()),
    }
}

/// Imports a backup. Fails when the merged collection could not be saved.
fn import(app: &NotesApp, json: &str) -> Result<String, String> {
    let mut state = app.state();
    let summary = state.import_json(json).map_err(|err| err.to_string())?;
    let failures: Vec<String> = state
        .take_notices()
        .into_iter()
        .filter(|notice| matches!(notice.kind, NoticeKind::QuotaExceeded | NoticeKind::SaveFailed))
        .map(|notice| notice.message)
        .collect();
    if !failures.is_empty() {
        return Err(format!("import not saved: {}", failures.join("; ")));
    }
    Ok(format!(
        "imported added={} merged={}\n",
        summary.added, summary.merged
    ))
}

fn render_note(app: &NotesApp, id: &str, format: ExportFormat) -> Result<String, String> {
    app.state()
        .note(id)
        .map(|note| format.render(note))
        .ok_or_else(|| format!("note not found: {id}"))
}

#[cfg(test)]
mod tests {
    use super::{import, run};
    use marknote_core::{CoreConfig, NotesApp};

    fn backup(count: usize) -> String {
        let records: Vec<String> = (0..count)
            .map(|index| {
                format!(
                    r#"{{"id":"n{index}","title":"Note {index}","content":"{}","tags":[],"createdAt":1,"updatedAt":{index},"archived":false,"starred":false}}"#,
                    "x".repeat(400)
                )
            })
            .collect();
        format!("[{}]", records.join(","))
    }

    #[test]
    fn ping_and_version_need_no_storage() {
        assert_eq!(run(&["ping".to_string()]).unwrap(), "marknote_core ping=pong\n");
        assert!(run(&["version".to_string()]).unwrap().starts_with("marknote_core version="));
    }

    #[tokio::test]
    async fn import_reports_counts() {
        let app = NotesApp::open(&CoreConfig::in_memory()).unwrap();
        assert_eq!(
            import(&app, &backup(3)).unwrap(),
            "imported added=3 merged=0\n"
        );
    }

    #[tokio::test]
    async fn import_that_exceeds_quota_fails() {
        let config = CoreConfig {
            metadata_quota_bytes: 2_000,
            ..CoreConfig::in_memory()
        };
        let app = NotesApp::open(&config).unwrap();

        let err = import(&app, &backup(20)).unwrap_err();
        assert!(err.starts_with("import not saved:"), "{err}");
    }

    #[tokio::test]
    async fn malformed_import_is_an_error() {
        let app = NotesApp::open(&CoreConfig::in_memory()).unwrap();
        assert!(import(&app, "{}").is_err());
        assert!(app.state().notes().is_empty());
    }
}
