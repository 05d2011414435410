//! Line-oriented interactive chat loop.
//!
//! Presentation glue over the session core: replays the hydrated
//! transcript, reads stdin, prints assistant output fragment by fragment
//! as it streams in, and maps slash commands onto session operations.

use std::error::Error;
use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::language::Language;
use crate::core::message::Role;
use crate::core::model::ModelId;
use crate::core::session::{Session, SessionError};

pub async fn run_chat(mut session: Session) -> Result<(), Box<dyn Error>> {
    print_transcript(&session);
    print_prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            print_prompt()?;
            continue;
        }

        if let Some(command) = text.strip_prefix('/') {
            if !handle_command(&mut session, command)? {
                break;
            }
            print_prompt()?;
            continue;
        }

        print!("{} ", Role::Assistant.default_avatar());
        std::io::stdout().flush()?;

        let outcome = session
            .submit(text, |fragment| {
                print!("{fragment}");
                let _ = std::io::stdout().flush();
            })
            .await;
        match outcome {
            Ok(()) => {
                println!();
                println!();
            }
            // The user turn is already recorded; show the failure inline
            // and keep the session going.
            Err(SessionError::Completion(e)) => {
                println!();
                println!("⚠️  {e}");
            }
            // History could not be written. Stop before losing more.
            Err(e @ SessionError::Transcript(_)) => return Err(e.into()),
        }
        print_prompt()?;
    }

    Ok(())
}

/// Dispatch a slash command. Returns `false` when the session should end.
fn handle_command(session: &mut Session, command: &str) -> Result<bool, Box<dyn Error>> {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("quit") | Some("salir") => return Ok(false),
        Some("clear") => {
            session.clear()?;
            println!("🗑️  El historial ha sido eliminado.");
        }
        Some("model") => match parts.next() {
            Some(id) => match ModelId::try_from(id) {
                Ok(model) => {
                    session.select_model(model);
                    println!("Modelo seleccionado: {model}");
                }
                Err(e) => println!("{e}"),
            },
            None => {
                println!("Modelos disponibles:");
                for model in ModelId::ALL {
                    let marker = if model == session.model() { "*" } else { " " };
                    println!("  {marker} {model}");
                }
            }
        },
        Some("language") | Some("idioma") => match parts.next() {
            Some(code) => match Language::try_from(code) {
                Ok(language) => {
                    session.select_language(language);
                    println!("Idioma seleccionado: {}", language.display_name());
                }
                Err(e) => println!("{e}"),
            },
            None => {
                println!("Idiomas disponibles:");
                for language in Language::ALL {
                    let marker = if language == session.language() { "*" } else { " " };
                    println!("  {marker} {} ({})", language.code(), language.display_name());
                }
            }
        },
        _ => {
            println!("Comandos: /model [id], /language [code], /clear, /quit");
        }
    }
    Ok(true)
}

fn print_transcript(session: &Session) {
    if session.turns().is_empty() {
        println!("No hay mensajes previos.");
        println!();
        return;
    }
    for turn in session.turns() {
        println!("{} {}", turn.avatar, turn.content);
        println!();
    }
}

fn print_prompt() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()
}
