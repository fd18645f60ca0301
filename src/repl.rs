use std::io::Write;

use rustyline::error::ReadlineError;
use rustyline::{
    Cmd, ConditionalEventHandler, DefaultEditor, Event, EventContext, EventHandler, KeyEvent,
    Movement, RepeatCount,
};
use tracing::debug;

use crate::config::Config;
use crate::session::Session;

const PROMPT: &str = "» ";

/// Ctrl-C clears a line that has text and falls through to the default
/// interrupt (which ends the REPL) on an empty one.
struct ClearOrInterrupt;

impl ConditionalEventHandler for ClearOrInterrupt {
    fn handle(&self, _: &Event, _: RepeatCount, _: bool, ctx: &EventContext) -> Option<Cmd> {
        if ctx.line().is_empty() { None } else { Some(Cmd::Kill(Movement::WholeLine)) }
    }
}

/// Read-eval-print loop over one [`Session`]. Returns on EOF or on
/// Ctrl-C at an empty prompt.
pub fn start(config: &Config) -> rustyline::Result<()> {
    let mut editor = DefaultEditor::new()?;
    editor.bind_sequence(
        KeyEvent::ctrl('c'),
        EventHandler::Conditional(Box::new(ClearOrInterrupt)),
    );
    if let Err(e) = editor.load_history(&config.history) {
        debug!(path = %config.history.display(), error = %e, "no history loaded");
    }

    let prompt = if config.color { format!("\x1b[34m{PROMPT}\x1b[0m") } else { PROMPT.to_string() };
    let mut session = Session::with_config(config.vm_config());

    loop {
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        };
        if line.trim().is_empty() {
            continue;
        }
        editor.add_history_entry(line.as_str())?;

        match session.eval(&line) {
            Ok(Some(value)) => println!("{value}"),
            Ok(None) => {}
            Err(e) => {
                let mut stderr = std::io::stderr().lock();
                for d in e.diagnostics(&line) {
                    let _ = stderr.write_all(config.render(&d).as_bytes());
                }
            }
        }
    }

    if let Err(e) = editor.save_history(&config.history) {
        debug!(path = %config.history.display(), error = %e, "history not saved");
    }
    Ok(())
}
