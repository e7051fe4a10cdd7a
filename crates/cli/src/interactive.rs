use anyhow::Result;
use diagram_common::{ChatTurn, GenerationOutcome};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::api_client::{ApiClient, GenerateBody};
use crate::display;
use crate::RequestOptions;

/// Chat history and the diagram being edited, carried between prompts
#[derive(Debug, Default)]
pub struct Conversation {
    history: Vec<ChatTurn>,
    current_diagram: Option<String>,
}

impl Conversation {
    pub fn with_diagram(diagram: Option<String>) -> Self {
        Self {
            history: Vec::new(),
            current_diagram: diagram.filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn body<'a>(&'a self, prompt: &'a str, options: &'a RequestOptions) -> GenerateBody<'a> {
        GenerateBody {
            prompt,
            chat_history: &self.history,
            current_diagram: self.current_diagram.as_deref(),
            connection_id: options.connection_id.as_ref(),
            validate: options.validate,
        }
    }

    /// Record a finished exchange; a non-empty diagram becomes the one being edited
    pub fn record(&mut self, prompt: &str, outcome: &GenerationOutcome) {
        self.history.push(ChatTurn::user(prompt));
        self.history.push(ChatTurn::assistant(outcome.chat_answer.clone()));
        if !outcome.diagram_source.trim().is_empty() {
            self.current_diagram = Some(outcome.diagram_source.clone());
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.current_diagram = None;
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn current_diagram(&self) -> Option<&str> {
        self.current_diagram.as_deref()
    }
}

enum Command {
    Prompt(String),
    Diagram,
    Reset,
    Help,
    Quit,
    Empty,
}

fn parse_command(line: &str) -> Command {
    match line.trim() {
        "" => Command::Empty,
        "/quit" | "/exit" | "exit" => Command::Quit,
        "/reset" => Command::Reset,
        "/diagram" => Command::Diagram,
        "/help" => Command::Help,
        prompt => Command::Prompt(prompt.to_string()),
    }
}

const HELP: &str = "Commands: /diagram (show current diagram), /reset (start over), /quit";

pub async fn run(client: &ApiClient, options: &RequestOptions, initial_diagram: Option<String>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut conversation = Conversation::with_diagram(initial_diagram);

    println!("Diagram assistant - connected to {}", client.base_url());
    println!("{HELP}");

    loop {
        let line = match rl.readline("diagram> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Reset => {
                conversation.reset();
                println!("Conversation cleared.");
            }
            Command::Diagram => match conversation.current_diagram() {
                Some(diagram) => println!("```mermaid\n{diagram}\n```"),
                None => println!("No diagram yet."),
            },
            Command::Prompt(prompt) => {
                let _ = rl.add_history_entry(prompt.as_str());
                match client.generate(&conversation.body(&prompt, options)).await {
                    Ok(outcome) => {
                        println!("{}\n", display::format_outcome(&outcome));
                        conversation.record(&prompt, &outcome);
                    }
                    Err(e) => eprintln!("Error: {e:#}"),
                }
            }
        }
    }

    Ok(())
}
