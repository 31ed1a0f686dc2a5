pub mod session;
pub mod transcript;

use std::io::Write;
use std::process::ExitCode;

use color_print::cformat;
use eyre::Result;
use rustyline::{Config, Editor};

use crate::cli::chat::session::ChatSession;
use crate::cli::chat::transcript::{Origin, Status};

const WELCOME_TEXT: &str = "
Welcome to LA Help.ai
How can we help you today?

Things to try
• Where can I find shelter?
• How do I apply for disaster assistance?
• Where can I get food and water near me?

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
LA Help.ai

/clear        Clear the conversation history
/help         Show this help dialogue
/quit         Quit the application
";

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    session: ChatSession,
    rendered: usize,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        session: ChatSession,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            session,
            rendered: 0,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        if self.interactive {
            self.print_welcome()?;
        }

        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(rustyline::CompletionType::List)
            .build();
        let mut rl = Editor::<()>::with_config(config)?;

        loop {
            let readline = rl.readline("> ");

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        match input.trim() {
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.session.reset();
                self.rendered = 0;
                writeln!(self.output, "Conversation cleared.")?;
            }
            _ => {
                // The session itself never blocks on the network; the prompt
                // just chooses to wait for the reply before printing.
                self.session.submit(input);
                self.session.wait_idle().await;
                self.render_new()?;
            }
        }

        Ok(())
    }

    /// Prints every message that settled since the last render, oldest first.
    fn render_new(&mut self) -> Result<()> {
        let transcript = self.session.store().snapshot();
        for message in transcript.iter().skip(self.rendered) {
            let line = match (message.origin, message.status) {
                (Origin::User, _) => cformat!("<bold>you:</> {}", message.text),
                (Origin::Assistant, Status::Error) => {
                    cformat!("<cyan>LA Help.ai:</> <red>{}</>", message.text)
                }
                (Origin::Assistant, _) => {
                    cformat!("<cyan>LA Help.ai:</> {}", message.text)
                }
            };
            writeln!(self.output, "{}", line)?;
        }
        self.rendered = transcript.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::backend_client::BackendClient;
    use crate::cli::chat::transcript::Message;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn single_query_renders_user_and_reply_lines() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/query_services")
            .with_status(200)
            .with_body(r#"{"formatted_response": "Shelters are open at..."}"#)
            .create_async()
            .await;

        let session = ChatSession::new(BackendClient::new(format!(
            "{}/query_services",
            server.url()
        )));
        let buf = SharedBuf::default();
        let mut context = ChatContext::new(
            Box::new(buf.clone()),
            Some("Where can I find shelter?".to_string()),
            false,
            session,
        );

        context.run().await.unwrap();

        let output = buf.contents();
        assert!(output.contains("Where can I find shelter?"));
        assert!(output.contains("Shelters are open at..."));
    }

    #[tokio::test]
    async fn clear_command_resets_the_session() {
        let server = mockito::Server::new_async().await;
        let session = ChatSession::new(BackendClient::new(format!(
            "{}/query_services",
            server.url()
        )));
        let buf = SharedBuf::default();
        let mut context = ChatContext::new(Box::new(buf.clone()), None, false, session);

        context.session.store().append(Message::user("hi"));
        context.handle_input("/clear").await.unwrap();

        assert!(context.session.store().snapshot().is_empty());
        assert!(buf.contents().contains("Conversation cleared."));
    }
}
