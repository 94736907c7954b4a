//! Interactive chat loop

use std::io::Write;
use std::time::Duration;

use colored::control;
use dial_core::{ChatCompletionRequest, Dial, Message};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::conversation::Conversation;
use crate::error::{format_error, Error, Result};

const SYSTEM_PROMPT_QUESTION: &str = "Provide System prompt or press 'enter' to continue.";
const GOODBYE: &str = "Exiting the chat. Goodbye!";
const PROMPT: &str = "> ";

/// One chat session against a single deployment
pub struct ChatSession<'a> {
    client: &'a Dial,
    deployment: String,
    stream: bool,
    system_prompt: Option<String>,
    spinner: bool,
}

impl<'a> ChatSession<'a> {
    pub fn new(client: &'a Dial, deployment: impl Into<String>, stream: bool) -> Self {
        Self {
            client,
            deployment: deployment.into(),
            stream,
            system_prompt: None,
            spinner: false,
        }
    }

    /// Use this system prompt instead of asking for one
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Show a spinner while waiting for non-streamed answers
    pub fn with_spinner(mut self, spinner: bool) -> Self {
        self.spinner = spinner;
        self
    }

    /// Run until `exit` or end of input, returning the transcript
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<Conversation>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        let mut conversation = Conversation::new();

        let system_prompt = match &self.system_prompt {
            Some(prompt) => prompt.clone(),
            None => {
                writeln!(output, "{}", SYSTEM_PROMPT_QUESTION)?;
                write!(output, "{}", PROMPT)?;
                output.flush()?;
                let answer = lines.next_line().await?.unwrap_or_default();
                match answer.trim() {
                    "" => DEFAULT_SYSTEM_PROMPT.to_string(),
                    prompt => prompt.to_string(),
                }
            }
        };
        conversation.add_message(Message::system(system_prompt));

        writeln!(output, "\nType your question or 'exit' to quit.")?;
        loop {
            write!(output, "{}", PROMPT)?;
            output.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(output, "\n{}", GOODBYE)?;
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case("exit") {
                writeln!(output, "{}", GOODBYE)?;
                break;
            }

            conversation.add_message(Message::user(line));
            match self.turn(&conversation, output).await {
                Ok(reply) => conversation.add_message(Message::assistant(reply)),
                Err(Error::Io(e)) => return Err(Error::Io(e)),
                Err(e) => {
                    tracing::warn!(error = %e, "Chat turn failed");
                    eprintln!("{}", format_error(&e, control::SHOULD_COLORIZE.should_colorize()));
                    conversation.pop();
                }
            }
        }

        tracing::info!(messages = conversation.len(), "Chat session finished");
        Ok(conversation)
    }

    /// Ask for one answer and print it
    async fn turn<W: Write>(&self, conversation: &Conversation, output: &mut W) -> Result<String> {
        let request = ChatCompletionRequest::new(conversation.messages().to_vec());
        let completions = self.client.chat().completions();

        if self.stream {
            let mut chunks = completions.create_stream(&self.deployment, &request).await?;
            let mut reply = String::new();
            while let Some(chunk) = chunks.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        writeln!(output)?;
                        return Err(e.into());
                    }
                };
                if let Some(snippet) = chunk.content() {
                    write!(output, "{}", snippet)?;
                    output.flush()?;
                    reply.push_str(snippet);
                }
            }
            writeln!(output)?;
            Ok(reply)
        } else {
            let spinner = self.spinner.then(waiting_spinner);
            let result = completions.create(&self.deployment, &request).await;
            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }

            let completion = result?;
            let choice = completion.choices.first().ok_or(Error::NoChoices)?;
            let content = choice.message.content.clone().unwrap_or_default();
            writeln!(output, "{}", content)?;
            Ok(content)
        }
    }
}

fn waiting_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Waiting for response...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use dial_core::Role;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COMPLETIONS: &str = "/openai/deployments/gpt-4o/chat/completions";

    fn client(server: &MockServer) -> Dial {
        Dial::builder()
            .base_url(server.uri())
            .api_key("test-key")
            .max_retries(0)
            .build()
            .unwrap()
    }

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "c1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        }))
    }

    async fn run(session: &ChatSession<'_>, input: &str) -> (Conversation, String) {
        let mut output = Vec::new();
        let conversation = session.run(input.as_bytes(), &mut output).await.unwrap();
        (conversation, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn test_default_system_prompt_and_exit() {
        let server = MockServer::start().await;
        let client = client(&server);
        let session = ChatSession::new(&client, "gpt-4o", false);

        let (conversation, output) = run(&session, "\n\n  EXIT  \n").await;

        assert!(output.starts_with(SYSTEM_PROMPT_QUESTION));
        assert!(output.ends_with("Exiting the chat. Goodbye!\n"));
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].content, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_non_streaming_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .and(body_partial_json(json!({
                "stream": false,
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(completion("Hi!"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let session = ChatSession::new(&client, "gpt-4o", false)
            .with_system_prompt(Some("Be brief.".to_string()));
        let (conversation, output) = run(&session, "hello\n").await;

        assert!(!output.contains(SYSTEM_PROMPT_QUESTION));
        assert!(output.contains("Hi!\n"));
        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(conversation.messages()[2].content, "Hi!");
    }

    #[tokio::test]
    async fn test_streaming_turn() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let session = ChatSession::new(&client, "gpt-4o", true);
        let (conversation, output) = run(&session, "Pirate\nhi\nexit\n").await;

        assert!(output.contains("Hello\n"));
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.messages()[0].content, "Pirate");
        assert_eq!(conversation.messages()[2].content, "Hello");
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_transcript_consistent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .respond_with(completion("recovered"))
            .mount(&server)
            .await;

        let client = client(&server);
        let session = ChatSession::new(&client, "gpt-4o", false);
        let (conversation, _) = run(&session, "\nfirst\nsecond\n").await;

        let contents: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec![DEFAULT_SYSTEM_PROMPT, "second", "recovered"]);
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1", "choices": []})))
            .mount(&server)
            .await;

        let client = client(&server);
        let session = ChatSession::new(&client, "gpt-4o", false);
        let conversation = Conversation::new();
        let mut output = Vec::new();
        let err = session.turn(&conversation, &mut output).await.unwrap_err();

        assert!(matches!(err, Error::NoChoices));
    }
}
